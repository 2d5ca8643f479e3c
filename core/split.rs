/*!
This module partitions row indexes into train and test sets, for the holdout split and for k-fold cross validation. All partitions are shuffled with a seeded `Xoshiro256Plus` so they are reproducible.
*/

use crate::error::{Error, Result};
use crate::target::Target;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
	pub train: Vec<usize>,
	pub test: Vec<usize>,
}

/// Split the rows of `target` into a train set and a test set holding `test_fraction` of the rows. Classification targets are split per class so that both sets keep the class proportions.
pub fn train_test_split(target: &Target, test_fraction: f64, seed: u64) -> Result<Fold> {
	if !(test_fraction > 0.0 && test_fraction < 1.0) {
		return Err(Error::InvalidConfig(format!(
			"test_fraction must be in (0, 1), got {}",
			test_fraction
		)));
	}
	let n_rows = target.len();
	if n_rows < 2 {
		return Err(Error::InvalidInput(format!(
			"at least 2 rows are required to split, got {}",
			n_rows
		)));
	}
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	let mut train = Vec::new();
	let mut test = Vec::new();
	for mut group in groups(target) {
		group.shuffle(&mut rng);
		let n_test = (group.len() as f64 * test_fraction).round() as usize;
		test.extend_from_slice(&group[..n_test]);
		train.extend_from_slice(&group[n_test..]);
	}
	// Rounding per class can leave either side empty on tiny datasets.
	if test.is_empty() {
		if let Some(index) = train.pop() {
			test.push(index);
		}
	}
	if train.is_empty() {
		if let Some(index) = test.pop() {
			train.push(index);
		}
	}
	train.sort_unstable();
	test.sort_unstable();
	Ok(Fold { train, test })
}

/// Shuffle the rows and cut them into `n_splits` contiguous folds. The first `n_rows % n_splits` folds have one extra row.
pub fn k_fold(n_rows: usize, n_splits: usize, seed: u64) -> Result<Vec<Fold>> {
	check_n_splits(n_rows, n_splits)?;
	let mut indexes: Vec<usize> = (0..n_rows).collect();
	indexes.shuffle(&mut Xoshiro256Plus::seed_from_u64(seed));
	let fold_of = |position: usize| {
		let base = n_rows / n_splits;
		let remainder = n_rows % n_splits;
		let boundary = remainder * (base + 1);
		if position < boundary {
			position / (base + 1)
		} else {
			remainder + (position - boundary) / base
		}
	};
	let assignments: Vec<(usize, usize)> = indexes
		.into_iter()
		.enumerate()
		.map(|(position, index)| (index, fold_of(position)))
		.collect();
	Ok(folds(&assignments, n_splits))
}

/// Assign the rows of each class to folds in turn, so every fold has close to the same class proportions as the whole target.
pub fn stratified_k_fold(target: &Target, n_splits: usize, seed: u64) -> Result<Vec<Fold>> {
	check_n_splits(target.len(), n_splits)?;
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	let mut assignments = Vec::with_capacity(target.len());
	let mut position = 0;
	for mut group in groups(target) {
		if group.len() < n_splits {
			log::warn!(
				"a class has {} rows, which is fewer than the {} folds",
				group.len(),
				n_splits
			);
		}
		group.shuffle(&mut rng);
		for index in group {
			assignments.push((index, position % n_splits));
			position += 1;
		}
	}
	Ok(folds(&assignments, n_splits))
}

/// Stratified folds for classification targets and shuffled plain folds for regression targets.
pub fn cv_folds(target: &Target, n_splits: usize, seed: u64) -> Result<Vec<Fold>> {
	match target {
		Target::Classification { .. } => stratified_k_fold(target, n_splits, seed),
		Target::Regression { .. } => k_fold(target.len(), n_splits, seed),
	}
}

fn check_n_splits(n_rows: usize, n_splits: usize) -> Result<()> {
	if n_splits < 2 {
		return Err(Error::InvalidConfig(format!(
			"cv_folds must be at least 2, got {}",
			n_splits
		)));
	}
	if n_splits > n_rows {
		return Err(Error::InvalidInput(format!(
			"cannot split {} rows into {} folds",
			n_rows, n_splits
		)));
	}
	Ok(())
}

/// The row indexes of each class in row order, or a single group holding every row for regression.
fn groups(target: &Target) -> Vec<Vec<usize>> {
	match target {
		Target::Classification { classes, labels } => {
			let mut groups = vec![Vec::new(); classes.len()];
			for (index, label) in labels.iter().enumerate() {
				groups[*label].push(index);
			}
			groups.retain(|group| !group.is_empty());
			groups
		}
		Target::Regression { values } => vec![(0..values.len()).collect()],
	}
}

fn folds(assignments: &[(usize, usize)], n_splits: usize) -> Vec<Fold> {
	(0..n_splits)
		.map(|fold_index| {
			let mut train = Vec::new();
			let mut test = Vec::new();
			for (index, fold) in assignments.iter() {
				if *fold == fold_index {
					test.push(*index);
				} else {
					train.push(*index);
				}
			}
			train.sort_unstable();
			test.sort_unstable();
			Fold { train, test }
		})
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;

	fn classification(labels: Vec<usize>) -> Target {
		Target::Classification {
			classes: vec!["a".to_owned(), "b".to_owned()],
			labels,
		}
	}

	#[test]
	fn test_stratified_holdout() {
		let labels: Vec<usize> = (0..100).map(|index| if index < 80 { 0 } else { 1 }).collect();
		let target = classification(labels.clone());
		let fold = train_test_split(&target, 0.2, 42).unwrap();
		assert_eq!(fold.test.len(), 20);
		assert_eq!(fold.train.len(), 80);
		let n_positive_test = fold.test.iter().filter(|index| labels[**index] == 1).count();
		assert_eq!(n_positive_test, 4);
		assert_eq!(fold, train_test_split(&target, 0.2, 42).unwrap());
	}

	#[test]
	fn test_k_fold_sizes() {
		let folds = k_fold(11, 3, 0).unwrap();
		let sizes: Vec<usize> = folds.iter().map(|fold| fold.test.len()).collect();
		assert_eq!(sizes, vec![4, 4, 3]);
		let mut all: Vec<usize> = folds.iter().flat_map(|fold| fold.test.clone()).collect();
		all.sort_unstable();
		assert_eq!(all, (0..11).collect::<Vec<_>>());
		for fold in folds.iter() {
			assert_eq!(fold.train.len() + fold.test.len(), 11);
		}
	}

	#[test]
	fn test_stratified_k_fold_keeps_classes_in_every_fold() {
		let labels: Vec<usize> = (0..30).map(|index| index % 3 / 2).collect();
		let target = classification(labels.clone());
		for fold in stratified_k_fold(&target, 5, 7).unwrap() {
			assert!(fold.test.iter().any(|index| labels[*index] == 0));
			assert!(fold.test.iter().any(|index| labels[*index] == 1));
			assert_eq!(fold.test.len(), 6);
		}
	}

	#[test]
	fn test_too_many_folds() {
		assert!(matches!(k_fold(3, 5, 0), Err(Error::InvalidInput(_))));
		assert!(matches!(k_fold(3, 1, 0), Err(Error::InvalidConfig(_))));
	}
}
