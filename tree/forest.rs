use super::{
	argmax_rows, check_class_labels, compute_binned_features, compute_binning_instructions,
	train_tree, MaxFeatures, SplitStrategy, Tree, TreeError, TreeOptions, DEFAULT_MAX_BINS,
};
use kitsune_util::progress_counter::ProgressCounter;
use ndarray::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;

/// These are the options passed to `ForestRegressor::train` and `ForestClassifier::train`.
#[derive(Debug, Clone)]
pub struct ForestOptions {
	pub n_trees: usize,
	/// If true, each tree is trained on a sample of the examples drawn with replacement.
	pub bootstrap: bool,
	pub tree_options: TreeOptions,
	pub max_bins: usize,
	pub seed: u64,
}

impl ForestOptions {
	/// Fully grown trees on bootstrap samples, with the best split among `max_features` features at each node.
	pub fn random_forest(n_trees: usize, max_features: MaxFeatures, seed: u64) -> Self {
		Self {
			n_trees,
			bootstrap: true,
			tree_options: TreeOptions {
				max_features,
				split_strategy: SplitStrategy::Best,
				..Default::default()
			},
			max_bins: DEFAULT_MAX_BINS,
			seed,
		}
	}

	/// Fully grown trees on every example, with a random split of each of `max_features` features at each node.
	pub fn extra_trees(n_trees: usize, max_features: MaxFeatures, seed: u64) -> Self {
		Self {
			n_trees,
			bootstrap: false,
			tree_options: TreeOptions {
				max_features,
				split_strategy: SplitStrategy::Random,
				..Default::default()
			},
			max_bins: DEFAULT_MAX_BINS,
			seed,
		}
	}
}

/// A forest regressor predicts the mean of its trees' predictions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ForestRegressor {
	pub n_features: usize,
	pub trees: Vec<Tree>,
}

/// A forest classifier's trees predict the proportion of each class in their leaves, and the forest predicts the mean of these proportions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ForestClassifier {
	pub n_features: usize,
	pub n_classes: usize,
	pub trees: Vec<Tree>,
}

impl ForestRegressor {
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &ForestOptions,
	) -> Result<Self, TreeError> {
		if labels.is_empty() {
			return Err(TreeError::NoExamples);
		}
		// With squared error, unit hessians and negated labels as gradients make each leaf the mean of its labels.
		let gradients = labels.mapv(|label| -label).insert_axis(Axis(1));
		let hessians = Array2::ones(gradients.raw_dim());
		let trees = train_forest(features, gradients.view(), hessians.view(), options);
		Ok(Self {
			n_features: features.ncols(),
			trees,
		})
	}

	pub fn predict(&self, features: ArrayView2<f32>) -> Array1<f32> {
		predict_forest(&self.trees, features, 1).column(0).to_owned()
	}
}

impl ForestClassifier {
	/// Train a forest classifier. `labels` are 0-indexed and less than `n_classes`.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &ForestOptions,
	) -> Result<Self, TreeError> {
		check_class_labels(labels, n_classes)?;
		let mut gradients = Array2::<f32>::zeros((labels.len(), n_classes));
		for (mut row, label) in gradients.rows_mut().into_iter().zip(labels.iter()) {
			row[*label] = -1.0;
		}
		let hessians = Array2::ones(gradients.raw_dim());
		let trees = train_forest(features, gradients.view(), hessians.view(), options);
		Ok(Self {
			n_features: features.ncols(),
			n_classes,
			trees,
		})
	}

	/// Compute the probability of each class, which has shape (n_examples, n_classes).
	pub fn predict_proba(&self, features: ArrayView2<f32>) -> Array2<f32> {
		predict_forest(&self.trees, features, self.n_classes)
	}

	pub fn predict(&self, features: ArrayView2<f32>) -> Vec<usize> {
		argmax_rows(self.predict_proba(features).view())
	}
}

fn train_forest(
	features: ArrayView2<f32>,
	gradients: ArrayView2<f32>,
	hessians: ArrayView2<f32>,
	options: &ForestOptions,
) -> Vec<Tree> {
	let n_examples = features.nrows();
	let instructions = compute_binning_instructions(features, options.max_bins);
	let binned_features = compute_binned_features(features, instructions);
	let feature_subset: Vec<usize> = (0..features.ncols()).collect();
	let progress_counter = ProgressCounter::new(options.n_trees as u64);
	let trees: Vec<Tree> = (0..options.n_trees)
		.into_par_iter()
		.map(|tree_index| {
			let mut rng = Xoshiro256Plus::seed_from_u64(options.seed.wrapping_add(tree_index as u64));
			let examples_index = if options.bootstrap {
				(0..n_examples)
					.map(|_| rng.gen_range(0, n_examples))
					.collect()
			} else {
				(0..n_examples).collect()
			};
			let tree = train_tree(
				&binned_features,
				gradients,
				hessians,
				examples_index,
				&feature_subset,
				&options.tree_options,
				&mut rng,
			);
			progress_counter.inc(1);
			tree
		})
		.collect();
	log::debug!(
		"trained {} of {} trees with {} leaves in total",
		progress_counter.get(),
		progress_counter.total(),
		trees.iter().map(|tree| tree.n_leaves()).sum::<usize>(),
	);
	trees
}

/// Average the outputs of `trees` for each example.
fn predict_forest(trees: &[Tree], features: ArrayView2<f32>, n_outputs: usize) -> Array2<f32> {
	let mut predictions = Array2::<f32>::zeros((features.nrows(), n_outputs));
	let n_trees = trees.len().max(1) as f32;
	predictions
		.axis_iter_mut(Axis(0))
		.into_par_iter()
		.zip(features.axis_iter(Axis(0)).into_par_iter())
		.for_each(|(mut predictions, example)| {
			for tree in trees.iter() {
				for (prediction, value) in predictions.iter_mut().zip(tree.predict(example)) {
					*prediction += value;
				}
			}
			predictions.mapv_inplace(|prediction| prediction / n_trees);
		});
	predictions
}

#[cfg(test)]
mod test {
	use super::*;

	fn data() -> (Array2<f32>, Array1<usize>) {
		// Each value of the first feature appears five times, and it separates the classes.
		let features = Array2::from_shape_fn((200, 2), |(row, column)| {
			if column == 0 {
				(row / 5) as f32
			} else {
				((row * 7) % 5) as f32
			}
		});
		let labels = (0..200).map(|row| if row < 100 { 0 } else { 1 }).collect();
		(features, labels)
	}

	#[test]
	fn test_random_forest_classifier() {
		let (features, labels) = data();
		let options = ForestOptions::random_forest(20, MaxFeatures::All, 42);
		let model = ForestClassifier::train(features.view(), labels.view(), 2, &options).unwrap();
		assert_eq!(model.predict(features.view()), labels.to_vec());
		for row in model.predict_proba(features.view()).rows() {
			assert!((row.sum() - 1.0).abs() < 1e-5);
		}
	}

	#[test]
	fn test_extra_trees_is_deterministic() {
		let (features, labels) = data();
		let labels = labels.mapv(|label| label as f32 * 10.0);
		let options = ForestOptions::extra_trees(10, MaxFeatures::All, 7);
		let a = ForestRegressor::train(features.view(), labels.view(), &options).unwrap();
		let b = ForestRegressor::train(features.view(), labels.view(), &options).unwrap();
		let predictions = a.predict(features.view());
		assert_eq!(predictions, b.predict(features.view()));
		let mae = (&predictions - &labels).mapv(f32::abs).mean().unwrap();
		assert!(mae < 1.0);
	}

	#[test]
	fn test_single_class() {
		let (features, _) = data();
		let labels = Array1::<usize>::zeros(200);
		let options = ForestOptions::random_forest(2, MaxFeatures::Sqrt, 0);
		let result = ForestClassifier::train(features.view(), labels.view(), 2, &options);
		assert!(matches!(result, Err(TreeError::TooFewClasses(1))));
	}
}
