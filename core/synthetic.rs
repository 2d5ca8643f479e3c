/*!
Seeded generators of synthetic datasets, for tests and demos. Both produce number columns `feature_0`, `feature_1`, and so on, followed by a `target` column: integer class labels for classification and numbers for regression.
*/

use crate::error::{Error, Result};
use kitsune_dataframe::{DataFrame, DataFrameColumn, IntegerColumn, NumberColumn};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::f64::consts::PI;

#[derive(Debug, Clone)]
pub struct ClassificationOptions {
	pub n_samples: usize,
	pub n_features: usize,
	/// The number of leading features that depend on the class. The rest are noise.
	pub n_informative: usize,
	pub n_classes: usize,
	/// The distance of each class centroid from the origin along every informative feature.
	pub class_sep: f64,
	pub seed: u64,
}

impl Default for ClassificationOptions {
	fn default() -> Self {
		Self {
			n_samples: 100,
			n_features: 20,
			n_informative: 2,
			n_classes: 2,
			class_sep: 1.0,
			seed: 42,
		}
	}
}

#[derive(Debug, Clone)]
pub struct RegressionOptions {
	pub n_samples: usize,
	pub n_features: usize,
	pub n_informative: usize,
	/// The standard deviation of the gaussian noise added to the target.
	pub noise: f64,
	pub bias: f64,
	pub seed: u64,
}

impl Default for RegressionOptions {
	fn default() -> Self {
		Self {
			n_samples: 100,
			n_features: 10,
			n_informative: 5,
			noise: 0.0,
			bias: 0.0,
			seed: 42,
		}
	}
}

/// Generate clusters of points around the vertices of a hypercube, one vertex per class. Classes are balanced and the rows are shuffled.
pub fn make_classification(options: &ClassificationOptions) -> Result<DataFrame> {
	let ClassificationOptions {
		n_samples,
		n_features,
		n_informative,
		n_classes,
		class_sep,
		seed,
	} = *options;
	if n_classes < 2 || n_samples < n_classes {
		return Err(Error::InvalidConfig(format!(
			"cannot generate {} samples of {} classes",
			n_samples, n_classes
		)));
	}
	if n_informative == 0 || n_informative > n_features || n_informative >= 64 {
		return Err(Error::InvalidConfig(format!(
			"n_informative must be between 1 and n_features, got {}",
			n_informative
		)));
	}
	if n_classes > 1 << n_informative {
		return Err(Error::InvalidConfig(format!(
			"{} informative features cannot separate {} classes",
			n_informative, n_classes
		)));
	}
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	let signs: Vec<f64> = (0..n_informative)
		.map(|_| if rng.gen::<bool>() { 1.0 } else { -1.0 })
		.collect();
	let mut labels: Vec<usize> = (0..n_samples).map(|index| index % n_classes).collect();
	labels.shuffle(&mut rng);
	let mut columns = vec![Vec::with_capacity(n_samples); n_features];
	for label in labels.iter() {
		for (feature, column) in columns.iter_mut().enumerate() {
			let mut value = standard_normal(&mut rng);
			if feature < n_informative {
				let vertex = if (label >> feature) & 1 == 1 { 1.0 } else { -1.0 };
				value += vertex * signs[feature] * class_sep;
			}
			column.push(value as f32);
		}
	}
	let mut dataframe = feature_columns(columns);
	dataframe
		.columns
		.push(DataFrameColumn::Integer(IntegerColumn {
			name: "target".to_owned(),
			data: labels.into_iter().map(|label| Some(label as i64)).collect(),
		}));
	Ok(dataframe)
}

/// Generate gaussian features and a target that is a random linear function of the informative ones plus noise.
pub fn make_regression(options: &RegressionOptions) -> Result<DataFrame> {
	let RegressionOptions {
		n_samples,
		n_features,
		n_informative,
		noise,
		bias,
		seed,
	} = *options;
	if n_samples == 0 || n_features == 0 || n_informative > n_features {
		return Err(Error::InvalidConfig(format!(
			"cannot generate {} samples with {} features of which {} are informative",
			n_samples, n_features, n_informative
		)));
	}
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	let weights: Vec<f64> = (0..n_informative)
		.map(|_| 100.0 * rng.gen::<f64>())
		.collect();
	let mut columns = vec![Vec::with_capacity(n_samples); n_features];
	let mut target = Vec::with_capacity(n_samples);
	for _ in 0..n_samples {
		let mut value = bias;
		for (feature, column) in columns.iter_mut().enumerate() {
			let x = standard_normal(&mut rng);
			if let Some(weight) = weights.get(feature) {
				value += weight * x;
			}
			column.push(x as f32);
		}
		if noise > 0.0 {
			value += noise * standard_normal(&mut rng);
		}
		target.push(value as f32);
	}
	let mut dataframe = feature_columns(columns);
	dataframe.columns.push(DataFrameColumn::Number(NumberColumn {
		name: "target".to_owned(),
		data: target,
	}));
	Ok(dataframe)
}

fn feature_columns(columns: Vec<Vec<f32>>) -> DataFrame {
	DataFrame::from_columns(
		columns
			.into_iter()
			.enumerate()
			.map(|(index, data)| {
				DataFrameColumn::Number(NumberColumn {
					name: format!("feature_{}", index),
					data,
				})
			})
			.collect(),
	)
}

/// Box-Muller.
fn standard_normal(rng: &mut Xoshiro256Plus) -> f64 {
	let u = 1.0 - rng.gen::<f64>();
	let v = rng.gen::<f64>();
	(-2.0 * u.ln()).sqrt() * (2.0 * PI * v).cos()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_make_classification() {
		let options = ClassificationOptions {
			n_samples: 90,
			n_features: 5,
			n_informative: 2,
			n_classes: 3,
			..Default::default()
		};
		let dataframe = make_classification(&options).unwrap();
		assert_eq!(dataframe.ncols(), 6);
		assert_eq!(dataframe.nrows(), 90);
		match dataframe.column("target").unwrap() {
			DataFrameColumn::Integer(column) => {
				for class in 0..3 {
					let count = column.data.iter().filter(|label| **label == Some(class)).count();
					assert_eq!(count, 30);
				}
			}
			_ => panic!("expected an integer target"),
		}
		assert_eq!(make_classification(&options).unwrap(), dataframe);
		let options = ClassificationOptions {
			n_classes: 5,
			..options
		};
		assert!(matches!(make_classification(&options), Err(Error::InvalidConfig(_))));
	}

	#[test]
	fn test_make_regression() {
		let options = RegressionOptions {
			n_samples: 50,
			n_features: 3,
			n_informative: 3,
			..Default::default()
		};
		let dataframe = make_regression(&options).unwrap();
		assert_eq!(dataframe.column_names(), vec!["feature_0", "feature_1", "feature_2", "target"]);
		assert_eq!(dataframe.nrows(), 50);
		let other = make_regression(&RegressionOptions { seed: 7, ..options }).unwrap();
		assert_ne!(other, dataframe);
	}
}
