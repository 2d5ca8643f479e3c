/*!
This module summarizes how much each feature contributes to a trained model's predictions.

[`explain`](fn.explain.html) samples reference rows from the training features and query rows from the test features, asks an [`AttributionBackend`](trait.AttributionBackend.html) for per-row attributions, and reduces them to a summary whose size is bounded by `top_k`: the mean absolute attribution of the top features, the same rolled up to the source columns the features were generated from, and quantiles of the attributions and the feature values of the top features.
*/

use crate::error::{Error, Result};
use crate::pipeline::TrainedEstimator;
use crate::target::Task;
use indexmap::IndexMap;
use kitsune_util::numeric::{quantiles, round_to};
use ndarray::prelude::*;
use rand::{seq::index, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::cmp::Ordering;

mod permutation;

pub use self::permutation::PermutationShap;

const DECIMAL_PLACES: i32 = 4;

/// A model whose outputs can be attributed to its input features.
pub trait Attributable: Sync {
	fn n_features(&self) -> usize;
	/// One for regressors, the number of classes for classifiers.
	fn n_outputs(&self) -> usize;
	/// Compute the outputs for each row of `features`, with shape (n_rows, n_outputs).
	fn compute_outputs(&self, features: ArrayView2<f32>) -> Array2<f32>;
}

impl Attributable for TrainedEstimator {
	fn n_features(&self) -> usize {
		TrainedEstimator::n_features(self)
	}

	fn n_outputs(&self) -> usize {
		TrainedEstimator::n_outputs(self)
	}

	fn compute_outputs(&self, features: ArrayView2<f32>) -> Array2<f32> {
		TrainedEstimator::compute_outputs(self, features)
	}
}

/// Computes per-row, per-feature, per-output attributions of `model` for the rows of `query` relative to the rows of `reference`. The result has shape (n_query_rows, n_features, n_outputs).
pub trait AttributionBackend {
	fn attribute(
		&self,
		model: &dyn Attributable,
		reference: ArrayView2<f32>,
		query: ArrayView2<f32>,
	) -> Array3<f32>;
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExplainOptions {
	/// The maximum number of training rows in the reference set.
	pub n_ref_max: usize,
	/// The maximum number of test rows to explain.
	pub n_explain_max: usize,
	pub top_k: usize,
	pub quantiles: Vec<f64>,
	pub include_distributions: bool,
	/// The number of antithetic permutation pairs per explained row.
	pub n_permutations: usize,
	pub seed: u64,
}

impl Default for ExplainOptions {
	fn default() -> Self {
		Self {
			n_ref_max: 20,
			n_explain_max: 50,
			top_k: 30,
			quantiles: vec![0.10, 0.25, 0.50, 0.75, 0.90],
			include_distributions: true,
			n_permutations: 4,
			seed: 42,
		}
	}
}

pub struct ExplainInput<'a> {
	pub task: Task,
	pub model: &'a dyn Attributable,
	/// The transformed training features.
	pub train_features: ArrayView2<'a, f32>,
	/// The transformed test features.
	pub test_features: ArrayView2<'a, f32>,
	pub feature_names: &'a [String],
	/// For each feature, the name of the column it was generated from.
	pub feature_parents: &'a [String],
	pub label_classes: Option<&'a [String]>,
	pub options: &'a ExplainOptions,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExplanationSummary {
	pub task: Task,
	pub metadata: ExplanationMetadata,
	pub features: Vec<FeatureEntry>,
	pub global: GlobalImportance,
	pub distributions: Distributions,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExplanationMetadata {
	pub model_output: String,
	pub output_space: String,
	pub n_ref: usize,
	pub n_explain: usize,
	pub top_k: usize,
	pub quantiles: Vec<f64>,
	pub seed: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub n_classes: Option<usize>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label_classes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureEntry {
	pub fid: usize,
	pub name: String,
	pub parent: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureValue {
	pub fid: usize,
	pub value: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParentValue {
	pub parent: String,
	pub value: f64,
}

/// Classification keys its maps by the class index as a string, "0", "1", and so on.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum GlobalImportance {
	Regression {
		mean_abs: Vec<FeatureValue>,
		mean_abs_parent: Vec<ParentValue>,
	},
	Classification {
		mean_abs_per_class: IndexMap<String, Vec<FeatureValue>>,
		mean_abs_parent_per_class: IndexMap<String, Vec<ParentValue>>,
	},
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureDistribution {
	pub fid: usize,
	pub shap_quantiles: Vec<Option<f64>>,
	pub x_quantiles: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PerFeature {
	pub per_feature: Vec<FeatureDistribution>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Distributions {
	Regression(PerFeature),
	Classification(IndexMap<String, PerFeature>),
}

/// Explain with permutation SHAP.
pub fn explain(input: &ExplainInput) -> Result<ExplanationSummary> {
	let backend = PermutationShap {
		n_permutations: input.options.n_permutations,
		seed: input.options.seed,
	};
	explain_with(input, &backend)
}

pub fn explain_with(input: &ExplainInput, backend: &dyn AttributionBackend) -> Result<ExplanationSummary> {
	validate(input)?;
	let options = input.options;
	let n_features = input.feature_names.len();
	let n_outputs = input.model.n_outputs();

	let mut rng = Xoshiro256Plus::seed_from_u64(options.seed);
	let reference_indexes = sample_rows(&mut rng, input.train_features.nrows(), options.n_ref_max);
	let query_indexes = sample_rows(&mut rng, input.test_features.nrows(), options.n_explain_max);
	let reference = input.train_features.select(Axis(0), &reference_indexes);
	let query = input.test_features.select(Axis(0), &query_indexes);
	log::info!(
		"explaining {} rows against {} reference rows",
		query.nrows(),
		reference.nrows()
	);

	let attributions = backend.attribute(input.model, reference.view(), query.view());
	let expected_shape = [query.nrows(), n_features, n_outputs];
	if attributions.shape() != expected_shape {
		return Err(Error::InvalidInput(format!(
			"the attribution backend returned shape {:?}, expected {:?}",
			attributions.shape(),
			expected_shape
		)));
	}

	let (model_output, output_space) = match input.task {
		Task::Classification => ("predict_proba", "probability"),
		Task::Regression => ("predict", "raw"),
	};
	let metadata = ExplanationMetadata {
		model_output: model_output.to_owned(),
		output_space: output_space.to_owned(),
		n_ref: reference.nrows(),
		n_explain: query.nrows(),
		top_k: options.top_k,
		quantiles: options.quantiles.clone(),
		seed: options.seed,
		n_classes: match input.task {
			Task::Classification => Some(n_outputs),
			Task::Regression => None,
		},
		label_classes: input.label_classes.map(|classes| classes.to_vec()),
	};
	let features = input
		.feature_names
		.iter()
		.zip(input.feature_parents.iter())
		.enumerate()
		.map(|(fid, (name, parent))| FeatureEntry {
			fid,
			name: name.clone(),
			parent: parent.clone(),
		})
		.collect();

	let (global, distributions) = match input.task {
		Task::Regression => {
			let output = aggregate_output(
				attributions.index_axis(Axis(2), 0),
				query.view(),
				input.feature_parents,
				options,
			);
			(
				GlobalImportance::Regression {
					mean_abs: output.mean_abs,
					mean_abs_parent: output.mean_abs_parent,
				},
				Distributions::Regression(PerFeature {
					per_feature: output.per_feature,
				}),
			)
		}
		Task::Classification => {
			let mut mean_abs_per_class = IndexMap::new();
			let mut mean_abs_parent_per_class = IndexMap::new();
			let mut distributions = IndexMap::new();
			for class in 0..n_outputs {
				let output = aggregate_output(
					attributions.index_axis(Axis(2), class),
					query.view(),
					input.feature_parents,
					options,
				);
				mean_abs_per_class.insert(class.to_string(), output.mean_abs);
				mean_abs_parent_per_class.insert(class.to_string(), output.mean_abs_parent);
				if options.include_distributions {
					distributions.insert(
						class.to_string(),
						PerFeature {
							per_feature: output.per_feature,
						},
					);
				}
			}
			(
				GlobalImportance::Classification {
					mean_abs_per_class,
					mean_abs_parent_per_class,
				},
				Distributions::Classification(distributions),
			)
		}
	};

	Ok(ExplanationSummary {
		task: input.task,
		metadata,
		features,
		global,
		distributions,
	})
}

fn validate(input: &ExplainInput) -> Result<()> {
	let n_names = input.feature_names.len();
	if n_names == 0 {
		return Err(Error::FeatureMismatch("feature_names is empty".to_owned()));
	}
	if input.feature_parents.is_empty() {
		return Err(Error::FeatureMismatch("feature_parents is empty".to_owned()));
	}
	if input.feature_parents.len() != n_names {
		return Err(Error::FeatureMismatch(format!(
			"{} feature names but {} feature parents",
			n_names,
			input.feature_parents.len()
		)));
	}
	let model_features = input.model.n_features();
	if model_features != n_names {
		return Err(Error::FeatureMismatch(format!(
			"the model was fitted on {} features but {} feature names were given",
			model_features, n_names
		)));
	}
	for (name, matrix) in [
		("train", input.train_features),
		("test", input.test_features),
	]
	.iter()
	{
		if matrix.ncols() != n_names {
			return Err(Error::FeatureMismatch(format!(
				"the {} features have {} columns but {} feature names were given",
				name,
				matrix.ncols(),
				n_names
			)));
		}
		if matrix.nrows() == 0 {
			return Err(Error::InvalidInput(format!("the {} features have no rows", name)));
		}
	}
	let n_outputs = input.model.n_outputs();
	match input.task {
		Task::Regression => {
			if n_outputs != 1 {
				return Err(Error::InvalidInput(format!(
					"a regression model must have one output, got {}",
					n_outputs
				)));
			}
		}
		Task::Classification => {
			if let Some(classes) = input.label_classes {
				if classes.len() != n_outputs {
					return Err(Error::InvalidInput(format!(
						"{} label classes were given but the model has {} classes",
						classes.len(),
						n_outputs
					)));
				}
			}
		}
	}
	let options = input.options;
	if options.quantiles.iter().any(|q| !(0.0..=1.0).contains(q)) {
		return Err(Error::InvalidInput(format!(
			"quantiles must be within [0, 1], got {:?}",
			options.quantiles
		)));
	}
	if options.n_ref_max == 0 || options.n_explain_max == 0 || options.top_k == 0 {
		return Err(Error::InvalidConfig(
			"n_ref_max, n_explain_max, and top_k must be positive".to_owned(),
		));
	}
	Ok(())
}

/// Sample at most `max` of `n` row indexes without replacement, in ascending order.
fn sample_rows(rng: &mut Xoshiro256Plus, n: usize, max: usize) -> Vec<usize> {
	let mut indexes = index::sample(rng, n, n.min(max)).into_vec();
	indexes.sort_unstable();
	indexes
}

struct OutputSummary {
	mean_abs: Vec<FeatureValue>,
	mean_abs_parent: Vec<ParentValue>,
	per_feature: Vec<FeatureDistribution>,
}

/// Summarize the attributions of one output, with shape (n_rows, n_features).
fn aggregate_output(
	attributions: ArrayView2<f32>,
	query: ArrayView2<f32>,
	feature_parents: &[String],
	options: &ExplainOptions,
) -> OutputSummary {
	let mean_abs: Vec<f64> = attributions
		.columns()
		.into_iter()
		.map(|column| {
			column.iter().map(|value| value.abs() as f64).sum::<f64>() / column.len() as f64
		})
		.collect();
	let top_fids = top_indexes(&mean_abs, options.top_k);

	let mut parent_sums: IndexMap<&str, f64> = IndexMap::new();
	for (parent, value) in feature_parents.iter().zip(mean_abs.iter()) {
		*parent_sums.entry(parent.as_str()).or_insert(0.0) += value;
	}
	let mut parents: Vec<(&str, f64)> = parent_sums.into_iter().collect();
	parents.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
	parents.truncate(options.top_k);

	let per_feature = if options.include_distributions {
		top_fids
			.iter()
			.map(|fid| {
				let shap_values: Vec<f64> = attributions.column(*fid).iter().map(|value| *value as f64).collect();
				let x_values: Vec<f64> = query.column(*fid).iter().map(|value| *value as f64).collect();
				FeatureDistribution {
					fid: *fid,
					shap_quantiles: rounded_quantiles(&shap_values, &options.quantiles),
					x_quantiles: rounded_quantiles(&x_values, &options.quantiles),
				}
			})
			.collect()
	} else {
		Vec::new()
	};

	OutputSummary {
		mean_abs: top_fids
			.iter()
			.map(|fid| FeatureValue {
				fid: *fid,
				value: round_to(mean_abs[*fid], DECIMAL_PLACES),
			})
			.collect(),
		mean_abs_parent: parents
			.into_iter()
			.map(|(parent, value)| ParentValue {
				parent: parent.to_owned(),
				value: round_to(value, DECIMAL_PLACES),
			})
			.collect(),
		per_feature,
	}
}

/// The indexes of the `k` largest values, largest first. Equal values keep their original order.
fn top_indexes(values: &[f64], k: usize) -> Vec<usize> {
	let mut indexes: Vec<usize> = (0..values.len()).collect();
	indexes.sort_by(|a, b| values[*b].partial_cmp(&values[*a]).unwrap_or(Ordering::Equal));
	indexes.truncate(k);
	indexes
}

fn rounded_quantiles(values: &[f64], levels: &[f64]) -> Vec<Option<f64>> {
	quantiles(values, levels)
		.into_iter()
		.map(|value| value.map(|value| round_to(value, DECIMAL_PLACES)))
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;

	/// Attributes each feature a fixed amount for every row and output.
	struct ConstantBackend(Vec<f32>);

	impl AttributionBackend for ConstantBackend {
		fn attribute(
			&self,
			model: &dyn Attributable,
			_reference: ArrayView2<f32>,
			query: ArrayView2<f32>,
		) -> Array3<f32> {
			Array3::from_shape_fn((query.nrows(), self.0.len(), model.n_outputs()), |(_, feature, output)| {
				self.0[feature] * (output + 1) as f32
			})
		}
	}

	struct Model {
		n_features: usize,
		n_outputs: usize,
	}

	impl Attributable for Model {
		fn n_features(&self) -> usize {
			self.n_features
		}

		fn n_outputs(&self) -> usize {
			self.n_outputs
		}

		fn compute_outputs(&self, features: ArrayView2<f32>) -> Array2<f32> {
			Array2::zeros((features.nrows(), self.n_outputs))
		}
	}

	fn names(names: &[&str]) -> Vec<String> {
		names.iter().map(|name| name.to_string()).collect()
	}

	#[test]
	fn test_regression_summary() {
		let model = Model {
			n_features: 3,
			n_outputs: 1,
		};
		let train = Array2::from_shape_fn((100, 3), |(row, column)| (row + column) as f32);
		let test = Array2::from_shape_fn((10, 3), |(row, _)| row as f32);
		let feature_names = names(&["color=red", "color=blue", "height"]);
		let feature_parents = names(&["color", "color", "height"]);
		let options = ExplainOptions {
			top_k: 2,
			..Default::default()
		};
		let input = ExplainInput {
			task: Task::Regression,
			model: &model,
			train_features: train.view(),
			test_features: test.view(),
			feature_names: &feature_names,
			feature_parents: &feature_parents,
			label_classes: None,
			options: &options,
		};
		let summary = explain_with(&input, &ConstantBackend(vec![-0.25, 0.5, 0.6])).unwrap();
		assert_eq!(summary.metadata.n_ref, 20);
		assert_eq!(summary.metadata.n_explain, 10);
		assert_eq!(summary.metadata.output_space, "raw");
		assert_eq!(summary.features.len(), 3);
		match &summary.global {
			GlobalImportance::Regression {
				mean_abs,
				mean_abs_parent,
			} => {
				assert_eq!(
					mean_abs,
					&vec![
						FeatureValue { fid: 2, value: 0.6 },
						FeatureValue { fid: 1, value: 0.5 },
					]
				);
				assert_eq!(mean_abs_parent[0].parent, "color");
				assert_eq!(mean_abs_parent[0].value, 0.75);
				assert_eq!(mean_abs_parent[1].parent, "height");
			}
			_ => panic!("expected a regression summary"),
		}
		match &summary.distributions {
			Distributions::Regression(distributions) => {
				assert_eq!(distributions.per_feature.len(), 2);
				let height = &distributions.per_feature[0];
				assert_eq!(height.fid, 2);
				assert_eq!(height.shap_quantiles, vec![Some(0.6); 5]);
				assert_eq!(height.x_quantiles[2], Some(4.5));
			}
			_ => panic!("expected regression distributions"),
		}
	}

	#[test]
	fn test_classification_summary() {
		let model = Model {
			n_features: 2,
			n_outputs: 2,
		};
		let matrix = Array2::from_shape_fn((8, 2), |(row, column)| (row * column) as f32);
		let feature_names = names(&["a", "b"]);
		let classes = names(&["no", "yes"]);
		let options = ExplainOptions {
			include_distributions: false,
			..Default::default()
		};
		let input = ExplainInput {
			task: Task::Classification,
			model: &model,
			train_features: matrix.view(),
			test_features: matrix.view(),
			feature_names: &feature_names,
			feature_parents: &feature_names,
			label_classes: Some(&classes),
			options: &options,
		};
		let summary = explain_with(&input, &ConstantBackend(vec![0.1, 0.2])).unwrap();
		assert_eq!(summary.metadata.n_classes, Some(2));
		assert_eq!(summary.metadata.model_output, "predict_proba");
		match &summary.global {
			GlobalImportance::Classification {
				mean_abs_per_class, ..
			} => {
				assert_eq!(mean_abs_per_class.keys().collect::<Vec<_>>(), vec!["0", "1"]);
				assert_eq!(mean_abs_per_class["1"][0], FeatureValue { fid: 1, value: 0.4 });
			}
			_ => panic!("expected a classification summary"),
		}
		assert_eq!(summary.distributions, Distributions::Classification(IndexMap::new()));
		let json = serde_json::to_value(&summary).unwrap();
		assert_eq!(json["distributions"], serde_json::json!({}));
		assert_eq!(json["metadata"]["label_classes"], serde_json::json!(["no", "yes"]));
	}

	#[test]
	fn test_validation() {
		let model = Model {
			n_features: 3,
			n_outputs: 1,
		};
		let matrix = Array2::<f32>::zeros((5, 3));
		let options = ExplainOptions::default();
		let short_names = names(&["a", "b"]);
		let input = ExplainInput {
			task: Task::Regression,
			model: &model,
			train_features: matrix.view(),
			test_features: matrix.view(),
			feature_names: &short_names,
			feature_parents: &short_names,
			label_classes: None,
			options: &options,
		};
		assert!(matches!(explain(&input), Err(Error::FeatureMismatch(_))));

		let feature_names = names(&["a", "b", "c"]);
		let input = ExplainInput {
			feature_names: &feature_names,
			feature_parents: &short_names,
			..input
		};
		assert!(matches!(explain(&input), Err(Error::FeatureMismatch(_))));

		let bad_quantiles = ExplainOptions {
			quantiles: vec![0.5, 1.5],
			..Default::default()
		};
		let input = ExplainInput {
			feature_parents: &feature_names,
			options: &bad_quantiles,
			..input
		};
		assert!(matches!(explain(&input), Err(Error::InvalidInput(_))));
	}
}
