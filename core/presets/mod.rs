/*!
This module loads algorithm presets from a YAML catalog and builds them into untrained [`Pipeline`](../pipeline/struct.Pipeline.html)s.

A catalog entry names an estimator kind. Each kind is registered in `BUILDERS` with the tasks it supports, the numeric transform it uses by default, and a function that reads its hyperparameters from the entry's tier table for a given [`TrainMode`](../target/enum.TrainMode.html).
*/

use crate::automl::{AutoSelector, Candidate, CandidateKind};
use crate::error::{Error, Result};
use crate::evaluate::Scoring;
use crate::pipeline::{Estimator, Pipeline};
use crate::select::SemanticTypePartition;
use crate::target::{Task, TrainMode};
use kitsune_features::{NumericTransform, PreprocessorOptions};
use kitsune_linear::{ClassifierTrainOptions, RegressorTrainOptions};
use kitsune_tree::{BoostingOptions, ForestOptions, MaxFeatures};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("catalog.yaml");

/// A hyperparameter value, either the same for every train mode or one value per mode.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
	Tiered {
		fast: f64,
		balanced: f64,
		accurate: f64,
	},
	Scalar(f64),
}

impl ParamValue {
	pub fn resolve(&self, train_mode: TrainMode) -> f64 {
		match self {
			Self::Tiered {
				fast,
				balanced,
				accurate,
			} => match train_mode {
				TrainMode::Fast => *fast,
				TrainMode::Balanced => *balanced,
				TrainMode::Accurate => *accurate,
			},
			Self::Scalar(value) => *value,
		}
	}
}

#[derive(Debug, Clone, serde::Deserialize)]
struct CatalogEntry {
	task: Task,
	name: String,
	#[serde(default = "default_version")]
	version: String,
	#[serde(default)]
	estimator: Option<String>,
	#[serde(default)]
	numeric_transform: Option<serde_yaml::Value>,
	#[serde(default)]
	params: Option<serde_yaml::Value>,
}

fn default_version() -> String {
	"1.0".to_owned()
}

/// The metadata a preset contributes to a training run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PresetMetadata {
	pub task: Task,
	pub preset: String,
	pub version: String,
	pub framework: String,
	pub algorithm: String,
	pub semantic_types: SemanticTypePartition,
	pub train_mode: TrainMode,
	pub random_seed: u64,
	pub params: serde_json::Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PresetCatalog {
	entries: Vec<CatalogEntry>,
}

impl PresetCatalog {
	/// The catalog that ships with this crate.
	pub fn builtin() -> Result<Self> {
		Self::from_yaml(BUILTIN_CATALOG)
	}

	pub fn from_yaml(yaml: &str) -> Result<Self> {
		let entries: Vec<CatalogEntry> = serde_yaml::from_str(yaml)
			.map_err(|error| Error::InvalidConfig(format!("invalid preset catalog: {}", error)))?;
		Ok(Self { entries })
	}

	pub fn from_path(path: &Path) -> Result<Self> {
		let yaml = std::fs::read_to_string(path)?;
		Self::from_yaml(&yaml)
	}

	/// The names of the presets for `task`, in catalog order.
	pub fn names(&self, task: Task) -> Vec<&str> {
		self.entries
			.iter()
			.filter(|entry| entry.task == task)
			.map(|entry| entry.name.as_str())
			.collect()
	}

	pub fn load(&self, task: Task, name: &str) -> Result<Preset> {
		let entry = self
			.entries
			.iter()
			.find(|entry| entry.task == task && entry.name == name)
			.ok_or_else(|| Error::PresetNotFound {
				task: task.to_string(),
				name: name.to_owned(),
			})?;
		let malformed = |message: String| Error::MalformedPreset {
			name: name.to_owned(),
			message,
		};
		let kind = entry
			.estimator
			.as_deref()
			.ok_or_else(|| malformed("the entry has no estimator".to_owned()))?;
		let builder = BUILDERS
			.iter()
			.find(|builder| builder.estimator == kind)
			.ok_or_else(|| malformed(format!("unknown estimator \"{}\"", kind)))?;
		if !builder.tasks.contains(&task) {
			return Err(malformed(format!(
				"estimator \"{}\" does not support {}",
				kind, task
			)));
		}
		let params: BTreeMap<String, ParamValue> = match entry.params.as_ref() {
			Some(serde_yaml::Value::Null) | None => BTreeMap::new(),
			Some(params) => serde_yaml::from_value(params.clone())
				.map_err(|error| malformed(format!("invalid params: {}", error)))?,
		};
		let numeric_transform = match entry.numeric_transform.as_ref() {
			Some(value) => serde_yaml::from_value(value.clone())
				.map_err(|error| malformed(format!("invalid numeric_transform: {}", error)))?,
			None => builder.numeric_transform,
		};
		let mut candidates = Vec::new();
		if builder.estimator == AUTO {
			for kind in CandidateKind::for_task(task) {
				let preset = self.load(task, kind.preset_name()).map_err(|error| {
					malformed(format!(
						"candidate preset \"{}\" could not be loaded: {}",
						kind.preset_name(),
						error
					))
				})?;
				candidates.push((*kind, preset));
			}
		}
		Ok(Preset {
			task,
			name: entry.name.clone(),
			version: entry.version.clone(),
			estimator: kind.to_owned(),
			numeric_transform,
			params,
			candidates,
			builder,
		})
	}
}

#[derive(Debug, Clone)]
pub struct Preset {
	pub task: Task,
	pub name: String,
	pub version: String,
	pub estimator: String,
	pub numeric_transform: NumericTransform,
	pub params: BTreeMap<String, ParamValue>,
	/// For the auto preset, the presets of the candidates it chooses between.
	pub candidates: Vec<(CandidateKind, Preset)>,
	builder: &'static Builder,
}

impl Preset {
	/// Assemble the preprocessor and the estimator for the columns in `semantic_types`, with hyperparameters for `train_mode`.
	pub fn build(
		&self,
		semantic_types: &SemanticTypePartition,
		train_mode: TrainMode,
		seed: u64,
	) -> Result<(Pipeline, PresetMetadata)> {
		let built = (self.builder.build)(self, train_mode, seed)?;
		let pipeline = Pipeline {
			preprocessor: PreprocessorOptions {
				categorical: semantic_types.categorical.clone(),
				numeric: semantic_types.numeric.clone(),
				boolean: semantic_types.boolean.clone(),
				numeric_transform: self.numeric_transform,
			},
			estimator: built.estimator,
		};
		let metadata = PresetMetadata {
			task: self.task,
			preset: self.name.clone(),
			version: self.version.clone(),
			framework: self.builder.framework.to_owned(),
			algorithm: built.algorithm,
			semantic_types: semantic_types.clone(),
			train_mode,
			random_seed: seed,
			params: built.params,
			notes: built.notes,
		};
		Ok((pipeline, metadata))
	}

	/// Only the estimator, as the auto preset uses its candidates.
	pub fn estimator(&self, train_mode: TrainMode, seed: u64) -> Result<Estimator> {
		Ok((self.builder.build)(self, train_mode, seed)?.estimator)
	}

	pub fn param(&self, key: &str, train_mode: TrainMode) -> Result<f64> {
		self.params
			.get(key)
			.map(|value| value.resolve(train_mode))
			.ok_or_else(|| self.malformed(format!("missing param \"{}\"", key)))
	}

	fn param_or(&self, key: &str, train_mode: TrainMode, default: f64) -> f64 {
		self.params
			.get(key)
			.map(|value| value.resolve(train_mode))
			.unwrap_or(default)
	}

	/// A param that must be a positive whole number.
	fn count(&self, key: &str, train_mode: TrainMode) -> Result<usize> {
		let value = self.param(key, train_mode)?;
		if value < 1.0 || value.fract() != 0.0 {
			return Err(self.malformed(format!(
				"param \"{}\" must be a positive integer, got {}",
				key, value
			)));
		}
		Ok(value as usize)
	}

	fn malformed(&self, message: String) -> Error {
		Error::MalformedPreset {
			name: self.name.clone(),
			message,
		}
	}
}

const AUTO: &str = "auto";

struct Built {
	estimator: Estimator,
	algorithm: String,
	params: serde_json::Value,
	notes: Option<String>,
}

#[derive(Debug)]
struct Builder {
	estimator: &'static str,
	framework: &'static str,
	tasks: &'static [Task],
	numeric_transform: NumericTransform,
	build: fn(&Preset, TrainMode, u64) -> Result<Built>,
}

const BOTH: &[Task] = &[Task::Classification, Task::Regression];

static BUILDERS: &[Builder] = &[
	Builder {
		estimator: AUTO,
		framework: "kitsune_core",
		tasks: BOTH,
		numeric_transform: NumericTransform::Standardize,
		build: build_auto,
	},
	Builder {
		estimator: "logistic_regression",
		framework: "kitsune_linear",
		tasks: &[Task::Classification],
		numeric_transform: NumericTransform::Standardize,
		build: build_logistic_regression,
	},
	Builder {
		estimator: "linear_regression",
		framework: "kitsune_linear",
		tasks: &[Task::Regression],
		numeric_transform: NumericTransform::Passthrough,
		build: build_linear_regression,
	},
	Builder {
		estimator: "ridge",
		framework: "kitsune_linear",
		tasks: &[Task::Regression],
		numeric_transform: NumericTransform::Standardize,
		build: build_ridge,
	},
	Builder {
		estimator: "random_forest",
		framework: "kitsune_tree",
		tasks: BOTH,
		numeric_transform: NumericTransform::Passthrough,
		build: build_random_forest,
	},
	Builder {
		estimator: "extra_trees",
		framework: "kitsune_tree",
		tasks: BOTH,
		numeric_transform: NumericTransform::Passthrough,
		build: build_extra_trees,
	},
	Builder {
		estimator: "gradient_boosting",
		framework: "kitsune_tree",
		tasks: BOTH,
		numeric_transform: NumericTransform::Passthrough,
		build: build_gradient_boosting,
	},
	Builder {
		estimator: "histogram_gradient_boosting",
		framework: "kitsune_tree",
		tasks: BOTH,
		numeric_transform: NumericTransform::Passthrough,
		build: build_histogram_gradient_boosting,
	},
];

fn build_auto(preset: &Preset, train_mode: TrainMode, seed: u64) -> Result<Built> {
	let cv_folds = preset.count("cv_folds", train_mode)?;
	if cv_folds < 2 {
		return Err(preset.malformed("cv_folds must be at least 2".to_owned()));
	}
	let candidates = preset
		.candidates
		.iter()
		.map(|(kind, candidate)| {
			Ok(Candidate {
				kind: *kind,
				estimator: candidate.estimator(train_mode, seed)?,
			})
		})
		.collect::<Result<Vec<_>>>()?;
	let names: Vec<&str> = candidates
		.iter()
		.map(|candidate| candidate.kind.name(preset.task))
		.collect();
	let algorithm = match preset.task {
		Task::Classification => "AutoClassifier",
		Task::Regression => "AutoRegressor",
	};
	Ok(Built {
		params: json!({
			"cv_folds": cv_folds,
			"scoring": Scoring::for_task(preset.task),
			"candidates": names,
			"random_state": seed,
		}),
		notes: Some(format!("selects among {}", names.join(", "))),
		estimator: Estimator::Auto(AutoSelector {
			task: preset.task,
			train_mode,
			seed,
			cv_folds,
			candidates,
		}),
		algorithm: algorithm.to_owned(),
	})
}

fn build_logistic_regression(preset: &Preset, train_mode: TrainMode, _seed: u64) -> Result<Built> {
	let c = preset.param("c", train_mode)?;
	let max_iter = preset.count("max_iter", train_mode)?;
	Ok(Built {
		estimator: Estimator::LogisticRegression(ClassifierTrainOptions {
			c: c as f32,
			max_epochs: max_iter,
			..Default::default()
		}),
		algorithm: "LogisticRegression".to_owned(),
		params: json!({ "c": c, "max_iter": max_iter }),
		notes: None,
	})
}

fn build_linear_regression(_preset: &Preset, _train_mode: TrainMode, _seed: u64) -> Result<Built> {
	Ok(Built {
		estimator: Estimator::LinearRegression(RegressorTrainOptions { alpha: 0.0 }),
		algorithm: "LinearRegression".to_owned(),
		params: json!({}),
		notes: None,
	})
}

fn build_ridge(preset: &Preset, train_mode: TrainMode, _seed: u64) -> Result<Built> {
	let alpha = preset.param("alpha", train_mode)?;
	if alpha < 0.0 {
		return Err(preset.malformed(format!("alpha must not be negative, got {}", alpha)));
	}
	let algorithm = match preset.numeric_transform {
		NumericTransform::PolynomialStandardize => "Ridge + PolynomialFeatures(2)",
		_ => "Ridge",
	};
	Ok(Built {
		estimator: Estimator::Ridge(RegressorTrainOptions { alpha }),
		algorithm: algorithm.to_owned(),
		params: json!({ "alpha": alpha }),
		notes: None,
	})
}

/// Classification forests consider the square root of the features at each split and regression forests consider all of them.
fn forest_max_features(task: Task) -> (MaxFeatures, &'static str) {
	match task {
		Task::Classification => (MaxFeatures::Sqrt, "sqrt"),
		Task::Regression => (MaxFeatures::All, "all"),
	}
}

fn build_random_forest(preset: &Preset, train_mode: TrainMode, seed: u64) -> Result<Built> {
	let n_estimators = preset.count("n_estimators", train_mode)?;
	let (max_features, max_features_name) = forest_max_features(preset.task);
	let algorithm = match preset.task {
		Task::Classification => "RandomForestClassifier",
		Task::Regression => "RandomForestRegressor",
	};
	Ok(Built {
		estimator: Estimator::RandomForest(ForestOptions::random_forest(n_estimators, max_features, seed)),
		algorithm: algorithm.to_owned(),
		params: json!({
			"n_estimators": n_estimators,
			"max_features": max_features_name,
			"random_state": seed,
		}),
		notes: None,
	})
}

fn build_extra_trees(preset: &Preset, train_mode: TrainMode, seed: u64) -> Result<Built> {
	let n_estimators = preset.count("n_estimators", train_mode)?;
	let (max_features, max_features_name) = forest_max_features(preset.task);
	let algorithm = match preset.task {
		Task::Classification => "ExtraTreesClassifier",
		Task::Regression => "ExtraTreesRegressor",
	};
	Ok(Built {
		estimator: Estimator::ExtraTrees(ForestOptions::extra_trees(n_estimators, max_features, seed)),
		algorithm: algorithm.to_owned(),
		params: json!({
			"n_estimators": n_estimators,
			"max_features": max_features_name,
			"random_state": seed,
		}),
		notes: None,
	})
}

fn fraction(preset: &Preset, key: &str, train_mode: TrainMode, default: f64) -> Result<f64> {
	let value = preset.param_or(key, train_mode, default);
	if !(value > 0.0 && value <= 1.0) {
		return Err(preset.malformed(format!("param \"{}\" must be in (0, 1], got {}", key, value)));
	}
	Ok(value)
}

fn build_gradient_boosting(preset: &Preset, train_mode: TrainMode, seed: u64) -> Result<Built> {
	let n_estimators = preset.count("n_estimators", train_mode)?;
	let max_depth = preset.count("max_depth", train_mode)?;
	let learning_rate = preset.param("learning_rate", train_mode)?;
	let subsample = fraction(preset, "subsample", train_mode, 0.9)?;
	let colsample = fraction(preset, "colsample", train_mode, 0.9)?;
	let algorithm = match preset.task {
		Task::Classification => "GradientBoostingClassifier",
		Task::Regression => "GradientBoostingRegressor",
	};
	Ok(Built {
		estimator: Estimator::GradientBoosting(BoostingOptions::depthwise(
			n_estimators,
			max_depth,
			learning_rate as f32,
			subsample,
			colsample,
			seed,
		)),
		algorithm: algorithm.to_owned(),
		params: json!({
			"n_estimators": n_estimators,
			"max_depth": max_depth,
			"learning_rate": learning_rate,
			"subsample": subsample,
			"colsample": colsample,
			"random_state": seed,
		}),
		notes: None,
	})
}

fn build_histogram_gradient_boosting(preset: &Preset, train_mode: TrainMode, seed: u64) -> Result<Built> {
	let max_iter = preset.count("max_iter", train_mode)?;
	let learning_rate = preset.param("learning_rate", train_mode)?;
	let max_leaf_nodes = preset.param_or("max_leaf_nodes", train_mode, 31.0) as usize;
	let min_samples_leaf = preset.param_or("min_samples_leaf", train_mode, 20.0) as usize;
	if max_leaf_nodes < 2 {
		return Err(preset.malformed("max_leaf_nodes must be at least 2".to_owned()));
	}
	let algorithm = match preset.task {
		Task::Classification => "HistGradientBoostingClassifier",
		Task::Regression => "HistGradientBoostingRegressor",
	};
	Ok(Built {
		estimator: Estimator::HistogramGradientBoosting(BoostingOptions::leafwise(
			max_iter,
			learning_rate as f32,
			max_leaf_nodes,
			min_samples_leaf.max(1),
			seed,
		)),
		algorithm: algorithm.to_owned(),
		params: json!({
			"max_iter": max_iter,
			"learning_rate": learning_rate,
			"max_leaf_nodes": max_leaf_nodes,
			"min_samples_leaf": min_samples_leaf,
			"random_state": seed,
		}),
		notes: None,
	})
}

#[cfg(test)]
mod test {
	use super::*;

	fn partition() -> SemanticTypePartition {
		SemanticTypePartition {
			categorical: vec!["color".to_owned()],
			numeric: vec!["height".to_owned()],
			boolean: Vec::new(),
		}
	}

	#[test]
	fn test_every_builtin_preset_builds() {
		let catalog = PresetCatalog::builtin().unwrap();
		for task in [Task::Classification, Task::Regression].iter() {
			let names = catalog.names(*task);
			assert!(names.contains(&"auto"));
			for name in names {
				let preset = catalog.load(*task, name).unwrap();
				for train_mode in [TrainMode::Fast, TrainMode::Balanced, TrainMode::Accurate].iter() {
					let (_, metadata) = preset.build(&partition(), *train_mode, 42).unwrap();
					assert_eq!(metadata.preset, name);
					assert_eq!(metadata.version, "1.0");
					assert_eq!(metadata.train_mode, *train_mode);
				}
			}
		}
	}

	#[test]
	fn test_tiers() {
		let catalog = PresetCatalog::builtin().unwrap();
		let preset = catalog.load(Task::Regression, "ridge_regression").unwrap();
		let (pipeline, metadata) = preset.build(&partition(), TrainMode::Accurate, 7).unwrap();
		assert_eq!(metadata.params, json!({ "alpha": 10.0 }));
		assert_eq!(metadata.algorithm, "Ridge");
		assert_eq!(pipeline.preprocessor.numeric_transform, NumericTransform::Standardize);

		let preset = catalog.load(Task::Regression, "polynomial_ridge_regression").unwrap();
		let (pipeline, metadata) = preset.build(&partition(), TrainMode::Fast, 7).unwrap();
		assert_eq!(metadata.algorithm, "Ridge + PolynomialFeatures(2)");
		assert_eq!(
			pipeline.preprocessor.numeric_transform,
			NumericTransform::PolynomialStandardize
		);

		let preset = catalog.load(Task::Classification, "auto").unwrap();
		let (pipeline, metadata) = preset.build(&partition(), TrainMode::Fast, 7).unwrap();
		assert_eq!(metadata.params["cv_folds"], 3);
		match pipeline.estimator {
			Estimator::Auto(selector) => {
				assert_eq!(selector.cv_folds, 3);
				assert_eq!(selector.candidates.len(), 4);
			}
			_ => panic!("expected the auto estimator"),
		}
	}

	#[test]
	fn test_catalog_errors() {
		let catalog = PresetCatalog::builtin().unwrap();
		assert!(matches!(
			catalog.load(Task::Regression, "nope"),
			Err(Error::PresetNotFound { .. })
		));
		assert!(matches!(
			catalog.load(Task::Regression, "logistic_regression"),
			Err(Error::PresetNotFound { .. })
		));
		let catalog = PresetCatalog::from_yaml(
			r#"
- task: regression
  name: missing_estimator
- task: regression
  name: unknown_estimator
  estimator: magic
- task: regression
  name: bad_params
  estimator: ridge
  params:
    alpha: lots
- task: classification
  name: wrong_task
  estimator: ridge
"#,
		)
		.unwrap();
		for (task, name) in [
			(Task::Regression, "missing_estimator"),
			(Task::Regression, "unknown_estimator"),
			(Task::Regression, "bad_params"),
			(Task::Classification, "wrong_task"),
		]
		.iter()
		{
			assert!(matches!(
				catalog.load(*task, name),
				Err(Error::MalformedPreset { .. })
			));
		}
		assert!(matches!(
			PresetCatalog::from_yaml("not: [a, list"),
			Err(Error::InvalidConfig(_))
		));
	}
}
