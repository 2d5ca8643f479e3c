/*!
The record of a training run. [`TrainingRunMetadata`](struct.TrainingRunMetadata.html) is versioned and is assembled with a [`TrainingRunMetadataBuilder`](struct.TrainingRunMetadataBuilder.html), which refuses to produce a record without metrics or a schema snapshot.
*/

use crate::automl::AutoSelection;
use crate::config::EvaluationStrategy;
use crate::error::{Error, Result};
use crate::evaluate::{CvSummary, Metrics};
use crate::explain::ExplanationSummary;
use crate::presets::PresetMetadata;
use indexmap::IndexMap;
use kitsune_dataframe::DataFrameView;

pub const METADATA_VERSION: u32 = 1;

/// The columns a model was trained on and their storage types. Predictions require the same feature columns.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SchemaSnapshot {
	pub features: IndexMap<String, String>,
	pub feature_order: Vec<String>,
	pub target: IndexMap<String, String>,
}

impl SchemaSnapshot {
	pub fn new(features: &DataFrameView, target_name: &str, target_type: &str) -> Self {
		let features_map: IndexMap<String, String> = features
			.columns
			.iter()
			.map(|column| (column.name().to_owned(), column.column_type().name().to_owned()))
			.collect();
		let mut target = IndexMap::new();
		target.insert(target_name.to_owned(), target_type.to_owned());
		Self {
			feature_order: features_map.keys().cloned().collect(),
			features: features_map,
			target,
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainingRunMetadata {
	pub metadata_version: u32,
	pub problem_id: String,
	pub model_id: String,
	pub target: String,
	#[serde(flatten)]
	pub preset: PresetMetadata,
	pub evaluation_strategy: EvaluationStrategy,
	pub schema_snapshot: SchemaSnapshot,
	pub metrics: Metrics,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cross_validation: Option<CvSummary>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auto_selection: Option<AutoSelection>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub explanation: Option<ExplanationSummary>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label_classes: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub model_uri: Option<String>,
}

impl TrainingRunMetadata {
	pub fn from_json(value: serde_json::Value) -> Result<Self> {
		let metadata: Self = serde_json::from_value(value)?;
		if metadata.metadata_version != METADATA_VERSION {
			return Err(Error::Serialization(format!(
				"unsupported metadata version {}",
				metadata.metadata_version
			)));
		}
		Ok(metadata)
	}

	pub fn to_json(&self) -> Result<serde_json::Value> {
		Ok(serde_json::to_value(self)?)
	}
}

pub struct TrainingRunMetadataBuilder {
	problem_id: String,
	model_id: String,
	target: String,
	preset: PresetMetadata,
	evaluation_strategy: EvaluationStrategy,
	schema_snapshot: Option<SchemaSnapshot>,
	metrics: Option<Metrics>,
	cross_validation: Option<CvSummary>,
	auto_selection: Option<AutoSelection>,
	explanation: Option<ExplanationSummary>,
	label_classes: Option<Vec<String>>,
	model_uri: Option<String>,
}

impl TrainingRunMetadataBuilder {
	pub fn new(problem_id: &str, model_id: &str, target: &str, preset: PresetMetadata) -> Self {
		Self {
			problem_id: problem_id.to_owned(),
			model_id: model_id.to_owned(),
			target: target.to_owned(),
			preset,
			evaluation_strategy: EvaluationStrategy::Holdout,
			schema_snapshot: None,
			metrics: None,
			cross_validation: None,
			auto_selection: None,
			explanation: None,
			label_classes: None,
			model_uri: None,
		}
	}

	pub fn evaluation_strategy(mut self, evaluation_strategy: EvaluationStrategy) -> Self {
		self.evaluation_strategy = evaluation_strategy;
		self
	}

	pub fn schema_snapshot(mut self, schema_snapshot: SchemaSnapshot) -> Self {
		self.schema_snapshot = Some(schema_snapshot);
		self
	}

	pub fn metrics(mut self, metrics: Metrics) -> Self {
		self.metrics = Some(metrics);
		self
	}

	pub fn cross_validation(mut self, cross_validation: Option<CvSummary>) -> Self {
		self.cross_validation = cross_validation;
		self
	}

	pub fn auto_selection(mut self, auto_selection: Option<AutoSelection>) -> Self {
		self.auto_selection = auto_selection;
		self
	}

	pub fn explanation(mut self, explanation: Option<ExplanationSummary>) -> Self {
		self.explanation = explanation;
		self
	}

	pub fn label_classes(mut self, label_classes: Option<Vec<String>>) -> Self {
		self.label_classes = label_classes;
		self
	}

	pub fn model_uri(mut self, model_uri: Option<String>) -> Self {
		self.model_uri = model_uri;
		self
	}

	pub fn build(self) -> Result<TrainingRunMetadata> {
		let metrics = self
			.metrics
			.ok_or_else(|| Error::InvalidInput("training run metadata requires metrics".to_owned()))?;
		let schema_snapshot = self.schema_snapshot.ok_or_else(|| {
			Error::InvalidInput("training run metadata requires a schema snapshot".to_owned())
		})?;
		Ok(TrainingRunMetadata {
			metadata_version: METADATA_VERSION,
			problem_id: self.problem_id,
			model_id: self.model_id,
			target: self.target,
			preset: self.preset,
			evaluation_strategy: self.evaluation_strategy,
			schema_snapshot,
			metrics,
			cross_validation: self.cross_validation,
			auto_selection: self.auto_selection,
			explanation: self.explanation,
			label_classes: self.label_classes,
			model_uri: self.model_uri,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::evaluate::RegressionSummary;
	use crate::select::SemanticTypePartition;
	use crate::target::{Task, TrainMode};
	use kitsune_dataframe::{DataFrame, DataFrameColumn, NumberColumn};

	fn preset() -> PresetMetadata {
		PresetMetadata {
			task: Task::Regression,
			preset: "linear_regression".to_owned(),
			version: "1.0".to_owned(),
			framework: "kitsune_linear".to_owned(),
			algorithm: "LinearRegression".to_owned(),
			semantic_types: SemanticTypePartition {
				numeric: vec!["x".to_owned()],
				..Default::default()
			},
			train_mode: TrainMode::Balanced,
			random_seed: 42,
			params: serde_json::json!({}),
			notes: None,
		}
	}

	fn schema() -> SchemaSnapshot {
		let dataframe = DataFrame::from_columns(vec![DataFrameColumn::Number(NumberColumn {
			name: "x".to_owned(),
			data: vec![1.0, 2.0],
		})]);
		SchemaSnapshot::new(&dataframe.view(), "y", "number")
	}

	fn metrics() -> Metrics {
		Metrics::Regression(RegressionSummary {
			mae: 0.1,
			mse: 0.01,
			rmse: 0.1,
			r2: 0.99,
			mape: 0.05,
		})
	}

	#[test]
	fn test_builder_requires_metrics_and_schema() {
		let builder = TrainingRunMetadataBuilder::new("problem", "model", "y", preset());
		assert!(matches!(builder.build(), Err(Error::InvalidInput(_))));
		let builder = TrainingRunMetadataBuilder::new("problem", "model", "y", preset()).metrics(metrics());
		assert!(matches!(builder.build(), Err(Error::InvalidInput(_))));
		let builder = TrainingRunMetadataBuilder::new("problem", "model", "y", preset()).schema_snapshot(schema());
		assert!(matches!(builder.build(), Err(Error::InvalidInput(_))));
	}

	#[test]
	fn test_json() {
		let metadata = TrainingRunMetadataBuilder::new("problem", "model", "y", preset())
			.metrics(metrics())
			.schema_snapshot(schema())
			.build()
			.unwrap();
		let json = metadata.to_json().unwrap();
		assert_eq!(json["metadata_version"], 1);
		assert_eq!(json["task"], "regression");
		assert_eq!(json["algorithm"], "LinearRegression");
		assert_eq!(json["schema_snapshot"]["features"]["x"], "number");
		assert_eq!(json["schema_snapshot"]["target"]["y"], "number");
		assert_eq!(json["metrics"]["r2"], 0.99);
		assert!(json.get("explanation").is_none());
		assert_eq!(TrainingRunMetadata::from_json(json).unwrap(), metadata);
	}
}
