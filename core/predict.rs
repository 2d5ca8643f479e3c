/*!
This module makes predictions with a trained model. The input columns are checked against and reordered by the schema snapshot recorded when the model was trained, and the target column is ignored if present.
*/

use crate::error::{Error, Result};
use crate::metadata::TrainingRunMetadata;
use crate::pipeline::{Predictions, TrainedPipeline};
use crate::store::Stores;
use kitsune_dataframe::{DataFrame, DataFrameColumnType, DataFrameView, FromCsvOptions};
use std::collections::BTreeMap;

#[derive(serde::Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PredictOutput {
	Regression(Vec<RegressionPredictOutput>),
	Classification(Vec<ClassificationPredictOutput>),
}

#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct RegressionPredictOutput {
	pub value: f32,
}

#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct ClassificationPredictOutput {
	pub class_name: String,
	pub probability: f32,
	pub probabilities: BTreeMap<String, f32>,
}

impl PredictOutput {
	pub fn len(&self) -> usize {
		match self {
			Self::Regression(output) => output.len(),
			Self::Classification(output) => output.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct PredictionSummary {
	pub predictions: PredictOutput,
	pub model_metadata: TrainingRunMetadata,
}

/// Select the feature columns of the schema snapshot from `input`, in training order. Extra columns, the target among them, are dropped.
pub fn prepare_input<'a>(
	input: &DataFrameView<'a>,
	metadata: &TrainingRunMetadata,
) -> Result<DataFrameView<'a>> {
	let feature_order = &metadata.schema_snapshot.feature_order;
	let missing: Vec<&str> = feature_order
		.iter()
		.filter(|name| input.column(name).is_none())
		.map(|name| name.as_str())
		.collect();
	if !missing.is_empty() {
		return Err(Error::SchemaMismatch(format!(
			"the input is missing feature columns: {}",
			missing.join(", ")
		)));
	}
	let n_dropped = input.ncols().saturating_sub(feature_order.len());
	if n_dropped > 0 {
		log::debug!("ignoring {} input columns the model was not trained on", n_dropped);
	}
	input
		.select(feature_order)
		.ok_or_else(|| Error::SchemaMismatch("a feature column disappeared".to_owned()))
}

pub fn predict_dataframe(
	pipeline: &TrainedPipeline,
	metadata: &TrainingRunMetadata,
	input: &DataFrameView,
) -> Result<PredictOutput> {
	let features = prepare_input(input, metadata)?;
	match pipeline.predict(&features)? {
		Predictions::Regression { values } => Ok(PredictOutput::Regression(
			values
				.iter()
				.map(|value| RegressionPredictOutput { value: *value })
				.collect(),
		)),
		Predictions::Classification {
			labels,
			probabilities,
		} => {
			let classes = pipeline
				.classes
				.as_ref()
				.ok_or_else(|| Error::InvalidInput("the classifier has no class names".to_owned()))?;
			let outputs = labels
				.iter()
				.zip(probabilities.rows())
				.map(|(label, probabilities)| {
					let class_name = classes.get(*label).cloned().ok_or_else(|| {
						Error::InvalidInput(format!("predicted label {} has no class name", label))
					})?;
					Ok(ClassificationPredictOutput {
						class_name,
						probability: probabilities[*label],
						probabilities: classes
							.iter()
							.cloned()
							.zip(probabilities.iter().copied())
							.collect(),
					})
				})
				.collect::<Result<Vec<_>>>()?;
			Ok(PredictOutput::Classification(outputs))
		}
	}
}

/// The storage types to load prediction input with, so that each feature column is read the way it was at training time.
pub fn column_types(metadata: &TrainingRunMetadata) -> BTreeMap<String, DataFrameColumnType> {
	metadata
		.schema_snapshot
		.features
		.iter()
		.filter_map(|(name, dtype)| {
			let column_type = match dtype.as_str() {
				"number" => DataFrameColumnType::Number,
				"integer" => DataFrameColumnType::Integer,
				"boolean" => DataFrameColumnType::Boolean,
				"datetime" => DataFrameColumnType::Datetime,
				// Categories are compared by their string values, so enum options need not be known.
				"enum" | "text" => DataFrameColumnType::Text,
				_ => return None,
			};
			Some((name.clone(), column_type))
		})
		.collect()
}

/// Load the metadata of `model_id` and the artifact it points to.
pub fn load_model(model_id: &str, stores: Stores) -> Result<(TrainedPipeline, TrainingRunMetadata)> {
	let metadata = TrainingRunMetadata::from_json(stores.metadata.read(model_id)?)?;
	let uri = metadata.model_uri.as_deref().ok_or_else(|| {
		Error::Serialization(format!("the metadata of model {} has no model_uri", model_id))
	})?;
	let pipeline = TrainedPipeline::from_bytes(&stores.artifacts.read(uri)?)?;
	Ok((pipeline, metadata))
}

/// Predict for every row of the csv at `input_uri` with the model `model_id`.
pub fn predict(model_id: &str, input_uri: &str, stores: Stores) -> Result<PredictionSummary> {
	let (pipeline, metadata) = load_model(model_id, stores)?;
	let bytes = stores.data_source.read(input_uri)?;
	let options = FromCsvOptions {
		column_types: Some(column_types(&metadata)),
		..Default::default()
	};
	let dataframe = DataFrame::from_bytes(&bytes, options)
		.map_err(|error| Error::InvalidCsv(format!("{:#}", error)))?;
	let predictions = predict_dataframe(&pipeline, &metadata, &dataframe.view())?;
	log::info!("predicted {} rows with model {}", predictions.len(), model_id);
	Ok(PredictionSummary {
		predictions,
		model_metadata: metadata,
	})
}
