/*!
The analytical core of Kitsune. It profiles tabular datasets, selects features, builds models from a catalog of presets, chooses among candidate models with cross validation, evaluates them, and explains their predictions with shapley values.

A training run is driven by [`train`](train/fn.train.html), which reads a dataset through a [`DataSource`](store/trait.DataSource.html) and writes the fitted model and its [`TrainingRunMetadata`](metadata/struct.TrainingRunMetadata.html) to the stores. [`predict`](predict/fn.predict.html) loads them back.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod automl;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod explain;
pub mod id;
pub mod metadata;
pub mod pipeline;
pub mod predict;
pub mod presets;
pub mod profile;
pub mod progress;
pub mod select;
pub mod split;
pub mod store;
pub mod synthetic;
pub mod target;
pub mod train;

pub use self::{
	config::TrainConfig,
	error::{Error, ErrorKind, Result},
	id::Id,
	metadata::TrainingRunMetadata,
	predict::predict,
	presets::PresetCatalog,
	profile::{analyze, suggest_schema, DatasetProfile},
	progress::Progress,
	target::{Task, TrainMode},
	train::train,
};
