/*!
This module runs a whole training run: profile the dataset if no profile is given, select the features, hold out a test split, build and fit the configured preset, score it, optionally cross validate it and explain it, and assemble the [`TrainingRunMetadata`](../metadata/struct.TrainingRunMetadata.html).
*/

use crate::config::{EvaluationStrategy, TrainConfig};
use crate::error::{Error, Result};
use crate::evaluate::{calculate_cv, calculate_metrics};
use crate::explain::{explain, ExplainInput};
use crate::id::Id;
use crate::metadata::{SchemaSnapshot, TrainingRunMetadata, TrainingRunMetadataBuilder};
use crate::pipeline::{TrainedEstimator, TrainedPipeline};
use crate::presets::PresetCatalog;
use crate::profile::{analyze, DatasetProfile, SuggestedAnalysis};
use crate::progress::Progress;
use crate::select::{select, semantic_types};
use crate::split::train_test_split;
use crate::store::{model_uri, Stores};
use crate::target::{Target, Task};
use kitsune_dataframe::{DataFrame, DataFrameView, FromCsvOptions};

pub struct TrainOptions<'a> {
	pub problem_id: &'a str,
	pub model_id: &'a str,
	pub target: &'a str,
	/// The task to train for. When absent it is the analysis the profile suggests for the target column.
	pub task: Option<Task>,
	/// A stored profile of the dataset. When absent the dataset is profiled.
	pub profile: Option<&'a DatasetProfile>,
	pub config: &'a TrainConfig,
	pub catalog: &'a PresetCatalog,
}

pub struct TrainOutput {
	pub pipeline: TrainedPipeline,
	pub metadata: TrainingRunMetadata,
}

pub fn train_dataframe(
	dataframe: &DataFrameView,
	options: &TrainOptions,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<TrainOutput> {
	let config = options.config;
	config.validate()?;
	let seed = config.random_seed();

	let computed_profile;
	let profile = match options.profile {
		Some(profile) => profile,
		None => {
			update_progress(Progress::Profiling);
			computed_profile = analyze(dataframe);
			&computed_profile
		}
	};
	let task = match options.task {
		Some(task) => task,
		None => infer_task(profile, options.target)?,
	};
	log::info!("training a {} model for target \"{}\"", task, options.target);

	update_progress(Progress::Selecting);
	let selection = select(
		dataframe,
		options.target,
		Some(profile),
		&config.feature_strategy(),
	)?;
	let target = Target::from_column(&selection.target.view(), task)?;
	let partition = semantic_types(&selection.features.column_names(), Some(profile))?;
	let feature_columns: Vec<String> = selection
		.features
		.column_names()
		.into_iter()
		.filter(|name| {
			partition.categorical.contains(name)
				|| partition.numeric.contains(name)
				|| partition.boolean.contains(name)
		})
		.collect();
	if feature_columns.len() < selection.features.ncols() {
		log::warn!(
			"{} selected columns have no trainable semantic type and are ignored",
			selection.features.ncols() - feature_columns.len()
		);
	}
	if feature_columns.is_empty() {
		return Err(Error::InvalidInput(
			"no feature columns remain after selection".to_owned(),
		));
	}
	let features_view = selection.features.view();
	let features = features_view
		.select(&feature_columns)
		.ok_or_else(|| Error::SchemaMismatch("a selected column disappeared".to_owned()))?;

	let split = train_test_split(&target, config.test_fraction(), seed)?;
	let train_features = features.take_rows(&split.train);
	let test_features = features.take_rows(&split.test);
	let train_target = target.take(&split.train);
	let test_target = target.take(&split.test);
	log::info!(
		"split {} rows into {} train and {} test rows",
		target.len(),
		split.train.len(),
		split.test.len()
	);

	let preset = options.catalog.load(task, config.algorithm())?;
	let (pipeline, preset_metadata) = preset.build(&partition, config.train_mode(), seed)?;
	update_progress(Progress::Fitting {
		preset: preset.name.clone(),
	});
	log::info!(
		"fitting {} in {} mode",
		preset_metadata.algorithm,
		preset_metadata.train_mode
	);
	let trained = pipeline.fit(&train_features.view(), &train_target)?;

	update_progress(Progress::Evaluating);
	let predicted = trained.predict_target(&test_features.view())?;
	let metrics = calculate_metrics(&test_target, &predicted, task)?;

	let auto_model = match &trained.estimator {
		TrainedEstimator::Auto(model) => Some(model),
		_ => None,
	};
	let cross_validation = match config.evaluation_strategy() {
		EvaluationStrategy::Cv => {
			update_progress(Progress::CrossValidating {
				n_folds: config.cv_folds(),
			});
			Some(calculate_cv(
				&pipeline,
				&train_features.view(),
				&train_target,
				task,
				config.cv_folds(),
				seed,
			)?)
		}
		EvaluationStrategy::Holdout => auto_model.map(|model| model.cv_summary.clone()),
	};

	let explanation = if config.explain() {
		update_progress(Progress::Explaining);
		let train_matrix = trained.transform(&train_features.view())?;
		let test_matrix = trained.transform(&test_features.view())?;
		let feature_names = trained.feature_names();
		let feature_parents = trained.feature_parents();
		let explain_options = config.explain_options();
		Some(explain(&ExplainInput {
			task,
			model: &trained.estimator,
			train_features: train_matrix.view(),
			test_features: test_matrix.view(),
			feature_names: &feature_names,
			feature_parents: &feature_parents,
			label_classes: target.classes(),
			options: &explain_options,
		})?)
	} else {
		None
	};

	let metadata = TrainingRunMetadataBuilder::new(
		options.problem_id,
		options.model_id,
		options.target,
		preset_metadata,
	)
	.evaluation_strategy(config.evaluation_strategy())
	.schema_snapshot(SchemaSnapshot::new(
		&features,
		options.target,
		selection.target.column_type().name(),
	))
	.metrics(metrics)
	.cross_validation(cross_validation)
	.auto_selection(auto_model.map(|model| model.selection.clone()))
	.explanation(explanation)
	.label_classes(target.classes().map(|classes| classes.to_vec()))
	.build()?;

	Ok(TrainOutput {
		pipeline: trained,
		metadata,
	})
}

/// Everything a training run needs besides the stores.
pub struct TrainRequest<'a> {
	pub problem_id: &'a str,
	/// Generated when absent.
	pub model_id: Option<Id>,
	pub dataset_uri: &'a str,
	pub target: &'a str,
	pub task: Option<Task>,
	pub profile: Option<&'a DatasetProfile>,
	pub config: &'a TrainConfig,
	pub catalog: &'a PresetCatalog,
}

/// Read the dataset from the data source, train, and write the model artifact and its metadata to the stores. The returned metadata carries the artifact's `model_uri`.
pub fn train(
	request: &TrainRequest,
	stores: Stores,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<TrainOutput> {
	update_progress(Progress::Loading);
	let bytes = stores.data_source.read(request.dataset_uri)?;
	let dataframe = DataFrame::from_bytes(&bytes, FromCsvOptions::default())
		.map_err(|error| Error::InvalidCsv(format!("{:#}", error)))?;
	log::info!(
		"loaded {} rows and {} columns from {}",
		dataframe.nrows(),
		dataframe.ncols(),
		request.dataset_uri
	);
	let model_id = request.model_id.unwrap_or_else(Id::generate).to_string();
	let mut output = train_dataframe(
		&dataframe.view(),
		&TrainOptions {
			problem_id: request.problem_id,
			model_id: &model_id,
			target: request.target,
			task: request.task,
			profile: request.profile,
			config: request.config,
			catalog: request.catalog,
		},
		update_progress,
	)?;

	update_progress(Progress::Saving);
	let uri = model_uri(request.problem_id, &model_id);
	stores.artifacts.write(&uri, &output.pipeline.to_bytes()?)?;
	output.metadata.model_uri = Some(uri.clone());
	stores.metadata.write(&model_id, &output.metadata.to_json()?)?;
	log::info!("saved model {} to {}", model_id, uri);
	Ok(output)
}

/// The task the profile suggests for `target`.
pub fn infer_task(profile: &DatasetProfile, target: &str) -> Result<Task> {
	let column = profile
		.column(target)
		.ok_or_else(|| Error::TargetNotFound(target.to_owned()))?;
	match column.suggested_analysis {
		SuggestedAnalysis::Classification => Ok(Task::Classification),
		SuggestedAnalysis::Regression => Ok(Task::Regression),
		SuggestedAnalysis::None => Err(Error::InvalidTarget(format!(
			"no task can be inferred for target column \"{}\", specify one",
			target
		))),
	}
}
