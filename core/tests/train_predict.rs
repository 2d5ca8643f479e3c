use kitsune_core::{
	config::{EvaluationStrategy, TrainConfig},
	error::Error,
	evaluate::Metrics,
	explain::{explain, ExplainInput, ExplainOptions, GlobalImportance},
	predict::{predict, predict_dataframe, PredictOutput},
	presets::PresetCatalog,
	progress::Progress,
	store::{model_uri, FsArtifactStore, FsDataSource, FsMetadataStore, Stores},
	synthetic::{make_classification, ClassificationOptions},
	train::{train, train_dataframe, TrainOptions, TrainOutput, TrainRequest},
	Id, Task, TrainMode,
};
use kitsune_dataframe::{DataFrame, FromCsvOptions};

fn fast_config(algorithm: &str) -> TrainConfig {
	TrainConfig {
		algorithm: Some(algorithm.to_owned()),
		train_mode: Some(TrainMode::Fast),
		explain: Some(false),
		..Default::default()
	}
}

fn train_synthetic(n_samples: usize, config: &TrainConfig) -> TrainOutput {
	let dataframe = make_classification(&ClassificationOptions {
		n_samples,
		n_features: 4,
		n_informative: 2,
		n_classes: 2,
		class_sep: 1.5,
		seed: 7,
	})
	.unwrap();
	let catalog = PresetCatalog::builtin().unwrap();
	train_dataframe(
		&dataframe.view(),
		&TrainOptions {
			problem_id: "synthetic",
			model_id: "model",
			target: "target",
			task: None,
			profile: None,
			config,
			catalog: &catalog,
		},
		&mut |_| {},
	)
	.unwrap()
}

/// A small regression dataset: an id column, two numeric features, a categorical feature, and a target that is linear in all three.
fn regression_csv() -> String {
	let colors = ["red", "green", "blue"];
	let mut csv = String::from("id,x0,x1,color,y\n");
	for i in 0..60 {
		let x0 = i as f32 / 10.0;
		let x1 = (i * 7) % 13;
		let color = colors[i % 3];
		let offset = match color {
			"red" => 5.0,
			"green" => -2.0,
			_ => 0.0,
		};
		let y = 2.0 * x0 + 3.0 * x1 as f32 + offset;
		csv.push_str(&format!("{},{},{},{},{}\n", i + 1, x0, x1, color, y));
	}
	csv
}

#[test]
fn test_auto_classification() {
	let output = train_synthetic(500, &fast_config("auto"));
	let metadata = output.metadata;
	assert_eq!(metadata.preset.task, Task::Classification);
	assert_eq!(metadata.preset.algorithm, "AutoClassifier");
	match &metadata.metrics {
		Metrics::Classification(metrics) => {
			assert!(metrics.f1 >= 0.0 && metrics.f1 <= 1.0);
			assert!(metrics.accuracy > 0.5);
		}
		_ => panic!("expected classification metrics"),
	}
	let fast_cv_folds = PresetCatalog::builtin()
		.unwrap()
		.load(Task::Classification, "auto")
		.unwrap()
		.param("cv_folds", TrainMode::Fast)
		.unwrap() as usize;
	let cross_validation = metadata.cross_validation.as_ref().unwrap();
	assert_eq!(cross_validation.cv_folds.len(), fast_cv_folds);
	let selection = metadata.auto_selection.as_ref().unwrap();
	assert_eq!(selection.candidates.len(), 4);
	assert!(selection
		.candidates
		.iter()
		.any(|candidate| candidate.name == selection.best_model));
	assert_eq!(
		metadata.label_classes,
		Some(vec!["0".to_owned(), "1".to_owned()])
	);
	assert!(metadata.explanation.is_none());
	assert_eq!(
		metadata.schema_snapshot.feature_order,
		vec!["feature_0", "feature_1", "feature_2", "feature_3"]
	);
}

#[test]
fn test_auto_selection_is_deterministic() {
	let config = fast_config("auto");
	let a = train_synthetic(120, &config).metadata;
	let b = train_synthetic(120, &config).metadata;
	assert_eq!(a.auto_selection, b.auto_selection);
	assert_eq!(a.cross_validation, b.cross_validation);
	assert_eq!(a.metrics, b.metrics);
}

#[test]
fn test_cv_evaluation_strategy() {
	let config = TrainConfig {
		evaluation_strategy: Some(EvaluationStrategy::Cv),
		cv_folds: Some(3),
		..fast_config("logistic_regression")
	};
	let metadata = train_synthetic(150, &config).metadata;
	assert_eq!(metadata.evaluation_strategy, EvaluationStrategy::Cv);
	assert_eq!(metadata.cross_validation.unwrap().cv_folds.len(), 3);
	assert!(metadata.auto_selection.is_none());
}

#[test]
fn test_explain_rejects_mismatched_feature_names() {
	let output = train_synthetic(100, &fast_config("logistic_regression"));
	let dataframe = make_classification(&ClassificationOptions {
		n_samples: 20,
		n_features: 4,
		seed: 8,
		..Default::default()
	})
	.unwrap();
	let view = dataframe.view();
	let features = view.select(&["feature_0", "feature_1", "feature_2", "feature_3"]).unwrap();
	let matrix = output.pipeline.transform(&features).unwrap();
	let mut feature_names = output.pipeline.feature_names();
	let mut feature_parents = output.pipeline.feature_parents();
	feature_names.pop();
	feature_parents.pop();
	let options = ExplainOptions::default();
	let result = explain(&ExplainInput {
		task: Task::Classification,
		model: &output.pipeline.estimator,
		train_features: matrix.view(),
		test_features: matrix.view(),
		feature_names: &feature_names,
		feature_parents: &feature_parents,
		label_classes: None,
		options: &options,
	});
	assert!(matches!(result, Err(Error::FeatureMismatch(_))));
}

#[test]
fn test_train_and_predict_through_stores() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("train.csv"), regression_csv()).unwrap();
	let data_source = FsDataSource {
		root: Some(dir.path().to_owned()),
	};
	let metadata_store = FsMetadataStore::new(dir.path().join("metadata"));
	let artifacts = FsArtifactStore::new(dir.path().join("models"));
	let stores = Stores {
		data_source: &data_source,
		metadata: &metadata_store,
		artifacts: &artifacts,
	};
	let config = TrainConfig {
		algorithm: Some("linear_regression".to_owned()),
		explain_options: Some(ExplainOptions {
			n_ref_max: 10,
			n_explain_max: 5,
			top_k: 2,
			..Default::default()
		}),
		..Default::default()
	};
	let catalog = PresetCatalog::builtin().unwrap();
	let model_id = Id::generate();
	let mut stages = Vec::new();
	let output = train(
		&TrainRequest {
			problem_id: "houses",
			model_id: Some(model_id),
			dataset_uri: "train.csv",
			target: "y",
			task: None,
			profile: None,
			config: &config,
			catalog: &catalog,
		},
		stores,
		&mut |progress| stages.push(progress),
	)
	.unwrap();
	assert_eq!(stages.first(), Some(&Progress::Loading));
	assert_eq!(stages.last(), Some(&Progress::Saving));
	assert!(stages.contains(&Progress::Explaining));

	let metadata = &output.metadata;
	let model_id = model_id.to_string();
	assert_eq!(metadata.preset.task, Task::Regression);
	assert_eq!(
		metadata.model_uri.as_deref(),
		Some(model_uri("houses", &model_id).as_str())
	);
	assert!(!metadata.schema_snapshot.features.contains_key("id"));
	assert_eq!(metadata.schema_snapshot.feature_order, vec!["x0", "x1", "color"]);
	match &metadata.metrics {
		Metrics::Regression(metrics) => assert!(metrics.r2 > 0.99),
		_ => panic!("expected regression metrics"),
	}
	let explanation = metadata.explanation.as_ref().unwrap();
	match &explanation.global {
		GlobalImportance::Regression { mean_abs, .. } => assert_eq!(mean_abs.len(), 2),
		_ => panic!("expected a regression explanation"),
	}
	assert!(dir
		.path()
		.join("models")
		.join(model_uri("houses", &model_id))
		.exists());

	// The columns are reordered and the target and id are present, which prediction ignores.
	std::fs::write(
		dir.path().join("input.csv"),
		"color,y,x1,id,x0\nred,0,3,1,1.5\nblue,0,12,2,0.0\ngreen,0,0,3,4.0\n",
	)
	.unwrap();
	let summary = predict(&model_id, "input.csv", stores).unwrap();
	assert_eq!(summary.model_metadata.model_id, model_id);
	match summary.predictions {
		PredictOutput::Regression(values) => {
			assert_eq!(values.len(), 3);
			assert!((values[0].value - 17.0).abs() < 0.5);
			assert!((values[1].value - 36.0).abs() < 0.5);
			assert!((values[2].value - 6.0).abs() < 0.5);
		}
		_ => panic!("expected regression predictions"),
	}

	let input = DataFrame::from_bytes(b"x0,color\n1.0,red\n", FromCsvOptions::default()).unwrap();
	let result = predict_dataframe(&output.pipeline, metadata, &input.view());
	match result {
		Err(Error::SchemaMismatch(message)) => assert!(message.contains("x1")),
		_ => panic!("expected a schema mismatch"),
	}

	let result = predict("not-a-model", "input.csv", stores);
	assert!(result.is_err());
}
