//! This module contains the main entrypoint to the kitsune cli.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use kitsune_core::{
	evaluate::Metrics,
	predict::PredictOutput,
	profile::DatasetProfile,
	store::{FsArtifactStore, FsDataSource, FsMetadataStore, Stores},
	synthetic::{make_classification, make_regression, ClassificationOptions, RegressionOptions},
	train::TrainRequest,
	PresetCatalog, Task, TrainConfig,
};
use kitsune_dataframe::{DataFrame, FromCsvOptions};
use kitsune_util::table::Table;
use std::path::{Path, PathBuf};

mod csv_writer;

#[derive(Parser)]
#[clap(
	about = "Profile tabular data, train models, and make predictions.",
	setting = clap::AppSettings::DisableHelpSubcommand,
)]
enum Options {
	Profile(ProfileOptions),
	Train(Box<TrainOptions>),
	Predict(PredictOptions),
	#[clap(subcommand)]
	Generate(GenerateOptions),
}

/// profile the columns of a csv file
#[derive(Parser)]
struct ProfileOptions {
	/// the path to your .csv file
	#[clap(short, long)]
	file: PathBuf,
	/// write the profile as json to this path
	#[clap(short, long)]
	output: Option<PathBuf>,
	/// print the storage type of each column instead of the profile
	#[clap(long)]
	schema: bool,
}

/// train a model from a csv file
#[derive(Parser)]
struct TrainOptions {
	/// the path to your .csv file
	#[clap(short, long)]
	file: PathBuf,
	/// the name of the column to predict
	#[clap(short, long)]
	target: String,
	/// classification or regression, inferred from the target column when absent
	#[clap(long)]
	task: Option<Task>,
	/// the path to a yaml config file
	#[clap(short, long)]
	config: Option<PathBuf>,
	/// the path to a yaml preset catalog, replacing the built in one
	#[clap(long)]
	presets: Option<PathBuf>,
	/// the path to a json profile written by `kitsune profile`
	#[clap(long)]
	profile: Option<PathBuf>,
	#[clap(long, default_value = "default")]
	problem_id: String,
	/// the directory models and their metadata are written to
	#[clap(long, default_value = ".kitsune")]
	store: PathBuf,
	/// do not print training progress
	#[clap(long = "no-progress", parse(from_flag = std::ops::Not::not))]
	progress: bool,
}

/// predict with a trained model
#[derive(Parser)]
struct PredictOptions {
	/// the id printed by `kitsune train`
	#[clap(short, long)]
	model_id: String,
	/// the path to a .csv file with the model's feature columns
	#[clap(short, long)]
	file: PathBuf,
	#[clap(long, default_value = ".kitsune")]
	store: PathBuf,
	/// write the predictions as json to this path instead of printing them
	#[clap(short, long)]
	output: Option<PathBuf>,
}

/// generate a synthetic dataset
#[derive(Parser)]
enum GenerateOptions {
	Classification(GenerateClassificationOptions),
	Regression(GenerateRegressionOptions),
}

#[derive(Parser)]
struct GenerateClassificationOptions {
	#[clap(long, default_value = "100")]
	samples: usize,
	#[clap(long, default_value = "20")]
	features: usize,
	#[clap(long, default_value = "2")]
	informative: usize,
	#[clap(long, default_value = "2")]
	classes: usize,
	#[clap(long, default_value = "42")]
	seed: u64,
	/// the path to write the .csv file to
	#[clap(short, long)]
	output: Option<PathBuf>,
}

#[derive(Parser)]
struct GenerateRegressionOptions {
	#[clap(long, default_value = "100")]
	samples: usize,
	#[clap(long, default_value = "10")]
	features: usize,
	#[clap(long, default_value = "5")]
	informative: usize,
	#[clap(long, default_value = "0")]
	noise: f64,
	#[clap(long, default_value = "42")]
	seed: u64,
	#[clap(short, long)]
	output: Option<PathBuf>,
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let options = Options::parse();
	let result = match options {
		Options::Profile(options) => cli_profile(options),
		Options::Train(options) => cli_train(*options),
		Options::Predict(options) => cli_predict(options),
		Options::Generate(options) => cli_generate(options),
	};
	if let Err(error) = result {
		eprintln!("{}: {:#}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn load_csv(path: &Path) -> Result<DataFrame> {
	let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
	DataFrame::from_bytes(&bytes, FromCsvOptions::default())
		.with_context(|| format!("failed to parse {}", path.display()))
}

fn cli_profile(options: ProfileOptions) -> Result<()> {
	let dataframe = load_csv(&options.file)?;
	if options.schema {
		let mut table = Table::new(vec!["column".to_owned(), "type".to_owned()]);
		for (name, column_type) in kitsune_core::suggest_schema(&dataframe.view()) {
			table.push_row(vec![name, column_type]);
		}
		print!("{}", table);
		return Ok(());
	}
	let profile = kitsune_core::analyze(&dataframe.view());
	print!("{}", profile_table(&profile));
	eprintln!(
		"{} rows, {} columns, {:.2}% missing",
		profile.summary.n_rows,
		profile.summary.n_cols,
		profile.summary.missing_pct * 100.0
	);
	if let Some(output) = options.output {
		let json = serde_json::to_vec_pretty(&profile)?;
		std::fs::write(&output, json)
			.with_context(|| format!("failed to write {}", output.display()))?;
		eprintln!("The profile was written to {}.", output.display());
	}
	Ok(())
}

fn profile_table(profile: &DatasetProfile) -> Table {
	let mut table = Table::new(
		["column", "dtype", "semantic type", "missing", "suggested analysis", "excluded"]
			.iter()
			.map(|header| header.to_string())
			.collect(),
	);
	for (name, column) in profile.columns.iter() {
		table.push_row(vec![
			name.clone(),
			column.dtype_raw.clone(),
			label(&column.semantic_type),
			format!("{:.2}%", column.missing_pct * 100.0),
			label(&column.suggested_analysis),
			column
				.exclusion_reason
				.as_ref()
				.map(label)
				.unwrap_or_default(),
		]);
	}
	table
}

fn cli_train(options: TrainOptions) -> Result<()> {
	let config = match options.config.as_deref() {
		Some(path) => TrainConfig::from_path(path)
			.with_context(|| format!("failed to load config {}", path.display()))?,
		None => TrainConfig::default(),
	};
	let catalog = match options.presets.as_deref() {
		Some(path) => PresetCatalog::from_path(path)
			.with_context(|| format!("failed to load presets {}", path.display()))?,
		None => PresetCatalog::builtin()?,
	};
	log::debug!("training with {:?}", config);
	let profile: Option<DatasetProfile> = match options.profile.as_deref() {
		Some(path) => {
			let bytes =
				std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
			Some(serde_json::from_slice(&bytes).context("failed to parse the profile")?)
		}
		None => None,
	};
	let dataset_uri = options.file.to_string_lossy();
	let data_source = FsDataSource::default();
	let metadata_store = FsMetadataStore::new(options.store.join("metadata"));
	let artifacts = FsArtifactStore::new(options.store.join("models"));
	let stores = Stores {
		data_source: &data_source,
		metadata: &metadata_store,
		artifacts: &artifacts,
	};
	let show_progress = options.progress;
	let output = kitsune_core::train(
		&TrainRequest {
			problem_id: &options.problem_id,
			model_id: None,
			dataset_uri: &dataset_uri,
			target: &options.target,
			task: options.task,
			profile: profile.as_ref(),
			config: &config,
			catalog: &catalog,
		},
		stores,
		&mut |progress| {
			if show_progress {
				eprintln!("{} {}", "=>".blue().bold(), progress);
			}
		},
	)?;

	let metadata = &output.metadata;
	eprintln!(
		"Trained {} ({} mode) for target \"{}\".",
		metadata.preset.algorithm, metadata.preset.train_mode, metadata.target
	);
	print!("{}", metrics_table(&metadata.metrics));
	if let Some(cross_validation) = metadata.cross_validation.as_ref() {
		eprintln!(
			"cross validation {}: {:.4} ± {:.4} over {} folds",
			cross_validation.scoring,
			cross_validation.mean,
			cross_validation.std,
			cross_validation.cv_folds.len()
		);
	}
	if let Some(selection) = metadata.auto_selection.as_ref() {
		let mut table = Table::new(
			["candidate", "mean", "std", "error"]
				.iter()
				.map(|header| header.to_string())
				.collect(),
		);
		for candidate in selection.candidates.iter() {
			table.push_row(vec![
				candidate.name.clone(),
				format_option(candidate.mean),
				format_option(candidate.std),
				candidate.error.clone().unwrap_or_default(),
			]);
		}
		print!("{}", table);
		eprintln!("The best model was {}.", selection.best_model);
	}
	eprintln!(
		"Your model {} was written to {}.",
		metadata.model_id.bold(),
		artifacts
			.root()
			.join(metadata.model_uri.as_deref().unwrap_or_default())
			.display()
	);
	Ok(())
}

fn metrics_table(metrics: &Metrics) -> Table {
	let rows: Vec<(&str, f64)> = match metrics {
		Metrics::Classification(metrics) => vec![
			("accuracy", metrics.accuracy),
			("precision", metrics.precision),
			("recall", metrics.recall),
			("f1", metrics.f1),
		],
		Metrics::Regression(metrics) => vec![
			("mae", metrics.mae),
			("mse", metrics.mse),
			("rmse", metrics.rmse),
			("r2", metrics.r2),
			("mape", metrics.mape),
		],
	};
	let mut table = Table::new(vec!["metric".to_owned(), "value".to_owned()]);
	for (name, value) in rows {
		table.push_row(vec![name.to_owned(), format!("{:.4}", value)]);
	}
	table
}

fn cli_predict(options: PredictOptions) -> Result<()> {
	let data_source = FsDataSource::default();
	let metadata_store = FsMetadataStore::new(options.store.join("metadata"));
	let artifacts = FsArtifactStore::new(options.store.join("models"));
	let stores = Stores {
		data_source: &data_source,
		metadata: &metadata_store,
		artifacts: &artifacts,
	};
	let input_uri = options.file.to_string_lossy();
	let summary = kitsune_core::predict(&options.model_id, &input_uri, stores)
		.with_context(|| format!("failed to predict with model {}", options.model_id))?;
	if let Some(output) = options.output {
		let json = serde_json::to_vec_pretty(&summary.predictions)?;
		std::fs::write(&output, json)
			.with_context(|| format!("failed to write {}", output.display()))?;
		eprintln!(
			"{} predictions were written to {}.",
			summary.predictions.len(),
			output.display()
		);
		return Ok(());
	}
	let table = match &summary.predictions {
		PredictOutput::Regression(outputs) => {
			let mut table = Table::new(vec!["row".to_owned(), "value".to_owned()]);
			for (row, output) in outputs.iter().enumerate() {
				table.push_row(vec![row.to_string(), output.value.to_string()]);
			}
			table
		}
		PredictOutput::Classification(outputs) => {
			let mut table = Table::new(
				["row", "class", "probability"]
					.iter()
					.map(|header| header.to_string())
					.collect(),
			);
			for (row, output) in outputs.iter().enumerate() {
				table.push_row(vec![
					row.to_string(),
					output.class_name.clone(),
					format!("{:.4}", output.probability),
				]);
			}
			table
		}
	};
	print!("{}", table);
	Ok(())
}

fn cli_generate(options: GenerateOptions) -> Result<()> {
	let (dataframe, output, name) = match options {
		GenerateOptions::Classification(options) => (
			make_classification(&ClassificationOptions {
				n_samples: options.samples,
				n_features: options.features,
				n_informative: options.informative,
				n_classes: options.classes,
				seed: options.seed,
				..Default::default()
			})?,
			options.output,
			"classification",
		),
		GenerateOptions::Regression(options) => (
			make_regression(&RegressionOptions {
				n_samples: options.samples,
				n_features: options.features,
				n_informative: options.informative,
				noise: options.noise,
				seed: options.seed,
				..Default::default()
			})?,
			options.output,
			"regression",
		),
	};
	let output = match output {
		Some(output) => output,
		None => available_path(&std::env::current_dir()?, name, "csv")?,
	};
	csv_writer::write_csv(&dataframe, &output)
		.with_context(|| format!("failed to write {}", output.display()))?;
	eprintln!(
		"{} rows were written to {}.",
		dataframe.nrows(),
		output.display()
	);
	Ok(())
}

/// The snake case name a value serializes to.
fn label<T: serde::Serialize>(value: &T) -> String {
	serde_json::to_value(value)
		.ok()
		.and_then(|value| value.as_str().map(ToOwned::to_owned))
		.unwrap_or_default()
}

fn format_option(value: Option<f64>) -> String {
	value.map(|value| format!("{:.4}", value)).unwrap_or_default()
}

/// This function checks if a file with the given name and extension already exists in `dir`, and if it does, it appends " 1", " 2", etc. to it until it finds a name that will not overwrite an existing file.
fn available_path(dir: &Path, name: &str, extension: &str) -> Result<PathBuf> {
	let mut i = 0;
	loop {
		let mut filename = String::from(name);
		if i > 0 {
			filename.push(' ');
			filename.push_str(&i.to_string());
		}
		filename.push('.');
		filename.push_str(extension);
		let path = dir.join(filename);
		match std::fs::metadata(&path) {
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(path),
			Err(error) => return Err(error.into()),
			Ok(_) => i += 1,
		}
	}
}
