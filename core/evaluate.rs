/*!
This module scores predictions against labels, on a holdout set with [`calculate_metrics`](fn.calculate_metrics.html) or with k-fold cross validation with [`calculate_cv`](fn.calculate_cv.html). Every reported number is rounded to four decimal places.
*/

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::split::{cv_folds, Fold};
use crate::target::{Target, Task};
use kitsune_dataframe::DataFrameView;
use kitsune_metrics::{ClassificationMetrics, MeanVariance, Metric, RegressionMetrics, StreamingMetric};
use kitsune_util::numeric::round_to;
use rayon::prelude::*;

const DECIMAL_PLACES: i32 = 4;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Metrics {
	Classification(ClassificationSummary),
	Regression(RegressionSummary),
}

/// Macro averaged precision, recall, and f1, over the classes that appear in the labels or the predictions.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassificationSummary {
	pub accuracy: f64,
	pub precision: f64,
	pub recall: f64,
	pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegressionSummary {
	pub mae: f64,
	pub mse: f64,
	pub rmse: f64,
	pub r2: f64,
	pub mape: f64,
}

/// The metric cross validation ranks models by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
	F1Macro,
	R2,
}

impl Scoring {
	pub fn for_task(task: Task) -> Self {
		match task {
			Task::Classification => Self::F1Macro,
			Task::Regression => Self::R2,
		}
	}
}

impl std::fmt::Display for Scoring {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::F1Macro => write!(f, "f1_macro"),
			Self::R2 => write!(f, "r2"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CvSummary {
	pub scoring: Scoring,
	/// The score of each fold, in fold order.
	pub cv_folds: Vec<f64>,
	pub mean: f64,
	/// The population standard deviation of the fold scores.
	pub std: f64,
}

impl CvSummary {
	pub fn from_scores(scoring: Scoring, scores: &[f64]) -> Self {
		let (mean, std) = MeanVariance::compute(scores)
			.map(|output| (output.mean, output.variance.sqrt()))
			.unwrap_or((f64::NAN, f64::NAN));
		Self {
			scoring,
			cv_folds: scores
				.iter()
				.map(|score| round_to(*score, DECIMAL_PLACES))
				.collect(),
			mean: round_to(mean, DECIMAL_PLACES),
			std: round_to(std, DECIMAL_PLACES),
		}
	}
}

/// Compute the holdout metrics of `predicted` against `truth`.
pub fn calculate_metrics(truth: &Target, predicted: &Target, task: Task) -> Result<Metrics> {
	check_targets(truth, predicted, task)?;
	match (truth, predicted) {
		(
			Target::Classification { classes, labels },
			Target::Classification {
				labels: predictions,
				..
			},
		) => {
			let mut metrics = ClassificationMetrics::new(classes.len());
			for (prediction, label) in predictions.iter().zip(labels.iter()) {
				metrics.update((*prediction, *label));
			}
			let output = metrics.finalize();
			Ok(Metrics::Classification(ClassificationSummary {
				accuracy: round_to(output.accuracy, DECIMAL_PLACES),
				precision: round_to(output.precision_macro, DECIMAL_PLACES),
				recall: round_to(output.recall_macro, DECIMAL_PLACES),
				f1: round_to(output.f1_macro, DECIMAL_PLACES),
			}))
		}
		(Target::Regression { values: labels }, Target::Regression { values: predictions }) => {
			let output = regression_metrics(labels, predictions)?;
			Ok(Metrics::Regression(RegressionSummary {
				mae: round_to(output.mae, DECIMAL_PLACES),
				mse: round_to(output.mse, DECIMAL_PLACES),
				rmse: round_to(output.rmse, DECIMAL_PLACES),
				r2: round_to(output.r2, DECIMAL_PLACES),
				mape: round_to(output.mape, DECIMAL_PLACES),
			}))
		}
		_ => Err(Error::InvalidInput(
			"labels and predictions are for different tasks".to_owned(),
		)),
	}
}

/// The unrounded cross validation score of `predicted` against `truth`: macro f1 for classification and r2 for regression.
pub fn score(truth: &Target, predicted: &Target) -> Result<f64> {
	check_targets(truth, predicted, truth.task())?;
	match (truth, predicted) {
		(
			Target::Classification { classes, labels },
			Target::Classification {
				labels: predictions,
				..
			},
		) => {
			let mut metrics = ClassificationMetrics::new(classes.len());
			for (prediction, label) in predictions.iter().zip(labels.iter()) {
				metrics.update((*prediction, *label));
			}
			Ok(metrics.finalize().f1_macro)
		}
		(Target::Regression { values: labels }, Target::Regression { values: predictions }) => {
			Ok(regression_metrics(labels, predictions)?.r2)
		}
		_ => Err(Error::InvalidInput(
			"labels and predictions are for different tasks".to_owned(),
		)),
	}
}

/// Refit `pipeline` on each of `n_splits` folds of `features` and score it on the held out rows. Folds are stratified for classification and shuffled for regression, and they are fitted in parallel.
pub fn calculate_cv(
	pipeline: &Pipeline,
	features: &DataFrameView,
	target: &Target,
	task: Task,
	n_splits: usize,
	seed: u64,
) -> Result<CvSummary> {
	if target.task() != task {
		return Err(Error::InvalidInput(format!(
			"expected a {} target, got a {} target",
			task,
			target.task()
		)));
	}
	if features.nrows() != target.len() {
		return Err(Error::LengthMismatch {
			expected: target.len(),
			actual: features.nrows(),
		});
	}
	let folds = cv_folds(target, n_splits, seed)?;
	let scores = folds
		.par_iter()
		.enumerate()
		.map(|(fold_index, fold)| {
			let score = cv_fold(pipeline, features, target, fold)?;
			log::debug!("cv fold {} scored {:.4}", fold_index, score);
			Ok(score)
		})
		.collect::<Result<Vec<f64>>>()?;
	let summary = CvSummary::from_scores(Scoring::for_task(task), &scores);
	log::info!(
		"cross validation {} mean {} std {}",
		summary.scoring,
		summary.mean,
		summary.std
	);
	Ok(summary)
}

fn cv_fold(pipeline: &Pipeline, features: &DataFrameView, target: &Target, fold: &Fold) -> Result<f64> {
	let train_features = features.take_rows(&fold.train);
	let test_features = features.take_rows(&fold.test);
	let trained = pipeline.fit(&train_features.view(), &target.take(&fold.train))?;
	let predicted = trained.predict_target(&test_features.view())?;
	score(&target.take(&fold.test), &predicted)
}

fn check_targets(truth: &Target, predicted: &Target, task: Task) -> Result<()> {
	if truth.len() != predicted.len() {
		return Err(Error::LengthMismatch {
			expected: truth.len(),
			actual: predicted.len(),
		});
	}
	if truth.is_empty() {
		return Err(Error::InvalidInput(
			"metrics need at least one example".to_owned(),
		));
	}
	if truth.task() != task || predicted.task() != task {
		return Err(Error::InvalidInput(format!(
			"expected {} labels and predictions",
			task
		)));
	}
	if truth.classes() != predicted.classes() {
		return Err(Error::InvalidInput(
			"labels and predictions have different classes".to_owned(),
		));
	}
	Ok(())
}

fn regression_metrics(
	labels: &[f32],
	predictions: &[f32],
) -> Result<kitsune_metrics::RegressionMetricsOutput> {
	let mut metrics = RegressionMetrics::default();
	for (prediction, label) in predictions.iter().zip(labels.iter()) {
		metrics.update((*prediction, *label));
	}
	metrics
		.finalize()
		.ok_or_else(|| Error::InvalidInput("metrics need at least one example".to_owned()))
}

#[cfg(test)]
mod test {
	use super::*;

	fn classes() -> Vec<String> {
		vec!["cat".to_owned(), "dog".to_owned(), "fish".to_owned()]
	}

	#[test]
	fn test_classification_metrics() {
		let truth = Target::Classification {
			classes: classes(),
			labels: vec![0, 0, 1, 1],
		};
		let predicted = Target::Classification {
			classes: classes(),
			labels: vec![0, 1, 1, 1],
		};
		let metrics = calculate_metrics(&truth, &predicted, Task::Classification).unwrap();
		// Class 2 appears in neither, so the averages are over two classes.
		assert_eq!(
			metrics,
			Metrics::Classification(ClassificationSummary {
				accuracy: 0.75,
				precision: 0.8333,
				recall: 0.75,
				f1: 0.7333,
			})
		);
	}

	#[test]
	fn test_regression_metrics() {
		let truth = Target::Regression {
			values: vec![1.0, 2.0, 3.0, 4.0],
		};
		let predicted = Target::Regression {
			values: vec![1.0, 2.0, 3.0, 6.0],
		};
		match calculate_metrics(&truth, &predicted, Task::Regression).unwrap() {
			Metrics::Regression(metrics) => {
				assert_eq!(metrics.mae, 0.5);
				assert_eq!(metrics.mse, 1.0);
				assert_eq!(metrics.rmse, 1.0);
				assert_eq!(metrics.r2, 0.2);
				assert_eq!(metrics.mape, 0.125);
			}
			_ => panic!("expected regression metrics"),
		}
	}

	#[test]
	fn test_mismatches() {
		let truth = Target::Regression {
			values: vec![1.0, 2.0],
		};
		let predicted = Target::Regression { values: vec![1.0] };
		assert!(matches!(
			calculate_metrics(&truth, &predicted, Task::Regression),
			Err(Error::LengthMismatch { .. })
		));
		assert!(matches!(
			calculate_metrics(&truth, &truth, Task::Classification),
			Err(Error::InvalidInput(_))
		));
	}

	#[test]
	fn test_cv_summary() {
		let summary = CvSummary::from_scores(Scoring::R2, &[0.5, 0.7, 0.9]);
		assert_eq!(summary.cv_folds, vec![0.5, 0.7, 0.9]);
		assert_eq!(summary.mean, 0.7);
		assert_eq!(summary.std, 0.1633);
		assert_eq!(serde_json::to_value(&summary).unwrap()["scoring"], "r2");
	}
}
