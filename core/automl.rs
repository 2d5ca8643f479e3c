/*!
The `auto` estimator. An [`AutoSelector`](struct.AutoSelector.html) cross validates a fixed list of candidate estimators on the preprocessed training features, refits the one with the best mean score on all of them, and delegates predictions to it.
*/

use crate::error::{Error, Result};
use crate::evaluate::{score, CvSummary, Scoring};
use crate::pipeline::{Estimator, TrainedEstimator};
use crate::split::{cv_folds, Fold};
use crate::target::{Target, Task, TrainMode};
use ndarray::prelude::*;
use rayon::prelude::*;

/// The estimators the auto preset chooses between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
	LogisticRegression,
	LinearRegression,
	Ridge,
	RandomForest,
	ExtraTrees,
	GradientBoosting,
}

impl CandidateKind {
	/// The candidates for `task`, in the order they are evaluated. Ties go to the earlier candidate.
	pub fn for_task(task: Task) -> &'static [CandidateKind] {
		match task {
			Task::Classification => &[
				CandidateKind::LogisticRegression,
				CandidateKind::RandomForest,
				CandidateKind::ExtraTrees,
				CandidateKind::GradientBoosting,
			],
			Task::Regression => &[
				CandidateKind::LinearRegression,
				CandidateKind::Ridge,
				CandidateKind::RandomForest,
				CandidateKind::GradientBoosting,
			],
		}
	}

	/// The catalog preset whose tier table parameterizes this candidate.
	pub fn preset_name(&self) -> &'static str {
		match self {
			Self::LogisticRegression => "logistic_regression",
			Self::LinearRegression => "linear_regression",
			Self::Ridge => "ridge_regression",
			Self::RandomForest => "random_forest",
			Self::ExtraTrees => "extra_trees",
			Self::GradientBoosting => "xgboost",
		}
	}

	pub fn name(&self, task: Task) -> &'static str {
		match (self, task) {
			(Self::LogisticRegression, _) => "LogisticRegression",
			(Self::LinearRegression, _) => "LinearRegression",
			(Self::Ridge, _) => "Ridge",
			(Self::RandomForest, Task::Classification) => "RandomForestClassifier",
			(Self::RandomForest, Task::Regression) => "RandomForestRegressor",
			(Self::ExtraTrees, Task::Classification) => "ExtraTreesClassifier",
			(Self::ExtraTrees, Task::Regression) => "ExtraTreesRegressor",
			(Self::GradientBoosting, Task::Classification) => "GradientBoostingClassifier",
			(Self::GradientBoosting, Task::Regression) => "GradientBoostingRegressor",
		}
	}
}

#[derive(Debug, Clone)]
pub struct Candidate {
	pub kind: CandidateKind,
	pub estimator: Estimator,
}

#[derive(Debug, Clone)]
pub struct AutoSelector {
	pub task: Task,
	pub train_mode: TrainMode,
	pub seed: u64,
	pub cv_folds: usize,
	pub candidates: Vec<Candidate>,
}

/// The outcome of cross validating one candidate. A candidate that failed has an `error` and no scores.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CandidateResult {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mean: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub std: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AutoSelection {
	pub best_model: String,
	pub scoring: Scoring,
	pub candidates: Vec<CandidateResult>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AutoModel {
	pub selection: AutoSelection,
	/// The cross validation scores of the winning candidate.
	pub cv_summary: CvSummary,
	pub best: TrainedEstimator,
}

impl AutoSelector {
	pub fn fit(&self, features: ArrayView2<f32>, target: &Target) -> Result<AutoModel> {
		if target.task() != self.task {
			return Err(Error::InvalidTarget(format!(
				"the auto {} estimator cannot be fitted to a {} target",
				self.task,
				target.task()
			)));
		}
		let scoring = Scoring::for_task(self.task);
		let folds = cv_folds(target, self.cv_folds, self.seed)?;
		log::info!(
			"evaluating {} candidates with {} fold cross validation",
			self.candidates.len(),
			folds.len()
		);
		let mut results = Vec::with_capacity(self.candidates.len());
		let mut best: Option<(usize, Vec<f64>, f64)> = None;
		for (index, candidate) in self.candidates.iter().enumerate() {
			let name = candidate.kind.name(self.task);
			match cross_validate(&candidate.estimator, features, target, &folds) {
				Ok(scores) => {
					let summary = CvSummary::from_scores(scoring, &scores);
					let mean = scores.iter().sum::<f64>() / scores.len() as f64;
					log::debug!("candidate {} scored {} {}", name, scoring, summary.mean);
					results.push(CandidateResult {
						name: name.to_owned(),
						mean: Some(summary.mean),
						std: Some(summary.std),
						error: None,
					});
					let is_better = match best.as_ref() {
						Some((_, _, best_mean)) => mean > *best_mean,
						None => !mean.is_nan(),
					};
					if is_better {
						best = Some((index, scores, mean));
					}
				}
				Err(error) => {
					log::warn!("candidate {} failed: {}", name, error);
					results.push(CandidateResult {
						name: name.to_owned(),
						mean: None,
						std: None,
						error: Some(error.to_string()),
					});
				}
			}
		}
		let (best_index, best_scores, _) = match best {
			Some(best) => best,
			None => {
				let message = results
					.iter()
					.map(|result| {
						format!(
							"{}: {}",
							result.name,
							result.error.as_deref().unwrap_or("no score")
						)
					})
					.collect::<Vec<_>>()
					.join("; ");
				return Err(Error::AllCandidatesFailed(message));
			}
		};
		let winner = &self.candidates[best_index];
		let best_model = winner.kind.name(self.task).to_owned();
		log::info!("selected {}, refitting on every training row", best_model);
		let best = winner.estimator.fit(features, target)?;
		Ok(AutoModel {
			selection: AutoSelection {
				best_model,
				scoring,
				candidates: results,
			},
			cv_summary: CvSummary::from_scores(scoring, &best_scores),
			best,
		})
	}
}

/// Fit `estimator` on the train rows of each fold and score it on the test rows. Folds run in parallel and the scores are returned in fold order.
fn cross_validate(
	estimator: &Estimator,
	features: ArrayView2<f32>,
	target: &Target,
	folds: &[Fold],
) -> Result<Vec<f64>> {
	folds
		.par_iter()
		.map(|fold| {
			let train_features = features.select(Axis(0), &fold.train);
			let test_features = features.select(Axis(0), &fold.test);
			let trained = estimator.fit(train_features.view(), &target.take(&fold.train))?;
			let predicted = predictions_to_target(&trained, test_features.view(), target);
			score(&target.take(&fold.test), &predicted)
		})
		.collect()
}

fn predictions_to_target(trained: &TrainedEstimator, features: ArrayView2<f32>, target: &Target) -> Target {
	match trained.predict(features) {
		crate::pipeline::Predictions::Classification { labels, .. } => Target::Classification {
			classes: target.classes().map(|classes| classes.to_vec()).unwrap_or_default(),
			labels,
		},
		crate::pipeline::Predictions::Regression { values } => Target::Regression {
			values: values.to_vec(),
		},
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use kitsune_linear::RegressorTrainOptions;
	use kitsune_tree::{ForestOptions, MaxFeatures};

	fn regression_data() -> (Array2<f32>, Target) {
		let features = Array2::from_shape_fn((60, 2), |(row, column)| {
			((row * 7 + column * 13) % 17) as f32
		});
		let values = features
			.rows()
			.into_iter()
			.map(|row| 3.0 * row[0] - 2.0 * row[1] + 1.0)
			.collect();
		(features, Target::Regression { values })
	}

	fn selector(candidates: Vec<Candidate>) -> AutoSelector {
		AutoSelector {
			task: Task::Regression,
			train_mode: TrainMode::Fast,
			seed: 42,
			cv_folds: 3,
			candidates,
		}
	}

	#[test]
	fn test_selects_linear_model_for_linear_data() {
		let (features, target) = regression_data();
		let selector = selector(vec![
			Candidate {
				kind: CandidateKind::RandomForest,
				estimator: Estimator::RandomForest(ForestOptions::random_forest(10, MaxFeatures::All, 42)),
			},
			Candidate {
				kind: CandidateKind::LinearRegression,
				estimator: Estimator::LinearRegression(RegressorTrainOptions { alpha: 0.0 }),
			},
		]);
		let model = selector.fit(features.view(), &target).unwrap();
		assert_eq!(model.selection.best_model, "LinearRegression");
		assert_eq!(model.selection.candidates.len(), 2);
		assert_eq!(model.cv_summary.cv_folds.len(), 3);
		assert_eq!(model.cv_summary.mean, 1.0);
		let again = selector.fit(features.view(), &target).unwrap();
		assert_eq!(again.selection, model.selection);
	}

	#[test]
	fn test_failing_candidate_is_skipped() {
		let (features, target) = regression_data();
		let selector = selector(vec![
			Candidate {
				kind: CandidateKind::LogisticRegression,
				estimator: Estimator::LogisticRegression(Default::default()),
			},
			Candidate {
				kind: CandidateKind::Ridge,
				estimator: Estimator::Ridge(RegressorTrainOptions { alpha: 1.0 }),
			},
		]);
		let model = selector.fit(features.view(), &target).unwrap();
		assert_eq!(model.selection.best_model, "Ridge");
		assert!(model.selection.candidates[0].error.is_some());
		assert!(model.selection.candidates[0].mean.is_none());
	}

	#[test]
	fn test_all_candidates_failed() {
		let features = Array2::<f32>::zeros((9, 1));
		let target = Target::Classification {
			classes: vec!["only".to_owned()],
			labels: vec![0; 9],
		};
		let selector = AutoSelector {
			task: Task::Classification,
			train_mode: TrainMode::Fast,
			seed: 0,
			cv_folds: 3,
			candidates: vec![Candidate {
				kind: CandidateKind::LogisticRegression,
				estimator: Estimator::LogisticRegression(Default::default()),
			}],
		};
		assert!(matches!(
			selector.fit(features.view(), &target),
			Err(Error::AllCandidatesFailed(_))
		));
	}
}
