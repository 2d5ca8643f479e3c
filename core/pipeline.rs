/*!
A [`Pipeline`](struct.Pipeline.html) pairs the options of a three-branch preprocessor with an untrained [`Estimator`](enum.Estimator.html). Fitting it produces a [`TrainedPipeline`](struct.TrainedPipeline.html), which is what is serialized as a model artifact.
*/

use crate::automl::{AutoModel, AutoSelector};
use crate::error::{Error, Result};
use crate::target::{Target, Task};
use kitsune_dataframe::DataFrameView;
use kitsune_features::{Preprocessor, PreprocessorOptions};
use kitsune_linear::{ClassifierTrainOptions, MulticlassClassifier, Regressor, RegressorTrainOptions};
use kitsune_tree::{
	BoostingClassifier, BoostingOptions, BoostingRegressor, ForestClassifier, ForestOptions,
	ForestRegressor,
};
use ndarray::prelude::*;

/// An untrained estimator and its training options.
#[derive(Debug, Clone)]
pub enum Estimator {
	LinearRegression(RegressorTrainOptions),
	Ridge(RegressorTrainOptions),
	LogisticRegression(ClassifierTrainOptions),
	RandomForest(ForestOptions),
	ExtraTrees(ForestOptions),
	GradientBoosting(BoostingOptions),
	HistogramGradientBoosting(BoostingOptions),
	Auto(AutoSelector),
}

impl Estimator {
	pub fn name(&self) -> &'static str {
		match self {
			Self::LinearRegression(_) => "linear_regression",
			Self::Ridge(_) => "ridge",
			Self::LogisticRegression(_) => "logistic_regression",
			Self::RandomForest(_) => "random_forest",
			Self::ExtraTrees(_) => "extra_trees",
			Self::GradientBoosting(_) => "gradient_boosting",
			Self::HistogramGradientBoosting(_) => "histogram_gradient_boosting",
			Self::Auto(_) => "auto",
		}
	}

	/// Train the estimator on a dense feature matrix with one row per label in `target`.
	pub fn fit(&self, features: ArrayView2<f32>, target: &Target) -> Result<TrainedEstimator> {
		if features.nrows() != target.len() {
			return Err(Error::LengthMismatch {
				expected: target.len(),
				actual: features.nrows(),
			});
		}
		let name = self.name();
		let fit_error = |error: &dyn std::fmt::Display| Error::fit(name, error);
		let trained = match (self, target) {
			(Self::LinearRegression(options), Target::Regression { values })
			| (Self::Ridge(options), Target::Regression { values }) => {
				let model = Regressor::train(features, ArrayView1::from(values.as_slice()), options)
					.map_err(|error| fit_error(&error))?;
				TrainedEstimator::LinearRegressor(model)
			}
			(Self::LogisticRegression(options), Target::Classification { classes, labels }) => {
				let model = MulticlassClassifier::train(
					features,
					ArrayView1::from(labels.as_slice()),
					classes.len(),
					options,
				)
				.map_err(|error| fit_error(&error))?;
				TrainedEstimator::LinearClassifier(model)
			}
			(Self::RandomForest(options), Target::Regression { values })
			| (Self::ExtraTrees(options), Target::Regression { values }) => {
				let model = ForestRegressor::train(features, ArrayView1::from(values.as_slice()), options)
					.map_err(|error| fit_error(&error))?;
				TrainedEstimator::ForestRegressor(model)
			}
			(Self::RandomForest(options), Target::Classification { classes, labels })
			| (Self::ExtraTrees(options), Target::Classification { classes, labels }) => {
				let model = ForestClassifier::train(
					features,
					ArrayView1::from(labels.as_slice()),
					classes.len(),
					options,
				)
				.map_err(|error| fit_error(&error))?;
				TrainedEstimator::ForestClassifier(model)
			}
			(Self::GradientBoosting(options), Target::Regression { values })
			| (Self::HistogramGradientBoosting(options), Target::Regression { values }) => {
				let model =
					BoostingRegressor::train(features, ArrayView1::from(values.as_slice()), options)
						.map_err(|error| fit_error(&error))?;
				TrainedEstimator::BoostingRegressor(model)
			}
			(Self::GradientBoosting(options), Target::Classification { classes, labels })
			| (Self::HistogramGradientBoosting(options), Target::Classification { classes, labels }) => {
				let model = BoostingClassifier::train(
					features,
					ArrayView1::from(labels.as_slice()),
					classes.len(),
					options,
				)
				.map_err(|error| fit_error(&error))?;
				TrainedEstimator::BoostingClassifier(model)
			}
			(Self::Auto(selector), _) => TrainedEstimator::Auto(Box::new(selector.fit(features, target)?)),
			(_, target) => {
				return Err(Error::fit(
					name,
					format!("{} targets are not supported", target.task()),
				))
			}
		};
		Ok(trained)
	}
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum TrainedEstimator {
	LinearRegressor(Regressor),
	LinearClassifier(MulticlassClassifier),
	ForestRegressor(ForestRegressor),
	ForestClassifier(ForestClassifier),
	BoostingRegressor(BoostingRegressor),
	BoostingClassifier(BoostingClassifier),
	Auto(Box<AutoModel>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
	Classification {
		labels: Vec<usize>,
		/// The probability of each class, with shape (n_examples, n_classes).
		probabilities: Array2<f32>,
	},
	Regression {
		values: Array1<f32>,
	},
}

impl TrainedEstimator {
	pub fn task(&self) -> Task {
		match self {
			Self::LinearRegressor(_) | Self::ForestRegressor(_) | Self::BoostingRegressor(_) => {
				Task::Regression
			}
			Self::LinearClassifier(_) | Self::ForestClassifier(_) | Self::BoostingClassifier(_) => {
				Task::Classification
			}
			Self::Auto(model) => model.best.task(),
		}
	}

	/// The number of columns in the feature matrix the estimator was fitted on.
	pub fn n_features(&self) -> usize {
		match self {
			Self::LinearRegressor(model) => model.n_features(),
			Self::LinearClassifier(model) => model.n_features(),
			Self::ForestRegressor(model) => model.n_features,
			Self::ForestClassifier(model) => model.n_features,
			Self::BoostingRegressor(model) => model.n_features,
			Self::BoostingClassifier(model) => model.n_features,
			Self::Auto(model) => model.best.n_features(),
		}
	}

	/// One output for regressors, one probability per class for classifiers.
	pub fn n_outputs(&self) -> usize {
		match self {
			Self::LinearRegressor(_) | Self::ForestRegressor(_) | Self::BoostingRegressor(_) => 1,
			Self::LinearClassifier(model) => model.n_classes(),
			Self::ForestClassifier(model) => model.n_classes,
			Self::BoostingClassifier(model) => model.n_classes(),
			Self::Auto(model) => model.best.n_outputs(),
		}
	}

	/// Compute the raw prediction of a regressor or the class probabilities of a classifier, with shape (n_examples, n_outputs).
	pub fn compute_outputs(&self, features: ArrayView2<f32>) -> Array2<f32> {
		match self {
			Self::LinearRegressor(model) => {
				let mut predictions = Array1::<f32>::zeros(features.nrows());
				model.predict(features, predictions.view_mut());
				predictions.insert_axis(Axis(1))
			}
			Self::LinearClassifier(model) => model.predict_proba(features),
			Self::ForestRegressor(model) => model.predict(features).insert_axis(Axis(1)),
			Self::ForestClassifier(model) => model.predict_proba(features),
			Self::BoostingRegressor(model) => model.predict(features).insert_axis(Axis(1)),
			Self::BoostingClassifier(model) => model.predict_proba(features),
			Self::Auto(model) => model.best.compute_outputs(features),
		}
	}

	pub fn predict(&self, features: ArrayView2<f32>) -> Predictions {
		let outputs = self.compute_outputs(features);
		match self.task() {
			Task::Regression => Predictions::Regression {
				values: outputs.column(0).to_owned(),
			},
			Task::Classification => Predictions::Classification {
				labels: argmax_rows(outputs.view()),
				probabilities: outputs,
			},
		}
	}
}

/// The index of the largest value in each row, with ties going to the lowest index.
fn argmax_rows(values: ArrayView2<f32>) -> Vec<usize> {
	values
		.rows()
		.into_iter()
		.map(|row| {
			row.iter()
				.enumerate()
				.fold((0, f32::NEG_INFINITY), |best, (index, value)| {
					if *value > best.1 {
						(index, *value)
					} else {
						best
					}
				})
				.0
		})
		.collect()
}

#[derive(Debug, Clone)]
pub struct Pipeline {
	pub preprocessor: PreprocessorOptions,
	pub estimator: Estimator,
}

impl Pipeline {
	/// Fit the preprocessor on `features`, transform them, and train the estimator on the result.
	pub fn fit(&self, features: &DataFrameView, target: &Target) -> Result<TrainedPipeline> {
		if features.nrows() != target.len() {
			return Err(Error::LengthMismatch {
				expected: target.len(),
				actual: features.nrows(),
			});
		}
		let preprocessor = Preprocessor::fit(&self.preprocessor, features)?;
		let matrix = preprocessor.transform(features)?;
		log::debug!(
			"fitting {} on {} rows and {} features",
			self.estimator.name(),
			matrix.nrows(),
			matrix.ncols()
		);
		let estimator = self.estimator.fit(matrix.view(), target)?;
		Ok(TrainedPipeline {
			preprocessor,
			estimator,
			classes: target.classes().map(|classes| classes.to_vec()),
		})
	}
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrainedPipeline {
	pub preprocessor: Preprocessor,
	pub estimator: TrainedEstimator,
	/// The class names for classification, in label order.
	pub classes: Option<Vec<String>>,
}

impl TrainedPipeline {
	pub fn task(&self) -> Task {
		self.estimator.task()
	}

	pub fn transform(&self, features: &DataFrameView) -> Result<Array2<f32>> {
		Ok(self.preprocessor.transform(features)?)
	}

	pub fn predict(&self, features: &DataFrameView) -> Result<Predictions> {
		let matrix = self.transform(features)?;
		Ok(self.estimator.predict(matrix.view()))
	}

	/// Predict and encode the predictions the same way as the training target, so they can be scored against it.
	pub fn predict_target(&self, features: &DataFrameView) -> Result<Target> {
		match self.predict(features)? {
			Predictions::Classification { labels, .. } => Ok(Target::Classification {
				classes: self.classes.clone().unwrap_or_default(),
				labels,
			}),
			Predictions::Regression { values } => Ok(Target::Regression {
				values: values.to_vec(),
			}),
		}
	}

	/// The class probabilities of a classifier. Returns `None` for regressors.
	pub fn predict_proba(&self, features: &DataFrameView) -> Result<Option<Array2<f32>>> {
		match self.predict(features)? {
			Predictions::Classification { probabilities, .. } => Ok(Some(probabilities)),
			Predictions::Regression { .. } => Ok(None),
		}
	}

	pub fn feature_names(&self) -> Vec<String> {
		self.preprocessor.feature_names()
	}

	pub fn feature_parents(&self) -> Vec<String> {
		self.preprocessor.feature_parents()
	}

	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		Ok(rmp_serde::to_vec_named(self)?)
	}

	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		Ok(rmp_serde::from_read_ref(bytes)?)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use kitsune_dataframe::{DataFrame, DataFrameColumn, NumberColumn};
	use kitsune_features::NumericTransform;

	fn dataframe() -> DataFrame {
		DataFrame::from_columns(vec![DataFrameColumn::Number(NumberColumn {
			name: "x".to_owned(),
			data: (0..20).map(|index| index as f32).collect(),
		})])
	}

	fn options() -> PreprocessorOptions {
		PreprocessorOptions {
			categorical: Vec::new(),
			numeric: vec!["x".to_owned()],
			boolean: Vec::new(),
			numeric_transform: NumericTransform::Standardize,
		}
	}

	#[test]
	fn test_fit_predict_and_serialize() {
		let dataframe = dataframe();
		let target = Target::Regression {
			values: (0..20).map(|index| 2.0 * index as f32 + 1.0).collect(),
		};
		let pipeline = Pipeline {
			preprocessor: options(),
			estimator: Estimator::LinearRegression(RegressorTrainOptions { alpha: 0.0 }),
		};
		let trained = pipeline.fit(&dataframe.view(), &target).unwrap();
		assert_eq!(trained.feature_names(), vec!["x"]);
		let predictions = trained.predict_target(&dataframe.view()).unwrap();
		match predictions {
			Target::Regression { values } => assert!((values[5] - 11.0).abs() < 1e-3),
			_ => panic!("expected regression predictions"),
		}
		let restored = TrainedPipeline::from_bytes(&trained.to_bytes().unwrap()).unwrap();
		assert_eq!(
			restored.predict(&dataframe.view()).unwrap(),
			trained.predict(&dataframe.view()).unwrap()
		);
	}

	#[test]
	fn test_task_mismatch() {
		let dataframe = dataframe();
		let target = Target::Regression {
			values: vec![0.0; 20],
		};
		let pipeline = Pipeline {
			preprocessor: options(),
			estimator: Estimator::LogisticRegression(ClassifierTrainOptions::default()),
		};
		assert!(matches!(
			pipeline.fit(&dataframe.view(), &target),
			Err(Error::Fit { .. })
		));
	}
}
