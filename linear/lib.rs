/*!
This crate is an implementation of linear machine learning models for regression and classification. There are two model types, [`Regressor`](struct.Regressor.html) and [`MulticlassClassifier`](struct.MulticlassClassifier.html).

`Regressor` is fit in closed form by solving the ridge normal equations, which makes it exact and deterministic. An `alpha` of zero gives ordinary least squares, with a tiny ridge added so collinear features such as a complete one hot encoding still have a solution.

`MulticlassClassifier` trains `n_classes` linear models whose outputs are combined with the `softmax` function, using mini batch gradient descent with L2 regularization. Batches are visited in order on a single thread so that training is reproducible. The change in training loss is monitored after each epoch, and training terminates when the loss has stabilized.
*/

#![allow(clippy::tabs_in_doc_comments)]

use thiserror::Error;

mod multiclass_classifier;
mod regressor;

pub use self::multiclass_classifier::{ClassifierTrainOptions, MulticlassClassifier};
pub use self::regressor::{Regressor, RegressorTrainOptions};

#[derive(Debug, Error)]
pub enum LinearError {
	#[error("cannot train on zero examples")]
	NoExamples,
	#[error("the labels must contain at least two classes, but found {0}")]
	TooFewClasses(usize),
	#[error("label {label} is out of range for {n_classes} classes")]
	LabelOutOfRange { label: usize, n_classes: usize },
	#[error("the normal equations could not be solved")]
	Singular,
}

/// The parameters in this struct control how to determine whether training should stop early after each epoch.
#[derive(Debug, Clone)]
pub struct EarlyStoppingOptions {
	/// If this many epochs pass by without a significant improvement in the training loss over the previous epoch, training will be stopped early.
	pub n_epochs_without_improvement_to_stop: usize,
	/// This is the minimum decrease in the loss for an epoch to be considered a significant improvement over the previous epoch.
	pub min_decrease_in_loss_for_significant_change: f32,
}

impl Default for EarlyStoppingOptions {
	fn default() -> Self {
		Self {
			n_epochs_without_improvement_to_stop: 5,
			min_decrease_in_loss_for_significant_change: 1e-4,
		}
	}
}

/**
The `EarlyStoppingMonitor` keeps track of the values of an early stopping metric for each epoch, and if enough epochs have passed without a significant improvement in the metric, the `update()` function will return `true` to indicate that training should be stopped.
*/
struct EarlyStoppingMonitor {
	threshold: f32,
	epochs: usize,
	n_epochs_without_observed_improvement: usize,
	previous_epoch_metric_value: Option<f32>,
}

impl EarlyStoppingMonitor {
	fn new(options: &EarlyStoppingOptions) -> Self {
		Self {
			threshold: options.min_decrease_in_loss_for_significant_change,
			epochs: options.n_epochs_without_improvement_to_stop,
			n_epochs_without_observed_improvement: 0,
			previous_epoch_metric_value: None,
		}
	}

	/// Update the monitor with the next epoch's metric value. Returns true if training should stop.
	fn update(&mut self, value: f32) -> bool {
		let should_stop = match self.previous_epoch_metric_value {
			Some(previous) if value > previous || (value - previous).abs() < self.threshold => {
				self.n_epochs_without_observed_improvement += 1;
				self.n_epochs_without_observed_improvement >= self.epochs
			}
			Some(_) => {
				self.n_epochs_without_observed_improvement = 0;
				false
			}
			None => false,
		};
		self.previous_epoch_metric_value = Some(value);
		should_stop
	}
}

#[test]
fn test_early_stopping_monitor() {
	let mut monitor = EarlyStoppingMonitor::new(&EarlyStoppingOptions {
		n_epochs_without_improvement_to_stop: 2,
		min_decrease_in_loss_for_significant_change: 0.01,
	});
	assert!(!monitor.update(1.0));
	assert!(!monitor.update(0.5));
	assert!(!monitor.update(0.499));
	assert!(!monitor.update(0.3));
	assert!(!monitor.update(0.35));
	assert!(monitor.update(0.3449));
}
