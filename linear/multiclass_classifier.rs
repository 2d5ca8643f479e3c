use super::{EarlyStoppingMonitor, EarlyStoppingOptions, LinearError};
use itertools::izip;
use kitsune_metrics::{CrossEntropy, CrossEntropyInput, StreamingMetric};
use kitsune_util::progress_counter::ProgressCounter;
use ndarray::prelude::*;
use ndarray::Zip;

/// These are the options passed to `MulticlassClassifier::train`.
#[derive(Debug, Clone)]
pub struct ClassifierTrainOptions {
	/// The inverse of the regularization strength. The L2 penalty applied to each update is `1 / (c * n_examples)`.
	pub c: f32,
	pub learning_rate: f32,
	pub max_epochs: usize,
	pub n_examples_per_batch: usize,
	/// If the value is `Some`, early stopping on the training loss will be enabled.
	pub early_stopping_options: Option<EarlyStoppingOptions>,
}

impl Default for ClassifierTrainOptions {
	fn default() -> Self {
		Self {
			c: 1.0,
			learning_rate: 0.1,
			max_epochs: 100,
			n_examples_per_batch: 128,
			early_stopping_options: Some(EarlyStoppingOptions::default()),
		}
	}
}

/// This struct describes a linear multiclass classifier model. You can train one by calling `MulticlassClassifier::train`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MulticlassClassifier {
	/// (n_classes)
	pub biases: Array1<f32>,
	/// (n_features, n_classes)
	pub weights: Array2<f32>,
	/// These are the training loss values for each epoch.
	pub losses: Vec<f32>,
}

impl MulticlassClassifier {
	/// Train a linear multiclass classifier. `labels` are 0-indexed and less than `n_classes`.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &ClassifierTrainOptions,
	) -> Result<Self, LinearError> {
		let n_examples = features.nrows();
		if n_examples == 0 {
			return Err(LinearError::NoExamples);
		}
		let mut seen = vec![false; n_classes];
		for label in labels.iter() {
			match seen.get_mut(*label) {
				Some(seen) => *seen = true,
				None => {
					return Err(LinearError::LabelOutOfRange {
						label: *label,
						n_classes,
					})
				}
			}
		}
		let n_seen = seen.iter().filter(|seen| **seen).count();
		if n_seen < 2 {
			return Err(LinearError::TooFewClasses(n_seen));
		}
		let l2_regularization = 1.0 / (options.c * n_examples as f32);
		let mut model = Self {
			biases: Array1::<f32>::zeros(n_classes),
			weights: Array2::<f32>::zeros((features.ncols(), n_classes)),
			losses: Vec::new(),
		};
		let mut early_stopping_monitor = options
			.early_stopping_options
			.as_ref()
			.map(EarlyStoppingMonitor::new);
		let n_examples_per_batch = options.n_examples_per_batch.max(1);
		let epoch_counter = ProgressCounter::new(options.max_epochs as u64);
		for _ in 0..options.max_epochs {
			epoch_counter.inc(1);
			for (features, labels) in izip!(
				features.axis_chunks_iter(Axis(0), n_examples_per_batch),
				labels.axis_chunks_iter(Axis(0), n_examples_per_batch),
			) {
				model.train_batch(features, labels, options.learning_rate, l2_regularization);
			}
			let loss = model.compute_loss(features, labels);
			model.losses.push(loss);
			if let Some(early_stopping_monitor) = early_stopping_monitor.as_mut() {
				if early_stopping_monitor.update(loss) {
					break;
				}
			}
		}
		log::debug!(
			"trained a linear classifier for {} of {} epochs, final loss {:?}",
			epoch_counter.get(),
			epoch_counter.total(),
			model.losses.last(),
		);
		Ok(model)
	}

	fn train_batch(
		&mut self,
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		learning_rate: f32,
		l2_regularization: f32,
	) {
		let n_classes = self.biases.len();
		let mut logits = features.dot(&self.weights) + &self.biases;
		softmax(logits.view_mut());
		// The gradient of the loss with respect to the logits is the probabilities minus the one hot labels.
		let mut py = logits;
		for (mut row, label) in py.rows_mut().into_iter().zip(labels.iter()) {
			row[*label] -= 1.0;
		}
		for class_index in 0..n_classes {
			let weight_gradients = (&features * &py.column(class_index).insert_axis(Axis(1)))
				.mean_axis(Axis(0))
				.unwrap_or_else(|| Array1::zeros(features.ncols()));
			Zip::from(self.weights.column_mut(class_index))
				.and(&weight_gradients)
				.for_each(|weight, weight_gradient| {
					*weight -= learning_rate * (weight_gradient + l2_regularization * *weight)
				});
			let bias_gradient = py.column(class_index).mean().unwrap_or(0.0);
			self.biases[class_index] -= learning_rate * bias_gradient;
		}
	}

	fn compute_loss(&self, features: ArrayView2<f32>, labels: ArrayView1<usize>) -> f32 {
		let probabilities = self.predict_proba(features);
		let mut metric = CrossEntropy::default();
		for (probabilities, label) in probabilities.rows().into_iter().zip(labels.iter()) {
			metric.update(CrossEntropyInput {
				probabilities,
				label: *label,
			});
		}
		metric.finalize().unwrap_or(0.0) as f32
	}

	pub fn n_features(&self) -> usize {
		self.weights.nrows()
	}

	pub fn n_classes(&self) -> usize {
		self.biases.len()
	}

	/// Compute the probability of each class, which has shape (n_examples, n_classes).
	pub fn predict_proba(&self, features: ArrayView2<f32>) -> Array2<f32> {
		let mut logits = features.dot(&self.weights) + &self.biases;
		softmax(logits.view_mut());
		logits
	}

	/// Compute the index of the most probable class for each example. Ties go to the lowest index.
	pub fn predict(&self, features: ArrayView2<f32>) -> Vec<usize> {
		argmax_rows(self.predict_proba(features).view())
	}
}

fn softmax(mut logits: ArrayViewMut2<f32>) {
	for mut logits in logits.rows_mut() {
		let max = logits.iter().fold(f32::NEG_INFINITY, |a, b| a.max(*b));
		logits.mapv_inplace(|logit| (logit - max).exp());
		let sum = logits.sum();
		logits.mapv_inplace(|value| value / sum);
	}
}

/// The index of the largest value in each row, with ties going to the lowest index.
pub fn argmax_rows(values: ArrayView2<f32>) -> Vec<usize> {
	values
		.rows()
		.into_iter()
		.map(|row| {
			let mut best = 0;
			for (index, value) in row.iter().enumerate() {
				if *value > row[best] {
					best = index;
				}
			}
			best
		})
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_separable() {
		let features = arr2(&[
			[-2.0, 0.5],
			[-1.5, -0.5],
			[-1.0, 0.0],
			[1.0, 0.2],
			[1.5, -0.3],
			[2.0, 0.1],
			[0.0, 3.0],
			[0.3, 2.5],
			[-0.2, 2.0],
		]);
		let labels = arr1(&[0, 0, 0, 1, 1, 1, 2, 2, 2]);
		let model = MulticlassClassifier::train(
			features.view(),
			labels.view(),
			3,
			&ClassifierTrainOptions {
				max_epochs: 500,
				early_stopping_options: None,
				..Default::default()
			},
		)
		.unwrap();
		assert_eq!(model.predict(features.view()), labels.to_vec());
		let probabilities = model.predict_proba(features.view());
		for row in probabilities.rows() {
			assert!((row.sum() - 1.0).abs() < 1e-5);
		}
		// The loss decreases from the first epoch to the last.
		assert!(model.losses.last().unwrap() < model.losses.first().unwrap());
	}

	#[test]
	fn test_single_class() {
		let features = arr2(&[[1.0], [2.0]]);
		let labels = arr1(&[1, 1]);
		let result = MulticlassClassifier::train(
			features.view(),
			labels.view(),
			2,
			&ClassifierTrainOptions::default(),
		);
		assert!(matches!(result, Err(LinearError::TooFewClasses(1))));
	}
}
