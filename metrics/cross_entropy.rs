use super::{mean::Mean, StreamingMetric};
use ndarray::prelude::*;
use num_traits::clamp;

/// CrossEntropy is the loss function used in multiclass classification. [Learn more](https://en.wikipedia.org/wiki/Cross_entropy#Cross-entropy_loss_function_and_logistic_regression).
#[derive(Debug, Clone, Default)]
pub struct CrossEntropy(Mean);

/// The input to [CrossEntropy](struct.CrossEntropy.html). `label` is 0-indexed.
pub struct CrossEntropyInput<'a> {
	/// (n_classes)
	pub probabilities: ArrayView1<'a, f32>,
	pub label: usize,
}

impl<'a> StreamingMetric<'a> for CrossEntropy {
	type Input = CrossEntropyInput<'a>;
	type Output = Option<f64>;

	fn update(&mut self, value: CrossEntropyInput) {
		let probability = value.probabilities.get(value.label).copied().unwrap_or(0.0);
		let probability = clamp(f64::from(probability), f64::EPSILON, 1.0 - f64::EPSILON);
		self.0.update(-probability.ln())
	}

	fn merge(&mut self, other: Self) {
		self.0.merge(other.0)
	}

	fn finalize(self) -> Self::Output {
		self.0.finalize()
	}
}

#[test]
fn test_cross_entropy() {
	let mut metric = CrossEntropy::default();
	let probabilities = arr1(&[0.5f32, 0.25, 0.25]);
	metric.update(CrossEntropyInput {
		probabilities: probabilities.view(),
		label: 0,
	});
	metric.update(CrossEntropyInput {
		probabilities: probabilities.view(),
		label: 1,
	});
	let loss = metric.finalize().unwrap();
	assert!((loss - (2f64.ln() + 4f64.ln()) / 2.0).abs() < 1e-9);
}
