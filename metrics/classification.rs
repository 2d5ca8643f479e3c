use super::StreamingMetric;
use ndarray::prelude::*;

/// `ClassificationMetrics` accumulates a confusion matrix from `(prediction, label)` pairs, where both are 0-indexed classes less than `n_classes`.
#[derive(Debug, Clone)]
pub struct ClassificationMetrics {
	/// The shape of the confusion matrix is (n_classes x n_classes).
	confusion_matrix: Array2<u64>,
}

#[derive(Debug)]
pub struct ClassificationMetricsOutput {
	pub class_metrics: Vec<ClassMetrics>,
	pub accuracy: f64,
	/// The unweighted mean of the per class precisions, over the classes that appear among the labels or the predictions.
	pub precision_macro: f64,
	pub recall_macro: f64,
	pub f1_macro: f64,
}

/// Metrics for a single class. A ratio whose denominator is zero is reported as zero.
#[derive(Debug)]
pub struct ClassMetrics {
	pub true_positives: u64,
	pub false_positives: u64,
	pub true_negatives: u64,
	pub false_negatives: u64,
	pub precision: f64,
	pub recall: f64,
	pub f1_score: f64,
}

impl ClassificationMetrics {
	pub fn new(n_classes: usize) -> Self {
		//                                           prediction    label
		//                                               |           |
		//                                               v           v
		let confusion_matrix = <Array2<u64>>::zeros((n_classes, n_classes));
		Self { confusion_matrix }
	}
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
	if denominator == 0 {
		0.0
	} else {
		numerator as f64 / denominator as f64
	}
}

impl StreamingMetric<'_> for ClassificationMetrics {
	type Input = (usize, usize);
	type Output = ClassificationMetricsOutput;

	fn update(&mut self, (prediction, label): (usize, usize)) {
		self.confusion_matrix[(prediction, label)] += 1;
	}

	fn merge(&mut self, other: Self) {
		self.confusion_matrix += &other.confusion_matrix;
	}

	fn finalize(self) -> ClassificationMetricsOutput {
		let n_classes = self.confusion_matrix.nrows();
		let n_examples = self.confusion_matrix.sum();
		let confusion_matrix = self.confusion_matrix;
		let class_metrics: Vec<ClassMetrics> = (0..n_classes)
			.map(|class_index| {
				let true_positives = confusion_matrix[(class_index, class_index)];
				let false_positives = confusion_matrix.row(class_index).sum() - true_positives;
				let false_negatives = confusion_matrix.column(class_index).sum() - true_positives;
				let true_negatives =
					n_examples - true_positives - false_positives - false_negatives;
				let precision = ratio(true_positives, true_positives + false_positives);
				let recall = ratio(true_positives, true_positives + false_negatives);
				let f1_score = if precision + recall > 0.0 {
					2.0 * (precision * recall) / (precision + recall)
				} else {
					0.0
				};
				ClassMetrics {
					true_positives,
					false_positives,
					true_negatives,
					false_negatives,
					precision,
					recall,
					f1_score,
				}
			})
			.collect();
		let present: Vec<&ClassMetrics> = class_metrics
			.iter()
			.filter(|class| class.true_positives + class.false_positives + class.false_negatives > 0)
			.collect();
		let macro_average = |value: &dyn Fn(&ClassMetrics) -> f64| {
			if present.is_empty() {
				0.0
			} else {
				present.iter().map(|class| value(*class)).sum::<f64>() / present.len() as f64
			}
		};
		let precision_macro = macro_average(&|class| class.precision);
		let recall_macro = macro_average(&|class| class.recall);
		let f1_macro = macro_average(&|class| class.f1_score);
		let n_correct: u64 = confusion_matrix.diag().sum();
		let accuracy = ratio(n_correct, n_examples);
		ClassificationMetricsOutput {
			class_metrics,
			accuracy,
			precision_macro,
			recall_macro,
			f1_macro,
		}
	}
}

#[cfg(test)]
fn compute(n_classes: usize, labels: &[usize], predictions: &[usize]) -> ClassificationMetricsOutput {
	let mut metrics = ClassificationMetrics::new(n_classes);
	for (label, prediction) in labels.iter().zip(predictions.iter()) {
		metrics.update((*prediction, *label));
	}
	metrics.finalize()
}

#[test]
fn test_binary() {
	let labels = [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
	let predictions = [0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 0, 0];
	let metrics = compute(2, &labels, &predictions);
	let class_0 = &metrics.class_metrics[0];
	assert_eq!(
		(
			class_0.true_positives,
			class_0.false_positives,
			class_0.true_negatives,
			class_0.false_negatives
		),
		(5, 2, 3, 3)
	);
	let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
	assert!(close(class_0.precision, 5.0 / 7.0));
	assert!(close(class_0.recall, 0.625));
	assert!(close(class_0.f1_score, 2.0 / 3.0));
	assert!(close(metrics.class_metrics[1].f1_score, 6.0 / 11.0));
	assert!(close(metrics.accuracy, 8.0 / 13.0));
	assert!(close(metrics.precision_macro, (5.0 / 7.0 + 0.5) / 2.0));
	assert!(close(metrics.recall_macro, 0.6125));
	assert!(close(metrics.f1_macro, (2.0 / 3.0 + 6.0 / 11.0) / 2.0));
}

#[test]
fn test_absent_classes_and_zero_division() {
	// Class 2 never appears and is left out of the macro average. Class 1 is never predicted, so its precision is zero.
	let metrics = compute(3, &[0, 0, 1, 1], &[0, 0, 0, 0]);
	assert_eq!(metrics.accuracy, 0.5);
	assert_eq!(metrics.class_metrics[1].precision, 0.0);
	assert_eq!(metrics.class_metrics[1].f1_score, 0.0);
	assert!((metrics.precision_macro - 0.25).abs() < 1e-12);
	assert!((metrics.recall_macro - 0.5).abs() < 1e-12);
	assert!((metrics.f1_macro - (2.0 / 3.0) / 2.0).abs() < 1e-12);
}
