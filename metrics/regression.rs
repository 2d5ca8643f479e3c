use super::{mean_variance::merge_mean_m2, StreamingMetric};

/// `RegressionMetrics` accumulates errors from `(prediction, label)` pairs.
#[derive(Debug, Clone, Default)]
pub struct RegressionMetrics {
	n: u64,
	label_mean: f64,
	label_m2: f64,
	absolute_error: f64,
	squared_error: f64,
	absolute_percentage_error: f64,
}

#[derive(Debug)]
pub struct RegressionMetricsOutput {
	pub mae: f64,
	pub mse: f64,
	pub rmse: f64,
	/// The coefficient of determination. When the labels have zero variance, this is 1 if the predictions are perfect and 0 otherwise.
	pub r2: f64,
	/// The mean absolute percentage error, as a fraction. Labels are floored at machine epsilon in magnitude so that zero labels do not divide by zero.
	pub mape: f64,
}

impl StreamingMetric<'_> for RegressionMetrics {
	type Input = (f32, f32);
	type Output = Option<RegressionMetricsOutput>;

	fn update(&mut self, (prediction, label): (f32, f32)) {
		let prediction = f64::from(prediction);
		let label = f64::from(label);
		let (mean, m2) = merge_mean_m2(self.n, self.label_mean, self.label_m2, 1, label, 0.0);
		self.n += 1;
		self.label_mean = mean;
		self.label_m2 = m2;
		let absolute_error = (prediction - label).abs();
		self.absolute_error += absolute_error;
		self.squared_error += absolute_error * absolute_error;
		self.absolute_percentage_error += absolute_error / label.abs().max(f64::EPSILON);
	}

	fn merge(&mut self, other: Self) {
		let (mean, m2) = merge_mean_m2(
			self.n,
			self.label_mean,
			self.label_m2,
			other.n,
			other.label_mean,
			other.label_m2,
		);
		self.n += other.n;
		self.label_mean = mean;
		self.label_m2 = m2;
		self.absolute_error += other.absolute_error;
		self.squared_error += other.squared_error;
		self.absolute_percentage_error += other.absolute_percentage_error;
	}

	fn finalize(self) -> Self::Output {
		if self.n == 0 {
			return None;
		}
		let n = self.n as f64;
		let mae = self.absolute_error / n;
		let mse = self.squared_error / n;
		let rmse = mse.sqrt();
		let r2 = if self.label_m2 > 0.0 {
			1.0 - self.squared_error / self.label_m2
		} else if self.squared_error == 0.0 {
			1.0
		} else {
			0.0
		};
		let mape = self.absolute_percentage_error / n;
		Some(RegressionMetricsOutput {
			mae,
			mse,
			rmse,
			r2,
			mape,
		})
	}
}

#[test]
fn test_regression_metrics() {
	let mut metrics = RegressionMetrics::default();
	let mut other = RegressionMetrics::default();
	metrics.update((2.5, 3.0));
	metrics.update((0.0, -0.5));
	other.update((2.0, 2.0));
	other.update((8.0, 7.0));
	metrics.merge(other);
	let output = metrics.finalize().unwrap();
	let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
	assert!(close(output.mae, 0.5));
	assert!(close(output.mse, 0.375));
	assert!(close(output.rmse, 0.375f64.sqrt()));
	assert!(close(output.r2, 0.948_608_137_044_967_9));
	assert!(close(output.mape, (0.5 / 3.0 + 1.0 + 0.0 + 1.0 / 7.0) / 4.0));
}

#[test]
fn test_constant_labels() {
	let mut perfect = RegressionMetrics::default();
	perfect.update((1.0, 1.0));
	perfect.update((1.0, 1.0));
	assert_eq!(perfect.finalize().unwrap().r2, 1.0);
	let mut imperfect = RegressionMetrics::default();
	imperfect.update((2.0, 1.0));
	imperfect.update((1.0, 1.0));
	assert_eq!(imperfect.finalize().unwrap().r2, 0.0);
	assert!(RegressionMetrics::default().finalize().is_none());
}
