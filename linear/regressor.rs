use super::LinearError;
use itertools::izip;
use ndarray::prelude::*;

/// The ridge added to the diagonal, relative to its mean, when `alpha` is zero.
const MIN_RIDGE: f64 = 1e-8;

/// These are the options passed to `Regressor::train`.
#[derive(Debug, Clone)]
pub struct RegressorTrainOptions {
	/// The L2 penalty on the weights. The bias is never penalized.
	pub alpha: f64,
}

impl Default for RegressorTrainOptions {
	fn default() -> Self {
		Self { alpha: 1.0 }
	}
}

/// This struct describes a linear regressor model. You can train one by calling `Regressor::train`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Regressor {
	pub bias: f32,
	pub weights: Array1<f32>,
	/// These are the mean values of each feature in the training set.
	pub means: Vec<f32>,
}

impl Regressor {
	/// Train a linear regressor by solving `(XᵀX + αI) w = Xᵀy` on centered features and labels.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &RegressorTrainOptions,
	) -> Result<Self, LinearError> {
		let n_examples = features.nrows();
		let n_features = features.ncols();
		if n_examples == 0 {
			return Err(LinearError::NoExamples);
		}
		let features = features.mapv(f64::from);
		let labels = labels.mapv(f64::from);
		let means = features
			.mean_axis(Axis(0))
			.unwrap_or_else(|| Array1::zeros(n_features));
		let label_mean = labels.mean().unwrap_or(0.0);
		let centered_features = &features - &means;
		let centered_labels = &labels - label_mean;
		let mut gram = centered_features.t().dot(&centered_features);
		let rhs = centered_features.t().dot(&centered_labels);
		let ridge = if options.alpha > 0.0 {
			options.alpha
		} else {
			let mean_diagonal = gram.diag().mean().unwrap_or(0.0);
			MIN_RIDGE * mean_diagonal.max(1.0)
		};
		for index in 0..n_features {
			gram[(index, index)] += ridge;
		}
		let weights = if n_features == 0 {
			Array1::zeros(0)
		} else {
			solve_cholesky(gram, rhs).ok_or(LinearError::Singular)?
		};
		let bias = label_mean - weights.dot(&means);
		Ok(Self {
			bias: bias as f32,
			weights: weights.mapv(|weight| weight as f32),
			means: means.iter().map(|mean| *mean as f32).collect(),
		})
	}

	pub fn n_features(&self) -> usize {
		self.weights.len()
	}

	/// Write predictions into `predictions` for the input `features`.
	pub fn predict(&self, features: ArrayView2<f32>, mut predictions: ArrayViewMut1<f32>) {
		predictions.fill(self.bias);
		ndarray::linalg::general_mat_vec_mul(1.0, &features, &self.weights, 1.0, &mut predictions);
	}
}

/// Solve `a x = b` for a symmetric positive definite `a`. Returns `None` if `a` is not positive definite.
fn solve_cholesky(a: Array2<f64>, b: Array1<f64>) -> Option<Array1<f64>> {
	let n = a.nrows();
	let mut l = Array2::<f64>::zeros((n, n));
	for i in 0..n {
		for j in 0..=i {
			let sum: f64 = izip!(l.row(i).iter(), l.row(j).iter())
				.take(j)
				.map(|(a, b)| a * b)
				.sum();
			if i == j {
				let value = a[(i, i)] - sum;
				if value <= 0.0 || !value.is_finite() {
					return None;
				}
				l[(i, j)] = value.sqrt();
			} else {
				l[(i, j)] = (a[(i, j)] - sum) / l[(j, j)];
			}
		}
	}
	// Forward substitution for `l y = b`, then back substitution for `lᵀ x = y`.
	let mut y = Array1::<f64>::zeros(n);
	for i in 0..n {
		let sum: f64 = (0..i).map(|k| l[(i, k)] * y[k]).sum();
		y[i] = (b[i] - sum) / l[(i, i)];
	}
	let mut x = Array1::<f64>::zeros(n);
	for i in (0..n).rev() {
		let sum: f64 = (i + 1..n).map(|k| l[(k, i)] * x[k]).sum();
		x[i] = (y[i] - sum) / l[(i, i)];
	}
	Some(x)
}

#[cfg(test)]
mod test {
	use super::*;

	fn data() -> (Array2<f32>, Array1<f32>) {
		let features = arr2(&[
			[1.0, 2.0],
			[2.0, 0.0],
			[3.0, 5.0],
			[4.0, 1.0],
			[5.0, 3.0],
			[6.0, 4.0],
		]);
		let labels = features
			.rows()
			.into_iter()
			.map(|row| 2.0 * row[0] - 3.0 * row[1] + 1.0)
			.collect();
		(features, labels)
	}

	#[test]
	fn test_least_squares_is_exact() {
		let (features, labels) = data();
		let model = Regressor::train(
			features.view(),
			labels.view(),
			&RegressorTrainOptions { alpha: 0.0 },
		)
		.unwrap();
		assert!((model.weights[0] - 2.0).abs() < 1e-3);
		assert!((model.weights[1] + 3.0).abs() < 1e-3);
		assert!((model.bias - 1.0).abs() < 1e-3);
		let mut predictions = Array1::zeros(features.nrows());
		model.predict(features.view(), predictions.view_mut());
		for (prediction, label) in predictions.iter().zip(labels.iter()) {
			assert!((prediction - label).abs() < 1e-3);
		}
	}

	#[test]
	fn test_ridge_shrinks_weights() {
		let (features, labels) = data();
		let model = Regressor::train(
			features.view(),
			labels.view(),
			&RegressorTrainOptions { alpha: 100.0 },
		)
		.unwrap();
		assert!(model.weights[0].abs() < 2.0);
		assert!(model.weights[1].abs() < 3.0);
	}

	#[test]
	fn test_collinear_features() {
		// The two columns always sum to one, like a complete one hot encoding.
		let features = arr2(&[[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]]);
		let labels = arr1(&[3.0, 1.0, 3.0, 1.0]);
		let model = Regressor::train(
			features.view(),
			labels.view(),
			&RegressorTrainOptions { alpha: 0.0 },
		)
		.unwrap();
		let mut predictions = Array1::zeros(4);
		model.predict(features.view(), predictions.view_mut());
		assert!((predictions[0] - 3.0).abs() < 1e-3);
		assert!((predictions[1] - 1.0).abs() < 1e-3);
	}
}
