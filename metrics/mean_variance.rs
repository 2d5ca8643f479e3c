//! https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Parallel_algorithm

use super::Metric;

/// Combine two separately computed means and sums of squared deviations into a single mean and sum of squared deviations.
pub fn merge_mean_m2(
	n_a: u64,
	mean_a: f64,
	m2_a: f64,
	n_b: u64,
	mean_b: f64,
	m2_b: f64,
) -> (f64, f64) {
	let n_a = n_a as f64;
	let n_b = n_b as f64;
	if n_a + n_b == 0.0 {
		return (0.0, 0.0);
	}
	(
		(((n_a * mean_a) + (n_b * mean_b)) / (n_a + n_b)),
		m2_a + m2_b + (mean_b - mean_a) * (mean_b - mean_a) * (n_a * n_b / (n_a + n_b)),
	)
}

/// Convert a sum of squared deviations to the population variance.
pub fn m2_to_variance(m2: f64, n: u64) -> f64 {
	m2 / n as f64
}

/// The mean and variance of a slice of values, ignoring NaNs. `variance` is the population variance and `sample_variance` uses Bessel's correction.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanVariance {
	pub n: u64,
	pub mean: f64,
	pub variance: f64,
	pub sample_variance: f64,
}

impl<'a> Metric<'a> for MeanVariance {
	type Input = &'a [f64];
	type Output = Option<MeanVariance>;

	fn compute(input: Self::Input) -> Self::Output {
		let (n, mean, m2) = input
			.iter()
			.filter(|value| !value.is_nan())
			.fold((0u64, 0.0, 0.0), |(n, mean, m2), value| {
				let (mean, m2) = merge_mean_m2(n, mean, m2, 1, *value, 0.0);
				(n + 1, mean, m2)
			});
		if n == 0 {
			return None;
		}
		let sample_variance = if n > 1 {
			m2_to_variance(m2, n - 1)
		} else {
			f64::NAN
		};
		Some(MeanVariance {
			n,
			mean,
			variance: m2_to_variance(m2, n),
			sample_variance,
		})
	}
}

#[test]
fn test_mean_variance() {
	let output = MeanVariance::compute(&[2.0, 4.0, f64::NAN, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
	assert_eq!(output.n, 8);
	assert!((output.mean - 5.0).abs() < 1e-12);
	assert!((output.variance - 4.0).abs() < 1e-12);
	assert!((output.sample_variance - 32.0 / 7.0).abs() < 1e-12);
	assert!(MeanVariance::compute(&[]).is_none());
}
