//! Rounding and quantile helpers used when producing serialized reports.

use num_traits::ToPrimitive;

/// Round `value` to `places` decimal places. Non-finite values are returned unchanged.
pub fn round_to(value: f64, places: i32) -> f64 {
	if !value.is_finite() {
		return value;
	}
	let factor = 10f64.powi(places);
	let rounded = (value * factor).round() / factor;
	// Avoid serializing negative zero.
	if rounded == 0.0 {
		0.0
	} else {
		rounded
	}
}

/// Compute the quantile `q` of the already sorted `values` with linear interpolation between the two closest ranks. Returns `None` if `values` is empty.
pub fn quantile_sorted(values: &[f64], q: f64) -> Option<f64> {
	if values.is_empty() {
		return None;
	}
	let q = q.max(0.0).min(1.0);
	let position = q * (values.len() - 1).to_f64()?;
	let lower = position.floor().to_usize()?;
	let upper = position.ceil().to_usize()?;
	let fraction = position - position.floor();
	Some(values[lower] + (values[upper] - values[lower]) * fraction)
}

/// Compute each of `quantiles` for the unsorted `values`. NaN values are ignored.
pub fn quantiles(values: &[f64], quantiles: &[f64]) -> Vec<Option<f64>> {
	let mut sorted: Vec<f64> = values.iter().copied().filter(|value| !value.is_nan()).collect();
	sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
	quantiles
		.iter()
		.map(|q| quantile_sorted(&sorted, *q))
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_round_to() {
		assert_eq!(round_to(0.123_456, 4), 0.1235);
		assert_eq!(round_to(-0.000_01, 4), 0.0);
		assert!(round_to(f64::NAN, 4).is_nan());
	}

	#[test]
	fn test_quantiles() {
		let values = [4.0, 1.0, 3.0, 2.0, 5.0];
		let q = quantiles(&values, &[0.0, 0.1, 0.5, 0.9, 1.0]);
		assert_eq!(q[0], Some(1.0));
		assert!((q[1].unwrap() - 1.4).abs() < 1e-12);
		assert_eq!(q[2], Some(3.0));
		assert!((q[3].unwrap() - 4.6).abs() < 1e-12);
		assert_eq!(q[4], Some(5.0));
		assert_eq!(quantiles(&[], &[0.5]), vec![None]);
	}
}
