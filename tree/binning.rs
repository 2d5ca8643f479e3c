use kitsune_util::numeric::quantile_sorted;
use ndarray::prelude::*;
use rayon::prelude::*;

/**
A `BinningInstruction` describes how to map a feature's values to bins. An example goes to the bin whose index is the number of thresholds strictly less than its value, so a split after bin `b` sends an example left exactly when its value is <= `thresholds[b]`.

If a feature has fewer unique values than the maximum number of bins, the thresholds are the midpoints between consecutive unique values. Otherwise, they are quantiles of the feature's values.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct BinningInstruction {
	pub thresholds: Vec<f32>,
}

impl BinningInstruction {
	pub fn n_bins(&self) -> usize {
		self.thresholds.len() + 1
	}

	pub fn bin(&self, value: f32) -> u8 {
		self.thresholds.partition_point(|threshold| *threshold < value) as u8
	}
}

/// The binned values of every feature in column major order, along with the instructions used to compute them.
#[derive(Debug, Clone)]
pub struct BinnedFeatures {
	pub columns: Vec<Vec<u8>>,
	pub instructions: Vec<BinningInstruction>,
}

impl BinnedFeatures {
	pub fn n_features(&self) -> usize {
		self.columns.len()
	}

	pub fn n_examples(&self) -> usize {
		self.columns.first().map(|column| column.len()).unwrap_or(0)
	}
}

/// Compute the binning instructions for each column of `features`. Non-finite values are ignored.
pub fn compute_binning_instructions(
	features: ArrayView2<f32>,
	max_bins: usize,
) -> Vec<BinningInstruction> {
	let max_bins = max_bins.max(2).min(256);
	features
		.axis_iter(Axis(1))
		.into_par_iter()
		.map(|column| {
			let mut values: Vec<f32> = column
				.iter()
				.copied()
				.filter(|value| value.is_finite())
				.collect();
			values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
			let mut unique_values = values.clone();
			unique_values.dedup();
			let thresholds = if unique_values.len() <= max_bins {
				unique_values
					.windows(2)
					.map(|pair| (pair[0] + pair[1]) / 2.0)
					.collect()
			} else {
				let values: Vec<f64> = values.iter().map(|value| f64::from(*value)).collect();
				let mut thresholds: Vec<f32> = (1..max_bins)
					.filter_map(|index| quantile_sorted(&values, index as f64 / max_bins as f64))
					.map(|threshold| threshold as f32)
					.collect();
				thresholds.dedup();
				thresholds
			};
			BinningInstruction { thresholds }
		})
		.collect()
}

/// Compute the binned features based on the binning instructions.
pub fn compute_binned_features(
	features: ArrayView2<f32>,
	instructions: Vec<BinningInstruction>,
) -> BinnedFeatures {
	let columns = features
		.axis_iter(Axis(1))
		.into_par_iter()
		.zip(instructions.par_iter())
		.map(|(column, instruction)| column.iter().map(|value| instruction.bin(*value)).collect())
		.collect();
	BinnedFeatures {
		columns,
		instructions,
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_few_unique_values() {
		let features = arr2(&[[1.0], [3.0], [3.0], [2.0]]);
		let instructions = compute_binning_instructions(features.view(), 255);
		assert_eq!(instructions[0].thresholds, vec![1.5, 2.5]);
		let binned = compute_binned_features(features.view(), instructions);
		assert_eq!(binned.columns[0], vec![0, 2, 2, 1]);
	}

	#[test]
	fn test_many_unique_values() {
		let features = Array2::from_shape_fn((1000, 1), |(index, _)| index as f32);
		let instructions = compute_binning_instructions(features.view(), 10);
		assert_eq!(instructions[0].n_bins(), 10);
		let binned = compute_binned_features(features.view(), instructions);
		assert_eq!(binned.columns[0][0], 0);
		assert_eq!(binned.columns[0][999], 9);
	}
}
