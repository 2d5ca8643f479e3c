use super::{Attributable, AttributionBackend};
use ndarray::prelude::*;
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;

/**
Sampling SHAP values by walking random feature permutations.

Each walk starts from the reference rows and switches the features to the explained row's values one at a time in permutation order. The attribution of a feature is the change in the mean output over the reference rows when it is switched. Every permutation is walked forward and then reversed, and the attributions are averaged over all walks. For a model that is additive in its features every walk gives the same result, so the attributions are exact.
*/
#[derive(Debug, Clone)]
pub struct PermutationShap {
	/// The number of permutations per row. Each is walked twice.
	pub n_permutations: usize,
	pub seed: u64,
}

impl AttributionBackend for PermutationShap {
	fn attribute(
		&self,
		model: &dyn Attributable,
		reference: ArrayView2<f32>,
		query: ArrayView2<f32>,
	) -> Array3<f32> {
		let n_features = query.ncols();
		let n_outputs = model.n_outputs();
		let rows: Vec<Array2<f32>> = (0..query.nrows())
			.into_par_iter()
			.map(|row_index| {
				let seed = self.seed.wrapping_add(row_index as u64);
				self.attribute_row(model, reference, query.row(row_index), seed)
			})
			.collect();
		let mut attributions = Array3::zeros((query.nrows(), n_features, n_outputs));
		for (row_index, row) in rows.iter().enumerate() {
			attributions.index_axis_mut(Axis(0), row_index).assign(row);
		}
		attributions
	}
}

impl PermutationShap {
	fn attribute_row(
		&self,
		model: &dyn Attributable,
		reference: ArrayView2<f32>,
		row: ArrayView1<f32>,
		seed: u64,
	) -> Array2<f32> {
		let n_features = row.len();
		let n_outputs = model.n_outputs();
		let n_reference = reference.nrows();
		let n_permutations = self.n_permutations.max(1);
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		let mut totals = Array2::<f64>::zeros((n_features, n_outputs));
		let mut permutation: Vec<usize> = (0..n_features).collect();
		// The masked rows of one walk, in blocks of n_reference rows. Block i has the first i features of the walk switched.
		let mut masked = Array2::<f32>::zeros(((n_features + 1) * n_reference, n_features));
		for _ in 0..n_permutations {
			permutation.shuffle(&mut rng);
			let reversed: Vec<usize> = permutation.iter().rev().copied().collect();
			for walk in [&permutation, &reversed].iter() {
				let mut current = reference.to_owned();
				masked.slice_mut(s![0..n_reference, ..]).assign(&current);
				for (step, feature) in walk.iter().enumerate() {
					current.column_mut(*feature).fill(row[*feature]);
					let start = (step + 1) * n_reference;
					masked
						.slice_mut(s![start..start + n_reference, ..])
						.assign(&current);
				}
				let outputs = model.compute_outputs(masked.view());
				let block_means: Vec<Array1<f64>> = (0..=n_features)
					.map(|block| {
						outputs
							.slice(s![block * n_reference..(block + 1) * n_reference, ..])
							.mapv(|value| value as f64)
							.mean_axis(Axis(0))
							.unwrap_or_else(|| Array1::zeros(n_outputs))
					})
					.collect();
				for (step, feature) in walk.iter().enumerate() {
					let mut total = totals.row_mut(*feature);
					total += &(&block_means[step + 1] - &block_means[step]);
				}
			}
		}
		totals.mapv(|value| (value / (2 * n_permutations) as f64) as f32)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	struct Linear {
		weights: Vec<f32>,
		bias: f32,
	}

	impl Attributable for Linear {
		fn n_features(&self) -> usize {
			self.weights.len()
		}

		fn n_outputs(&self) -> usize {
			1
		}

		fn compute_outputs(&self, features: ArrayView2<f32>) -> Array2<f32> {
			let weights = ArrayView1::from(self.weights.as_slice());
			(features.dot(&weights) + self.bias).insert_axis(Axis(1))
		}
	}

	#[test]
	fn test_exact_for_linear_model() {
		let model = Linear {
			weights: vec![2.0, -1.0, 0.5],
			bias: 3.0,
		};
		let reference = Array2::from_shape_fn((6, 3), |(row, column)| (row * (column + 1)) as f32);
		let query = arr2(&[[1.0, 2.0, 3.0], [10.0, -4.0, 0.0]]);
		let backend = PermutationShap {
			n_permutations: 3,
			seed: 7,
		};
		let attributions = backend.attribute(&model, reference.view(), query.view());
		assert_eq!(attributions.shape(), &[2, 3, 1]);
		let reference_means = reference.mean_axis(Axis(0)).unwrap();
		for row in 0..2 {
			for feature in 0..3 {
				let expected = model.weights[feature] * (query[[row, feature]] - reference_means[feature]);
				assert!((attributions[[row, feature, 0]] - expected).abs() < 1e-4);
			}
		}
	}

	#[test]
	fn test_attributions_sum_to_output_difference() {
		struct Product;
		impl Attributable for Product {
			fn n_features(&self) -> usize {
				2
			}
			fn n_outputs(&self) -> usize {
				2
			}
			fn compute_outputs(&self, features: ArrayView2<f32>) -> Array2<f32> {
				Array2::from_shape_fn((features.nrows(), 2), |(row, output)| {
					let value = features[[row, 0]] * features[[row, 1]];
					if output == 0 {
						value
					} else {
						-value
					}
				})
			}
		}
		let reference = arr2(&[[0.0, 1.0], [2.0, 3.0]]);
		let query = arr2(&[[4.0, 5.0]]);
		let backend = PermutationShap {
			n_permutations: 2,
			seed: 0,
		};
		let attributions = backend.attribute(&Product, reference.view(), query.view());
		let reference_mean_output = (0.0 * 1.0 + 2.0 * 3.0) / 2.0;
		let total: f32 = attributions.index_axis(Axis(2), 0).sum();
		assert!((total - (20.0 - reference_mean_output)).abs() < 1e-4);
		let total: f32 = attributions.index_axis(Axis(2), 1).sum();
		assert!((total + (20.0 - reference_mean_output)).abs() < 1e-4);
	}
}
