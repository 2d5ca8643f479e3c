use super::{
	argmax_rows, check_class_labels, compute_binned_features, compute_binning_instructions,
	train_tree, BinnedFeatures, MaxFeatures, Tree, TreeError, TreeOptions, DEFAULT_MAX_BINS,
};
use kitsune_util::progress_counter::ProgressCounter;
use ndarray::prelude::*;
use rand::{seq::index::sample, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

/// Hessians of the softmax loss are clamped to at least this value.
const MIN_HESSIAN: f32 = 1e-6;

/// These are the options passed to `BoostingRegressor::train` and `BoostingClassifier::train`.
#[derive(Debug, Clone)]
pub struct BoostingOptions {
	/// This is the number of rounds of training. Each round adds one tree.
	pub n_rounds: usize,
	/// The learning rate scales the leaf values to control the effect each tree has on the output.
	pub learning_rate: f32,
	/// The fraction of examples, drawn without replacement, that each tree is trained on.
	pub subsample: f64,
	/// The fraction of features, drawn without replacement, that each tree may split on.
	pub colsample: f64,
	pub tree_options: TreeOptions,
	pub max_bins: usize,
	pub seed: u64,
}

impl BoostingOptions {
	/// Depth limited trees with an L2 penalty of one and a minimum hessian sum of one per leaf.
	pub fn depthwise(
		n_rounds: usize,
		max_depth: usize,
		learning_rate: f32,
		subsample: f64,
		colsample: f64,
		seed: u64,
	) -> Self {
		Self {
			n_rounds,
			learning_rate,
			subsample,
			colsample,
			tree_options: TreeOptions {
				max_depth: Some(max_depth),
				min_examples_per_leaf: 1,
				min_sum_hessians_per_leaf: 1.0,
				l2_regularization: 1.0,
				..Default::default()
			},
			max_bins: DEFAULT_MAX_BINS,
			seed,
		}
	}

	/// Leaf limited trees with no depth limit, as histogram gradient boosting grows them.
	pub fn leafwise(
		n_rounds: usize,
		learning_rate: f32,
		max_leaf_nodes: usize,
		min_examples_per_leaf: usize,
		seed: u64,
	) -> Self {
		Self {
			n_rounds,
			learning_rate,
			subsample: 1.0,
			colsample: 1.0,
			tree_options: TreeOptions {
				max_leaf_nodes: Some(max_leaf_nodes),
				min_examples_per_leaf,
				min_sum_hessians_per_leaf: 1e-3,
				..Default::default()
			},
			max_bins: DEFAULT_MAX_BINS,
			seed,
		}
	}
}

/// A gradient boosted regressor minimizes squared error. Its prediction is the bias plus the sum of the outputs of its trees.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BoostingRegressor {
	pub n_features: usize,
	pub bias: f32,
	pub trees: Vec<Tree>,
}

/// A gradient boosted classifier minimizes softmax cross entropy. Each tree has one output per class, and the class probabilities are the softmax of the biases plus the sum of the outputs of the trees.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BoostingClassifier {
	pub n_features: usize,
	pub biases: Vec<f32>,
	pub trees: Vec<Tree>,
}

impl BoostingRegressor {
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &BoostingOptions,
	) -> Result<Self, TreeError> {
		if labels.is_empty() {
			return Err(TreeError::NoExamples);
		}
		// The bias is the mean of the labels, which is the best constant prediction.
		let bias = labels.mapv(f64::from).mean().unwrap_or(0.0) as f32;
		let mut predictions = Array2::<f32>::from_elem((labels.len(), 1), bias);
		let trees = boost(features, options, &mut predictions, |predictions, mut gradients, mut hessians| {
			for (prediction, label, gradient, hessian) in itertools::izip!(
				predictions.column(0),
				labels.iter(),
				gradients.column_mut(0),
				hessians.column_mut(0),
			) {
				*gradient = prediction - label;
				*hessian = 1.0;
			}
		});
		Ok(Self {
			n_features: features.ncols(),
			bias,
			trees,
		})
	}

	pub fn predict(&self, features: ArrayView2<f32>) -> Array1<f32> {
		features
			.rows()
			.into_iter()
			.map(|example| {
				self.bias + self.trees.iter().map(|tree| tree.predict(example)[0]).sum::<f32>()
			})
			.collect()
	}
}

impl BoostingClassifier {
	/// Train a gradient boosted classifier. `labels` are 0-indexed and less than `n_classes`.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &BoostingOptions,
	) -> Result<Self, TreeError> {
		check_class_labels(labels, n_classes)?;
		// The biases are the logs of each class's proportion in the training set, so the baseline prediction is the majority class.
		let mut counts = vec![0usize; n_classes];
		for label in labels.iter() {
			counts[*label] += 1;
		}
		let n_examples = labels.len() as f64;
		let biases: Vec<f32> = counts
			.iter()
			.map(|count| ((*count as f64).max(1e-3) / n_examples).ln() as f32)
			.collect();
		let mut logits = Array2::<f32>::zeros((labels.len(), n_classes));
		for mut row in logits.rows_mut() {
			row.assign(&ArrayView1::from(biases.as_slice()));
		}
		let trees = boost(features, options, &mut logits, |logits, mut gradients, mut hessians| {
			for (logits, label, mut gradients, mut hessians) in itertools::izip!(
				logits.rows(),
				labels.iter(),
				gradients.rows_mut(),
				hessians.rows_mut(),
			) {
				let probabilities = softmax(logits);
				for (class_index, probability) in probabilities.iter().enumerate() {
					let target = if class_index == *label { 1.0 } else { 0.0 };
					gradients[class_index] = probability - target;
					hessians[class_index] = (probability * (1.0 - probability)).max(MIN_HESSIAN);
				}
			}
		});
		Ok(Self {
			n_features: features.ncols(),
			biases,
			trees,
		})
	}

	pub fn n_classes(&self) -> usize {
		self.biases.len()
	}

	/// Compute the probability of each class, which has shape (n_examples, n_classes).
	pub fn predict_proba(&self, features: ArrayView2<f32>) -> Array2<f32> {
		let mut probabilities = Array2::<f32>::zeros((features.nrows(), self.n_classes()));
		for (example, mut probabilities) in features.rows().into_iter().zip(probabilities.rows_mut()) {
			let mut logits = Array1::from(self.biases.clone());
			for tree in self.trees.iter() {
				for (logit, value) in logits.iter_mut().zip(tree.predict(example)) {
					*logit += value;
				}
			}
			probabilities.assign(&softmax(logits.view()));
		}
		probabilities
	}

	pub fn predict(&self, features: ArrayView2<f32>) -> Vec<usize> {
		argmax_rows(self.predict_proba(features).view())
	}
}

/// The shared boosting loop. Before each round, `update_gradients_and_hessians` is called with the current predictions, which have shape (n_examples, n_outputs). The new tree's outputs, scaled by the learning rate, are then added to the predictions.
fn boost<F>(
	features: ArrayView2<f32>,
	options: &BoostingOptions,
	predictions: &mut Array2<f32>,
	update_gradients_and_hessians: F,
) -> Vec<Tree>
where
	F: Fn(ArrayView2<f32>, ArrayViewMut2<f32>, ArrayViewMut2<f32>),
{
	let n_examples = features.nrows();
	let n_features = features.ncols();
	let instructions = compute_binning_instructions(features, options.max_bins);
	let binned_features: BinnedFeatures = compute_binned_features(features, instructions);
	let mut gradients = Array2::<f32>::zeros(predictions.raw_dim());
	let mut hessians = Array2::<f32>::zeros(predictions.raw_dim());
	let n_examples_per_round = MaxFeatures::Fraction(options.subsample).n_features(n_examples);
	let n_features_per_tree = MaxFeatures::Fraction(options.colsample).n_features(n_features);
	let mut rng = Xoshiro256Plus::seed_from_u64(options.seed);
	let mut trees = Vec::with_capacity(options.n_rounds);
	let round_counter = ProgressCounter::new(options.n_rounds as u64);
	for _ in 0..options.n_rounds {
		round_counter.inc(1);
		update_gradients_and_hessians(predictions.view(), gradients.view_mut(), hessians.view_mut());
		let examples_index: Vec<usize> = if n_examples_per_round < n_examples {
			sample(&mut rng, n_examples, n_examples_per_round).into_vec()
		} else {
			(0..n_examples).collect()
		};
		let mut feature_subset: Vec<usize> = if n_features_per_tree < n_features {
			sample(&mut rng, n_features, n_features_per_tree).into_vec()
		} else {
			(0..n_features).collect()
		};
		feature_subset.sort_unstable();
		let mut tree = train_tree(
			&binned_features,
			gradients.view(),
			hessians.view(),
			examples_index,
			&feature_subset,
			&options.tree_options,
			&mut rng,
		);
		tree.scale(options.learning_rate);
		for (example, mut predictions) in features.rows().into_iter().zip(predictions.rows_mut()) {
			for (prediction, value) in predictions.iter_mut().zip(tree.predict(example)) {
				*prediction += value;
			}
		}
		trees.push(tree);
	}
	log::debug!(
		"trained {} of {} boosting rounds",
		round_counter.get(),
		round_counter.total()
	);
	trees
}

fn softmax(logits: ArrayView1<f32>) -> Array1<f32> {
	let max = logits.iter().fold(f32::NEG_INFINITY, |a, b| a.max(*b));
	let exps = logits.mapv(|logit| (logit - max).exp());
	let sum = exps.sum();
	exps / sum
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_regressor_fits_nonlinear_function() {
		let features = Array2::from_shape_fn((100, 1), |(row, _)| row as f32 / 10.0);
		let labels = features.column(0).mapv(|x| x * x);
		let options = BoostingOptions::depthwise(100, 3, 0.3, 1.0, 1.0, 0);
		let model = BoostingRegressor::train(features.view(), labels.view(), &options).unwrap();
		let predictions = model.predict(features.view());
		let mse = (&predictions - &labels).mapv(|error| error * error).mean().unwrap();
		let variance = labels.var(0.0);
		assert!(mse < 0.01 * variance);
	}

	#[test]
	fn test_classifier_is_deterministic() {
		let features = Array2::from_shape_fn((90, 2), |(row, column)| {
			if column == 0 {
				(row % 30) as f32
			} else {
				((row * 13) % 7) as f32
			}
		});
		let labels: Array1<usize> = (0..90).map(|row| (row % 30) / 10).collect();
		let options = BoostingOptions::depthwise(30, 3, 0.3, 0.8, 0.5, 3);
		let a = BoostingClassifier::train(features.view(), labels.view(), 3, &options).unwrap();
		let b = BoostingClassifier::train(features.view(), labels.view(), 3, &options).unwrap();
		let probabilities = a.predict_proba(features.view());
		assert_eq!(probabilities, b.predict_proba(features.view()));
		for row in probabilities.rows() {
			assert!((row.sum() - 1.0).abs() < 1e-5);
		}
		let options = BoostingOptions::leafwise(30, 0.3, 31, 5, 0);
		let model = BoostingClassifier::train(features.view(), labels.view(), 3, &options).unwrap();
		assert_eq!(model.predict(features.view()), labels.to_vec());
	}
}
