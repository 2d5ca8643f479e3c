use super::{BinnedFeatures, BranchNode, LeafNode, Node, SplitStrategy, Tree, TreeOptions};
use ndarray::prelude::*;
use rand::{seq::index::sample, Rng};
use rand_xoshiro::Xoshiro256Plus;
use std::{cmp::Ordering, collections::BinaryHeap};

/// Splits must improve the objective by more than this to be made, so that nodes whose gradients are all equal are never split because of rounding.
const MIN_GAIN_TO_SPLIT: f64 = 1e-9;

/// The sums of gradients and hessians for each output over the examples in a node.
#[derive(Clone, Debug)]
struct NodeStats {
	n_examples: usize,
	sum_gradients: Vec<f64>,
	sum_hessians: Vec<f64>,
}

impl NodeStats {
	fn zeros(n_outputs: usize) -> Self {
		Self {
			n_examples: 0,
			sum_gradients: vec![0.0; n_outputs],
			sum_hessians: vec![0.0; n_outputs],
		}
	}

	fn compute(gradients: ArrayView2<f32>, hessians: ArrayView2<f32>, examples: &[usize]) -> Self {
		let mut stats = Self::zeros(gradients.ncols());
		for example in examples.iter() {
			stats.add(gradients.row(*example), hessians.row(*example));
		}
		stats
	}

	fn add(&mut self, gradients: ArrayView1<f32>, hessians: ArrayView1<f32>) {
		self.n_examples += 1;
		for (sum, gradient) in self.sum_gradients.iter_mut().zip(gradients.iter()) {
			*sum += f64::from(*gradient);
		}
		for (sum, hessian) in self.sum_hessians.iter_mut().zip(hessians.iter()) {
			*sum += f64::from(*hessian);
		}
	}

	fn merge(&mut self, other: &Self) {
		self.n_examples += other.n_examples;
		for (a, b) in self.sum_gradients.iter_mut().zip(other.sum_gradients.iter()) {
			*a += b;
		}
		for (a, b) in self.sum_hessians.iter_mut().zip(other.sum_hessians.iter()) {
			*a += b;
		}
	}

	fn subtract(&self, other: &Self) -> Self {
		Self {
			n_examples: self.n_examples - other.n_examples,
			sum_gradients: self
				.sum_gradients
				.iter()
				.zip(other.sum_gradients.iter())
				.map(|(a, b)| a - b)
				.collect(),
			sum_hessians: self
				.sum_hessians
				.iter()
				.zip(other.sum_hessians.iter())
				.map(|(a, b)| a - b)
				.collect(),
		}
	}

	fn total_hessian(&self) -> f64 {
		self.sum_hessians.iter().sum()
	}

	/// The negative loss is used to compute the gain of a given split.
	fn negative_loss(&self, l2_regularization: f64) -> f64 {
		self.sum_gradients
			.iter()
			.zip(self.sum_hessians.iter())
			.map(|(g, h)| {
				let denominator = h + l2_regularization;
				if denominator > 0.0 {
					g * g / denominator
				} else {
					0.0
				}
			})
			.sum()
	}

	fn leaf_values(&self, l2_regularization: f64) -> Vec<f32> {
		self.sum_gradients
			.iter()
			.zip(self.sum_hessians.iter())
			.map(|(g, h)| {
				let denominator = h + l2_regularization;
				if denominator > 0.0 {
					(-g / denominator) as f32
				} else {
					0.0
				}
			})
			.collect()
	}
}

#[derive(Clone, Debug)]
struct Split {
	feature_index: usize,
	bin: u8,
	gain: f64,
	left: NodeStats,
	right: NodeStats,
}

/// A node that may be split, ordered in the priority queue by the gain of its best split.
struct QueueItem {
	node_index: usize,
	depth: usize,
	examples: Vec<usize>,
	split: Split,
}

impl PartialEq for QueueItem {
	fn eq(&self, other: &Self) -> bool {
		self.split.gain == other.split.gain
	}
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for QueueItem {
	fn cmp(&self, other: &Self) -> Ordering {
		self.split
			.gain
			.partial_cmp(&other.split.gain)
			.unwrap_or(Ordering::Equal)
	}
}

/**
Train a single tree best first. `gradients` and `hessians` have shape (n_examples, n_outputs), and the leaves of the resulting tree have `n_outputs` values, each `-sum_gradients / (sum_hessians + l2_regularization)`.

`examples_index` lists the examples to train on and may contain repeats, which is how bootstrap samples are passed in. Only the features in `feature_subset` are considered for splits.
*/
pub fn train_tree(
	binned_features: &BinnedFeatures,
	gradients: ArrayView2<f32>,
	hessians: ArrayView2<f32>,
	examples_index: Vec<usize>,
	feature_subset: &[usize],
	options: &TreeOptions,
	rng: &mut Xoshiro256Plus,
) -> Tree {
	let l2_regularization = f64::from(options.l2_regularization);
	let n_total = examples_index.len().max(1) as f32;
	let mut nodes = Vec::new();
	let mut queue: BinaryHeap<QueueItem> = BinaryHeap::new();

	let root_stats = NodeStats::compute(gradients, hessians, &examples_index);
	nodes.push(Node::Leaf(LeafNode {
		values: root_stats.leaf_values(l2_regularization),
		examples_fraction: 1.0,
	}));
	if should_split(examples_index.len(), 0, options) {
		if let Some(split) = choose_split(
			binned_features,
			gradients,
			hessians,
			&examples_index,
			&root_stats,
			feature_subset,
			options,
			rng,
		) {
			queue.push(QueueItem {
				node_index: 0,
				depth: 0,
				examples: examples_index,
				split,
			});
		}
	}

	let mut n_leaves = 1;
	while let Some(queue_item) = queue.pop() {
		// Once the maximum number of leaves is reached, the remaining nodes in the queue stay leaves.
		if let Some(max_leaf_nodes) = options.max_leaf_nodes {
			if n_leaves >= max_leaf_nodes {
				break;
			}
		}
		let QueueItem {
			node_index,
			depth,
			examples,
			split,
		} = queue_item;
		let column = &binned_features.columns[split.feature_index];
		let (left_examples, right_examples): (Vec<usize>, Vec<usize>) = examples
			.iter()
			.copied()
			.partition(|example| column[*example] <= split.bin);
		let left_child_index = nodes.len();
		let right_child_index = left_child_index + 1;
		nodes.push(Node::Leaf(LeafNode {
			values: split.left.leaf_values(l2_regularization),
			examples_fraction: left_examples.len() as f32 / n_total,
		}));
		nodes.push(Node::Leaf(LeafNode {
			values: split.right.leaf_values(l2_regularization),
			examples_fraction: right_examples.len() as f32 / n_total,
		}));
		let split_value = binned_features.instructions[split.feature_index].thresholds
			[split.bin as usize];
		nodes[node_index] = Node::Branch(BranchNode {
			feature_index: split.feature_index,
			split_value,
			left_child_index,
			right_child_index,
			examples_fraction: examples.len() as f32 / n_total,
		});
		n_leaves += 1;
		for (child_index, stats, child_examples) in vec![
			(left_child_index, split.left, left_examples),
			(right_child_index, split.right, right_examples),
		] {
			if !should_split(child_examples.len(), depth + 1, options) {
				continue;
			}
			if let Some(child_split) = choose_split(
				binned_features,
				gradients,
				hessians,
				&child_examples,
				&stats,
				feature_subset,
				options,
				rng,
			) {
				queue.push(QueueItem {
					node_index: child_index,
					depth: depth + 1,
					examples: child_examples,
					split: child_split,
				});
			}
		}
	}
	Tree { nodes }
}

/// Determine if a node should be considered for splitting based on the number of examples in it and its depth.
fn should_split(n_examples: usize, depth: usize, options: &TreeOptions) -> bool {
	let max_depth_reached = options
		.max_depth
		.map(|max_depth| depth >= max_depth)
		.unwrap_or(false);
	!max_depth_reached && n_examples >= 2 * options.min_examples_per_leaf.max(1)
}

#[allow(clippy::too_many_arguments)]
fn choose_split(
	binned_features: &BinnedFeatures,
	gradients: ArrayView2<f32>,
	hessians: ArrayView2<f32>,
	examples: &[usize],
	node_stats: &NodeStats,
	feature_subset: &[usize],
	options: &TreeOptions,
	rng: &mut Xoshiro256Plus,
) -> Option<Split> {
	let n_candidates = options.max_features.n_features(feature_subset.len());
	let mut candidates: Vec<usize> = if n_candidates < feature_subset.len() {
		sample(rng, feature_subset.len(), n_candidates)
			.into_iter()
			.map(|index| feature_subset[index])
			.collect()
	} else {
		feature_subset.to_vec()
	};
	// Ties between features go to the feature with the lowest index.
	candidates.sort_unstable();
	let n_outputs = gradients.ncols();
	let l2_regularization = f64::from(options.l2_regularization);
	let parent_negative_loss = node_stats.negative_loss(l2_regularization);
	let mut best: Option<Split> = None;
	for feature_index in candidates {
		let column = &binned_features.columns[feature_index];
		let n_bins = binned_features.instructions[feature_index].n_bins();
		let mut bin_stats = vec![NodeStats::zeros(n_outputs); n_bins];
		for example in examples.iter() {
			bin_stats[column[*example] as usize].add(gradients.row(*example), hessians.row(*example));
		}
		let occupied: Vec<usize> = (0..n_bins)
			.filter(|bin| bin_stats[*bin].n_examples > 0)
			.collect();
		let (first, last) = match (occupied.first(), occupied.last()) {
			(Some(first), Some(last)) if first < last => (*first, *last),
			_ => continue,
		};
		let bins: Vec<usize> = match options.split_strategy {
			SplitStrategy::Best => occupied[..occupied.len() - 1].to_vec(),
			SplitStrategy::Random => vec![rng.gen_range(first, last)],
		};
		let mut left = NodeStats::zeros(n_outputs);
		let mut next_bin = 0;
		for bin in bins {
			while next_bin <= bin {
				left.merge(&bin_stats[next_bin]);
				next_bin += 1;
			}
			let right = node_stats.subtract(&left);
			if left.n_examples < options.min_examples_per_leaf
				|| right.n_examples < options.min_examples_per_leaf
				|| left.total_hessian() < f64::from(options.min_sum_hessians_per_leaf)
				|| right.total_hessian() < f64::from(options.min_sum_hessians_per_leaf)
			{
				continue;
			}
			let gain = left.negative_loss(l2_regularization) + right.negative_loss(l2_regularization)
				- parent_negative_loss;
			let is_better = match &best {
				Some(best) => gain > best.gain,
				None => gain > MIN_GAIN_TO_SPLIT,
			};
			if is_better {
				best = Some(Split {
					feature_index,
					bin: bin as u8,
					gain,
					left: left.clone(),
					right,
				});
			}
		}
	}
	best
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{compute_binned_features, compute_binning_instructions, MaxFeatures};
	use rand::SeedableRng;

	#[test]
	fn test_regression_tree() {
		// The label is 1 when the first feature is above 2, and the second feature is noise.
		let features = arr2(&[
			[0.0, 5.0],
			[1.0, 3.0],
			[2.0, 4.0],
			[3.0, 1.0],
			[4.0, 2.0],
			[5.0, 0.0],
		]);
		let labels = [0.0f32, 0.0, 0.0, 1.0, 1.0, 1.0];
		let gradients = Array2::from_shape_fn((6, 1), |(index, _)| -labels[index]);
		let hessians = Array2::ones((6, 1));
		let instructions = compute_binning_instructions(features.view(), 255);
		let binned_features = compute_binned_features(features.view(), instructions);
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let tree = train_tree(
			&binned_features,
			gradients.view(),
			hessians.view(),
			(0..6).collect(),
			&[0, 1],
			&TreeOptions {
				max_features: MaxFeatures::All,
				..Default::default()
			},
			&mut rng,
		);
		assert_eq!(tree.n_leaves(), 2);
		match &tree.nodes[0] {
			Node::Branch(branch) => {
				assert_eq!(branch.feature_index, 0);
				assert_eq!(branch.split_value, 2.5);
			}
			Node::Leaf(_) => panic!("expected the root to be a branch"),
		}
		for (example, label) in features.rows().into_iter().zip(labels.iter()) {
			assert_eq!(tree.predict(example), &[*label]);
		}
	}

	#[test]
	fn test_max_leaf_nodes_and_depth() {
		let features = Array2::from_shape_fn((64, 1), |(index, _)| index as f32);
		let gradients = Array2::from_shape_fn((64, 1), |(index, _)| -(index as f32));
		let hessians = Array2::ones((64, 1));
		let instructions = compute_binning_instructions(features.view(), 255);
		let binned_features = compute_binned_features(features.view(), instructions);
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let tree = train_tree(
			&binned_features,
			gradients.view(),
			hessians.view(),
			(0..64).collect(),
			&[0],
			&TreeOptions {
				max_leaf_nodes: Some(5),
				..Default::default()
			},
			&mut rng,
		);
		assert_eq!(tree.n_leaves(), 5);
		let tree = train_tree(
			&binned_features,
			gradients.view(),
			hessians.view(),
			(0..64).collect(),
			&[0],
			&TreeOptions {
				max_depth: Some(2),
				..Default::default()
			},
			&mut rng,
		);
		assert_eq!(tree.n_leaves(), 4);
	}
}
