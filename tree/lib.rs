/*!
This crate implements machine learning models for regression and classification using decision trees and ensembles of them. Every ensemble is built from the same tree trainer, which grows trees best first on binned features.

- [`ForestRegressor`](struct.ForestRegressor.html) and [`ForestClassifier`](struct.ForestClassifier.html) average many deep trees. With bootstrapping and the best split they are random forests, and without bootstrapping and with random splits they are extremely randomized trees.
- [`BoostingRegressor`](struct.BoostingRegressor.html) and [`BoostingClassifier`](struct.BoostingClassifier.html) are gradient boosted trees, with squared error and softmax cross entropy losses respectively.

All randomness comes from a seed in the options, and trees trained in parallel each get their own generator seeded with `seed + tree_index`, so results do not depend on the number of threads.
*/

#![allow(clippy::tabs_in_doc_comments)]

use ndarray::prelude::*;
use thiserror::Error;

mod binning;
mod forest;
mod gradient_boosting;
mod train;

pub use self::binning::{compute_binned_features, compute_binning_instructions, BinnedFeatures};
pub use self::forest::{ForestClassifier, ForestOptions, ForestRegressor};
pub use self::gradient_boosting::{BoostingClassifier, BoostingOptions, BoostingRegressor};
pub use self::train::train_tree;

/// Number features are binned into at most this many bins, so a bin index fits in a `u8`.
pub const DEFAULT_MAX_BINS: usize = 255;

#[derive(Debug, Error)]
pub enum TreeError {
	#[error("cannot train on zero examples")]
	NoExamples,
	#[error("the labels must contain at least two classes, but found {0}")]
	TooFewClasses(usize),
	#[error("label {label} is out of range for {n_classes} classes")]
	LabelOutOfRange { label: usize, n_classes: usize },
}

/// These are the options that control how a single tree is grown.
#[derive(Debug, Clone)]
pub struct TreeOptions {
	/// The depth of a single tree will never exceed this value. The root has depth zero.
	pub max_depth: Option<usize>,
	/// The number of leaf nodes in a single tree will never exceed this value.
	pub max_leaf_nodes: Option<usize>,
	/// A split will only be considered valid if the number of training examples sent to each of the resulting children is at least this value.
	pub min_examples_per_leaf: usize,
	/// A split will only be considered valid if the sum of hessians in each of the resulting children is at least this value.
	pub min_sum_hessians_per_leaf: f32,
	pub l2_regularization: f32,
	/// The number of features considered at each node.
	pub max_features: MaxFeatures,
	pub split_strategy: SplitStrategy,
}

impl Default for TreeOptions {
	fn default() -> Self {
		Self {
			max_depth: None,
			max_leaf_nodes: None,
			min_examples_per_leaf: 1,
			min_sum_hessians_per_leaf: 0.0,
			l2_regularization: 0.0,
			max_features: MaxFeatures::All,
			split_strategy: SplitStrategy::Best,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
	All,
	Sqrt,
	Fraction(f64),
}

impl MaxFeatures {
	pub fn n_features(&self, n_features: usize) -> usize {
		let n = match self {
			Self::All => n_features,
			Self::Sqrt => (n_features as f64).sqrt().floor() as usize,
			Self::Fraction(fraction) => (fraction * n_features as f64).floor() as usize,
		};
		n.max(1).min(n_features)
	}
}

/// `Best` searches every bin boundary of each candidate feature. `Random` draws one boundary uniformly between the smallest and largest bins present in the node, as extremely randomized trees do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitStrategy {
	Best,
	Random,
}

/// Trees are stored as a `Vec` of `Node`s. Each branch in the tree has two indexes into the `Vec`, one for each of its children. The root is at index zero.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Tree {
	pub nodes: Vec<Node>,
}

impl Tree {
	/// Make a prediction for a given example. The output has one value for each output of the tree.
	pub fn predict(&self, example: ArrayView1<f32>) -> &[f32] {
		let mut node_index = 0;
		loop {
			match &self.nodes[node_index] {
				Node::Branch(BranchNode {
					feature_index,
					split_value,
					left_child_index,
					right_child_index,
					..
				}) => {
					node_index = if example[*feature_index] <= *split_value {
						*left_child_index
					} else {
						*right_child_index
					};
				}
				Node::Leaf(LeafNode { values, .. }) => return values,
			}
		}
	}

	pub fn n_leaves(&self) -> usize {
		self.nodes
			.iter()
			.filter(|node| matches!(node, Node::Leaf(_)))
			.count()
	}

	/// Multiply every leaf value by `factor`.
	pub(crate) fn scale(&mut self, factor: f32) {
		for node in self.nodes.iter_mut() {
			if let Node::Leaf(leaf) = node {
				for value in leaf.values.iter_mut() {
					*value *= factor;
				}
			}
		}
	}
}

/// A node is either a branch or a leaf.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Node {
	Branch(BranchNode),
	Leaf(LeafNode),
}

/// A branch sends an example to its left child if its value for `feature_index` is <= `split_value`, and to its right child otherwise.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BranchNode {
	pub feature_index: usize,
	pub split_value: f32,
	pub left_child_index: usize,
	pub right_child_index: usize,
	/// The fraction of training examples that passed through this node.
	pub examples_fraction: f32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LeafNode {
	pub values: Vec<f32>,
	pub examples_fraction: f32,
}

/// Check that classification labels are in range and that at least two classes are present.
fn check_class_labels(labels: ArrayView1<usize>, n_classes: usize) -> Result<(), TreeError> {
	if labels.is_empty() {
		return Err(TreeError::NoExamples);
	}
	let mut seen = vec![false; n_classes];
	for label in labels.iter() {
		match seen.get_mut(*label) {
			Some(seen) => *seen = true,
			None => {
				return Err(TreeError::LabelOutOfRange {
					label: *label,
					n_classes,
				})
			}
		}
	}
	let n_seen = seen.iter().filter(|seen| **seen).count();
	if n_seen < 2 {
		return Err(TreeError::TooFewClasses(n_seen));
	}
	Ok(())
}

/// The index of the largest value in each row, with ties going to the lowest index.
fn argmax_rows(values: ArrayView2<f32>) -> Vec<usize> {
	values
		.rows()
		.into_iter()
		.map(|row| {
			let mut best = 0;
			for (index, value) in row.iter().enumerate() {
				if *value > row[best] {
					best = index;
				}
			}
			best
		})
		.collect()
}

#[test]
fn test_max_features() {
	assert_eq!(MaxFeatures::All.n_features(10), 10);
	assert_eq!(MaxFeatures::Sqrt.n_features(10), 3);
	assert_eq!(MaxFeatures::Sqrt.n_features(1), 1);
	assert_eq!(MaxFeatures::Fraction(0.9).n_features(10), 9);
	assert_eq!(MaxFeatures::Fraction(0.01).n_features(10), 1);
}
