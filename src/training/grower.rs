//! Recursive growth of a single tree from a bootstrap sample.

use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::dataset::{EncodedDataset, Labels, RowAccessor};
use crate::model::{LeafOutput, Node, NodeIndex, SplitCondition, Tree};

use super::sampling::sample_features;
use super::split::{find_best_split, LabelStats, SplitCandidate};

/// Grows one tree: recursive best-first split search with feature
/// subsampling, then freezes the node arena into an immutable [`Tree`].
///
/// The root is node 0. A split allocates both child placeholders before
/// recursing, so siblings sit at adjacent indices while each left subtree's
/// descendants land after its right sibling; the engine compiler re-lays
/// nodes out in preorder for serving.
pub(crate) struct TreeGrower<'a> {
    data: &'a EncodedDataset,
    labels: &'a Labels,
    max_depth: u32,
    min_examples_per_leaf: u32,
    n_candidates: usize,
    rng: Xoshiro256PlusPlus,
    nodes: Vec<Node>,
}

impl<'a> TreeGrower<'a> {
    pub fn new(
        data: &'a EncodedDataset,
        labels: &'a Labels,
        max_depth: u32,
        min_examples_per_leaf: u32,
        n_candidates: usize,
        seed: u64,
    ) -> Self {
        Self {
            data,
            labels,
            max_depth,
            min_examples_per_leaf,
            n_candidates,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            nodes: Vec::with_capacity(64),
        }
    }

    /// Grow from the given bootstrap row set and finalize.
    pub fn grow(mut self, rows: Vec<u32>) -> Tree {
        let root = self.allocate_placeholder();
        self.split_node(root, rows, 0);
        Tree::from_nodes(self.nodes)
    }

    fn split_node(&mut self, node: NodeIndex, rows: Vec<u32>, depth: u32) {
        let stats = LabelStats::from_rows(self.labels, &rows);
        if (rows.len() as u32) < self.min_examples_per_leaf
            || depth >= self.max_depth
            || stats.is_pure()
        {
            self.nodes[node as usize] = self.make_leaf(&stats, rows.len());
            return;
        }

        let candidates =
            sample_features(self.data.n_features(), self.n_candidates, &mut self.rng);
        let best = match find_best_split(self.data, self.labels, &rows, &candidates, &stats) {
            Some(best) => best,
            None => {
                self.nodes[node as usize] = self.make_leaf(&stats, rows.len());
                return;
            }
        };

        let (left_rows, right_rows) = self.partition(rows, &best);
        if left_rows.is_empty() || right_rows.is_empty() {
            // All examples fell on one side (possible when only missing
            // examples back one branch); keep the node as a leaf.
            let rows = if left_rows.is_empty() { right_rows } else { left_rows };
            self.nodes[node as usize] = self.make_leaf(&stats, rows.len());
            return;
        }

        let left = self.allocate_placeholder();
        let right = self.allocate_placeholder();
        self.nodes[node as usize] = Node::Split {
            feature: best.feature,
            condition: best.condition.clone(),
            missing_left: best.missing_left,
            left,
            right,
        };
        self.split_node(left, left_rows, depth + 1);
        self.split_node(right, right_rows, depth + 1);
    }

    fn partition(&self, rows: Vec<u32>, split: &SplitCandidate) -> (Vec<u32>, Vec<u32>) {
        let mut left = Vec::with_capacity(rows.len() / 2);
        let mut right = Vec::with_capacity(rows.len() / 2);
        for row in rows {
            let goes_left = match &split.condition {
                SplitCondition::Threshold(t) => {
                    match self.data.numerical(row as usize, split.feature) {
                        Some(v) => v < *t,
                        None => split.missing_left,
                    }
                }
                SplitCondition::Categories(set) => {
                    match self.data.category(row as usize, split.feature) {
                        Some(c) => !set.contains(c),
                        None => split.missing_left,
                    }
                }
            };
            if goes_left {
                left.push(row);
            } else {
                right.push(row);
            }
        }
        (left, right)
    }

    fn make_leaf(&self, stats: &LabelStats, n_examples: usize) -> Node {
        let output = match stats {
            LabelStats::Classification { counts, total } => {
                let norm = if *total > 0.0 { *total } else { 1.0 };
                LeafOutput::Distribution(counts.iter().map(|c| (c / norm) as f32).collect())
            }
            LabelStats::Regression { sum, count, .. } => {
                let mean = if *count > 0.0 { sum / count } else { 0.0 };
                LeafOutput::Scalar(mean as f32)
            }
        };
        Node::Leaf { output, n_examples: n_examples as u32 }
    }

    fn allocate_placeholder(&mut self) -> NodeIndex {
        let id = self.nodes.len() as NodeIndex;
        self.nodes.push(Node::Leaf {
            output: LeafOutput::Scalar(0.0),
            n_examples: 0,
        });
        id
    }
}
