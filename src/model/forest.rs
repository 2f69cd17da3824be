//! Trained ensemble: ordered trees plus the fixed aggregation rule.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::tree::{LeafOutput, Node, Tree};
use crate::dataset::{ColumnEncoding, FeatureId, RowAccessor};

/// Learning task of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    Classification,
    Regression,
}

/// Immutable trained random-forest model.
///
/// Tree order is insertion order fixed at sampling time, which makes
/// deterministic replay (and byte-identical retraining under a fixed seed)
/// possible. The model keeps a read-only reference to the encoding it was
/// trained against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestModel {
    trees: Vec<Tree>,
    task: Task,
    /// Number of classes; 0 for regression models.
    n_classes: usize,
    encoding: Arc<ColumnEncoding>,
}

impl RandomForestModel {
    /// Assemble a model from finalized parts (trainer output or a
    /// persistence collaborator).
    pub fn new(
        trees: Vec<Tree>,
        task: Task,
        n_classes: usize,
        encoding: Arc<ColumnEncoding>,
    ) -> Self {
        Self { trees, task, n_classes, encoding }
    }

    /// Trees in training order.
    #[inline]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Learning task.
    #[inline]
    pub fn task(&self) -> Task {
        self.task
    }

    /// Number of classes (0 for regression).
    #[inline]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// The training-time column encoding.
    #[inline]
    pub fn encoding(&self) -> &Arc<ColumnEncoding> {
        &self.encoding
    }

    /// Averaged per-class probabilities for one row (classification only).
    pub fn predict_row_scores<A: RowAccessor>(&self, rows: &A, row: usize) -> Vec<f32> {
        let mut acc = vec![0.0f64; self.n_classes.max(1)];
        for tree in &self.trees {
            match tree.traverse(rows, row) {
                Node::Leaf { output: LeafOutput::Distribution(probs), .. } => {
                    for (slot, p) in acc.iter_mut().zip(probs) {
                        *slot += f64::from(*p);
                    }
                }
                Node::Leaf { output: LeafOutput::Scalar(v), .. } => acc[0] += f64::from(*v),
                Node::Split { .. } => unreachable!("traverse returns a leaf"),
            }
        }
        let n = self.trees.len().max(1) as f64;
        acc.iter().map(|&s| (s / n) as f32).collect()
    }

    /// Reference aggregation for one row: the averaged-probability arg-max
    /// class index (ties broken by lowest class index) for classification,
    /// the mean of scalar leaves for regression.
    ///
    /// This is the semantics the compiled engine must reproduce exactly;
    /// equivalence tests compare engine output against it.
    pub fn predict_row<A: RowAccessor>(&self, rows: &A, row: usize) -> f32 {
        let scores = self.predict_row_scores(rows, row);
        match self.task {
            Task::Regression => scores[0],
            Task::Classification => argmax(&scores) as f32,
        }
    }

    /// Number of split nodes referencing each feature id, indexed by id.
    ///
    /// A cheap usage signal in place of full variable importances.
    pub fn feature_usage(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.encoding.len()];
        for tree in &self.trees {
            for node in tree.nodes() {
                if let Node::Split { feature, .. } = node {
                    counts[*feature as usize] += 1;
                }
            }
        }
        counts
    }

    /// One-line human-readable summary.
    pub fn describe(&self) -> String {
        let n_nodes: usize = self.trees.iter().map(Tree::n_nodes).sum();
        let max_depth = self.trees.iter().map(Tree::depth).max().unwrap_or(0);
        format!(
            "RandomForest({:?}): {} trees, {} nodes, depth<={}, {} features",
            self.task,
            self.trees.len(),
            n_nodes,
            max_depth,
            self.encoding.len()
        )
    }
}

/// Index of the maximum score; ties resolve to the lowest index.
pub(crate) fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnEncodingBuilder, EncodedDatasetBuilder, RawValue};
    use crate::model::tree::SplitCondition;
    use approx::assert_relative_eq;

    fn single_row(x: f32) -> crate::dataset::EncodedDataset {
        let enc = Arc::new(ColumnEncodingBuilder::new().numerical("x").build().unwrap());
        let mut builder = EncodedDatasetBuilder::new(enc);
        builder.push_row(&[RawValue::Numerical(x)]).unwrap();
        builder.build()
    }

    fn class_leaf(probs: Vec<f32>) -> Node {
        Node::Leaf { output: LeafOutput::Distribution(probs), n_examples: 1 }
    }

    #[test]
    fn classification_averages_then_argmaxes() {
        let enc = Arc::new(ColumnEncodingBuilder::new().numerical("x").build().unwrap());
        // Two stump-free trees voting differently: [0.9, 0.1] and [0.2, 0.8].
        let model = RandomForestModel::new(
            vec![
                Tree::from_nodes(vec![class_leaf(vec![0.9, 0.1])]),
                Tree::from_nodes(vec![class_leaf(vec![0.2, 0.8])]),
            ],
            Task::Classification,
            2,
            enc,
        );
        let rows = single_row(0.0);
        let scores = model.predict_row_scores(&rows, 0);
        assert_relative_eq!(scores[0], 0.55, epsilon = 1e-6);
        assert_relative_eq!(scores[1], 0.45, epsilon = 1e-6);
        assert_eq!(model.predict_row(&rows, 0), 0.0);
    }

    #[test]
    fn classification_ties_break_to_lowest_class() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
    }

    #[test]
    fn regression_averages_scalar_leaves() {
        let enc = Arc::new(ColumnEncodingBuilder::new().numerical("x").build().unwrap());
        let model = RandomForestModel::new(
            vec![
                Tree::from_nodes(vec![Node::Leaf {
                    output: LeafOutput::Scalar(1.0),
                    n_examples: 1,
                }]),
                Tree::from_nodes(vec![Node::Leaf {
                    output: LeafOutput::Scalar(3.0),
                    n_examples: 1,
                }]),
            ],
            Task::Regression,
            0,
            enc,
        );
        let rows = single_row(0.0);
        assert_relative_eq!(model.predict_row(&rows, 0), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn feature_usage_counts_split_nodes() {
        let enc = Arc::new(
            ColumnEncodingBuilder::new()
                .numerical("a")
                .numerical("b")
                .build()
                .unwrap(),
        );
        let tree = Tree::from_nodes(vec![
            Node::Split {
                feature: 1,
                condition: SplitCondition::Threshold(0.0),
                missing_left: true,
                left: 1,
                right: 2,
            },
            Node::Leaf { output: LeafOutput::Scalar(0.0), n_examples: 1 },
            Node::Leaf { output: LeafOutput::Scalar(1.0), n_examples: 1 },
        ]);
        let model = RandomForestModel::new(vec![tree], Task::Regression, 0, enc);
        assert_eq!(model.feature_usage(), vec![0, 1]);
    }
}
