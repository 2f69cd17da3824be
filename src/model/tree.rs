//! Trained tree representation: an arena of tagged nodes.
//!
//! Each tree owns a flat node array with integer child indices (root at 0),
//! which keeps the structure contiguous, cycle-free by construction checks,
//! and trivially serializable. Nodes are a tagged variant rather than a
//! class hierarchy: traversal is a flat match.

use serde::{Deserialize, Serialize};

use crate::dataset::{FeatureId, RowAccessor};

/// Index of a node inside its owning tree's arena.
pub type NodeIndex = u32;

/// Packed category membership set for a categorical split.
///
/// Categories in the set send an example to the right child; categories
/// outside it (including the reserved out-of-vocabulary index, unless it was
/// explicitly selected) go left.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySet {
    words: Vec<u32>,
}

impl CategorySet {
    /// Build a set from category indices.
    pub fn from_categories<I: IntoIterator<Item = u32>>(categories: I) -> Self {
        let mut words = Vec::new();
        for cat in categories {
            let word = (cat / 32) as usize;
            if word >= words.len() {
                words.resize(word + 1, 0);
            }
            words[word] |= 1 << (cat % 32);
        }
        Self { words }
    }

    /// Membership test.
    #[inline]
    pub fn contains(&self, category: u32) -> bool {
        self.words
            .get((category / 32) as usize)
            .map_or(false, |w| w & (1 << (category % 32)) != 0)
    }

    /// Packed u32 words, low categories first.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Category indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &bits)| {
            (0..32).filter_map(move |b| (bits & (1 << b) != 0).then_some(w as u32 * 32 + b))
        })
    }
}

/// Split test evaluated at a non-leaf node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitCondition {
    /// `value < threshold` goes left. Boolean columns use threshold 0.5
    /// over their 0/1 numerical view.
    Threshold(f32),
    /// Member categories go right.
    Categories(CategorySet),
}

/// Aggregated label stored in a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LeafOutput {
    /// Normalized class distribution (classification).
    Distribution(Vec<f32>),
    /// Mean target value (regression).
    Scalar(f32),
}

/// One node of a trained tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Terminal node holding the aggregated label of its training examples.
    Leaf { output: LeafOutput, n_examples: u32 },
    /// Binary split. `missing_left` is the missing-direction policy frozen
    /// at training time; it is never data-dependent at inference time.
    Split {
        feature: FeatureId,
        condition: SplitCondition,
        missing_left: bool,
        left: NodeIndex,
        right: NodeIndex,
    },
}

/// Structural defects reported by [`Tree::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValidationError {
    /// Tree has no nodes.
    Empty,
    /// A child pointer references an out-of-bounds node.
    ChildOutOfBounds { node: NodeIndex, child: NodeIndex },
    /// A node references itself as a child.
    SelfLoop { node: NodeIndex },
    /// A node is reachable by more than one path (cycle or shared child).
    DuplicateVisit { node: NodeIndex },
    /// A node exists in the arena but is unreachable from the root.
    Unreachable { node: NodeIndex },
}

/// Immutable trained tree. The root is node 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Wrap a finalized node arena.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Number of nodes.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Access a node by arena index.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index as usize]
    }

    /// The full node arena, root first.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Maximum root-to-leaf depth (a lone leaf has depth 0).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0 as NodeIndex, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match self.node(idx) {
                Node::Leaf { .. } => max_depth = max_depth.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        max_depth
    }

    /// Walk from the root to a leaf for one row, applying each split's
    /// frozen missing-direction policy when the feature value is absent.
    pub fn traverse<A: RowAccessor>(&self, rows: &A, row: usize) -> &Node {
        let mut idx: NodeIndex = 0;
        loop {
            match self.node(idx) {
                leaf @ Node::Leaf { .. } => return leaf,
                Node::Split { feature, condition, missing_left, left, right } => {
                    let go_left = match condition {
                        SplitCondition::Threshold(t) => match rows.numerical(row, *feature) {
                            Some(v) => v < *t,
                            None => *missing_left,
                        },
                        SplitCondition::Categories(set) => match rows.category(row, *feature) {
                            Some(c) => !set.contains(c),
                            None => *missing_left,
                        },
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }

    /// Check child bounds, self loops, reachability and single-parent
    /// ownership. Intended for debug checks and deserialized models.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n = self.nodes.len();
        if n == 0 {
            return Err(TreeValidationError::Empty);
        }
        let mut visited = vec![false; n];
        let mut stack = vec![0 as NodeIndex];
        while let Some(idx) = stack.pop() {
            let i = idx as usize;
            if visited[i] {
                return Err(TreeValidationError::DuplicateVisit { node: idx });
            }
            visited[i] = true;
            if let Node::Split { left, right, .. } = self.node(idx) {
                for &child in &[*left, *right] {
                    if child == idx {
                        return Err(TreeValidationError::SelfLoop { node: idx });
                    }
                    if child as usize >= n {
                        return Err(TreeValidationError::ChildOutOfBounds { node: idx, child });
                    }
                }
                stack.push(*right);
                stack.push(*left);
            }
        }
        if let Some(node) = visited.iter().position(|v| !v) {
            return Err(TreeValidationError::Unreachable { node: node as NodeIndex });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnEncodingBuilder, EncodedDatasetBuilder, RawValue};
    use std::sync::Arc;

    fn leaf(value: f32) -> Node {
        Node::Leaf { output: LeafOutput::Scalar(value), n_examples: 1 }
    }

    fn one_numeric_row(value: Option<f32>) -> crate::dataset::EncodedDataset {
        let enc = Arc::new(ColumnEncodingBuilder::new().numerical("x").build().unwrap());
        let mut builder = EncodedDatasetBuilder::new(enc);
        let cell = match value {
            Some(v) => RawValue::Numerical(v),
            None => RawValue::Missing,
        };
        builder.push_row(&[cell]).unwrap();
        builder.build()
    }

    fn threshold_tree(missing_left: bool) -> Tree {
        Tree::from_nodes(vec![
            Node::Split {
                feature: 0,
                condition: SplitCondition::Threshold(2.5),
                missing_left,
                left: 1,
                right: 2,
            },
            leaf(-1.0),
            leaf(1.0),
        ])
    }

    #[test]
    fn traverse_threshold_split() {
        let tree = threshold_tree(true);
        let low = one_numeric_row(Some(1.0));
        let high = one_numeric_row(Some(3.0));
        assert_eq!(tree.traverse(&low, 0), &leaf(-1.0));
        assert_eq!(tree.traverse(&high, 0), &leaf(1.0));
    }

    #[test]
    fn traverse_follows_frozen_missing_direction() {
        let missing = one_numeric_row(None);
        assert_eq!(threshold_tree(true).traverse(&missing, 0), &leaf(-1.0));
        assert_eq!(threshold_tree(false).traverse(&missing, 0), &leaf(1.0));
    }

    #[test]
    fn category_set_membership() {
        let set = CategorySet::from_categories([1, 3, 40]);
        assert!(set.contains(1));
        assert!(set.contains(3));
        assert!(set.contains(40));
        assert!(!set.contains(0));
        assert!(!set.contains(2));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 3, 40]);
    }

    #[test]
    fn validate_detects_defects() {
        assert_eq!(Tree::from_nodes(vec![]).validate(), Err(TreeValidationError::Empty));

        let out_of_bounds = Tree::from_nodes(vec![Node::Split {
            feature: 0,
            condition: SplitCondition::Threshold(0.0),
            missing_left: true,
            left: 1,
            right: 9,
        }]);
        assert!(matches!(
            out_of_bounds.validate(),
            Err(TreeValidationError::ChildOutOfBounds { .. })
        ));

        let orphan = Tree::from_nodes(vec![leaf(0.0), leaf(1.0)]);
        assert_eq!(orphan.validate(), Err(TreeValidationError::Unreachable { node: 1 }));

        let ok = threshold_tree(true);
        assert_eq!(ok.validate(), Ok(()));
        assert_eq!(ok.depth(), 1);
    }
}
