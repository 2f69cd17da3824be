//! Compiled engine: serving-optimized, immutable derivative of a model.
//!
//! Each tree is flattened into structure-of-arrays storage in depth-first
//! preorder, so a traversal's next node is usually adjacent in memory.
//! Split nodes carry target-encoding feature ids (remapped at compile
//! time), which makes row access during prediction a direct column index.
//!
//! The engine's lifetime is independent of the model that produced it; all
//! fields serialize, so a persistence collaborator can round-trip it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dataset::{ColumnEncoding, FeatureId, FeatureKind};
use crate::error::{Error, Result};
use crate::model::Task;

use super::examples::ExampleBatch;

/// Split kind tag for compiled nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitKind {
    Numeric,
    Categorical,
}

/// Packed category bitsets for all categorical splits of one tree.
///
/// `segments[node]` is `(start, len)` into `words`; a zero-length segment
/// means the node has no categorical split.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoriesStorage {
    words: Vec<u32>,
    segments: Vec<(u32, u32)>,
}

impl CategoriesStorage {
    pub(crate) fn new(words: Vec<u32>, segments: Vec<(u32, u32)>) -> Self {
        Self { words, segments }
    }

    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// Membership test for the categorical split at `node`.
    #[inline]
    pub fn category_goes_right(&self, node: u32, category: u32) -> bool {
        let (start, len) = self.segments[node as usize];
        let word = category / 32;
        if word >= len {
            return false;
        }
        self.words[(start + word) as usize] & (1 << (category % 32)) != 0
    }
}

/// One flattened tree in structure-of-arrays layout.
///
/// Leaf payloads live in `leaf_values` as fixed-width segments of
/// `n_outputs` floats, addressed through `leaf_offsets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTree {
    split_features: Box<[u32]>,
    thresholds: Box<[f32]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    missing_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    split_kinds: Box<[SplitKind]>,
    leaf_offsets: Box<[u32]>,
    leaf_values: Box<[f32]>,
    categories: CategoriesStorage,
    n_outputs: u32,
}

impl CompiledTree {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        split_features: Vec<u32>,
        thresholds: Vec<f32>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        missing_left: Vec<bool>,
        is_leaf: Vec<bool>,
        split_kinds: Vec<SplitKind>,
        leaf_offsets: Vec<u32>,
        leaf_values: Vec<f32>,
        categories: CategoriesStorage,
        n_outputs: u32,
    ) -> Self {
        let n = split_features.len();
        debug_assert_eq!(n, thresholds.len());
        debug_assert_eq!(n, left_children.len());
        debug_assert_eq!(n, right_children.len());
        debug_assert_eq!(n, missing_left.len());
        debug_assert_eq!(n, is_leaf.len());
        debug_assert_eq!(n, split_kinds.len());
        debug_assert_eq!(n, leaf_offsets.len());
        Self {
            split_features: split_features.into_boxed_slice(),
            thresholds: thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            missing_left: missing_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            split_kinds: split_kinds.into_boxed_slice(),
            leaf_offsets: leaf_offsets.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            categories,
            n_outputs,
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    pub(crate) fn is_leaf(&self, node: u32) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub(crate) fn split_feature(&self, node: u32) -> FeatureId {
        self.split_features[node as usize]
    }

    #[inline]
    pub(crate) fn threshold(&self, node: u32) -> f32 {
        self.thresholds[node as usize]
    }

    #[inline]
    pub(crate) fn left_child(&self, node: u32) -> u32 {
        self.left_children[node as usize]
    }

    #[inline]
    pub(crate) fn right_child(&self, node: u32) -> u32 {
        self.right_children[node as usize]
    }

    #[inline]
    pub(crate) fn missing_left(&self, node: u32) -> bool {
        self.missing_left[node as usize]
    }

    #[inline]
    pub(crate) fn split_kind(&self, node: u32) -> SplitKind {
        self.split_kinds[node as usize]
    }

    #[inline]
    pub(crate) fn categories(&self) -> &CategoriesStorage {
        &self.categories
    }

    /// The `n_outputs` leaf floats for a leaf node.
    #[inline]
    pub(crate) fn leaf_segment(&self, node: u32) -> &[f32] {
        let start = self.leaf_offsets[node as usize] as usize;
        &self.leaf_values[start..start + self.n_outputs as usize]
    }
}

/// Typed feature lookups over the engine's target encoding.
///
/// Resolves a name and checks the kind in one step, so callers hold ids
/// they can only use with the matching setter.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSet<'a> {
    encoding: &'a ColumnEncoding,
}

impl<'a> FeatureSet<'a> {
    fn resolve_kind(&self, name: &str, expected: FeatureKind) -> Result<FeatureId> {
        let id = self.encoding.resolve(name)?;
        let got = self.encoding.kind(id)?;
        if got != expected {
            return Err(Error::TypeMismatch { feature: name.to_string(), expected, got });
        }
        Ok(id)
    }

    /// Id of a numerical feature.
    pub fn numerical(&self, name: &str) -> Result<FeatureId> {
        self.resolve_kind(name, FeatureKind::Numerical)
    }

    /// Id of a categorical feature.
    pub fn categorical(&self, name: &str) -> Result<FeatureId> {
        self.resolve_kind(name, FeatureKind::Categorical)
    }

    /// Id of a boolean feature.
    pub fn boolean(&self, name: &str) -> Result<FeatureId> {
        self.resolve_kind(name, FeatureKind::Boolean)
    }
}

/// Latency-optimized serving artifact bound to one model and one target
/// encoding. Immutable after compilation; freely shared across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledEngine {
    pub(crate) trees: Vec<CompiledTree>,
    pub(crate) task: Task,
    pub(crate) n_outputs: usize,
    /// Training-encoding id -> target-encoding id. `u32::MAX` marks columns
    /// the model never references.
    pub(crate) feature_remap: Vec<u32>,
    pub(crate) encoding: Arc<ColumnEncoding>,
}

impl CompiledEngine {
    /// Number of compiled trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Total node count across trees.
    pub fn n_nodes(&self) -> usize {
        self.trees.iter().map(CompiledTree::n_nodes).sum()
    }

    /// Learning task.
    #[inline]
    pub fn task(&self) -> Task {
        self.task
    }

    /// Output width per example: class count for classification, 1 for
    /// regression.
    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// The target encoding the engine serves against.
    #[inline]
    pub fn encoding(&self) -> &Arc<ColumnEncoding> {
        &self.encoding
    }

    /// Training-id to target-id remap table.
    #[inline]
    pub fn feature_remap(&self) -> &[u32] {
        &self.feature_remap
    }

    /// Typed feature lookups.
    pub fn features(&self) -> FeatureSet<'_> {
        FeatureSet { encoding: &self.encoding }
    }

    /// Allocate a batch buffer for `capacity` examples, all cells missing.
    pub fn allocate_examples(&self, capacity: usize) -> ExampleBatch {
        ExampleBatch::with_capacity(Arc::clone(&self.encoding), capacity)
    }
}
