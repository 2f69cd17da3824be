//! Batch prediction over the compiled engine.
//!
//! Traversal reads the flattened arrays directly; per-tree votes are
//! accumulated in `f64` and divided by the tree count, matching the model's
//! own prediction path bit for bit.

use rayon::prelude::*;

use crate::dataset::RowAccessor;
use crate::error::{Error, Result};
use crate::model::{argmax, Task};

use super::engine::{CompiledEngine, CompiledTree, SplitKind};
use super::examples::ExampleBatch;

impl CompiledTree {
    /// Walk one example from the root to its leaf.
    #[inline]
    pub(crate) fn leaf_for_row<A: RowAccessor>(&self, rows: &A, row: usize) -> u32 {
        let mut node = 0u32;
        while !self.is_leaf(node) {
            let feature = self.split_feature(node);
            let goes_left = match self.split_kind(node) {
                SplitKind::Numeric => match rows.numerical(row, feature) {
                    Some(v) => v < self.threshold(node),
                    None => self.missing_left(node),
                },
                SplitKind::Categorical => match rows.category(row, feature) {
                    Some(c) => !self.categories().category_goes_right(node, c),
                    None => self.missing_left(node),
                },
            };
            node = if goes_left {
                self.left_child(node)
            } else {
                self.right_child(node)
            };
        }
        node
    }
}

impl CompiledEngine {
    fn check_batch(&self, batch: &ExampleBatch, count: usize) -> Result<()> {
        if !std::sync::Arc::ptr_eq(&self.encoding, batch.encoding())
            && *self.encoding != **batch.encoding()
        {
            return Err(Error::IncompatibleEncoding(
                "example batch was allocated for a different column encoding".into(),
            ));
        }
        if count > batch.capacity() {
            return Err(Error::IndexOutOfRange {
                what: "example",
                index: count,
                limit: batch.capacity(),
            });
        }
        Ok(())
    }

    /// Averaged per-output scores for one example.
    fn score_row(&self, batch: &ExampleBatch, row: usize, scores: &mut [f32]) {
        debug_assert_eq!(scores.len(), self.n_outputs);
        let mut acc = vec![0.0f64; self.n_outputs];
        for tree in &self.trees {
            let leaf = tree.leaf_for_row(batch, row);
            for (a, &v) in acc.iter_mut().zip(tree.leaf_segment(leaf)) {
                *a += v as f64;
            }
        }
        let n_trees = self.trees.len() as f64;
        for (out, a) in scores.iter_mut().zip(acc) {
            *out = (a / n_trees) as f32;
        }
    }

    fn value_from_scores(&self, scores: &[f32]) -> f32 {
        match self.task {
            Task::Classification => argmax(scores) as f32,
            Task::Regression => scores[0],
        }
    }

    /// Predict the first `count` examples of `batch` into `out`, one value
    /// per example: the winning class index for classification, the
    /// ensemble mean for regression.
    ///
    /// `out` is cleared and resized to `count`. `count` may be zero; it must
    /// not exceed the batch capacity, and the batch must have been allocated
    /// for this engine's encoding.
    pub fn predict_into(
        &self,
        batch: &ExampleBatch,
        count: usize,
        out: &mut Vec<f32>,
    ) -> Result<()> {
        self.check_batch(batch, count)?;
        out.clear();
        out.resize(count, 0.0);
        let mut scores = vec![0.0f32; self.n_outputs];
        for (row, slot) in out.iter_mut().enumerate() {
            self.score_row(batch, row, &mut scores);
            *slot = self.value_from_scores(&scores);
        }
        Ok(())
    }

    /// Predict full score vectors: `count * n_outputs` floats, example-major.
    pub fn predict_scores_into(
        &self,
        batch: &ExampleBatch,
        count: usize,
        out: &mut Vec<f32>,
    ) -> Result<()> {
        self.check_batch(batch, count)?;
        out.clear();
        out.resize(count * self.n_outputs, 0.0);
        for (row, scores) in out.chunks_exact_mut(self.n_outputs).enumerate() {
            self.score_row(batch, row, scores);
        }
        Ok(())
    }

    /// Parallel [`CompiledEngine::predict_into`]. Output is identical to the
    /// sequential path; only the example loop is split across threads.
    pub fn par_predict_into(
        &self,
        batch: &ExampleBatch,
        count: usize,
        out: &mut Vec<f32>,
    ) -> Result<()> {
        self.check_batch(batch, count)?;
        out.clear();
        out.resize(count, 0.0);
        out.par_iter_mut().enumerate().for_each(|(row, slot)| {
            let mut scores = vec![0.0f32; self.n_outputs];
            self.score_row(batch, row, &mut scores);
            *slot = self.value_from_scores(&scores);
        });
        Ok(())
    }
}
