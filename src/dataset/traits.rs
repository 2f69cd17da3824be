//! Row access abstraction shared by training data and serving batches.

use super::encoding::FeatureId;

/// Read-only, per-row feature access.
///
/// Implemented by [`EncodedDataset`](super::EncodedDataset) (training) and
/// [`ExampleBatch`](crate::inference::ExampleBatch) (serving), so tree
/// traversal code is written once against this trait.
///
/// Missing cells return `None`; the caller applies the split node's frozen
/// missing-direction policy.
pub trait RowAccessor {
    /// Number of addressable rows.
    fn n_rows(&self) -> usize;

    /// Numerical view of a cell: the raw value for numerical columns,
    /// 0.0/1.0 for boolean columns, `None` for missing cells or
    /// categorical columns.
    fn numerical(&self, row: usize, feature: FeatureId) -> Option<f32>;

    /// Vocabulary index of a categorical cell, `None` for missing cells or
    /// non-categorical columns.
    fn category(&self, row: usize, feature: FeatureId) -> Option<u32>;
}
