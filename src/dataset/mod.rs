//! Column encoding and columnar training data.
//!
//! - [`ColumnEncoding`]: name -> (kind, internal id, vocabulary) mapping,
//!   built once and shared read-only by all downstream components.
//! - [`EncodedDataset`]: caller-owned columnar storage with per-column
//!   missing bitmaps; the trainer only reads it.
//! - [`RowAccessor`]: the row-access seam shared with serving batches.

#[allow(clippy::module_inception)]
mod dataset;
mod encoding;
mod traits;

pub use dataset::{EncodedDataset, EncodedDatasetBuilder, Labels, RawValue};
pub use encoding::{
    ColumnEncoding, ColumnEncodingBuilder, ColumnSpec, FeatureId, FeatureKind, OOV_INDEX,
    OOV_TOKEN,
};
pub use traits::RowAccessor;
