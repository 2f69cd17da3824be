//! Crate-wide error taxonomy.
//!
//! Every fallible public operation returns [`Result`]. All variants are
//! recoverable caller-side conditions and carry enough context (feature name,
//! offending index, limit) to act on. There is no retry logic in this crate;
//! retries are a caller policy.

use crate::dataset::FeatureKind;

/// Errors surfaced by training, compilation and serving.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A feature name does not exist in the column encoding.
    #[error("unknown feature {name:?}")]
    UnknownFeature { name: String },

    /// An operation used a feature of the wrong kind (e.g. a numerical
    /// setter on a categorical column).
    #[error("type mismatch on feature {feature:?}: expected {expected}, got {got}")]
    TypeMismatch {
        feature: String,
        expected: FeatureKind,
        got: FeatureKind,
    },

    /// An example index or feature id is outside the valid range.
    #[error("{what} index {index} out of range (limit {limit})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    /// A training or buffer configuration is malformed. Detected before any
    /// work is scheduled.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The encoded dataset has zero rows.
    #[error("dataset has no rows")]
    EmptyDataset,

    /// A model references features that do not resolve in the target
    /// column encoding.
    #[error("incompatible encoding: {0}")]
    IncompatibleEncoding(String),

    /// The model holds no finalized trees.
    #[error("model has no trained trees")]
    NotTrained,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
