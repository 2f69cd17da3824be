//! Random-forest training.
//!
//! - [`RandomForestTrainer`] / [`RandomForestParams`]: the public surface.
//! - `sampling`: bootstrap and feature subsampling (deterministic per seed).
//! - `split`: impurity-driven split search with the fixed tie-break rule.
//! - `grower`: recursive growth of one tree.
//! - [`TrainingLogger`] / [`Verbosity`]: progress reporting.

mod grower;
mod logger;
mod params;
mod sampling;
mod split;
mod trainer;

pub use logger::{TrainingLogger, Verbosity};
pub use params::RandomForestParams;
pub use sampling::{bootstrap_sample, derive_tree_seed, sample_features};
pub use trainer::RandomForestTrainer;
