//! Training progress logging with verbosity levels.
//!
//! Emits through `tracing`; the caller decides whether a subscriber is
//! installed. [`Verbosity::Silent`] suppresses output even when one is.

use std::time::Duration;

/// How chatty training is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// No output.
    Silent,
    /// Run-level summary lines.
    #[default]
    Info,
    /// Per-tree progress.
    Debug,
}

/// Structured logger used by the trainer.
#[derive(Debug, Clone, Copy)]
pub struct TrainingLogger {
    verbosity: Verbosity,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn started(&self, n_trees: u32, n_rows: usize, n_features: usize) {
        if self.verbosity >= Verbosity::Info {
            tracing::info!(n_trees, n_rows, n_features, "training random forest");
        }
    }

    pub fn tree_grown(&self, tree_index: usize, n_nodes: usize) {
        if self.verbosity >= Verbosity::Debug {
            tracing::debug!(tree_index, n_nodes, "tree finalized");
        }
    }

    pub fn finished(&self, n_trees: usize, elapsed: Duration) {
        if self.verbosity >= Verbosity::Info {
            tracing::info!(n_trees, elapsed_ms = elapsed.as_millis() as u64, "training done");
        }
    }
}
