//! Trainer configuration.

use crate::dataset::Labels;
use crate::error::{Error, Result};

use super::logger::Verbosity;

/// Random-forest training parameters.
///
/// Passed explicitly into the training call (no ambient state), so parallel
/// unit tests stay reproducible. Use struct construction with
/// `..Default::default()` for convenient configuration.
#[derive(Debug, Clone)]
pub struct RandomForestParams {
    /// Number of trees to grow.
    pub n_trees: u32,
    /// Maximum tree depth (a lone root leaf has depth 0; must be >= 1).
    pub max_depth: u32,
    /// Nodes with fewer examples than this become leaves.
    pub min_examples_per_leaf: u32,
    /// Candidate features drawn per split search. `0` selects the usual
    /// heuristic: `floor(sqrt(n_features))` for classification,
    /// `n_features / 3` for regression, at least 1 either way.
    pub n_candidate_features: u32,
    /// Global seed; per-tree seeds are derived from it and the tree index.
    pub seed: u64,
    /// Worker threads for parallel tree growth.
    ///
    /// - `0`: rayon's global pool (default)
    /// - `1`: sequential
    /// - `n > 1`: dedicated pool of `n` threads
    pub n_threads: usize,
    /// Logging verbosity.
    pub verbosity: Verbosity,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 16,
            min_examples_per_leaf: 5,
            n_candidate_features: 0,
            seed: 42,
            n_threads: 0,
            verbosity: Verbosity::default(),
        }
    }
}

impl RandomForestParams {
    /// Reject malformed configurations before any work is scheduled.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.n_trees < 1 {
            return Err(Error::InvalidConfig("n_trees must be at least 1".into()));
        }
        if self.max_depth < 1 {
            return Err(Error::InvalidConfig("max_depth must be at least 1".into()));
        }
        if self.min_examples_per_leaf < 1 {
            return Err(Error::InvalidConfig(
                "min_examples_per_leaf must be at least 1".into(),
            ));
        }
        if self.n_candidate_features as usize > n_features {
            return Err(Error::InvalidConfig(format!(
                "n_candidate_features ({}) exceeds available features ({})",
                self.n_candidate_features, n_features
            )));
        }
        Ok(())
    }

    /// Effective candidate-feature count for a split search.
    pub fn effective_candidates(&self, n_features: usize, labels: &Labels) -> usize {
        if self.n_candidate_features > 0 {
            return self.n_candidate_features as usize;
        }
        let heuristic = match labels {
            Labels::Classification { .. } => (n_features as f64).sqrt().floor() as usize,
            Labels::Regression(_) => n_features / 3,
        };
        heuristic.clamp(1, n_features.max(1))
    }
}
