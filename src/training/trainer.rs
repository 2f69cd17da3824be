//! Random-forest trainer: bagging, parallel tree growth, finalization.
//!
//! Each tree runs `SAMPLE -> GROW -> FINALIZE` independently: a bootstrap
//! resample drawn with a per-tree seed, recursive split search, then an
//! immutable [`Tree`]. Trees are grown in parallel with rayon and written
//! back by tree index, so ensemble order is insertion order regardless of
//! completion order and a fixed seed reproduces the model exactly.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::dataset::{EncodedDataset, Labels};
use crate::error::{Error, Result};
use crate::model::{RandomForestModel, Task, Tree};

use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use super::grower::TreeGrower;
use super::logger::TrainingLogger;
use super::params::RandomForestParams;
use super::sampling::{bootstrap_sample, derive_tree_seed};

/// Bagged decision-tree ensemble trainer.
///
/// # Example
///
/// ```ignore
/// let trainer = RandomForestTrainer::new(RandomForestParams {
///     n_trees: 50,
///     max_depth: 8,
///     ..Default::default()
/// });
/// let model = trainer.train(&dataset, &labels)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RandomForestTrainer {
    params: RandomForestParams,
}

impl RandomForestTrainer {
    /// Create a trainer with the given parameters.
    pub fn new(params: RandomForestParams) -> Self {
        Self { params }
    }

    /// Training parameters.
    pub fn params(&self) -> &RandomForestParams {
        &self.params
    }

    /// Train a model. Fails fast on malformed configuration or data; no
    /// partial model is observable on error.
    pub fn train(&self, data: &EncodedDataset, labels: &Labels) -> Result<RandomForestModel> {
        if data.n_rows() == 0 {
            return Err(Error::EmptyDataset);
        }
        self.params.validate(data.n_features())?;
        self.validate_labels(data, labels)?;

        let task = match labels {
            Labels::Classification { .. } => Task::Classification,
            Labels::Regression(_) => Task::Regression,
        };
        let n_classes = match labels {
            Labels::Classification { n_classes, .. } => *n_classes,
            Labels::Regression(_) => 0,
        };
        let n_candidates = self.params.effective_candidates(data.n_features(), labels);

        let logger = TrainingLogger::new(self.params.verbosity);
        logger.started(self.params.n_trees, data.n_rows(), data.n_features());
        let start = Instant::now();

        let grow_one = |tree_index: usize| -> Tree {
            let seed = derive_tree_seed(self.params.seed, tree_index);
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let rows = bootstrap_sample(data.n_rows(), &mut rng);
            let tree = TreeGrower::new(
                data,
                labels,
                self.params.max_depth,
                self.params.min_examples_per_leaf,
                n_candidates,
                seed,
            )
            .grow(rows);
            logger.tree_grown(tree_index, tree.n_nodes());
            tree
        };

        // Parallel collect preserves index order: results land in their
        // tree-index slot, never in completion order.
        let n_trees = self.params.n_trees as usize;
        let trees: Vec<Tree> = match self.params.n_threads {
            1 => (0..n_trees).map(grow_one).collect(),
            0 => (0..n_trees).into_par_iter().map(grow_one).collect(),
            n => {
                let pool = ThreadPoolBuilder::new().num_threads(n).build().map_err(|e| {
                    Error::InvalidConfig(format!("failed to build thread pool: {e}"))
                })?;
                pool.install(|| (0..n_trees).into_par_iter().map(grow_one).collect())
            }
        };

        logger.finished(trees.len(), start.elapsed());
        Ok(RandomForestModel::new(
            trees,
            task,
            n_classes,
            Arc::clone(data.encoding()),
        ))
    }

    fn validate_labels(&self, data: &EncodedDataset, labels: &Labels) -> Result<()> {
        if labels.len() != data.n_rows() {
            return Err(Error::InvalidConfig(format!(
                "label count ({}) does not match row count ({})",
                labels.len(),
                data.n_rows()
            )));
        }
        if let Labels::Classification { classes, n_classes } = labels {
            if *n_classes < 2 {
                return Err(Error::InvalidConfig(
                    "classification needs at least 2 classes".into(),
                ));
            }
            if let Some(&bad) = classes.iter().find(|&&c| c as usize >= *n_classes) {
                return Err(Error::InvalidConfig(format!(
                    "class label {bad} out of range for {n_classes} classes"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnEncodingBuilder, EncodedDatasetBuilder, RawValue};
    use crate::training::Verbosity;

    fn numeric_dataset(xs: &[f32]) -> EncodedDataset {
        let enc = Arc::new(ColumnEncodingBuilder::new().numerical("x").build().unwrap());
        let mut builder = EncodedDatasetBuilder::new(enc);
        for &x in xs {
            builder.push_row(&[RawValue::Numerical(x)]).unwrap();
        }
        builder.build()
    }

    fn quiet(params: RandomForestParams) -> RandomForestParams {
        RandomForestParams { verbosity: Verbosity::Silent, ..params }
    }

    #[test]
    fn empty_dataset_rejected() {
        let data = numeric_dataset(&[]);
        let labels = Labels::Regression(vec![]);
        let err = RandomForestTrainer::default().train(&data, &labels).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset));
    }

    #[test]
    fn zero_depth_rejected_before_work() {
        let data = numeric_dataset(&[1.0]);
        let labels = Labels::Regression(vec![1.0]);
        let trainer = RandomForestTrainer::new(quiet(RandomForestParams {
            max_depth: 0,
            ..Default::default()
        }));
        assert!(matches!(
            trainer.train(&data, &labels).unwrap_err(),
            Error::InvalidConfig(_)
        ));
    }

    #[test]
    fn label_row_mismatch_rejected() {
        let data = numeric_dataset(&[1.0, 2.0]);
        let labels = Labels::Regression(vec![1.0]);
        let trainer = RandomForestTrainer::new(quiet(RandomForestParams::default()));
        assert!(matches!(
            trainer.train(&data, &labels).unwrap_err(),
            Error::InvalidConfig(_)
        ));
    }

    #[test]
    fn out_of_range_class_rejected() {
        let data = numeric_dataset(&[1.0, 2.0]);
        let labels = Labels::Classification { classes: vec![0, 5], n_classes: 2 };
        let trainer = RandomForestTrainer::new(quiet(RandomForestParams::default()));
        assert!(matches!(
            trainer.train(&data, &labels).unwrap_err(),
            Error::InvalidConfig(_)
        ));
    }

    #[test]
    fn fixed_seed_reproduces_model_exactly() {
        let data = numeric_dataset(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let labels = Labels::Classification {
            classes: vec![0, 0, 0, 0, 1, 1, 1, 1],
            n_classes: 2,
        };
        let trainer = RandomForestTrainer::new(quiet(RandomForestParams {
            n_trees: 5,
            max_depth: 3,
            min_examples_per_leaf: 1,
            seed: 123,
            ..Default::default()
        }));
        let a = trainer.train(&data, &labels).unwrap();
        let b = trainer.train(&data, &labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sequential_and_parallel_growth_agree() {
        let data = numeric_dataset(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let labels = Labels::Regression(vec![1.0, 1.5, 2.0, 10.0, 10.5, 11.0]);
        let base = RandomForestParams {
            n_trees: 8,
            max_depth: 4,
            min_examples_per_leaf: 1,
            seed: 9,
            ..Default::default()
        };
        let sequential = RandomForestTrainer::new(quiet(RandomForestParams {
            n_threads: 1,
            ..base.clone()
        }));
        let parallel = RandomForestTrainer::new(quiet(RandomForestParams {
            n_threads: 0,
            ..base
        }));
        assert_eq!(
            sequential.train(&data, &labels).unwrap(),
            parallel.train(&data, &labels).unwrap()
        );
    }

    #[test]
    fn tree_order_is_insertion_order() {
        let data = numeric_dataset(&[1.0, 2.0, 3.0, 4.0]);
        let labels = Labels::Classification { classes: vec![0, 0, 1, 1], n_classes: 2 };
        let trainer = RandomForestTrainer::new(quiet(RandomForestParams {
            n_trees: 4,
            max_depth: 2,
            min_examples_per_leaf: 1,
            seed: 1,
            ..Default::default()
        }));
        let model = trainer.train(&data, &labels).unwrap();
        // Growing tree i alone must reproduce tree i of the full run.
        for i in 0..4 {
            let seed = derive_tree_seed(1, i);
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let rows = bootstrap_sample(data.n_rows(), &mut rng);
            let lone = TreeGrower::new(&data, &labels, 2, 1, 1, seed).grow(rows);
            assert_eq!(&lone, &model.trees()[i]);
        }
    }
}
