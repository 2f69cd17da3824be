//! Random-forest training and a compiled, latency-optimized batch
//! prediction engine.
//!
//! The pipeline has three stages:
//!
//! 1. **Encode**: describe the columns once with a [`ColumnEncoding`] and
//!    load training data into an [`EncodedDataset`].
//! 2. **Train**: [`RandomForestTrainer`] grows a bagged ensemble of
//!    decision trees into an immutable [`RandomForestModel`]. Training is
//!    deterministic for a fixed seed, including under parallel growth.
//! 3. **Serve**: [`compile`] flattens the model into a [`CompiledEngine`]
//!    bound to a target encoding; [`ExampleBatch`] buffers are filled per
//!    request and predicted in bulk.
//!
//! ```ignore
//! let encoding = Arc::new(
//!     ColumnEncodingBuilder::new()
//!         .numerical("age")
//!         .categorical("education", ["HS-grad", "Bachelors"])
//!         .build()?,
//! );
//! let model = RandomForestTrainer::new(params).train(&dataset, &labels)?;
//! let engine = compile(&model, Arc::clone(&encoding))?;
//!
//! let mut batch = engine.allocate_examples(2);
//! batch.set_numerical(0, engine.features().numerical("age")?, 35.0)?;
//! batch.fill_missing(); // or populate every cell
//! let mut predictions = Vec::new();
//! engine.predict_into(&batch, 2, &mut predictions)?;
//! ```

pub mod dataset;
pub mod error;
pub mod inference;
pub mod model;
pub mod training;

pub use dataset::{
    ColumnEncoding, ColumnEncodingBuilder, ColumnSpec, EncodedDataset, EncodedDatasetBuilder,
    FeatureId, FeatureKind, Labels, RawValue, RowAccessor,
};
pub use error::{Error, Result};
pub use inference::{compile, CompiledEngine, ExampleBatch, FeatureSet};
pub use model::{RandomForestModel, Task, Tree};
pub use training::{RandomForestParams, RandomForestTrainer, Verbosity};
