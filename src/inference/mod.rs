//! Compiled serving engine.
//!
//! - [`compile`]: validate a model against a target encoding and flatten it.
//! - [`CompiledEngine`]: the immutable serving artifact.
//! - [`ExampleBatch`]: reusable fixed-capacity input buffer.
//! - `predict`: sequential and parallel batch prediction.

mod compile;
mod engine;
mod examples;
mod predict;

pub use compile::compile;
pub use engine::{CompiledEngine, CompiledTree, FeatureSet, SplitKind};
pub use examples::ExampleBatch;
