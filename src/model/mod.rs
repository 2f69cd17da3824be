//! Immutable tree and ensemble model produced by training.
//!
//! The model is the canonical representation: a reference traversal and
//! aggregation live here, and the compiled engine in
//! [`crate::inference`] must match them exactly.

mod forest;
mod tree;

pub use forest::{RandomForestModel, Task};
pub use tree::{
    CategorySet, LeafOutput, Node, NodeIndex, SplitCondition, Tree, TreeValidationError,
};

pub(crate) use forest::argmax;
