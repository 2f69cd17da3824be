//! Model-to-engine compilation.
//!
//! `compile` validates a trained model against a target column encoding and
//! flattens every tree into the engine's structure-of-arrays layout. It is
//! a pure function: identical inputs always produce identical engines,
//! which callers rely on for caching and serialization round-trips.

use std::sync::Arc;

use crate::dataset::{ColumnEncoding, FeatureKind};
use crate::error::{Error, Result};
use crate::model::{LeafOutput, Node, RandomForestModel, SplitCondition, Task, Tree};

use super::engine::{CategoriesStorage, CompiledEngine, CompiledTree, SplitKind};

/// Compile a trained model for serving against `target` encoding.
///
/// Every feature referenced by a split must resolve in `target` by name,
/// with the same kind and (for categorical columns) a vocabulary at least
/// as large as the training one; otherwise compilation fails with
/// [`Error::IncompatibleEncoding`]. A model without trees fails with
/// [`Error::NotTrained`].
pub fn compile(model: &RandomForestModel, target: Arc<ColumnEncoding>) -> Result<CompiledEngine> {
    if model.n_trees() == 0 {
        return Err(Error::NotTrained);
    }

    let remap = build_remap(model.encoding(), &target);
    for tree in model.trees() {
        for node in tree.nodes() {
            if let Node::Split { feature, .. } = node {
                if remap[*feature as usize] == u32::MAX {
                    return Err(remap_failure(model.encoding(), &target, *feature));
                }
            }
        }
    }

    let n_outputs = match model.task() {
        Task::Classification => model.n_classes(),
        Task::Regression => 1,
    };
    let trees = model
        .trees()
        .iter()
        .map(|tree| flatten_tree(tree, &remap, n_outputs))
        .collect();

    Ok(CompiledEngine {
        trees,
        task: model.task(),
        n_outputs,
        feature_remap: remap,
        encoding: target,
    })
}

/// Map each training-encoding id to its target-encoding id by name, keeping
/// `u32::MAX` where the target has no compatible column. Only ids actually
/// referenced by splits must map; the caller checks that.
fn build_remap(training: &ColumnEncoding, target: &ColumnEncoding) -> Vec<u32> {
    training
        .iter()
        .map(|(id, spec)| {
            let Ok(target_id) = target.resolve(spec.name()) else {
                return u32::MAX;
            };
            let compatible = match (spec.kind(), target.kind(target_id)) {
                (kind, Ok(target_kind)) if kind != target_kind => false,
                (FeatureKind::Categorical, _) => {
                    target.vocabulary_size(target_id).unwrap_or(0)
                        >= training.vocabulary_size(id).unwrap_or(0)
                }
                _ => true,
            };
            if compatible {
                target_id
            } else {
                u32::MAX
            }
        })
        .collect()
}

/// Diagnose why a referenced feature failed to remap.
fn remap_failure(
    training: &ColumnEncoding,
    target: &ColumnEncoding,
    feature: u32,
) -> Error {
    let spec = match training.spec(feature) {
        Ok(spec) => spec,
        Err(e) => return e,
    };
    match target.resolve(spec.name()) {
        Err(_) => Error::IncompatibleEncoding(format!(
            "feature {:?} referenced by the model is absent from the target encoding",
            spec.name()
        )),
        Ok(target_id) => match target.kind(target_id) {
            Ok(kind) if kind != spec.kind() => Error::IncompatibleEncoding(format!(
                "feature {:?} is {} in the model but {} in the target encoding",
                spec.name(),
                spec.kind(),
                kind
            )),
            _ => Error::IncompatibleEncoding(format!(
                "feature {:?}: target vocabulary is smaller than the training vocabulary",
                spec.name()
            )),
        },
    }
}

/// Flatten one tree into preorder structure-of-arrays storage.
fn flatten_tree(tree: &Tree, remap: &[u32], n_outputs: usize) -> CompiledTree {
    let n = tree.n_nodes();

    // Depth-first preorder: a node's left subtree immediately follows it.
    let mut order = Vec::with_capacity(n);
    let mut stack = vec![0u32];
    while let Some(old) = stack.pop() {
        order.push(old);
        if let Node::Split { left, right, .. } = tree.node(old) {
            stack.push(*right);
            stack.push(*left);
        }
    }
    let mut new_index = vec![0u32; n];
    for (new, &old) in order.iter().enumerate() {
        new_index[old as usize] = new as u32;
    }

    let mut split_features = vec![0u32; n];
    let mut thresholds = vec![0.0f32; n];
    let mut left_children = vec![0u32; n];
    let mut right_children = vec![0u32; n];
    let mut missing_left = vec![false; n];
    let mut is_leaf = vec![false; n];
    let mut split_kinds = vec![SplitKind::Numeric; n];
    let mut leaf_offsets = vec![0u32; n];
    let mut leaf_values = Vec::new();
    let mut category_words = Vec::new();
    let mut category_segments = vec![(0u32, 0u32); n];

    for (new, &old) in order.iter().enumerate() {
        match tree.node(old) {
            Node::Leaf { output, .. } => {
                is_leaf[new] = true;
                leaf_offsets[new] = leaf_values.len() as u32;
                match output {
                    LeafOutput::Distribution(probs) => {
                        debug_assert_eq!(probs.len(), n_outputs);
                        leaf_values.extend_from_slice(probs);
                    }
                    LeafOutput::Scalar(v) => leaf_values.push(*v),
                }
            }
            Node::Split { feature, condition, missing_left: ml, left, right } => {
                split_features[new] = remap[*feature as usize];
                left_children[new] = new_index[*left as usize];
                right_children[new] = new_index[*right as usize];
                missing_left[new] = *ml;
                match condition {
                    SplitCondition::Threshold(t) => thresholds[new] = *t,
                    SplitCondition::Categories(set) => {
                        split_kinds[new] = SplitKind::Categorical;
                        let start = category_words.len() as u32;
                        category_words.extend_from_slice(set.words());
                        category_segments[new] = (start, set.words().len() as u32);
                    }
                }
            }
        }
    }

    let categories = if category_words.is_empty() {
        CategoriesStorage::empty()
    } else {
        CategoriesStorage::new(category_words, category_segments)
    };

    CompiledTree::new(
        split_features,
        thresholds,
        left_children,
        right_children,
        missing_left,
        is_leaf,
        split_kinds,
        leaf_offsets,
        leaf_values,
        categories,
        n_outputs as u32,
    )
}
