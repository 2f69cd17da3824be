//! Fixed-capacity example batch buffer for serving.
//!
//! Typed columnar storage for `capacity` examples with one missing bitmap
//! per feature. Setters mutate in place; prediction reads the buffer
//! immutably, so a populated batch may be read from several threads at
//! once, but concurrent writes need external synchronization.

use std::sync::Arc;

use fixedbitset::FixedBitSet;

use crate::dataset::{ColumnEncoding, FeatureId, FeatureKind, RowAccessor};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum BatchValues {
    Numerical(Vec<f32>),
    Categorical(Vec<u32>),
    Boolean(Vec<bool>),
}

#[derive(Debug, Clone)]
struct BatchColumn {
    values: BatchValues,
    missing: FixedBitSet,
}

impl BatchColumn {
    fn new(kind: FeatureKind, capacity: usize) -> Self {
        let values = match kind {
            FeatureKind::Numerical => BatchValues::Numerical(vec![f32::NAN; capacity]),
            FeatureKind::Categorical => {
                BatchValues::Categorical(vec![crate::dataset::OOV_INDEX; capacity])
            }
            FeatureKind::Boolean => BatchValues::Boolean(vec![false; capacity]),
        };
        let mut missing = FixedBitSet::with_capacity(capacity);
        missing.insert_range(..);
        Self { values, missing }
    }
}

/// Mutable batch of examples bound to a column encoding.
///
/// Freshly allocated batches have every cell missing; use the setters to
/// populate cells, or [`ExampleBatch::fill_missing`] to reset.
#[derive(Debug, Clone)]
pub struct ExampleBatch {
    encoding: Arc<ColumnEncoding>,
    capacity: usize,
    columns: Vec<BatchColumn>,
}

impl ExampleBatch {
    /// Allocate a batch for `capacity` examples (zero is valid).
    pub fn with_capacity(encoding: Arc<ColumnEncoding>, capacity: usize) -> Self {
        let columns = encoding
            .iter()
            .map(|(_, spec)| BatchColumn::new(spec.kind(), capacity))
            .collect();
        Self { encoding, capacity, columns }
    }

    /// Number of example slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The encoding this batch was allocated for.
    #[inline]
    pub fn encoding(&self) -> &Arc<ColumnEncoding> {
        &self.encoding
    }

    /// Reset every cell to missing. Idempotent.
    pub fn fill_missing(&mut self) {
        for column in &mut self.columns {
            column.missing.insert_range(..);
        }
    }

    /// True if the cell is currently missing.
    pub fn is_missing(&self, example: usize, feature: FeatureId) -> Result<bool> {
        self.check_example(example)?;
        let column = self.column(feature)?;
        Ok(column.missing.contains(example))
    }

    /// Set a numerical cell.
    pub fn set_numerical(&mut self, example: usize, feature: FeatureId, value: f32) -> Result<()> {
        self.check_example(example)?;
        self.check_kind(feature, FeatureKind::Numerical)?;
        let column = &mut self.columns[feature as usize];
        match &mut column.values {
            BatchValues::Numerical(v) => v[example] = value,
            _ => unreachable!("kind checked above"),
        }
        column.missing.set(example, false);
        Ok(())
    }

    /// Set a boolean cell.
    pub fn set_boolean(&mut self, example: usize, feature: FeatureId, value: bool) -> Result<()> {
        self.check_example(example)?;
        self.check_kind(feature, FeatureKind::Boolean)?;
        let column = &mut self.columns[feature as usize];
        match &mut column.values {
            BatchValues::Boolean(v) => v[example] = value,
            _ => unreachable!("kind checked above"),
        }
        column.missing.set(example, false);
        Ok(())
    }

    /// Set a categorical cell from its raw string value. Unseen values
    /// encode to the reserved out-of-vocabulary index and never fail.
    pub fn set_categorical(&mut self, example: usize, feature: FeatureId, raw: &str) -> Result<()> {
        self.check_example(example)?;
        let index = self.encoding.encode_category(feature, raw)?;
        self.set_categorical_index(example, feature, index)
    }

    /// Set a categorical cell from an already-encoded vocabulary index.
    pub fn set_categorical_index(
        &mut self,
        example: usize,
        feature: FeatureId,
        index: u32,
    ) -> Result<()> {
        self.check_example(example)?;
        self.check_kind(feature, FeatureKind::Categorical)?;
        let vocab = self.encoding.vocabulary_size(feature)?;
        if index as usize >= vocab {
            return Err(Error::IndexOutOfRange {
                what: "category",
                index: index as usize,
                limit: vocab,
            });
        }
        let column = &mut self.columns[feature as usize];
        match &mut column.values {
            BatchValues::Categorical(v) => v[example] = index,
            _ => unreachable!("kind checked above"),
        }
        column.missing.set(example, false);
        Ok(())
    }

    fn check_example(&self, example: usize) -> Result<()> {
        if example >= self.capacity {
            return Err(Error::IndexOutOfRange {
                what: "example",
                index: example,
                limit: self.capacity,
            });
        }
        Ok(())
    }

    fn column(&self, feature: FeatureId) -> Result<&BatchColumn> {
        self.columns
            .get(feature as usize)
            .ok_or(Error::IndexOutOfRange {
                what: "feature",
                index: feature as usize,
                limit: self.columns.len(),
            })
    }

    fn check_kind(&self, feature: FeatureId, expected: FeatureKind) -> Result<()> {
        self.column(feature)?;
        let spec = self.encoding.spec(feature)?;
        if spec.kind() != expected {
            return Err(Error::TypeMismatch {
                feature: spec.name().to_string(),
                expected,
                got: spec.kind(),
            });
        }
        Ok(())
    }
}

impl RowAccessor for ExampleBatch {
    fn n_rows(&self) -> usize {
        self.capacity
    }

    fn numerical(&self, row: usize, feature: FeatureId) -> Option<f32> {
        let column = &self.columns[feature as usize];
        if column.missing.contains(row) {
            return None;
        }
        match &column.values {
            BatchValues::Numerical(v) => Some(v[row]),
            BatchValues::Boolean(v) => Some(if v[row] { 1.0 } else { 0.0 }),
            BatchValues::Categorical(_) => None,
        }
    }

    fn category(&self, row: usize, feature: FeatureId) -> Option<u32> {
        let column = &self.columns[feature as usize];
        if column.missing.contains(row) {
            return None;
        }
        match &column.values {
            BatchValues::Categorical(v) => Some(v[row]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnEncodingBuilder;

    fn encoding() -> Arc<ColumnEncoding> {
        Arc::new(
            ColumnEncodingBuilder::new()
                .numerical("age")
                .categorical("education", ["HS-grad", "Bachelors"])
                .boolean("retired")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn fresh_batch_is_all_missing() {
        let batch = ExampleBatch::with_capacity(encoding(), 3);
        assert_eq!(batch.capacity(), 3);
        for example in 0..3 {
            for feature in 0..3 {
                assert!(batch.is_missing(example, feature).unwrap());
            }
        }
    }

    #[test]
    fn zero_capacity_batch_is_valid() {
        let batch = ExampleBatch::with_capacity(encoding(), 0);
        assert_eq!(batch.capacity(), 0);
        assert!(matches!(
            batch.is_missing(0, 0).unwrap_err(),
            Error::IndexOutOfRange { what: "example", .. }
        ));
    }

    #[test]
    fn setters_clear_missing_bit() {
        let mut batch = ExampleBatch::with_capacity(encoding(), 2);
        batch.set_numerical(0, 0, 35.0).unwrap();
        batch.set_categorical(0, 1, "HS-grad").unwrap();
        batch.set_boolean(0, 2, true).unwrap();

        assert_eq!(batch.numerical(0, 0), Some(35.0));
        assert_eq!(batch.category(0, 1), Some(1));
        assert_eq!(batch.numerical(0, 2), Some(1.0));
        // Example 1 untouched.
        assert!(batch.is_missing(1, 0).unwrap());
    }

    #[test]
    fn fill_missing_resets_and_is_idempotent() {
        let mut batch = ExampleBatch::with_capacity(encoding(), 2);
        batch.set_numerical(1, 0, 1.0).unwrap();
        batch.fill_missing();
        assert!(batch.is_missing(1, 0).unwrap());
        batch.fill_missing();
        assert!(batch.is_missing(1, 0).unwrap());
    }

    #[test]
    fn unseen_category_encodes_to_reserved_index() {
        let mut batch = ExampleBatch::with_capacity(encoding(), 1);
        batch.set_categorical(0, 1, "Doctorate").unwrap();
        assert_eq!(batch.category(0, 1), Some(crate::dataset::OOV_INDEX));
    }

    #[test]
    fn type_mismatch_on_wrong_setter() {
        let mut batch = ExampleBatch::with_capacity(encoding(), 1);
        assert!(matches!(
            batch.set_numerical(0, 1, 1.0).unwrap_err(),
            Error::TypeMismatch { .. }
        ));
        assert!(matches!(
            batch.set_categorical(0, 0, "x").unwrap_err(),
            Error::TypeMismatch { .. }
        ));
        assert!(matches!(
            batch.set_boolean(0, 0, true).unwrap_err(),
            Error::TypeMismatch { .. }
        ));
    }

    #[test]
    fn out_of_range_example_and_feature_rejected() {
        let mut batch = ExampleBatch::with_capacity(encoding(), 1);
        assert!(matches!(
            batch.set_numerical(5, 0, 1.0).unwrap_err(),
            Error::IndexOutOfRange { what: "example", .. }
        ));
        assert!(matches!(
            batch.set_numerical(0, 9, 1.0).unwrap_err(),
            Error::IndexOutOfRange { what: "feature", .. }
        ));
        assert!(matches!(
            batch.set_categorical_index(0, 1, 99).unwrap_err(),
            Error::IndexOutOfRange { what: "category", .. }
        ));
    }
}
