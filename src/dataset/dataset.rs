//! Columnar encoded dataset with per-column missing bitmaps.
//!
//! The dataset is owned by the caller and only read by the trainer. Cells
//! are stored column-major, indexed by the encoding's internal ids, with one
//! missing bitmap per column.

use std::sync::Arc;

use fixedbitset::FixedBitSet;

use super::encoding::{ColumnEncoding, FeatureId, FeatureKind};
use super::traits::RowAccessor;
use crate::error::{Error, Result};

/// Typed storage for one column.
#[derive(Debug, Clone)]
pub(crate) enum ColumnValues {
    Numerical(Vec<f32>),
    Categorical(Vec<u32>),
    Boolean(Vec<bool>),
}

#[derive(Debug, Clone)]
pub(crate) struct Column {
    values: ColumnValues,
    missing: FixedBitSet,
}

impl Column {
    fn new(kind: FeatureKind) -> Self {
        let values = match kind {
            FeatureKind::Numerical => ColumnValues::Numerical(Vec::new()),
            FeatureKind::Categorical => ColumnValues::Categorical(Vec::new()),
            FeatureKind::Boolean => ColumnValues::Boolean(Vec::new()),
        };
        Self { values, missing: FixedBitSet::new() }
    }
}

/// One raw cell value when assembling a dataset row by row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
    /// Missing cell.
    Missing,
    /// Value for a numerical column.
    Numerical(f32),
    /// Raw string for a categorical column; unseen strings encode to the
    /// reserved out-of-vocabulary index.
    Categorical(&'a str),
    /// Value for a boolean column.
    Boolean(bool),
}

/// Training labels, one entry per dataset row.
#[derive(Debug, Clone, PartialEq)]
pub enum Labels {
    /// Class indices in `0..n_classes`.
    Classification { classes: Vec<u32>, n_classes: usize },
    /// Scalar regression targets.
    Regression(Vec<f32>),
}

impl Labels {
    /// Number of labeled rows.
    pub fn len(&self) -> usize {
        match self {
            Self::Classification { classes, .. } => classes.len(),
            Self::Regression(values) => values.len(),
        }
    }

    /// True when there are no labels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable columnar dataset bound to a [`ColumnEncoding`].
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    encoding: Arc<ColumnEncoding>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl EncodedDataset {
    /// The encoding the dataset was built against.
    #[inline]
    pub fn encoding(&self) -> &Arc<ColumnEncoding> {
        &self.encoding
    }

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of feature columns.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// True if the cell is missing.
    #[inline]
    pub fn is_missing(&self, row: usize, feature: FeatureId) -> bool {
        self.columns[feature as usize].missing.contains(row)
    }
}

impl RowAccessor for EncodedDataset {
    fn n_rows(&self) -> usize {
        self.n_rows
    }

    fn numerical(&self, row: usize, feature: FeatureId) -> Option<f32> {
        let col = &self.columns[feature as usize];
        if col.missing.contains(row) {
            return None;
        }
        match &col.values {
            ColumnValues::Numerical(v) => Some(v[row]),
            ColumnValues::Boolean(v) => Some(if v[row] { 1.0 } else { 0.0 }),
            ColumnValues::Categorical(_) => None,
        }
    }

    fn category(&self, row: usize, feature: FeatureId) -> Option<u32> {
        let col = &self.columns[feature as usize];
        if col.missing.contains(row) {
            return None;
        }
        match &col.values {
            ColumnValues::Categorical(v) => Some(v[row]),
            _ => None,
        }
    }
}

// ============================================================================
// EncodedDatasetBuilder
// ============================================================================

/// Row-by-row assembly of an [`EncodedDataset`].
#[derive(Debug)]
pub struct EncodedDatasetBuilder {
    encoding: Arc<ColumnEncoding>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl EncodedDatasetBuilder {
    /// Start an empty dataset for the given encoding.
    pub fn new(encoding: Arc<ColumnEncoding>) -> Self {
        let columns = encoding
            .iter()
            .map(|(_, spec)| Column::new(spec.kind()))
            .collect();
        Self { encoding, columns, n_rows: 0 }
    }

    /// Append one row. `values` must have one entry per encoded column, in
    /// id order; kind mismatches fail with [`Error::TypeMismatch`].
    pub fn push_row(&mut self, values: &[RawValue<'_>]) -> Result<()> {
        if values.len() != self.encoding.len() {
            return Err(Error::InvalidConfig(format!(
                "row has {} values, encoding has {} columns",
                values.len(),
                self.encoding.len()
            )));
        }
        // Validate the whole row before touching storage so a failed push
        // leaves the builder unchanged.
        for (id, value) in values.iter().enumerate() {
            let spec = self.encoding.spec(id as FeatureId)?;
            let got = match value {
                RawValue::Missing => continue,
                RawValue::Numerical(_) => FeatureKind::Numerical,
                RawValue::Categorical(_) => FeatureKind::Categorical,
                RawValue::Boolean(_) => FeatureKind::Boolean,
            };
            if got != spec.kind() {
                return Err(Error::TypeMismatch {
                    feature: spec.name().to_string(),
                    expected: spec.kind(),
                    got,
                });
            }
        }

        let row = self.n_rows;
        for (id, value) in values.iter().enumerate() {
            let col = &mut self.columns[id];
            col.missing.grow(row + 1);
            match (value, &mut col.values) {
                (RawValue::Missing, values) => {
                    col.missing.insert(row);
                    match values {
                        ColumnValues::Numerical(v) => v.push(f32::NAN),
                        ColumnValues::Categorical(v) => v.push(super::OOV_INDEX),
                        ColumnValues::Boolean(v) => v.push(false),
                    }
                }
                (RawValue::Numerical(x), ColumnValues::Numerical(v)) => v.push(*x),
                (RawValue::Boolean(b), ColumnValues::Boolean(v)) => v.push(*b),
                (RawValue::Categorical(raw), ColumnValues::Categorical(v)) => {
                    v.push(self.encoding.encode_category(id as FeatureId, raw)?);
                }
                _ => unreachable!("kinds validated above"),
            }
        }
        self.n_rows += 1;
        Ok(())
    }

    /// Finish and freeze the dataset.
    pub fn build(self) -> EncodedDataset {
        EncodedDataset {
            encoding: self.encoding,
            columns: self.columns,
            n_rows: self.n_rows,
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
                .numerical("x")
                .categorical("color", ["red", "green"])
                .boolean("flag")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn push_rows_and_read_back() {
        let enc = encoding();
        let mut builder = EncodedDatasetBuilder::new(enc);
        builder
            .push_row(&[
                RawValue::Numerical(1.5),
                RawValue::Categorical("green"),
                RawValue::Boolean(true),
            ])
            .unwrap();
        builder
            .push_row(&[RawValue::Missing, RawValue::Categorical("blue"), RawValue::Missing])
            .unwrap();
        let data = builder.build();

        assert_eq!(data.n_rows(), 2);
        assert_eq!(data.numerical(0, 0), Some(1.5));
        assert_eq!(data.category(0, 1), Some(2));
        assert_eq!(data.numerical(0, 2), Some(1.0));
        // Missing cells read as None; unseen category encodes to index 0.
        assert_eq!(data.numerical(1, 0), None);
        assert!(data.is_missing(1, 0));
        assert_eq!(data.category(1, 1), Some(crate::dataset::OOV_INDEX));
        assert_eq!(data.numerical(1, 2), None);
    }

    #[test]
    fn wrong_arity_rejected() {
        let mut builder = EncodedDatasetBuilder::new(encoding());
        let err = builder.push_row(&[RawValue::Numerical(1.0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn kind_mismatch_rejected_without_partial_write() {
        let mut builder = EncodedDatasetBuilder::new(encoding());
        let err = builder
            .push_row(&[
                RawValue::Numerical(1.0),
                RawValue::Numerical(2.0),
                RawValue::Boolean(false),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert_eq!(builder.build().n_rows(), 0);
    }

    #[test]
    fn categorical_cell_has_no_numerical_view() {
        let enc = encoding();
        let mut builder = EncodedDatasetBuilder::new(enc);
        builder
            .push_row(&[
                RawValue::Numerical(0.0),
                RawValue::Categorical("red"),
                RawValue::Boolean(false),
            ])
            .unwrap();
        let data = builder.build();
        assert_eq!(data.numerical(0, 1), None);
        assert_eq!(data.category(0, 0), None);
    }
}
