//! Column encoding: stable numeric ids for named, typed features.
//!
//! A [`ColumnEncoding`] is established once, before training, and is then
//! shared read-only by the trainer, the engine compiler and the batch
//! predictor. Internal ids are dense (0..n) and stable for the lifetime of
//! any engine compiled against the encoding.
//!
//! Categorical columns carry a closed vocabulary. Index 0 is reserved for
//! the out-of-vocabulary bucket: raw values never seen at encoding time map
//! to it instead of failing, so serving never rejects a novel category.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense internal feature id. Assigned in insertion order by the builder.
pub type FeatureId = u32;

/// Reserved vocabulary index for unseen / out-of-vocabulary categories.
pub const OOV_INDEX: u32 = 0;

/// Display token for the reserved out-of-vocabulary slot.
pub const OOV_TOKEN: &str = "<OOV>";

/// The type of a feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Floating-point value, split by threshold.
    Numerical,
    /// Closed-vocabulary string, split by subset membership.
    Categorical,
    /// True/false, split like a 0/1 numerical value.
    Boolean,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numerical => write!(f, "NUMERICAL"),
            Self::Categorical => write!(f, "CATEGORICAL"),
            Self::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

/// One named, typed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    name: String,
    kind: FeatureKind,
    /// Frozen vocabulary for categorical columns; index 0 is [`OOV_TOKEN`].
    /// Empty for numerical and boolean columns.
    vocabulary: Vec<String>,
}

impl ColumnSpec {
    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column kind.
    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    /// Vocabulary including the reserved index-0 slot. Empty unless categorical.
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }
}

/// Immutable name -> (kind, internal id, vocabulary) mapping.
///
/// Lookup maps are rebuilt from the column list on deserialization, so the
/// serialized form is exactly the column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ColumnSpec>", into = "Vec<ColumnSpec>")]
pub struct ColumnEncoding {
    columns: Vec<ColumnSpec>,
    by_name: HashMap<String, FeatureId>,
    /// Per-column category lookup; empty map for non-categorical columns.
    vocab_lookup: Vec<HashMap<String, u32>>,
}

impl From<Vec<ColumnSpec>> for ColumnEncoding {
    fn from(columns: Vec<ColumnSpec>) -> Self {
        let by_name = columns
            .iter()
            .enumerate()
            .map(|(id, c)| (c.name.clone(), id as FeatureId))
            .collect();
        let vocab_lookup = columns
            .iter()
            .map(|c| {
                c.vocabulary
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (v.clone(), i as u32))
                    .collect()
            })
            .collect();
        Self { columns, by_name, vocab_lookup }
    }
}

impl From<ColumnEncoding> for Vec<ColumnSpec> {
    fn from(encoding: ColumnEncoding) -> Self {
        encoding.columns
    }
}

impl ColumnEncoding {
    /// Number of columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the encoding has no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Resolve a feature name to its internal id.
    pub fn resolve(&self, name: &str) -> Result<FeatureId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownFeature { name: name.to_string() })
    }

    /// Get the spec for an internal id.
    pub fn spec(&self, feature: FeatureId) -> Result<&ColumnSpec> {
        self.columns
            .get(feature as usize)
            .ok_or(Error::IndexOutOfRange {
                what: "feature",
                index: feature as usize,
                limit: self.columns.len(),
            })
    }

    /// Kind of the column at `feature`.
    pub fn kind(&self, feature: FeatureId) -> Result<FeatureKind> {
        self.spec(feature).map(|c| c.kind)
    }

    /// Vocabulary size of a categorical column, including the reserved
    /// index-0 slot. Zero for non-categorical columns.
    pub fn vocabulary_size(&self, feature: FeatureId) -> Result<usize> {
        self.spec(feature).map(|c| c.vocabulary.len())
    }

    /// Encode a raw categorical value to its vocabulary index.
    ///
    /// Unseen values map to [`OOV_INDEX`] rather than failing; the
    /// vocabulary never grows after construction.
    pub fn encode_category(&self, feature: FeatureId, raw: &str) -> Result<u32> {
        let spec = self.spec(feature)?;
        if spec.kind != FeatureKind::Categorical {
            return Err(Error::TypeMismatch {
                feature: spec.name.clone(),
                expected: FeatureKind::Categorical,
                got: spec.kind,
            });
        }
        Ok(self.vocab_lookup[feature as usize]
            .get(raw)
            .copied()
            .unwrap_or(OOV_INDEX))
    }

    /// Decode a vocabulary index back to its raw value.
    pub fn decode_category(&self, feature: FeatureId, index: u32) -> Result<&str> {
        let spec = self.spec(feature)?;
        if spec.kind != FeatureKind::Categorical {
            return Err(Error::TypeMismatch {
                feature: spec.name.clone(),
                expected: FeatureKind::Categorical,
                got: spec.kind,
            });
        }
        spec.vocabulary
            .get(index as usize)
            .map(String::as_str)
            .ok_or(Error::IndexOutOfRange {
                what: "category",
                index: index as usize,
                limit: spec.vocabulary.len(),
            })
    }

    /// Iterate over `(id, spec)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &ColumnSpec)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(id, c)| (id as FeatureId, c))
    }
}

// ============================================================================
// ColumnEncodingBuilder
// ============================================================================

/// Builder for [`ColumnEncoding`]. Ids are assigned in call order.
#[derive(Debug, Default)]
pub struct ColumnEncodingBuilder {
    columns: Vec<ColumnSpec>,
}

impl ColumnEncodingBuilder {
    /// Start an empty encoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a numerical column.
    pub fn numerical(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            kind: FeatureKind::Numerical,
            vocabulary: Vec::new(),
        });
        self
    }

    /// Add a boolean column.
    pub fn boolean(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            kind: FeatureKind::Boolean,
            vocabulary: Vec::new(),
        });
        self
    }

    /// Add a categorical column with the given observed vocabulary.
    ///
    /// The reserved [`OOV_TOKEN`] is prepended at index 0; observed values
    /// get indices 1..=n in the given order.
    pub fn categorical<I, S>(mut self, name: impl Into<String>, vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut full = vec![OOV_TOKEN.to_string()];
        full.extend(vocabulary.into_iter().map(Into::into));
        self.columns.push(ColumnSpec {
            name: name.into(),
            kind: FeatureKind::Categorical,
            vocabulary: full,
        });
        self
    }

    /// Freeze into an immutable encoding.
    ///
    /// Fails with [`Error::InvalidConfig`] on duplicate column names or
    /// duplicate vocabulary entries within a column.
    pub fn build(self) -> Result<ColumnEncoding> {
        let mut seen = HashMap::new();
        for (id, col) in self.columns.iter().enumerate() {
            if let Some(prev) = seen.insert(col.name.clone(), id) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate column name {:?} (ids {} and {})",
                    col.name, prev, id
                )));
            }
            let mut vocab_seen = HashMap::new();
            for (i, v) in col.vocabulary.iter().enumerate() {
                if vocab_seen.insert(v.clone(), i).is_some() {
                    return Err(Error::InvalidConfig(format!(
                        "duplicate category {:?} in column {:?}",
                        v, col.name
                    )));
                }
            }
        }
        Ok(ColumnEncoding::from(self.columns))
    }
}
