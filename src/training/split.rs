//! Split search under impurity criteria.
//!
//! For each candidate feature the search enumerates a finite set of split
//! points: midpoints between sorted distinct values for numerical (and
//! boolean) columns, and prefixes of a statistic-ordered category list for
//! categorical columns. Examples missing the candidate feature are routed to
//! whichever child yields the higher impurity reduction; that direction is
//! frozen into the emitted split.
//!
//! Ties in reduction break by lowest feature id, then lowest split-point
//! ordinal, so the winner is independent of evaluation order.

use std::cmp::Ordering;

use crate::dataset::{EncodedDataset, FeatureId, FeatureKind, Labels, RowAccessor};
use crate::model::{CategorySet, SplitCondition};

/// Label statistics of an example set, sufficient for impurity computation.
///
/// Accumulates in `f64` so reductions compare deterministically for a given
/// summation order.
#[derive(Debug, Clone)]
pub(crate) enum LabelStats {
    Classification { counts: Vec<f64>, total: f64 },
    Regression { sum: f64, sum_sq: f64, count: f64 },
}

impl LabelStats {
    pub fn empty(labels: &Labels) -> Self {
        match labels {
            Labels::Classification { n_classes, .. } => Self::Classification {
                counts: vec![0.0; *n_classes],
                total: 0.0,
            },
            Labels::Regression(_) => Self::Regression { sum: 0.0, sum_sq: 0.0, count: 0.0 },
        }
    }

    pub fn from_rows(labels: &Labels, rows: &[u32]) -> Self {
        let mut stats = Self::empty(labels);
        for &row in rows {
            stats.add(labels, row);
        }
        stats
    }

    pub fn add(&mut self, labels: &Labels, row: u32) {
        match (self, labels) {
            (Self::Classification { counts, total }, Labels::Classification { classes, .. }) => {
                counts[classes[row as usize] as usize] += 1.0;
                *total += 1.0;
            }
            (Self::Regression { sum, sum_sq, count }, Labels::Regression(values)) => {
                let v = f64::from(values[row as usize]);
                *sum += v;
                *sum_sq += v * v;
                *count += 1.0;
            }
            _ => unreachable!("stats kind matches label kind"),
        }
    }

    pub fn sub(&mut self, labels: &Labels, row: u32) {
        match (self, labels) {
            (Self::Classification { counts, total }, Labels::Classification { classes, .. }) => {
                counts[classes[row as usize] as usize] -= 1.0;
                *total -= 1.0;
            }
            (Self::Regression { sum, sum_sq, count }, Labels::Regression(values)) => {
                let v = f64::from(values[row as usize]);
                *sum -= v;
                *sum_sq -= v * v;
                *count -= 1.0;
            }
            _ => unreachable!("stats kind matches label kind"),
        }
    }

    /// Fold another stats value into this one.
    pub fn merge(&mut self, other: &Self) {
        match (self, other) {
            (
                Self::Classification { counts, total },
                Self::Classification { counts: oc, total: ot },
            ) => {
                for (a, b) in counts.iter_mut().zip(oc) {
                    *a += b;
                }
                *total += ot;
            }
            (
                Self::Regression { sum, sum_sq, count },
                Self::Regression { sum: os, sum_sq: osq, count: oc },
            ) => {
                *sum += os;
                *sum_sq += osq;
                *count += oc;
            }
            _ => unreachable!("stats kinds match"),
        }
    }

    /// Remove another stats value from this one.
    pub fn subtract(&mut self, other: &Self) {
        match (self, other) {
            (
                Self::Classification { counts, total },
                Self::Classification { counts: oc, total: ot },
            ) => {
                for (a, b) in counts.iter_mut().zip(oc) {
                    *a -= b;
                }
                *total -= ot;
            }
            (
                Self::Regression { sum, sum_sq, count },
                Self::Regression { sum: os, sum_sq: osq, count: oc },
            ) => {
                *sum -= os;
                *sum_sq -= osq;
                *count -= oc;
            }
            _ => unreachable!("stats kinds match"),
        }
    }

    #[inline]
    pub fn count(&self) -> f64 {
        match self {
            Self::Classification { total, .. } => *total,
            Self::Regression { count, .. } => *count,
        }
    }

    /// Gini impurity (classification) or variance (regression). Zero for
    /// empty sets.
    pub fn impurity(&self) -> f64 {
        match self {
            Self::Classification { counts, total } => {
                if *total <= 0.0 {
                    return 0.0;
                }
                let sum_sq: f64 = counts.iter().map(|c| c * c).sum();
                1.0 - sum_sq / (total * total)
            }
            Self::Regression { sum, sum_sq, count } => {
                if *count <= 0.0 {
                    return 0.0;
                }
                let mean = sum / count;
                (sum_sq / count - mean * mean).max(0.0)
            }
        }
    }

    /// Impurity and count of the union with `other`, without allocating.
    pub fn merged_impurity(&self, other: &Self) -> (f64, f64) {
        match (self, other) {
            (
                Self::Classification { counts, total },
                Self::Classification { counts: oc, total: ot },
            ) => {
                let total = total + ot;
                if total <= 0.0 {
                    return (0.0, 0.0);
                }
                let sum_sq: f64 = counts.iter().zip(oc).map(|(a, b)| (a + b) * (a + b)).sum();
                (1.0 - sum_sq / (total * total), total)
            }
            (
                Self::Regression { sum, sum_sq, count },
                Self::Regression { sum: os, sum_sq: osq, count: oc },
            ) => {
                let count = count + oc;
                if count <= 0.0 {
                    return (0.0, 0.0);
                }
                let sum = sum + os;
                let mean = sum / count;
                (((sum_sq + osq) / count - mean * mean).max(0.0), count)
            }
            _ => unreachable!("stats kinds match"),
        }
    }

    /// True when all examples share one label (or the set is trivial).
    pub fn is_pure(&self) -> bool {
        match self {
            Self::Classification { counts, total } => {
                *total <= 1.0 || counts.iter().any(|c| *c == *total)
            }
            Self::Regression { .. } => self.count() <= 1.0 || self.impurity() <= 0.0,
        }
    }

    /// Most frequent class (lowest index on ties); `None` for regression.
    pub fn majority_class(&self) -> Option<usize> {
        match self {
            Self::Classification { counts, .. } => {
                let mut best = 0;
                for (i, &c) in counts.iter().enumerate().skip(1) {
                    if c > counts[best] {
                        best = i;
                    }
                }
                Some(best)
            }
            Self::Regression { .. } => None,
        }
    }

    /// Per-category ordering statistic: fraction of `anchor_class` examples
    /// for classification, mean label for regression.
    fn ordering_statistic(&self, anchor_class: Option<usize>) -> f64 {
        match self {
            Self::Classification { counts, total } => {
                let anchor = anchor_class.expect("anchor class set for classification");
                if *total <= 0.0 {
                    0.0
                } else {
                    counts[anchor] / total
                }
            }
            Self::Regression { sum, count, .. } => {
                if *count <= 0.0 {
                    0.0
                } else {
                    sum / count
                }
            }
        }
    }
}

/// Winning split for one node, with its tie-break key.
#[derive(Debug, Clone)]
pub(crate) struct SplitCandidate {
    pub feature: FeatureId,
    pub condition: SplitCondition,
    pub missing_left: bool,
    pub reduction: f64,
    /// Position of the split point in its feature's canonical enumeration
    /// (midpoint index or category-prefix length minus one).
    pub ordinal: u32,
}

impl SplitCandidate {
    /// Deterministic winner rule: higher reduction, then lower feature id,
    /// then lower split-point ordinal.
    pub fn beats(&self, other: &Self) -> bool {
        match self.reduction.partial_cmp(&other.reduction) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Less) => false,
            _ => (self.feature, self.ordinal) < (other.feature, other.ordinal),
        }
    }
}

/// Weighted impurity reduction for both placements of the missing set.
///
/// Returns `(reduction, missing_left)` for the better placement; equal
/// placements (in particular when no example is missing) prefer left.
fn best_missing_placement(
    parent_impurity: f64,
    total: f64,
    left: &LabelStats,
    right: &LabelStats,
    missing: &LabelStats,
) -> (f64, bool) {
    let reduction = |l: (f64, f64), r: (f64, f64)| {
        parent_impurity - (l.1 / total) * l.0 - (r.1 / total) * r.0
    };
    if missing.count() <= 0.0 {
        let red = reduction(
            (left.impurity(), left.count()),
            (right.impurity(), right.count()),
        );
        return (red, true);
    }
    let with_left = reduction(
        left.merged_impurity(missing),
        (right.impurity(), right.count()),
    );
    let with_right = reduction(
        (left.impurity(), left.count()),
        right.merged_impurity(missing),
    );
    if with_left >= with_right {
        (with_left, true)
    } else {
        (with_right, false)
    }
}

/// Best split for one node over the given candidate features.
///
/// `candidates` must be in ascending id order; the tie-break rule makes the
/// result independent of evaluation order regardless.
pub(crate) fn find_best_split(
    data: &EncodedDataset,
    labels: &Labels,
    rows: &[u32],
    candidates: &[FeatureId],
    parent: &LabelStats,
) -> Option<SplitCandidate> {
    let mut best: Option<SplitCandidate> = None;
    for &feature in candidates {
        let kind = data
            .encoding()
            .kind(feature)
            .expect("candidate ids come from the encoding");
        let candidate = match kind {
            FeatureKind::Numerical | FeatureKind::Boolean => {
                best_numerical_split(data, labels, rows, feature, parent)
            }
            FeatureKind::Categorical => {
                best_categorical_split(data, labels, rows, feature, parent)
            }
        };
        if let Some(c) = candidate {
            if best.as_ref().map_or(true, |b| c.beats(b)) {
                best = Some(c);
            }
        }
    }
    best
}

/// Midpoint-threshold search over sorted distinct present values.
fn best_numerical_split(
    data: &EncodedDataset,
    labels: &Labels,
    rows: &[u32],
    feature: FeatureId,
    parent: &LabelStats,
) -> Option<SplitCandidate> {
    let mut present: Vec<(f32, u32)> = Vec::with_capacity(rows.len());
    let mut missing = LabelStats::empty(labels);
    for &row in rows {
        match data.numerical(row as usize, feature) {
            Some(v) => present.push((v, row)),
            None => missing.add(labels, row),
        }
    }
    if present.len() < 2 {
        return None;
    }
    present.sort_unstable_by(|a, b| {
        a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1))
    });

    let parent_impurity = parent.impurity();
    let total = parent.count();
    let mut left = LabelStats::empty(labels);
    let mut right = LabelStats::empty(labels);
    for &(_, row) in &present {
        right.add(labels, row);
    }

    let mut best: Option<SplitCandidate> = None;
    let mut ordinal = 0u32;
    for i in 1..present.len() {
        let (prev_value, prev_row) = present[i - 1];
        left.add(labels, prev_row);
        right.sub(labels, prev_row);
        let value = present[i].0;
        if value <= prev_value {
            continue; // not a distinct-value boundary
        }
        let threshold = 0.5 * (prev_value + value);
        let (reduction, missing_left) =
            best_missing_placement(parent_impurity, total, &left, &right, &missing);
        if reduction > 0.0 {
            let candidate = SplitCandidate {
                feature,
                condition: SplitCondition::Threshold(threshold),
                missing_left,
                reduction,
                ordinal,
            };
            if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                best = Some(candidate);
            }
        }
        ordinal += 1;
    }
    best
}

/// Greedy one-vs-rest category search.
///
/// Categories present at the node are ordered by a per-category label
/// statistic (descending; ties by ascending category id), then each prefix
/// of that order is evaluated as the right-branch subset. The prefix length
/// minus one is the candidate's tie-break ordinal. Categories absent from
/// the node (including the out-of-vocabulary index when unseen here) fall
/// outside the subset and go left.
fn best_categorical_split(
    data: &EncodedDataset,
    labels: &Labels,
    rows: &[u32],
    feature: FeatureId,
    parent: &LabelStats,
) -> Option<SplitCandidate> {
    let vocab_size = data
        .encoding()
        .vocabulary_size(feature)
        .expect("candidate ids come from the encoding");
    let mut per_category = vec![LabelStats::empty(labels); vocab_size];
    let mut missing = LabelStats::empty(labels);
    for &row in rows {
        match data.category(row as usize, feature) {
            Some(c) => per_category[c as usize].add(labels, row),
            None => missing.add(labels, row),
        }
    }

    let anchor = parent.majority_class();
    let mut ordered: Vec<(u32, f64)> = per_category
        .iter()
        .enumerate()
        .filter(|(_, s)| s.count() > 0.0)
        .map(|(c, s)| (c as u32, s.ordering_statistic(anchor)))
        .collect();
    if ordered.len() < 2 {
        return None;
    }
    ordered.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0))
    });

    let parent_impurity = parent.impurity();
    let total = parent.count();
    let mut right = LabelStats::empty(labels);
    let mut left = LabelStats::empty(labels);
    for &(c, _) in &ordered {
        left.merge(&per_category[c as usize]);
    }

    let mut best: Option<SplitCandidate> = None;
    let mut best_prefix = 0usize;
    for k in 1..ordered.len() {
        let cat = ordered[k - 1].0;
        right.merge(&per_category[cat as usize]);
        left.subtract(&per_category[cat as usize]);
        let (reduction, missing_left) =
            best_missing_placement(parent_impurity, total, &left, &right, &missing);
        if reduction > 0.0 {
            let candidate = SplitCandidate {
                feature,
                // Condition filled in below once the best prefix is known.
                condition: SplitCondition::Threshold(0.0),
                missing_left,
                reduction,
                ordinal: (k - 1) as u32,
            };
            if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                best = Some(candidate);
                best_prefix = k;
            }
        }
    }

    best.map(|mut candidate| {
        let set = CategorySet::from_categories(ordered[..best_prefix].iter().map(|&(c, _)| c));
        candidate.condition = SplitCondition::Categories(set);
        candidate
    })
}
