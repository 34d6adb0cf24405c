use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde::Serialize;

use crate::data::model::{Dataset, IncomeBracket, Record, Region, ScoreColumn};

// ---------------------------------------------------------------------------
// Grouping keys
// ---------------------------------------------------------------------------

/// Categorical attribute used to partition a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Income,
    Region,
}

impl Grouping {
    /// Extract the group key for a record. Records whose municipality maps
    /// to no region are excluded from region groupings.
    pub fn key_of(self, record: &Record) -> Option<GroupKey> {
        match self {
            Grouping::Income => Some(GroupKey::Income(record.income())),
            Grouping::Region => record.region().map(GroupKey::Region),
        }
    }
}

/// Ordering is by income code, then by the fixed region order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum GroupKey {
    Income(IncomeBracket),
    Region(Region),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Income(b) => write!(f, "{b}"),
            GroupKey::Region(r) => write!(f, "{r}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Descriptive statistics over one numeric column within one group. Values
/// are full precision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStatistics {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` when fewer than two values exist.
    pub std: Option<f64>,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl GroupStatistics {
    /// Summarise a non-empty slice. Returns `None` for an empty one so empty
    /// groups never produce NaN rows.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = mean(&sorted);
        let std = sample_std(&sorted, mean);

        Some(GroupStatistics {
            count,
            mean,
            std,
            min: sorted[0],
            p25: percentile_sorted(&sorted, 0.25),
            p50: percentile_sorted(&sorted, 0.50),
            p75: percentile_sorted(&sorted, 0.75),
            max: sorted[count - 1],
        })
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Two-pass sample standard deviation (n − 1 denominator).
fn sample_std(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Percentile of sorted data with linear interpolation between order
/// statistics at position `q * (n - 1)`.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

// ---------------------------------------------------------------------------
// Grouped aggregation
// ---------------------------------------------------------------------------

/// Collect the values of `column` per group, in record order.
fn partition(dataset: &Dataset, grouping: Grouping, column: ScoreColumn) -> BTreeMap<GroupKey, Vec<f64>> {
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for record in dataset {
        if let Some(key) = grouping.key_of(record) {
            groups.entry(key).or_default().push(record.score(column));
        }
    }
    groups
}

/// Per-group statistics of `column`. Groups with no records are absent.
pub fn group_statistics(
    dataset: &Dataset,
    grouping: Grouping,
    column: ScoreColumn,
) -> BTreeMap<GroupKey, GroupStatistics> {
    let stats: BTreeMap<GroupKey, GroupStatistics> = partition(dataset, grouping, column)
        .into_iter()
        .filter_map(|(key, values)| GroupStatistics::from_values(&values).map(|s| (key, s)))
        .collect();
    debug!(
        "{} groups for {:?} over {}",
        stats.len(),
        grouping,
        column.header()
    );
    stats
}

/// Mean of `column` per group.
pub fn group_means(dataset: &Dataset, grouping: Grouping, column: ScoreColumn) -> BTreeMap<GroupKey, f64> {
    partition(dataset, grouping, column)
        .into_iter()
        .map(|(key, values)| (key, mean(&values)))
        .collect()
}
