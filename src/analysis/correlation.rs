//! Pearson correlation between an ordinal category rank and a score column.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::Serialize;

use super::aggregate::mean;
use crate::data::model::{Dataset, IncomeBracket, Record, Region, ScoreColumn};
use crate::error::StatError;

// ---------------------------------------------------------------------------
// Ordinal mappings
// ---------------------------------------------------------------------------

/// How a record's category becomes a numeric rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mapping", content = "column", rename_all = "snake_case")]
pub enum OrdinalMapping {
    /// A → 1 … Q → 17.
    IncomeRank,
    /// Regions ranked 1..k by descending mean of the given column.
    RegionByPerformance(ScoreColumn),
}

pub fn income_rank(bracket: IncomeBracket) -> u8 {
    match bracket {
        IncomeBracket::A => 1,
        IncomeBracket::B => 2,
        IncomeBracket::C => 3,
        IncomeBracket::D => 4,
        IncomeBracket::E => 5,
        IncomeBracket::F => 6,
        IncomeBracket::G => 7,
        IncomeBracket::H => 8,
        IncomeBracket::I => 9,
        IncomeBracket::J => 10,
        IncomeBracket::K => 11,
        IncomeBracket::L => 12,
        IncomeBracket::M => 13,
        IncomeBracket::N => 14,
        IncomeBracket::O => 15,
        IncomeBracket::P => 16,
        IncomeBracket::Q => 17,
    }
}

/// Rank regions present in `dataset` by descending mean of `column`; rank 1
/// is the best-performing region. Equal means keep first-seen order.
pub fn region_performance_ranks(dataset: &Dataset, column: ScoreColumn) -> HashMap<Region, u8> {
    let mut seen: Vec<Region> = Vec::new();
    let mut values: HashMap<Region, Vec<f64>> = HashMap::new();
    for record in dataset {
        if let Some(region) = record.region() {
            let bucket = values.entry(region).or_default();
            if bucket.is_empty() {
                seen.push(region);
            }
            bucket.push(record.score(column));
        }
    }

    let mut ranked: Vec<(Region, f64)> = seen
        .into_iter()
        .map(|region| (region, mean(&values[&region])))
        .collect();
    // Stable sort keeps first-seen order for ties.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (region, _))| (region, (i + 1) as u8))
        .collect()
}

/// A mapping resolved against a dataset, ready to rank individual records.
enum Ranker {
    Income,
    Region(HashMap<Region, u8>),
}

impl Ranker {
    fn resolve(mapping: OrdinalMapping, dataset: &Dataset) -> Self {
        match mapping {
            OrdinalMapping::IncomeRank => Ranker::Income,
            OrdinalMapping::RegionByPerformance(column) => {
                Ranker::Region(region_performance_ranks(dataset, column))
            }
        }
    }

    fn rank(&self, record: &Record) -> Option<f64> {
        match self {
            Ranker::Income => Some(income_rank(record.income()) as f64),
            Ranker::Region(ranks) => record
                .region()
                .and_then(|r| ranks.get(&r))
                .map(|&rank| rank as f64),
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
    Negligible,
}

impl Strength {
    /// Classify on the absolute value of a coefficient.
    pub fn classify(coefficient: f64) -> Self {
        let magnitude = coefficient.abs();
        if magnitude > 0.7 {
            Strength::Strong
        } else if magnitude > 0.3 {
            Strength::Moderate
        } else if magnitude > 0.1 {
            Strength::Weak
        } else {
            Strength::Negligible
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strength::Strong => "strong",
            Strength::Moderate => "moderate",
            Strength::Weak => "weak",
            Strength::Negligible => "negligible",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    Positive,
    Negative,
    /// Zero coefficient, or a magnitude whose direction is not meaningful.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub coefficient: f64,
    pub sign: Sign,
    pub strength: Strength,
}

impl CorrelationResult {
    fn signed(coefficient: f64) -> Self {
        let sign = if coefficient > 0.0 {
            Sign::Positive
        } else if coefficient < 0.0 {
            Sign::Negative
        } else {
            Sign::None
        };
        CorrelationResult {
            coefficient,
            sign,
            strength: Strength::classify(coefficient),
        }
    }

    /// Magnitude only; the sign of a rank-by-performance coefficient is an
    /// artifact of rank direction.
    fn magnitude(coefficient: f64) -> Self {
        let coefficient = coefficient.abs();
        CorrelationResult {
            coefficient,
            sign: Sign::None,
            strength: Strength::classify(coefficient),
        }
    }
}

// ---------------------------------------------------------------------------
// Pearson
// ---------------------------------------------------------------------------

/// Pearson's r for paired samples, computed around the means. Zero variance
/// in either variable is reported as undefined rather than NaN.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64, StatError> {
    let n = x.len().min(y.len());
    if n < 2 {
        return Err(StatError::InsufficientData { needed: 2, found: n });
    }
    let (x, y) = (&x[..n], &y[..n]);
    // Checked on the raw values: the mean of identical values can round away
    // from them and leave a tiny non-zero variance.
    if is_constant(x) || is_constant(y) {
        return Err(StatError::UndefinedCorrelation);
    }
    let mx = mean(x);
    let my = mean(y);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return Err(StatError::UndefinedCorrelation);
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    if !r.is_finite() {
        return Err(StatError::UndefinedCorrelation);
    }
    Ok(r.clamp(-1.0, 1.0))
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Correlate the ordinal rank given by `mapping` with `column`.
pub fn correlate(
    dataset: &Dataset,
    mapping: OrdinalMapping,
    column: ScoreColumn,
) -> Result<CorrelationResult, StatError> {
    let ranker = Ranker::resolve(mapping, dataset);
    correlate_with(&ranker, dataset, mapping, column)
}

/// Correlate one mapping against several columns, resolving the mapping once.
pub fn correlate_many(
    dataset: &Dataset,
    mapping: OrdinalMapping,
    columns: &[ScoreColumn],
) -> Vec<(ScoreColumn, Result<CorrelationResult, StatError>)> {
    let ranker = Ranker::resolve(mapping, dataset);
    columns
        .iter()
        .map(|&column| (column, correlate_with(&ranker, dataset, mapping, column)))
        .collect()
}

fn correlate_with(
    ranker: &Ranker,
    dataset: &Dataset,
    mapping: OrdinalMapping,
    column: ScoreColumn,
) -> Result<CorrelationResult, StatError> {
    let (ranks, values): (Vec<f64>, Vec<f64>) = dataset
        .iter()
        .filter_map(|r| ranker.rank(r).map(|rank| (rank, r.score(column))))
        .unzip();

    let r = pearson(&ranks, &values)?;
    debug!("{mapping:?} vs {}: r = {r:.4}", column.header());

    Ok(match mapping {
        OrdinalMapping::IncomeRank => CorrelationResult::signed(r),
        OrdinalMapping::RegionByPerformance(_) => CorrelationResult::magnitude(r),
    })
}
