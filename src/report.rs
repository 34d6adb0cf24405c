use std::fmt;

use serde::Serialize;

use crate::analysis::aggregate::{GroupKey, GroupStatistics, Grouping};
use crate::analysis::correlation::{CorrelationResult, OrdinalMapping, Sign};
use crate::analysis::outlier::FilterStatus;
use crate::data::model::{IncomeBracket, ScoreColumn};
use crate::error::StatError;
use crate::pipeline::{PreparedData, ProcessingSummary};

// ---------------------------------------------------------------------------
// Presentation helpers
// ---------------------------------------------------------------------------

/// Round to one decimal place for display.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Monthly household income range for a bracket, in reais.
pub fn income_label(bracket: IncomeBracket) -> &'static str {
    match bracket {
        IncomeBracket::A => "No income",
        IncomeBracket::B => "Up to R$ 1,100",
        IncomeBracket::C => "R$ 1,100 - 1,650",
        IncomeBracket::D => "R$ 1,650 - 2,200",
        IncomeBracket::E => "R$ 2,200 - 2,750",
        IncomeBracket::F => "R$ 2,750 - 3,300",
        IncomeBracket::G => "R$ 3,300 - 4,400",
        IncomeBracket::H => "R$ 4,400 - 5,500",
        IncomeBracket::I => "R$ 5,500 - 6,600",
        IncomeBracket::J => "R$ 6,600 - 7,700",
        IncomeBracket::K => "R$ 7,700 - 8,800",
        IncomeBracket::L => "R$ 8,800 - 9,900",
        IncomeBracket::M => "R$ 9,900 - 11,000",
        IncomeBracket::N => "R$ 11,000 - 13,200",
        IncomeBracket::O => "R$ 13,200 - 16,500",
        IncomeBracket::P => "R$ 16,500 - 22,000",
        IncomeBracket::Q => "Above R$ 22,000",
    }
}

// ---------------------------------------------------------------------------
// Serialisable report rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub group: String,
    pub label: String,
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl GroupRow {
    fn new(key: GroupKey, stats: &GroupStatistics) -> Self {
        let label = match key {
            GroupKey::Income(b) => income_label(b).to_string(),
            GroupKey::Region(r) => r.name().to_string(),
        };
        GroupRow {
            group: key.to_string(),
            label,
            count: stats.count,
            mean: round1(stats.mean),
            std: stats.std.map(round1),
            min: round1(stats.min),
            p25: round1(stats.p25),
            p50: round1(stats.p50),
            p75: round1(stats.p75),
            max: round1(stats.max),
        }
    }
}

/// A correlation as shown to readers: either a value or the reason there is
/// none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CorrelationCell {
    Defined(CorrelationResult),
    Undefined { reason: String },
    InsufficientData { reason: String },
}

impl From<Result<CorrelationResult, StatError>> for CorrelationCell {
    fn from(result: Result<CorrelationResult, StatError>) -> Self {
        match result {
            Ok(r) => CorrelationCell::Defined(r),
            Err(e @ StatError::UndefinedCorrelation) => CorrelationCell::Undefined {
                reason: e.to_string(),
            },
            Err(e @ StatError::InsufficientData { .. }) => CorrelationCell::InsufficientData {
                reason: e.to_string(),
            },
        }
    }
}

impl CorrelationCell {
    fn describe(&self) -> String {
        match self {
            CorrelationCell::Defined(r) => {
                let direction = match r.sign {
                    Sign::Positive => " positive",
                    Sign::Negative => " negative",
                    Sign::None => "",
                };
                format!("{:.3} ({}{direction})", r.coefficient, r.strength)
            }
            CorrelationCell::Undefined { .. } => "undefined".to_string(),
            CorrelationCell::InsufficientData { .. } => "insufficient data".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationRow {
    pub column: ScoreColumn,
    #[serde(flatten)]
    pub cell: CorrelationCell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationTable {
    pub mapping: OrdinalMapping,
    pub rows: Vec<CorrelationRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub summary: ProcessingSummary,
    pub grouping: Grouping,
    pub column: ScoreColumn,
    pub groups: Vec<GroupRow>,
    pub correlations: Vec<CorrelationTable>,
}

impl Report {
    /// Build the full report: group statistics for `column` under `grouping`,
    /// plus income and region correlations against every score column.
    pub fn build(prepared: &PreparedData, grouping: Grouping, column: ScoreColumn) -> Self {
        let groups = prepared
            .group_statistics(grouping, column)
            .iter()
            .map(|(key, stats)| GroupRow::new(*key, stats))
            .collect();

        let correlations = [
            OrdinalMapping::IncomeRank,
            OrdinalMapping::RegionByPerformance(column),
        ]
        .into_iter()
        .map(|mapping| CorrelationTable {
            mapping,
            rows: prepared
                .correlations(mapping, &ScoreColumn::ALL)
                .into_iter()
                .map(|(column, result)| CorrelationRow {
                    column,
                    cell: result.into(),
                })
                .collect(),
        })
        .collect();

        Report {
            summary: prepared.summary.clone(),
            grouping,
            column,
            groups,
            correlations,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Plain-text rendering for terminals.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(f, "Processing summary")?;
        writeln!(f, "  source rows:          {}", s.raw_rows)?;
        writeln!(f, "  unparseable rows:     {}", s.parse_dropped.total())?;
        writeln!(f, "  non-positive scores:  {}", s.invalid_dropped)?;
        writeln!(f, "  original records:     {}", s.original)?;
        writeln!(f, "  clean records:        {}", s.clean)?;
        writeln!(
            f,
            "  outliers removed:     {} ({:.2}%)",
            s.outliers_removed, s.percent_removed
        )?;
        if let FilterStatus::Skipped { records, min_records } = s.filter_status {
            writeln!(
                f,
                "  outlier filter:       insufficient data ({records} < {min_records} records)"
            )?;
        }

        writeln!(f)?;
        writeln!(f, "{} by {:?}", self.column, self.grouping)?;
        writeln!(
            f,
            "  {:<6} {:<20} {:>7} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "group", "label", "count", "mean", "std", "min", "p25", "p50", "p75", "max"
        )?;
        for row in &self.groups {
            let std = row
                .std
                .map(|v| format!("{v:.1}"))
                .unwrap_or_else(|| "n/a".to_string());
            writeln!(
                f,
                "  {:<6} {:<20} {:>7} {:>8.1} {:>8} {:>8.1} {:>8.1} {:>8.1} {:>8.1} {:>8.1}",
                truncate(&row.group, 6),
                truncate(&row.label, 20),
                row.count,
                row.mean,
                std,
                row.min,
                row.p25,
                row.p50,
                row.p75,
                row.max
            )?;
        }
        if self.groups.is_empty() {
            writeln!(f, "  insufficient data")?;
        }

        for table in &self.correlations {
            writeln!(f)?;
            match table.mapping {
                OrdinalMapping::IncomeRank => writeln!(f, "Correlation with income bracket")?,
                OrdinalMapping::RegionByPerformance(c) => {
                    writeln!(f, "Correlation with region (ranked by {c}, magnitude only)")?
                }
            }
            for row in &table.rows {
                writeln!(f, "  {:<20} {}", row.column.label(), row.cell.describe())?;
            }
        }
        Ok(())
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
