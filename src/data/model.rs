use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// IncomeBracket – household income code (Q006)
// ---------------------------------------------------------------------------

/// Declared household income bracket, `A` (no income) through `Q` (highest).
///
/// Declaration order is the ordinal order, so the derived `Ord` sorts brackets
/// by code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IncomeBracket {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
}

impl IncomeBracket {
    pub const ALL: [IncomeBracket; 17] = [
        IncomeBracket::A,
        IncomeBracket::B,
        IncomeBracket::C,
        IncomeBracket::D,
        IncomeBracket::E,
        IncomeBracket::F,
        IncomeBracket::G,
        IncomeBracket::H,
        IncomeBracket::I,
        IncomeBracket::J,
        IncomeBracket::K,
        IncomeBracket::L,
        IncomeBracket::M,
        IncomeBracket::N,
        IncomeBracket::O,
        IncomeBracket::P,
        IncomeBracket::Q,
    ];

    /// Parse a single-letter code. Only upper-case `A`..`Q` is accepted.
    pub fn from_code(code: char) -> Option<Self> {
        let idx = (code as u32).checked_sub('A' as u32)? as usize;
        Self::ALL.get(idx).copied()
    }

    /// The letter code as it appears in the source file.
    pub fn code(self) -> char {
        (b'A' + self as u8) as char
    }
}

impl fmt::Display for IncomeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for IncomeBracket {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => IncomeBracket::from_code(c).ok_or(()),
            _ => Err(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Region – derived from the municipality code
// ---------------------------------------------------------------------------

/// Geographic region, derived from the leading digit of a municipality code.
/// Variant order is the fixed reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    North,
    Northeast,
    Southeast,
    South,
    CentralWest,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::North,
        Region::Northeast,
        Region::Southeast,
        Region::South,
        Region::CentralWest,
    ];

    /// Map a municipality code to its region. Codes whose leading digit is not
    /// 1–5 belong to no region.
    pub fn from_municipality(code: u32) -> Option<Self> {
        let mut lead = code;
        while lead >= 10 {
            lead /= 10;
        }
        match lead {
            1 => Some(Region::North),
            2 => Some(Region::Northeast),
            3 => Some(Region::Southeast),
            4 => Some(Region::South),
            5 => Some(Region::CentralWest),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Region::North => "North",
            Region::Northeast => "Northeast",
            Region::Southeast => "Southeast",
            Region::South => "South",
            Region::CentralWest => "Central-West",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ScoreColumn – the numeric columns a statistic can target
// ---------------------------------------------------------------------------

/// Number of objective score dimensions fed to the outlier detector.
pub const OBJECTIVE_DIMS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreColumn {
    NaturalSciences,
    HumanSciences,
    Languages,
    Mathematics,
    Essay,
}

impl ScoreColumn {
    pub const ALL: [ScoreColumn; 5] = [
        ScoreColumn::NaturalSciences,
        ScoreColumn::HumanSciences,
        ScoreColumn::Languages,
        ScoreColumn::Mathematics,
        ScoreColumn::Essay,
    ];

    /// Column header in the source file.
    pub fn header(self) -> &'static str {
        match self {
            ScoreColumn::NaturalSciences => "NU_NOTA_CN",
            ScoreColumn::HumanSciences => "NU_NOTA_CH",
            ScoreColumn::Languages => "NU_NOTA_LC",
            ScoreColumn::Mathematics => "NU_NOTA_MT",
            ScoreColumn::Essay => "NU_NOTA_REDACAO",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreColumn::NaturalSciences => "Natural Sciences",
            ScoreColumn::HumanSciences => "Human Sciences",
            ScoreColumn::Languages => "Languages and Codes",
            ScoreColumn::Mathematics => "Mathematics",
            ScoreColumn::Essay => "Essay",
        }
    }
}

impl fmt::Display for ScoreColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Record – one participant row
// ---------------------------------------------------------------------------

/// A single participant. Immutable once built; fields are read through
/// accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    income: IncomeBracket,
    municipality: u32,
    /// Natural sciences, human sciences, languages, mathematics.
    scores: [f64; OBJECTIVE_DIMS],
    essay: f64,
}

impl Record {
    pub fn new(
        income: IncomeBracket,
        municipality: u32,
        scores: [f64; OBJECTIVE_DIMS],
        essay: f64,
    ) -> Self {
        Record {
            income,
            municipality,
            scores,
            essay,
        }
    }

    pub fn income(&self) -> IncomeBracket {
        self.income
    }

    pub fn municipality(&self) -> u32 {
        self.municipality
    }

    pub fn region(&self) -> Option<Region> {
        Region::from_municipality(self.municipality)
    }

    /// The objective score vector used for anomaly detection.
    pub fn objective_scores(&self) -> &[f64; OBJECTIVE_DIMS] {
        &self.scores
    }

    pub fn essay(&self) -> f64 {
        self.essay
    }

    pub fn score(&self, column: ScoreColumn) -> f64 {
        match column {
            ScoreColumn::NaturalSciences => self.scores[0],
            ScoreColumn::HumanSciences => self.scores[1],
            ScoreColumn::Languages => self.scores[2],
            ScoreColumn::Mathematics => self.scores[3],
            ScoreColumn::Essay => self.essay,
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – an ordered, immutable collection of records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn from_records(records: Vec<Record>) -> Self {
        Dataset { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Build a new dataset keeping the records for which `keep` is true.
    pub fn retain_by<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(usize, &Record) -> bool,
    {
        let records = self
            .records
            .iter()
            .enumerate()
            .filter(|(i, r)| keep(*i, r))
            .map(|(_, r)| r.clone())
            .collect();
        Dataset { records }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
