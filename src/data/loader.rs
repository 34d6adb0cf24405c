use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ByteRecord;
use log::{debug, info, warn};
use serde::Serialize;

use super::model::{Dataset, IncomeBracket, Record, ScoreColumn, OBJECTIVE_DIMS};
use crate::error::{LoadError, RowParseError};

// ---------------------------------------------------------------------------
// Schema: required column headers
// ---------------------------------------------------------------------------

pub const INCOME_COLUMN: &str = "Q006";
pub const MUNICIPALITY_COLUMN: &str = "CO_MUNICIPIO_PROVA";
pub const DELIMITER: u8 = b';';

const OBJECTIVE_COLUMNS: [ScoreColumn; OBJECTIVE_DIMS] = [
    ScoreColumn::NaturalSciences,
    ScoreColumn::HumanSciences,
    ScoreColumn::Languages,
    ScoreColumn::Mathematics,
];

/// Positions of the required columns inside a header row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    income: usize,
    municipality: usize,
    scores: [usize; OBJECTIVE_DIMS],
    essay: usize,
}

impl ColumnIndex {
    fn resolve(headers: &[String]) -> Result<Self, LoadError> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(LoadError::MissingColumn(name))
        };

        let mut scores = [0usize; OBJECTIVE_DIMS];
        for (slot, col) in scores.iter_mut().zip(OBJECTIVE_COLUMNS) {
            *slot = find(col.header())?;
        }

        Ok(ColumnIndex {
            income: find(INCOME_COLUMN)?,
            municipality: find(MUNICIPALITY_COLUMN)?,
            scores,
            essay: find(ScoreColumn::Essay.header())?,
        })
    }
}

// ---------------------------------------------------------------------------
// Load outcome
// ---------------------------------------------------------------------------

/// Rows dropped by the loader, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub missing_field: usize,
    pub invalid_value: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.missing_field + self.invalid_value
    }

    fn record(&mut self, err: RowParseError) {
        match err {
            RowParseError::MissingField(_) => self.missing_field += 1,
            RowParseError::InvalidValue(_) => self.invalid_value += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    /// Data rows seen, excluding the header.
    pub raw_rows: usize,
    pub dropped: DropCounts,
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a participant dataset from a `;`-separated Latin-1 file.
pub fn load_file(path: &Path) -> Result<LoadOutcome> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading dataset file {}", path.display()))?;
    load_bytes(&bytes).with_context(|| format!("parsing dataset file {}", path.display()))
}

pub fn load_bytes(bytes: &[u8]) -> Result<LoadOutcome, LoadError> {
    load_reader(bytes)
}

/// Parse records from any reader. Rows with a missing or unparseable
/// required field are dropped and counted; a header without a required
/// column is an error.
pub fn load_reader<R: Read>(source: R) -> Result<LoadOutcome, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| latin1(h).trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::EmptySource);
    }
    let index = ColumnIndex::resolve(&headers)?;

    let mut records = Vec::new();
    let mut dropped = DropCounts::default();
    let mut raw_rows = 0usize;
    let mut row = ByteRecord::new();

    while reader.read_byte_record(&mut row)? {
        raw_rows += 1;
        match parse_row(&row, &index) {
            Ok(record) => records.push(record),
            Err(err) => {
                debug!("dropping row {raw_rows}: {err}");
                dropped.record(err);
            }
        }
    }

    if dropped.total() > 0 {
        warn!(
            "dropped {} of {raw_rows} rows ({} missing field, {} invalid value)",
            dropped.total(),
            dropped.missing_field,
            dropped.invalid_value
        );
    }
    info!("loaded {} records from {raw_rows} rows", records.len());

    Ok(LoadOutcome {
        dataset: Dataset::from_records(records),
        raw_rows,
        dropped,
    })
}

// ---------------------------------------------------------------------------
// Row parsing
// ---------------------------------------------------------------------------

fn parse_row(row: &ByteRecord, index: &ColumnIndex) -> Result<Record, RowParseError> {
    let income_raw = field(row, index.income, INCOME_COLUMN)?;
    let income: IncomeBracket = income_raw
        .parse()
        .map_err(|_| RowParseError::InvalidValue(INCOME_COLUMN))?;

    let municipality = field(row, index.municipality, MUNICIPALITY_COLUMN)?
        .parse::<u32>()
        .map_err(|_| RowParseError::InvalidValue(MUNICIPALITY_COLUMN))?;

    let mut scores = [0.0; OBJECTIVE_DIMS];
    for ((slot, &idx), col) in scores.iter_mut().zip(&index.scores).zip(OBJECTIVE_COLUMNS) {
        *slot = parse_score(row, idx, col.header())?;
    }
    let essay = parse_score(row, index.essay, ScoreColumn::Essay.header())?;

    Ok(Record::new(income, municipality, scores, essay))
}

/// Fetch a trimmed, non-empty field as text.
fn field(row: &ByteRecord, idx: usize, name: &'static str) -> Result<String, RowParseError> {
    let text = row
        .get(idx)
        .map(|raw| latin1(raw).trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(RowParseError::MissingField(name));
    }
    Ok(text)
}

/// Scores accept either `.` or `,` as the decimal separator.
fn parse_score(row: &ByteRecord, idx: usize, name: &'static str) -> Result<f64, RowParseError> {
    let text = field(row, idx, name)?;
    let value = text
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| RowParseError::InvalidValue(name))?;
    if !value.is_finite() {
        return Err(RowParseError::InvalidValue(name));
    }
    Ok(value)
}

/// ISO-8859-1 maps every byte to the code point of the same value.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const HEADER: &str =
        "NU_INSCRICAO;CO_MUNICIPIO_PROVA;NU_NOTA_CN;NU_NOTA_CH;NU_NOTA_LC;NU_NOTA_MT;NU_NOTA_REDACAO;Q006";

    fn source(rows: &[&str]) -> Vec<u8> {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.into_bytes()
    }

    #[test]
    fn parses_complete_rows() {
        let data = source(&["1;3550308;500.1;510.2;520.3;530.4;600;C"]);
        let out = load_bytes(&data).expect("load");
        assert_eq!(out.raw_rows, 1);
        assert_eq!(out.dataset.len(), 1);
        let r = &out.dataset.records()[0];
        assert_eq!(r.income(), IncomeBracket::C);
        assert_eq!(r.municipality(), 3_550_308);
        assert_eq!(r.objective_scores(), &[500.1, 510.2, 520.3, 530.4]);
        assert_eq!(r.essay(), 600.0);
    }

    #[test]
    fn drops_rows_with_missing_essay() {
        let mut rows = Vec::new();
        for i in 0..10 {
            if i < 2 {
                rows.push(format!("{i};3550308;500;500;500;500;;A"));
            } else {
                rows.push(format!("{i};3550308;500;500;500;500;640;A"));
            }
        }
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let out = load_bytes(&source(&refs)).expect("load");
        assert_eq!(out.raw_rows, 10);
        assert_eq!(out.dataset.len(), 8);
        assert_eq!(out.dropped.missing_field, 2);
        assert_eq!(out.dropped.invalid_value, 0);
    }

    #[test]
    fn counts_invalid_and_short_rows() {
        let data = source(&[
            "1;3550308;abc;500;500;500;600;A",
            "2;3550308;500;500;500;500;600;Z",
            "3;3550308;500;500",
            "4;3550308;500;500;500;500;600;B",
        ]);
        let out = load_bytes(&data).expect("load");
        assert_eq!(out.dataset.len(), 1);
        assert_eq!(out.dropped.invalid_value, 2);
        assert_eq!(out.dropped.missing_field, 1);
        assert!(out.dataset.len() <= out.raw_rows);
    }

    #[test]
    fn accepts_comma_decimal_separator() {
        let data = source(&["1;4106902;500,5;510;520;530;600,25;Q"]);
        let out = load_bytes(&data).expect("load");
        let r = &out.dataset.records()[0];
        assert_eq!(r.objective_scores()[0], 500.5);
        assert_eq!(r.essay(), 600.25);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let data = b"CO_MUNICIPIO_PROVA;NU_NOTA_CN;NU_NOTA_CH;NU_NOTA_LC;NU_NOTA_MT;NU_NOTA_REDACAO\n1;1;1;1;1;1\n";
        match load_bytes(data) {
            Err(LoadError::MissingColumn(col)) => assert_eq!(col, INCOME_COLUMN),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(load_bytes(b""), Err(LoadError::EmptySource)));
    }

    #[test]
    fn latin1_extra_columns_are_ignored() {
        let mut data = b"NO_MUNIC\xcdPIO;".to_vec();
        data.extend_from_slice(HEADER.as_bytes());
        data.extend_from_slice(b"\nS\xe3o Paulo;1;3550308;500;500;500;500;600;D\n");
        let out = load_bytes(&data).expect("load");
        assert_eq!(out.dataset.len(), 1);
    }

    #[test]
    fn load_file_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&source(&["1;2927408;450;460;470;480;520;B"]))
            .expect("write");
        let out = load_file(file.path()).expect("load");
        assert_eq!(out.dataset.len(), 1);
    }

    #[test]
    fn load_file_reports_missing_path() {
        let err = load_file(Path::new("/nonexistent/enem.csv")).unwrap_err();
        assert!(err.to_string().contains("reading dataset file"));
    }
}
