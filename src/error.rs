use thiserror::Error;

/// Structural failures while reading a source file. Any of these aborts the
/// pipeline before a statistic is computed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("required column '{0}' is missing from the header")]
    MissingColumn(&'static str),

    #[error("source has no header row")]
    EmptySource,

    #[error("malformed delimited input: {0}")]
    Csv(#[from] csv::Error),
}

/// Why a single row was dropped. Absorbed by the loader and only reported as
/// counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RowParseError {
    #[error("required field '{0}' is empty or absent")]
    MissingField(&'static str),

    #[error("field '{0}' could not be parsed")]
    InvalidValue(&'static str),
}

/// A statistic that cannot be computed from the data at hand. These are
/// ordinary results, rendered as "insufficient data" or "undefined".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatError {
    #[error("insufficient data: {needed} observations required, {found} available")]
    InsufficientData { needed: usize, found: usize },

    #[error("correlation undefined: a variable has zero variance")]
    UndefinedCorrelation,
}
