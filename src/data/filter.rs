use log::{debug, warn};

use super::model::{Dataset, Record};

// ---------------------------------------------------------------------------
// Validity filter: every objective score must be present and positive
// ---------------------------------------------------------------------------

/// Result of the validity drop step.
#[derive(Debug, Clone)]
pub struct ValidityOutcome {
    pub dataset: Dataset,
    /// Records removed because an objective score was zero, negative or
    /// non-finite.
    pub dropped: usize,
}

/// A record passes when all four objective scores are finite and strictly
/// greater than zero. Absent participants are recorded with a zero score, so
/// they never reach the outlier detector.
pub fn is_valid(record: &Record) -> bool {
    record
        .objective_scores()
        .iter()
        .all(|s| s.is_finite() && *s > 0.0)
}

/// Return a new dataset holding only valid records, plus how many were
/// dropped.
pub fn retain_valid(dataset: &Dataset) -> ValidityOutcome {
    let kept = dataset.retain_by(|_, r| is_valid(r));
    let dropped = dataset.len() - kept.len();
    if dropped > 0 {
        warn!("dropped {dropped} records with non-positive objective scores");
    } else {
        debug!("all {} records have positive objective scores", dataset.len());
    }
    ValidityOutcome {
        dataset: kept,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::IncomeBracket;

    fn rec(scores: [f64; 4]) -> Record {
        Record::new(IncomeBracket::A, 3_550_308, scores, 0.0)
    }

    #[test]
    fn drops_zero_negative_and_nan_scores() {
        let ds = Dataset::from_records(vec![
            rec([500.0, 500.0, 500.0, 500.0]),
            rec([0.0, 500.0, 500.0, 500.0]),
            rec([500.0, -1.0, 500.0, 500.0]),
            rec([500.0, 500.0, f64::NAN, 500.0]),
            rec([1.0, 1.0, 1.0, 1.0]),
        ]);
        let out = retain_valid(&ds);
        assert_eq!(out.dataset.len(), 2);
        assert_eq!(out.dropped, 3);
        assert!(out.dataset.iter().all(is_valid));
    }

    #[test]
    fn essay_score_does_not_affect_validity() {
        // A zero essay score is a legitimate grade.
        assert!(is_valid(&rec([400.0, 410.0, 420.0, 430.0])));
    }
}
