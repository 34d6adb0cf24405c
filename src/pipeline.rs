use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::analysis::aggregate::{group_statistics, GroupKey, GroupStatistics, Grouping};
use crate::analysis::correlation::{correlate_many, CorrelationResult, OrdinalMapping};
use crate::analysis::outlier::{filter_outliers, FilterStatus};
use crate::cache::{Clock, ResultCache, SourceFingerprint};
use crate::config::PipelineConfig;
use crate::data::filter::retain_valid;
use crate::data::loader::{load_bytes, DropCounts};
use crate::data::model::{Dataset, ScoreColumn};
use crate::error::{LoadError, StatError};

// ---------------------------------------------------------------------------
// Processing summary
// ---------------------------------------------------------------------------

/// Record counts through each stage, for diagnostic display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingSummary {
    /// Data rows in the source.
    pub raw_rows: usize,
    pub parse_dropped: DropCounts,
    /// Records removed for non-positive objective scores.
    pub invalid_dropped: usize,
    /// Records entering the outlier filter.
    pub original: usize,
    pub clean: usize,
    pub outliers_removed: usize,
    /// `outliers_removed` as a percentage of `original`.
    pub percent_removed: f64,
    pub filter_status: FilterStatus,
}

// ---------------------------------------------------------------------------
// Prepared data: output of the costly stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PreparedData {
    pub clean: Dataset,
    pub summary: ProcessingSummary,
}

impl PreparedData {
    pub fn group_statistics(
        &self,
        grouping: Grouping,
        column: ScoreColumn,
    ) -> BTreeMap<GroupKey, GroupStatistics> {
        group_statistics(&self.clean, grouping, column)
    }

    pub fn correlations(
        &self,
        mapping: OrdinalMapping,
        columns: &[ScoreColumn],
    ) -> Vec<(ScoreColumn, Result<CorrelationResult, StatError>)> {
        correlate_many(&self.clean, mapping, columns)
    }
}

/// Run load → validity → outlier filter over raw source bytes.
pub fn prepare(bytes: &[u8], config: &PipelineConfig) -> Result<PreparedData, LoadError> {
    let loaded = load_bytes(bytes)?;
    let valid = retain_valid(&loaded.dataset);
    let original = valid.dataset.len();
    let filtered = filter_outliers(&valid.dataset, config);

    let percent_removed = if original == 0 {
        0.0
    } else {
        filtered.outlier_count as f64 * 100.0 / original as f64
    };

    let summary = ProcessingSummary {
        raw_rows: loaded.raw_rows,
        parse_dropped: loaded.dropped,
        invalid_dropped: valid.dropped,
        original,
        clean: filtered.inliers.len(),
        outliers_removed: filtered.outlier_count,
        percent_removed,
        filter_status: filtered.status,
    };
    info!(
        "prepared {} clean records from {} rows ({:.2}% outliers removed)",
        summary.clean, summary.raw_rows, summary.percent_removed
    );

    Ok(PreparedData {
        clean: filtered.inliers,
        summary,
    })
}

// ---------------------------------------------------------------------------
// Session: prepared data cached per source
// ---------------------------------------------------------------------------

/// Owns the configuration and the prepared-data cache. Create one per
/// process and share it by reference.
pub struct Session {
    config: PipelineConfig,
    cache: ResultCache<SourceFingerprint, PreparedData>,
}

impl Session {
    pub fn new(config: PipelineConfig) -> Self {
        let cache = ResultCache::new(config.cache_ttl);
        Session { config, cache }
    }

    pub fn with_clock(config: PipelineConfig, clock: Arc<dyn Clock>) -> Self {
        let cache = ResultCache::with_clock(config.cache_ttl, clock);
        Session { config, cache }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Prepared data for `bytes`, reusing a cached result for identical
    /// content.
    pub fn prepared(&self, bytes: &[u8]) -> Result<Arc<PreparedData>, LoadError> {
        let key = SourceFingerprint::of(bytes);
        self.cache
            .get_or_try_compute(key, || prepare(bytes, &self.config))
    }

    pub fn prepared_file(&self, path: &Path) -> Result<Arc<PreparedData>> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading dataset file {}", path.display()))?;
        self.prepared(&bytes)
            .with_context(|| format!("preparing dataset file {}", path.display()))
    }

    pub fn cache(&self) -> &ResultCache<SourceFingerprint, PreparedData> {
        &self.cache
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(PipelineConfig::default())
    }
}
