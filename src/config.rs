use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTAMINATION: f64 = 0.05;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_TREES: usize = 100;
pub const DEFAULT_MAX_SAMPLES: usize = 256;
/// Below this many records the outlier filter passes data through.
pub const DEFAULT_MIN_RECORDS: usize = 32;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600 * 20);

/// Fixed pipeline parameters. The binaries always run with `Default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fraction of records treated as anomalous.
    pub contamination: f64,
    pub seed: u64,
    pub n_trees: usize,
    /// Subsample size per isolation tree.
    pub max_samples: usize,
    pub min_records: usize,
    #[serde(with = "duration_secs")]
    pub cache_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            contamination: DEFAULT_CONTAMINATION,
            seed: DEFAULT_SEED,
            n_trees: DEFAULT_TREES,
            max_samples: DEFAULT_MAX_SAMPLES,
            min_records: DEFAULT_MIN_RECORDS,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
