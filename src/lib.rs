//! Outlier-filtered grouped statistics and ordinal correlations for exam
//! score datasets.
//!
//! ```text
//!  source bytes ──► data::loader ──► data::filter ──► analysis::outlier
//!                                                        │
//!                         cache (per source fingerprint) ◄┘
//!                                                        │
//!                     analysis::aggregate ◄──────────────┤
//!                     analysis::correlation ◄────────────┘
//!                                  │
//!                                  ▼
//!                               report
//! ```

pub mod analysis;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod report;
