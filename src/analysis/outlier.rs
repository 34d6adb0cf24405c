//! Multivariate outlier removal with an isolation forest.
//!
//! Each tree recursively splits a random subsample of the objective score
//! vectors on a random dimension at a uniform random threshold. Points in
//! sparse regions end up isolated after fewer splits, so a short average path
//! length across the ensemble marks an anomaly.
//!
//! All randomness flows from one seeded `ChaCha8Rng`: per-tree seeds are drawn
//! up front, which keeps the result identical whether trees are built
//! sequentially or in parallel.

use log::{debug, info, warn};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::data::model::{Dataset, OBJECTIVE_DIMS};

type Point = [f64; OBJECTIVE_DIMS];

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

// ---------------------------------------------------------------------------
// Isolation tree
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        dim: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(
        points: &[Point],
        members: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> Node {
        if members.len() <= 1 || depth >= max_depth {
            return Node::Leaf {
                size: members.len(),
            };
        }

        // Only dimensions with spread can separate anything.
        let mut splittable: Vec<(usize, f64, f64)> = Vec::with_capacity(OBJECTIVE_DIMS);
        for dim in 0..OBJECTIVE_DIMS {
            let (lo, hi) = members.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(points[i][dim]), hi.max(points[i][dim]))
            });
            if hi > lo {
                splittable.push((dim, lo, hi));
            }
        }
        if splittable.is_empty() {
            return Node::Leaf {
                size: members.len(),
            };
        }

        let (dim, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
        let threshold = rng.gen_range(lo..hi);

        // threshold is in [lo, hi), so both sides are non-empty.
        let (left, right): (Vec<usize>, Vec<usize>) =
            members.into_iter().partition(|&i| points[i][dim] <= threshold);

        Node::Split {
            dim,
            threshold,
            left: Box::new(Node::build(points, left, depth + 1, max_depth, rng)),
            right: Box::new(Node::build(points, right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, point: &Point) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    dim,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[*dim] <= *threshold { left.as_ref() } else { right.as_ref() };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points; used
/// both to credit unsplit leaves and to normalise scores.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ---------------------------------------------------------------------------
// Forest
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    subsample: usize,
}

impl IsolationForest {
    /// Grow `n_trees` trees over `points`, each on a subsample of at most
    /// `max_samples` points.
    pub fn fit(points: &[Point], n_trees: usize, max_samples: usize, seed: u64) -> Self {
        let subsample = max_samples.min(points.len()).max(1);
        let max_depth = (subsample as f64).log2().ceil().max(1.0) as usize;

        let mut master = ChaCha8Rng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..n_trees.max(1)).map(|_| master.gen()).collect();

        let trees = tree_seeds
            .par_iter()
            .map(|&tree_seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(tree_seed);
                let members = if points.is_empty() {
                    Vec::new()
                } else {
                    index::sample(&mut rng, points.len(), subsample).into_vec()
                };
                Node::build(points, members, 0, max_depth, &mut rng)
            })
            .collect();

        IsolationForest { trees, subsample }
    }

    /// Anomaly score in (0, 1]; higher means more anomalous.
    pub fn score(&self, point: &Point) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(point)).sum();
        let mean = total / self.trees.len() as f64;
        let norm = average_path_length(self.subsample);
        if norm == 0.0 {
            return 0.5;
        }
        2f64.powf(-mean / norm)
    }

    pub fn score_all(&self, points: &[Point]) -> Vec<f64> {
        points.par_iter().map(|p| self.score(p)).collect()
    }
}

// ---------------------------------------------------------------------------
// Filter stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FilterStatus {
    Applied,
    /// Too few records to fit a forest; data passed through unchanged.
    Skipped { records: usize, min_records: usize },
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub inliers: Dataset,
    pub outlier_count: usize,
    pub status: FilterStatus,
}

/// Number of outliers for a dataset of `n` records. The small epsilon keeps
/// products like `0.05 * 60` from flooring below their exact value.
pub fn outlier_quota(contamination: f64, n: usize) -> usize {
    if contamination <= 0.0 {
        return 0;
    }
    let quota = (contamination.min(1.0) * n as f64 + 1e-9).floor() as usize;
    quota.min(n)
}

/// Mark the `quota` highest-scoring indices as outliers. Equal scores resolve
/// to the lower index first.
pub fn verdicts(scores: &[f64], quota: usize) -> Vec<bool> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));

    let mut outlier = vec![false; scores.len()];
    for &i in order.iter().take(quota) {
        outlier[i] = true;
    }
    outlier
}

/// Remove the most anomalous `contamination` share of records.
pub fn filter_outliers(dataset: &Dataset, config: &PipelineConfig) -> FilterOutcome {
    let n = dataset.len();
    if n < config.min_records {
        warn!(
            "outlier filter skipped: {n} records, at least {} required",
            config.min_records
        );
        return FilterOutcome {
            inliers: dataset.clone(),
            outlier_count: 0,
            status: FilterStatus::Skipped {
                records: n,
                min_records: config.min_records,
            },
        };
    }

    let quota = outlier_quota(config.contamination, n);
    if quota == 0 {
        debug!("contamination {} yields no outliers for {n} records", config.contamination);
        return FilterOutcome {
            inliers: dataset.clone(),
            outlier_count: 0,
            status: FilterStatus::Applied,
        };
    }

    let points: Vec<Point> = dataset.iter().map(|r| *r.objective_scores()).collect();
    let forest = IsolationForest::fit(&points, config.n_trees, config.max_samples, config.seed);
    let scores = forest.score_all(&points);
    let outlier = verdicts(&scores, quota);

    let inliers = dataset.retain_by(|i, _| !outlier[i]);
    let outlier_count = n - inliers.len();
    info!(
        "outlier filter removed {outlier_count} of {n} records ({} trees, seed {})",
        config.n_trees, config.seed
    );

    FilterOutcome {
        inliers,
        outlier_count,
        status: FilterStatus::Applied,
    }
}
