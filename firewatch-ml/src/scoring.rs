//! Anomaly score math
//!
//! Turns average path lengths into the score / offset / decision triple used
//! to label samples.

use serde::{Deserialize, Serialize};

use crate::average_path_length;

/// Score of one sample against a fitted forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScore {
    /// `-2^(-E[h]/c(ψ))`, in `[-1, 0)`; lower is more anomalous
    pub score: f64,
    /// `score - offset`; negative means outlier
    pub decision: f64,
    /// Mean path length across trees
    pub avg_path_length: f64,
    /// Number of trees used
    pub num_trees: usize,
}

impl AnomalyScore {
    /// Whether the forest labels this sample an outlier
    pub fn is_outlier(&self) -> bool {
        self.decision < 0.0
    }
}

/// Negated isolation score for a mean path length over subsamples of `subsample_size`
///
/// Short paths give scores near -1, paths of the expected length give -0.5.
pub fn score_from_path_length(avg_path_length: f64, subsample_size: usize) -> f64 {
    let normalizer = average_path_length(subsample_size);
    if normalizer == 0.0 {
        return -0.5;
    }

    -(2f64.powf(-avg_path_length / normalizer))
}

/// Percentile `q` (0..=100) with linear interpolation between closest ranks
///
/// Returns `None` for an empty slice or a slice holding non-finite values.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}
