//! The contract between the pipeline and an anomaly detector
//!
//! The pipeline and the risk evaluator only ever see a detector through
//! [`AnomalyScorer`] and the [`Verdict`] it returns. The isolation-forest
//! detector lives in `firewatch-ml`; tests here use small stand-ins.

use serde::{Deserialize, Serialize};

use crate::readings::ChannelSample;

/// Lifecycle state reported with every verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectorStatus {
    /// Baseline not learned yet
    Training,
    /// Sample looks like the baseline
    Normal,
    /// Sample is an outlier
    Alert,
}

/// Per-tick output of an anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// True iff the model labels the sample an outlier
    pub is_anomalous: bool,
    /// Confidence in percent, 0 while training
    pub confidence: u8,
    /// Lifecycle state
    pub status: DetectorStatus,
    /// Decision-function score, absent while training
    pub raw_score: Option<f64>,
    /// Human-readable summary
    pub message: String,
}

impl Verdict {
    /// Verdict while the baseline is still being collected
    pub fn training(collected: usize, required: usize) -> Self {
        Self {
            is_anomalous: false,
            confidence: 0,
            status: DetectorStatus::Training,
            raw_score: None,
            message: format!("Collecting data ({collected}/{required})"),
        }
    }

    /// Verdict from a trained model's decision score and label
    pub fn scored(raw_score: f64, is_anomalous: bool) -> Self {
        let (status, message) = if is_anomalous {
            (DetectorStatus::Alert, "Unusual pattern detected")
        } else {
            (DetectorStatus::Normal, "Values normal")
        };

        Self {
            is_anomalous,
            confidence: confidence_from_score(raw_score),
            status,
            raw_score: Some(raw_score),
            message: message.to_string(),
        }
    }
}

/// Map a decision score to a percentage: `clamp(round((1 - score) * 50 + 50), 0, 100)`
///
/// Non-finite scores map to 0.
pub fn confidence_from_score(score: f64) -> u8 {
    let pct = ((1.0 - score) * 50.0 + 50.0).round();
    if pct.is_nan() {
        return 0;
    }
    pct.clamp(0.0, 100.0) as u8
}

/// Mean and population standard deviation of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Mean value
    pub mean: f64,
    /// Standard deviation (population)
    pub std_dev: f64,
}

/// Summary of a detector's live sample window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStatistics {
    /// Samples currently in the window
    pub sample_count: usize,
    /// Temperature channel
    pub temperature: ChannelStats,
    /// Humidity channel
    pub humidity: ChannelStats,
    /// Gas channel
    pub gas: ChannelStats,
}

impl WindowStatistics {
    /// Summarize a window, `None` if it is empty
    pub fn compute<'a, I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a ChannelSample>,
        I::IntoIter: Clone,
    {
        let samples = samples.into_iter();
        let count = samples.clone().count();
        if count == 0 {
            return None;
        }

        let channel = |pick: fn(&ChannelSample) -> f64| {
            let n = count as f64;
            let mean = samples.clone().map(pick).sum::<f64>() / n;
            let variance = samples
                .clone()
                .map(|s| (pick(s) - mean).powi(2))
                .sum::<f64>()
                / n;
            ChannelStats {
                mean,
                std_dev: variance.sqrt(),
            }
        };

        Some(Self {
            sample_count: count,
            temperature: channel(|s| s.temperature),
            humidity: channel(|s| s.humidity),
            gas: channel(|s| s.gas),
        })
    }
}

/// Incrementally trained anomaly detector over channel samples
pub trait AnomalyScorer {
    /// Record a sample; may trigger training
    fn add_sample(&mut self, sample: ChannelSample);

    /// Classify a sample against the learned baseline
    fn predict(&self, sample: ChannelSample) -> Verdict;

    /// Statistics over the live window, `None` when no samples were seen
    fn statistics(&self) -> Option<WindowStatistics>;

    /// Whether a baseline has been learned
    fn is_trained(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_verdict_has_no_score() {
        let verdict = Verdict::training(7, 20);
        assert_eq!(verdict.status, DetectorStatus::Training);
        assert_eq!(verdict.confidence, 0);
        assert!(verdict.raw_score.is_none());
        assert!(!verdict.is_anomalous);
        assert_eq!(verdict.message, "Collecting data (7/20)");
    }

    #[test]
    fn scored_verdict_status_follows_label() {
        let normal = Verdict::scored(0.08, false);
        assert_eq!(normal.status, DetectorStatus::Normal);
        assert_eq!(normal.confidence, 96);

        let alert = Verdict::scored(-0.12, true);
        assert_eq!(alert.status, DetectorStatus::Alert);
        assert_eq!(alert.confidence, 100);
    }

    #[test]
    fn confidence_mapping_is_clamped() {
        assert_eq!(confidence_from_score(0.0), 100);
        assert_eq!(confidence_from_score(1.0), 50);
        assert_eq!(confidence_from_score(3.0), 0);
        assert_eq!(confidence_from_score(-5.0), 100);
        assert_eq!(confidence_from_score(0.5), 75);
        assert_eq!(confidence_from_score(f64::NAN), 0);
    }

    #[test]
    fn statistics_population_std() {
        let samples = vec![
            ChannelSample::new(20.0, 40.0, 100.0),
            ChannelSample::new(22.0, 40.0, 100.0),
            ChannelSample::new(24.0, 40.0, 100.0),
        ];

        let stats = WindowStatistics::compute(&samples).unwrap();
        assert_eq!(stats.sample_count, 3);
        assert!((stats.temperature.mean - 22.0).abs() < 1e-12);
        assert!((stats.temperature.std_dev - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(stats.humidity.std_dev, 0.0);
    }

    #[test]
    fn statistics_of_empty_window() {
        let samples: Vec<ChannelSample> = Vec::new();
        assert!(WindowStatistics::compute(&samples).is_none());
    }
}
