//! Train-once anomaly detector over (temperature, humidity, gas)
//!
//! ## Lifecycle
//!
//! ```text
//!            add_sample                     add_sample (window = min_samples)
//! TRAINING ─────────────▶ TRAINING ─────────────────────────────────▶ TRAINED
//!                                    fit scaler + forest on the window     │
//!                                                                          │ add_sample
//!                                                                          ▼
//!                                                          window grows, model frozen
//! ```
//!
//! The model is fitted exactly once, on the window as it stands when it first
//! reaches `min_samples`. Later samples only refresh the window statistics.
//! If that fit is degenerate (non-finite values in the window) the detector
//! logs it, stays untrained, and tries again on the next sample.

use firewatch_core::{
    buffer::BoundedWindow,
    config::JsonConfig,
    errors::{ConfigError, ConfigResult},
    AnomalyScorer, ChannelSample, Verdict, WindowStatistics,
};
use serde::{Deserialize, Serialize};

use crate::{
    ChannelScaler, ForestConfig, IsolationForest, MLResult, Sample, DEFAULT_CONTAMINATION,
    DEFAULT_NUM_TREES, DEFAULT_SAMPLE_SIZE, DEFAULT_SEED,
};

/// Default capacity of the sample window
pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

/// Default number of samples that triggers training
pub const DEFAULT_MIN_SAMPLES: usize = 20;

/// Detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples kept in the window
    pub window_capacity: usize,
    /// Window size at which the model is fitted
    pub min_samples: usize,
    /// Expected outlier fraction of the training window
    pub contamination: f64,
    /// Trees in the forest
    pub num_trees: usize,
    /// Upper bound on the per-tree subsample
    pub max_samples: usize,
    /// Random seed
    pub seed: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            min_samples: DEFAULT_MIN_SAMPLES,
            contamination: DEFAULT_CONTAMINATION,
            num_trees: DEFAULT_NUM_TREES,
            max_samples: DEFAULT_SAMPLE_SIZE,
            seed: DEFAULT_SEED,
        }
    }
}

impl DetectorConfig {
    fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            num_trees: self.num_trees,
            max_samples: self.max_samples,
            contamination: self.contamination,
            seed: self.seed,
        }
    }
}

impl JsonConfig for DetectorConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.window_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "detector.window_capacity",
                reason: "must be at least 1",
            });
        }
        if self.min_samples < 2 {
            return Err(ConfigError::Invalid {
                field: "detector.min_samples",
                reason: "must be at least 2",
            });
        }
        if self.min_samples > self.window_capacity {
            return Err(ConfigError::Invalid {
                field: "detector.min_samples",
                reason: "must not exceed window_capacity",
            });
        }
        if self.num_trees == 0 {
            return Err(ConfigError::Invalid {
                field: "detector.num_trees",
                reason: "must be at least 1",
            });
        }
        if self.max_samples < 2 {
            return Err(ConfigError::Invalid {
                field: "detector.max_samples",
                reason: "must be at least 2",
            });
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ConfigError::Invalid {
                field: "detector.contamination",
                reason: "must be in (0, 0.5]",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct TrainedModel {
    scaler: ChannelScaler,
    forest: IsolationForest,
}

/// Isolation-forest detector implementing [`AnomalyScorer`]
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: DetectorConfig,
    window: BoundedWindow<ChannelSample>,
    model: Option<TrainedModel>,
    training_size: usize,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl AnomalyDetector {
    /// Untrained detector with an empty window
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            window: BoundedWindow::new(config.window_capacity),
            config,
            model: None,
            training_size: 0,
        }
    }

    fn train(&self) -> MLResult<TrainedModel> {
        let scaler = ChannelScaler::fit(self.window.iter())?;
        let scaled: Vec<Sample> = self.window.iter().map(|&s| scaler.transform(s)).collect();

        let mut forest = IsolationForest::new(self.config.forest_config());
        forest.fit(&scaled)?;

        Ok(TrainedModel { scaler, forest })
    }

    /// Window statistics, `None` before the first sample
    pub fn get_statistics(&self) -> Option<WindowStatistics> {
        WindowStatistics::compute(self.window.iter())
    }

    /// Samples currently in the window
    pub fn sample_count(&self) -> usize {
        self.window.len()
    }

    /// Window size the model was fitted on, 0 while untrained
    pub fn training_size(&self) -> usize {
        self.training_size
    }

    /// Decision offset of the fitted forest
    pub fn offset(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.forest.offset())
    }

    /// Configuration in use
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl AnomalyScorer for AnomalyDetector {
    fn add_sample(&mut self, sample: ChannelSample) {
        self.window.push(sample);

        if self.model.is_some() || self.window.len() < self.config.min_samples {
            return;
        }

        match self.train() {
            Ok(model) => {
                self.training_size = self.window.len();
                log::info!(
                    "anomaly detector trained on {} samples (offset {:.4})",
                    self.training_size,
                    model.forest.offset()
                );
                self.model = Some(model);
            }
            Err(e) => {
                log::warn!(
                    "anomaly detector fit failed on {} samples, staying untrained: {}",
                    self.window.len(),
                    e
                );
            }
        }
    }

    fn predict(&self, sample: ChannelSample) -> Verdict {
        let Some(model) = &self.model else {
            return Verdict::training(self.window.len(), self.config.min_samples);
        };

        let decision = model.forest.decision_function(&model.scaler.transform(sample));
        Verdict::scored(decision, decision < 0.0)
    }

    fn statistics(&self) -> Option<WindowStatistics> {
        self.get_statistics()
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firewatch_core::DetectorStatus;

    fn baseline(i: usize) -> ChannelSample {
        // Deterministic wobble around a calm room
        let t = (i % 7) as f64 * 0.15;
        let h = (i % 5) as f64 * 0.4;
        let g = (i % 3) as f64 * 1.5;
        ChannelSample::new(22.0 + t, 48.0 + h, 100.0 + g)
    }

    #[test]
    fn training_verdict_until_min_samples() {
        let mut detector = AnomalyDetector::default();

        for i in 0..19 {
            detector.add_sample(baseline(i));
            let verdict = detector.predict(baseline(i));
            assert_eq!(verdict.status, DetectorStatus::Training);
            assert_eq!(verdict.confidence, 0);
            assert_eq!(verdict.message, format!("Collecting data ({}/20)", i + 1));
        }
        assert!(!detector.is_trained());

        detector.add_sample(baseline(19));
        assert!(detector.is_trained());
        assert_eq!(detector.training_size(), 20);
        assert_ne!(detector.predict(baseline(3)).status, DetectorStatus::Training);
    }

    #[test]
    fn trained_detector_never_reports_training() {
        let mut detector = AnomalyDetector::default();
        for i in 0..20 {
            detector.add_sample(baseline(i));
        }

        for sample in [
            ChannelSample::new(0.0, 0.0, 0.0),
            ChannelSample::new(-40.0, 100.0, 10_000.0),
            ChannelSample::new(22.3, 48.4, 101.5),
        ] {
            let verdict = detector.predict(sample);
            assert_ne!(verdict.status, DetectorStatus::Training, "{sample:?}");
            assert!(verdict.raw_score.is_some());
        }
    }

    #[test]
    fn spike_is_flagged() {
        let mut detector = AnomalyDetector::default();
        for i in 0..20 {
            detector.add_sample(baseline(i));
        }

        let verdict = detector.predict(ChannelSample::new(70.0, 10.0, 500.0));
        assert!(verdict.is_anomalous);
        assert_eq!(verdict.status, DetectorStatus::Alert);
        assert!(verdict.raw_score.unwrap() < 0.0);
        assert_eq!(verdict.message, "Unusual pattern detected");
    }

    #[test]
    fn model_is_frozen_after_training() {
        let mut detector = AnomalyDetector::default();
        for i in 0..20 {
            detector.add_sample(baseline(i));
        }

        let probe = ChannelSample::new(23.0, 49.0, 101.0);
        let before = detector.predict(probe);
        let offset = detector.offset();

        // Drift that would move a retrained model
        for i in 0..40 {
            detector.add_sample(ChannelSample::new(40.0 + i as f64, 20.0, 300.0));
        }

        assert_eq!(detector.predict(probe), before);
        assert_eq!(detector.offset(), offset);
        assert_eq!(detector.training_size(), 20);
    }

    #[test]
    fn statistics_track_the_live_window() {
        let mut detector = AnomalyDetector::default();
        assert!(detector.get_statistics().is_none());

        for i in 0..80 {
            detector.add_sample(ChannelSample::new(i as f64, 50.0, 100.0));
        }

        let stats = detector.get_statistics().unwrap();
        assert_eq!(stats.sample_count, 50);
        // Window holds 30..80
        assert!((stats.temperature.mean - 54.5).abs() < 1e-9);
        assert_eq!(stats.humidity.std_dev, 0.0);
    }

    #[test]
    fn constant_window_trains_without_alerts() {
        let mut detector = AnomalyDetector::default();
        for _ in 0..20 {
            detector.add_sample(ChannelSample::new(22.0, 50.0, 100.0));
        }

        assert!(detector.is_trained());
        let verdict = detector.predict(ChannelSample::new(22.0, 50.0, 100.0));
        assert!(!verdict.is_anomalous);
        assert!(verdict.raw_score.unwrap().is_finite());
    }

    #[test]
    fn degenerate_window_retries_until_clean() {
        let mut detector = AnomalyDetector::default();
        detector.add_sample(ChannelSample::new(f64::NAN, 50.0, 100.0));
        for i in 0..49 {
            detector.add_sample(baseline(i));
        }

        // Window is full and still holds the NaN
        assert_eq!(detector.sample_count(), 50);
        assert!(!detector.is_trained());

        // NaN evicted, fit succeeds
        detector.add_sample(baseline(49));
        assert!(detector.is_trained());
        assert_eq!(detector.training_size(), 50);
    }

    #[test]
    fn confidence_follows_decision_score() {
        let mut detector = AnomalyDetector::default();
        for i in 0..20 {
            detector.add_sample(baseline(i));
        }

        let verdict = detector.predict(baseline(5));
        let score = verdict.raw_score.unwrap();
        let expected = ((1.0 - score) * 50.0 + 50.0).round().clamp(0.0, 100.0) as u8;
        assert_eq!(verdict.confidence, expected);
    }

    #[test]
    fn config_validation() {
        assert!(DetectorConfig::default().validate().is_ok());

        let never_trains = DetectorConfig {
            window_capacity: 10,
            min_samples: 20,
            ..DetectorConfig::default()
        };
        assert!(never_trains.validate().is_err());

        let bad_contamination = DetectorConfig {
            contamination: 0.9,
            ..DetectorConfig::default()
        };
        assert!(bad_contamination.validate().is_err());
    }

    #[test]
    fn custom_min_samples() {
        let mut detector = AnomalyDetector::new(DetectorConfig {
            min_samples: 5,
            num_trees: 20,
            ..DetectorConfig::default()
        });
        for i in 0..5 {
            detector.add_sample(baseline(i));
        }
        assert!(detector.is_trained());
        assert_eq!(detector.training_size(), 5);
    }
}
