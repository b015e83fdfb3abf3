//! Pipeline integration for the isolation-forest detector
//!
//! Wires [`AnomalyDetector`] into the core [`TelemetryPipeline`] and bundles
//! both configurations into one document:
//!
//! ```json
//! {
//!   "pipeline": { "offline_timeout_ms": 10000, "filter": { "window_size": 3 } },
//!   "detector": { "min_samples": 20, "window_capacity": 50 }
//! }
//! ```
//!
//! Every field is optional; omitted ones keep their defaults.

use firewatch_core::{
    config::JsonConfig, errors::ConfigResult, PipelineConfig, TelemetryPipeline,
};
use serde::{Deserialize, Serialize};

use crate::{AnomalyDetector, DetectorConfig};

/// Telemetry pipeline running the isolation-forest detector
pub type FireMonitor = TelemetryPipeline<AnomalyDetector>;

/// Full configuration of a [`FireMonitor`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Filter, risk, link and history parameters
    pub pipeline: PipelineConfig,
    /// Detector parameters
    pub detector: DetectorConfig,
}

impl JsonConfig for MonitorConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.pipeline.validate()?;
        self.detector.validate()
    }
}

impl MonitorConfig {
    /// Build a monitor from this configuration
    pub fn build(self) -> FireMonitor {
        log::debug!(
            "building fire monitor: window {} / min {} / {} trees",
            self.detector.window_capacity,
            self.detector.min_samples,
            self.detector.num_trees
        );
        TelemetryPipeline::new(self.pipeline, AnomalyDetector::new(self.detector))
    }
}
