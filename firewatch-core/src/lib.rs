//! Telemetry processing core for Firewatch
//!
//! Turns raw readings from a fire-monitoring edge device into filtered
//! values, a detector verdict and a rule-based risk assessment.
//!
//! Key properties:
//! - One pipeline per device, one reading at a time
//! - Bounded memory: every history is a fixed-capacity window
//! - The anomaly detector is pluggable through [`AnomalyScorer`]
//!
//! ```rust
//! use firewatch_core::{RiskEvaluator, RiskLevel, SignalFilter, Verdict};
//!
//! let mut filter = SignalFilter::default();
//! let filtered = filter.process(Some(48.0), Some(15.0), Some(320.0), Some(150.0), 0);
//! let sample = filtered.sample();
//!
//! let risk = RiskEvaluator::default().evaluate(
//!     sample.temperature,
//!     sample.gas,
//!     sample.humidity,
//!     filtered.proximity,
//!     &Verdict::training(1, 20),
//! );
//! assert_eq!(risk.level, RiskLevel::Critical);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod config;
pub mod constants;
pub mod errors;
pub mod filter;
pub mod pipeline;
pub mod readings;
pub mod risk;
pub mod time;
pub mod traits;

// Public API
pub use config::JsonConfig;
pub use errors::{ConfigError, ConfigResult, PipelineError, PipelineResult};
pub use filter::{FilterConfig, FilterStatus, SignalFilter};
pub use pipeline::{
    LinkStatus, PipelineConfig, PipelineStats, PipelineView, ProcessedBundle, SharedPipeline,
    TelemetryPipeline,
};
pub use readings::{ChannelSample, DeviceMetadata, FilteredReading, ProximitySource, RawReading};
pub use risk::{RiskAssessment, RiskEvaluator, RiskFactor, RiskLevel, RiskThresholds};
pub use time::{FixedTime, SystemTime, TimeSource, Timestamp};
pub use traits::{AnomalyScorer, DetectorStatus, Verdict, WindowStatistics};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
