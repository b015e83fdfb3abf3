//! Error Types for the Telemetry Pipeline
//!
//! ## Error Taxonomy
//!
//! Most bad input is not an error at all. The pipeline recovers locally from
//! the conditions a field deployment produces every day:
//!
//! | Condition | Handling |
//! |---|---|
//! | one channel failed to read this tick | channel is `None` in the filtered reading |
//! | proximity echo beyond the sensor's range | last valid distance is held, see [`ProximitySource`] |
//! | detector queried before it has a baseline | `DetectorStatus::Training` in the verdict |
//! | degenerate training window | detector stays untrained and retries on the next sample |
//!
//! Only structurally invalid input reaches the caller as an error, so it can
//! be logged and counted instead of disappearing:
//!
//! ```rust
//! use firewatch_core::{PipelineError, RawReading};
//!
//! match RawReading::from_json(br#"{"temp": "hot"}"#, 0) {
//!     Err(PipelineError::MalformedReading { reason }) => {
//!         // count_rejection(reason);
//!         assert!(reason.contains("temp"));
//!     }
//!     _ => unreachable!(),
//! }
//! ```
//!
//! [`ProximitySource`]: crate::readings::ProximitySource

use thiserror::Error;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced at the pipeline boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Payload or reading is structurally invalid; nothing was updated
    #[error("Malformed reading: {reason}")]
    MalformedReading {
        /// What made the reading unusable
        reason: String,
    },

    /// Another thread panicked while holding the shared pipeline
    #[error("Pipeline lock poisoned")]
    PoisonedLock,
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::MalformedReading`]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedReading {
            reason: reason.into(),
        }
    }
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A parameter has an unusable value
    #[error("Invalid configuration for `{field}`: {reason}")]
    Invalid {
        /// Offending field, dotted path
        field: &'static str,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Config file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Config document is not valid JSON for the expected shape
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;
