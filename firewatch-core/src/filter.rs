//! Selective smoothing and spike rejection for raw sensor signals
//!
//! ## Two Kinds of Channel
//!
//! Temperature, humidity and gas change slowly. Their sensors (DHT11, MQ-135)
//! are noisy from tick to tick, so each of them gets a short moving average:
//!
//! ```text
//! raw temp:   24.0  30.0  24.5  25.0
//! window:     [24]  [24,30]  [24,30,24.5]  [30,24.5,25]
//! output:     24.0  27.0  26.2  26.5
//! ```
//!
//! Proximity is the opposite. An approaching person or animal has to show up
//! on the very tick it is measured, so it is never averaged. The ultrasonic
//! sensor does, however, produce large spurious echoes beyond its physical
//! range. Those are discarded and the last valid distance is held instead:
//!
//! ```text
//! raw:     12   840   15   (none)
//! output:  12    12   15    15
//! ```
//!
//! The filter owns all of its state; nothing outside reads it except through
//! [`SignalFilter::status`].

use serde::{Deserialize, Serialize};

use crate::{
    buffer::BoundedWindow,
    config::JsonConfig,
    constants::{DEFAULT_SMOOTHING_WINDOW, PROXIMITY_CEILING_CM},
    errors::{ConfigError, ConfigResult},
    readings::{FilteredReading, ProximitySource},
    time::Timestamp,
};

/// Configuration for the signal filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Samples averaged per slow channel
    pub window_size: usize,
    /// Proximity values above this are treated as artifacts
    pub proximity_ceiling: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_SMOOTHING_WINDOW,
            proximity_ceiling: PROXIMITY_CEILING_CM,
        }
    }
}

impl JsonConfig for FilterConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid {
                field: "filter.window_size",
                reason: "must be at least 1",
            });
        }

        if !(self.proximity_ceiling.is_finite() && self.proximity_ceiling > 0.0) {
            return Err(ConfigError::Invalid {
                field: "filter.proximity_ceiling",
                reason: "must be a positive finite distance",
            });
        }

        Ok(())
    }
}

/// Introspection snapshot of the filter state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterStatus {
    /// Samples currently averaged for temperature
    pub temperature_samples: usize,
    /// Samples currently averaged for humidity
    pub humidity_samples: usize,
    /// Samples currently averaged for gas
    pub gas_samples: usize,
    /// Smoothing window size
    pub window_size: usize,
    /// Proximity artifact ceiling
    pub proximity_ceiling: f64,
    /// Distance currently held as last valid
    pub last_valid_proximity: f64,
}

/// Per-device smoothing filter
#[derive(Debug, Clone)]
pub struct SignalFilter {
    temperature: BoundedWindow<f64>,
    humidity: BoundedWindow<f64>,
    gas: BoundedWindow<f64>,
    last_valid_proximity: f64,
    config: FilterConfig,
}

impl Default for SignalFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl SignalFilter {
    /// Create a filter with empty history and a last valid proximity of 0
    pub fn new(config: FilterConfig) -> Self {
        Self {
            temperature: BoundedWindow::new(config.window_size),
            humidity: BoundedWindow::new(config.window_size),
            gas: BoundedWindow::new(config.window_size),
            last_valid_proximity: 0.0,
            config,
        }
    }

    /// Filter one tick of raw values
    ///
    /// Present slow channels are appended to their window and replaced by the
    /// window mean rounded to one decimal. Absent ones stay absent.
    pub fn process(
        &mut self,
        temperature: Option<f64>,
        humidity: Option<f64>,
        gas: Option<f64>,
        proximity_raw: Option<f64>,
        timestamp: Timestamp,
    ) -> FilteredReading {
        let temperature = temperature.and_then(|v| smooth(&mut self.temperature, v));
        let humidity = humidity.and_then(|v| smooth(&mut self.humidity, v));
        let gas = gas.and_then(|v| smooth(&mut self.gas, v));

        let (proximity, proximity_source) = self.filter_proximity(proximity_raw);

        FilteredReading {
            temperature,
            humidity,
            gas,
            proximity,
            proximity_source,
            timestamp,
        }
    }

    fn filter_proximity(&mut self, raw: Option<f64>) -> (f64, ProximitySource) {
        match raw {
            None => (self.last_valid_proximity, ProximitySource::HeldMissing),
            Some(value) if !value.is_finite() || value > self.config.proximity_ceiling => {
                log::debug!(
                    "proximity artifact {} rejected (ceiling {}), holding {}",
                    value,
                    self.config.proximity_ceiling,
                    self.last_valid_proximity
                );
                (
                    self.last_valid_proximity,
                    ProximitySource::HeldAfterArtifact { rejected: value },
                )
            }
            Some(value) => {
                self.last_valid_proximity = value;
                (value, ProximitySource::Measured)
            }
        }
    }

    /// Most recent physically plausible distance
    pub fn last_valid_proximity(&self) -> f64 {
        self.last_valid_proximity
    }

    /// Read-only view of the filter state
    pub fn status(&self) -> FilterStatus {
        FilterStatus {
            temperature_samples: self.temperature.len(),
            humidity_samples: self.humidity.len(),
            gas_samples: self.gas.len(),
            window_size: self.config.window_size,
            proximity_ceiling: self.config.proximity_ceiling,
            last_valid_proximity: self.last_valid_proximity,
        }
    }
}

fn smooth(window: &mut BoundedWindow<f64>, value: f64) -> Option<f64> {
    window.push(value);
    window.mean().map(round_to_tenth)
}

/// Round half away from zero to one decimal place
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
