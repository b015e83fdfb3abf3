//! Rule-Based Fire Risk Scoring
//!
//! ## Scoring Model
//!
//! The evaluator fuses three kinds of evidence into one additive score:
//!
//! | Condition | Score | Factor |
//! |---|---|---|
//! | temp > 45 | +40 | critical temperature |
//! | 35 < temp ≤ 45 | +20 | elevated temperature |
//! | gas > 300 | +35 | dangerous gas level |
//! | 150 < gas ≤ 300 | +15 | elevated gas |
//! | hum < 20 | +15 | very low humidity |
//! | 20 ≤ hum < 35 | +5 | low humidity |
//! | detector flags an outlier | +20 | anomaly detected |
//! | 0 < proximity < 10 | +0 | movement detected |
//!
//! Each physical channel is a two-tier threshold where only the higher tier
//! fires. The score maps to a level:
//!
//! ```text
//!   0 ───────── 30 ───────── 60 ─────────▶
//!      NORMAL      WARNING      CRITICAL
//! ```
//!
//! Movement never changes the score; it is listed as a factor and appended to
//! the message so an approaching person is visible even on a calm day.
//!
//! ## Statelessness
//!
//! Every evaluation depends only on its five inputs. Debouncing or latching
//! alerts over time is the caller's business.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    config::JsonConfig,
    constants::*,
    errors::{ConfigError, ConfigResult},
    traits::Verdict,
};

/// Suffix appended to the message when movement is detected
pub const MOVEMENT_SUFFIX: &str = " | MOVEMENT DETECTED";

/// Alert level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Score below the warning threshold
    Normal,
    /// Score between the warning and critical thresholds
    Warning,
    /// Score at or above the critical threshold
    Critical,
}

impl RiskLevel {
    /// Message shown for this level before any suffix
    pub const fn base_message(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "System stable",
            RiskLevel::Warning => "Dangerous conditions",
            RiskLevel::Critical => "FIRE ALERT!",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Normal => "NORMAL",
            RiskLevel::Warning => "WARNING",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Condition that contributed to an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    /// Temperature above the critical threshold
    CriticalTemperature,
    /// Temperature above the elevated threshold
    ElevatedTemperature,
    /// Gas above the dangerous threshold
    DangerousGas,
    /// Gas above the elevated threshold
    ElevatedGas,
    /// Humidity below the very-low threshold
    VeryLowHumidity,
    /// Humidity below the low threshold
    LowHumidity,
    /// Detector flagged the sample
    AnomalyDetected,
    /// Object close to the device
    MovementDetected,
}

impl RiskFactor {
    /// Human-readable label
    pub const fn label(&self) -> &'static str {
        match self {
            RiskFactor::CriticalTemperature => "critical temperature",
            RiskFactor::ElevatedTemperature => "elevated temperature",
            RiskFactor::DangerousGas => "dangerous gas level",
            RiskFactor::ElevatedGas => "elevated gas",
            RiskFactor::VeryLowHumidity => "very low humidity",
            RiskFactor::LowHumidity => "low humidity",
            RiskFactor::AnomalyDetected => "anomaly detected",
            RiskFactor::MovementDetected => "movement detected",
        }
    }

    /// Score this factor adds
    pub const fn weight(&self) -> u32 {
        match self {
            RiskFactor::CriticalTemperature => WEIGHT_TEMP_CRITICAL,
            RiskFactor::ElevatedTemperature => WEIGHT_TEMP_ELEVATED,
            RiskFactor::DangerousGas => WEIGHT_GAS_DANGEROUS,
            RiskFactor::ElevatedGas => WEIGHT_GAS_ELEVATED,
            RiskFactor::VeryLowHumidity => WEIGHT_HUMIDITY_VERY_LOW,
            RiskFactor::LowHumidity => WEIGHT_HUMIDITY_LOW,
            RiskFactor::AnomalyDetected => WEIGHT_ANOMALY,
            RiskFactor::MovementDetected => 0,
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Alert level
    pub level: RiskLevel,
    /// Additive score, unbounded above
    pub score: u32,
    /// Factors in check order: temperature, gas, humidity, anomaly, movement
    pub contributing_factors: Vec<RiskFactor>,
    /// Level message, with the movement suffix when applicable
    pub message: String,
}

impl RiskAssessment {
    /// Whether the movement factor fired
    pub fn movement_detected(&self) -> bool {
        self.contributing_factors.contains(&RiskFactor::MovementDetected)
    }

    /// Factor labels, in order
    pub fn factor_labels(&self) -> Vec<&'static str> {
        self.contributing_factors.iter().map(RiskFactor::label).collect()
    }
}

/// Threshold table for the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Elevated temperature tier (°C, strict lower bound)
    pub temperature_elevated: f64,
    /// Critical temperature tier (°C, strict lower bound)
    pub temperature_critical: f64,
    /// Elevated gas tier (ppm, strict lower bound)
    pub gas_elevated: f64,
    /// Dangerous gas tier (ppm, strict lower bound)
    pub gas_dangerous: f64,
    /// Low humidity tier (%, strict upper bound)
    pub humidity_low: f64,
    /// Very low humidity tier (%, strict upper bound)
    pub humidity_very_low: f64,
    /// Movement distance (cm, strict upper bound)
    pub movement_distance: f64,
    /// Score at or above which the level is WARNING
    pub warning_score: u32,
    /// Score at or above which the level is CRITICAL
    pub critical_score: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            temperature_elevated: TEMP_ELEVATED_C,
            temperature_critical: TEMP_CRITICAL_C,
            gas_elevated: GAS_ELEVATED_PPM,
            gas_dangerous: GAS_DANGEROUS_PPM,
            humidity_low: HUMIDITY_LOW_PCT,
            humidity_very_low: HUMIDITY_VERY_LOW_PCT,
            movement_distance: MOVEMENT_DISTANCE_CM,
            warning_score: WARNING_SCORE,
            critical_score: CRITICAL_SCORE,
        }
    }
}

impl JsonConfig for RiskThresholds {
    fn validate(&self) -> ConfigResult<()> {
        if self.temperature_elevated > self.temperature_critical {
            return Err(ConfigError::Invalid {
                field: "risk.temperature_elevated",
                reason: "must not exceed temperature_critical",
            });
        }
        if self.gas_elevated > self.gas_dangerous {
            return Err(ConfigError::Invalid {
                field: "risk.gas_elevated",
                reason: "must not exceed gas_dangerous",
            });
        }
        if self.humidity_very_low > self.humidity_low {
            return Err(ConfigError::Invalid {
                field: "risk.humidity_very_low",
                reason: "must not exceed humidity_low",
            });
        }
        if self.warning_score > self.critical_score {
            return Err(ConfigError::Invalid {
                field: "risk.warning_score",
                reason: "must not exceed critical_score",
            });
        }
        Ok(())
    }
}

/// Stateless risk evaluator
#[derive(Debug, Clone, Default)]
pub struct RiskEvaluator {
    thresholds: RiskThresholds,
}

impl RiskEvaluator {
    /// Create an evaluator with a custom threshold table
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    /// Threshold table in use
    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Fuse readings, verdict and proximity into an assessment
    pub fn evaluate(
        &self,
        temperature: f64,
        gas: f64,
        humidity: f64,
        proximity: f64,
        verdict: &Verdict,
    ) -> RiskAssessment {
        let t = &self.thresholds;
        let mut factors = Vec::new();

        if temperature > t.temperature_critical {
            factors.push(RiskFactor::CriticalTemperature);
        } else if temperature > t.temperature_elevated {
            factors.push(RiskFactor::ElevatedTemperature);
        }

        if gas > t.gas_dangerous {
            factors.push(RiskFactor::DangerousGas);
        } else if gas > t.gas_elevated {
            factors.push(RiskFactor::ElevatedGas);
        }

        if humidity < t.humidity_very_low {
            factors.push(RiskFactor::VeryLowHumidity);
        } else if humidity < t.humidity_low {
            factors.push(RiskFactor::LowHumidity);
        }

        if verdict.is_anomalous {
            factors.push(RiskFactor::AnomalyDetected);
        }

        let movement = proximity > 0.0 && proximity < t.movement_distance;
        if movement {
            factors.push(RiskFactor::MovementDetected);
        }

        let score = factors.iter().map(RiskFactor::weight).sum();
        let level = self.level_for(score);

        let mut message = level.base_message().to_string();
        if movement {
            message.push_str(MOVEMENT_SUFFIX);
        }

        RiskAssessment {
            level,
            score,
            contributing_factors: factors,
            message,
        }
    }

    /// Level for a score under the configured cut-offs
    pub fn level_for(&self, score: u32) -> RiskLevel {
        if score >= self.thresholds.critical_score {
            RiskLevel::Critical
        } else if score >= self.thresholds.warning_score {
            RiskLevel::Warning
        } else {
            RiskLevel::Normal
        }
    }
}
