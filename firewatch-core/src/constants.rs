//! Default parameters for the telemetry pipeline
//!
//! All numeric defaults live here with a note on where they come from.
//! Every one of them can be overridden through the config structs in
//! [`crate::config`]; these are only the values used when nothing else is
//! configured.

// ===== SIGNAL FILTER =====

/// Number of samples averaged per slow channel (temperature, humidity, gas).
///
/// Three samples suppress single-tick noise from DHT11/MQ-135 class sensors
/// while adding at most two ticks of lag.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;

/// Physical range ceiling of the ultrasonic distance sensor (cm).
///
/// HC-SR04 datasheet: 2 cm - 400 cm. Anything above is an echo artifact.
pub const PROXIMITY_CEILING_CM: f64 = 400.0;

// ===== RISK THRESHOLDS =====

/// Temperature above which the elevated tier fires (°C).
pub const TEMP_ELEVATED_C: f64 = 35.0;

/// Temperature above which the critical tier fires (°C).
pub const TEMP_CRITICAL_C: f64 = 45.0;

/// Gas reading above which the elevated tier fires (ppm).
pub const GAS_ELEVATED_PPM: f64 = 150.0;

/// Gas reading above which the dangerous tier fires (ppm).
pub const GAS_DANGEROUS_PPM: f64 = 300.0;

/// Humidity below which the low tier fires (%RH).
pub const HUMIDITY_LOW_PCT: f64 = 35.0;

/// Humidity below which the very-low tier fires (%RH).
///
/// Dry fuel ignites readily below ~20% relative humidity.
pub const HUMIDITY_VERY_LOW_PCT: f64 = 20.0;

/// Distance under which an object counts as movement near the device (cm).
pub const MOVEMENT_DISTANCE_CM: f64 = 10.0;

/// Score at or above which the level is WARNING.
pub const WARNING_SCORE: u32 = 30;

/// Score at or above which the level is CRITICAL.
pub const CRITICAL_SCORE: u32 = 60;

// ===== RISK WEIGHTS =====

/// Score added for critical temperature.
pub const WEIGHT_TEMP_CRITICAL: u32 = 40;

/// Score added for elevated temperature.
pub const WEIGHT_TEMP_ELEVATED: u32 = 20;

/// Score added for a dangerous gas level.
pub const WEIGHT_GAS_DANGEROUS: u32 = 35;

/// Score added for elevated gas.
pub const WEIGHT_GAS_ELEVATED: u32 = 15;

/// Score added for very low humidity.
pub const WEIGHT_HUMIDITY_VERY_LOW: u32 = 15;

/// Score added for low humidity.
pub const WEIGHT_HUMIDITY_LOW: u32 = 5;

/// Score added when the anomaly detector flags the sample.
pub const WEIGHT_ANOMALY: u32 = 20;

// ===== LINK / HISTORY =====

/// Silence after which the device is reported offline (ms).
///
/// The edge device publishes roughly every 2 s, so 10 s is several missed ticks.
pub const DEFAULT_OFFLINE_TIMEOUT_MS: u64 = 10_000;

/// Number of filtered points kept for charting.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
