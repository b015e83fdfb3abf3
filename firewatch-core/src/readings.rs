//! Sensor readings as they enter and leave the pipeline
//!
//! The edge device publishes one JSON document per sampling tick:
//!
//! ```json
//! {
//!   "temp": 24.5, "hum": 41.0, "gas": 120.0, "distancia": 85.2,
//!   "hardware": { "modelo_rpi": "Raspberry Pi 4", "cpu_temp": 51.2 },
//!   "estado_sensores": { "dht11": "online", "ultrasonido": "online" }
//! }
//! ```
//!
//! The four channel fields are decoded into a [`RawReading`]; everything else
//! is carried untouched in [`DeviceMetadata`] so the display side can show
//! hardware and per-sensor status without the core interpreting it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{PipelineError, PipelineResult};
use crate::time::Timestamp;

/// Wire key for temperature (°C)
pub const KEY_TEMPERATURE: &str = "temp";
/// Wire key for relative humidity (%)
pub const KEY_HUMIDITY: &str = "hum";
/// Wire key for gas concentration (ppm)
pub const KEY_GAS: &str = "gas";
/// Wire key for ultrasonic distance (cm)
pub const KEY_PROXIMITY: &str = "distancia";

/// Passthrough metadata published alongside the readings
///
/// Opaque to the core; forwarded unchanged in every bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceMetadata(Map<String, Value>);

impl DeviceMetadata {
    /// Wrap an already decoded JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Look up a passthrough field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Hardware description block (`hardware`), if the device sent one
    pub fn hardware(&self) -> Option<&Map<String, Value>> {
        self.0.get("hardware").and_then(Value::as_object)
    }

    /// Per-sensor online/offline block (`estado_sensores`), if present
    pub fn sensor_status(&self) -> Option<&Map<String, Value>> {
        self.0.get("estado_sensores").and_then(Value::as_object)
    }

    /// True when the device sent nothing besides the channels
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Unfiltered sensor output for one sampling tick
///
/// A channel is `None` when its sensor failed to read this tick. A proximity
/// of `0.0` means "no object in range", which is different from a small
/// positive distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// Temperature in °C
    pub temperature: Option<f64>,
    /// Relative humidity in %
    pub humidity: Option<f64>,
    /// Gas concentration in ppm
    pub gas: Option<f64>,
    /// Ultrasonic distance in cm
    pub proximity: Option<f64>,
    /// Receipt time in milliseconds
    pub timestamp: Timestamp,
    /// Passthrough fields
    #[serde(default)]
    pub metadata: DeviceMetadata,
}

impl RawReading {
    /// Empty reading stamped at `timestamp`; fill channels with the `with_*` methods
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Set the temperature channel
    pub fn with_temperature(mut self, value: f64) -> Self {
        self.temperature = Some(value);
        self
    }

    /// Set the humidity channel
    pub fn with_humidity(mut self, value: f64) -> Self {
        self.humidity = Some(value);
        self
    }

    /// Set the gas channel
    pub fn with_gas(mut self, value: f64) -> Self {
        self.gas = Some(value);
        self
    }

    /// Set the proximity channel
    pub fn with_proximity(mut self, value: f64) -> Self {
        self.proximity = Some(value);
        self
    }

    /// Attach passthrough metadata
    pub fn with_metadata(mut self, metadata: DeviceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Decode one wire payload received at `received_at`
    ///
    /// Absent or `null` channels decode as missing. Anything that is not a
    /// JSON object, or a channel holding a non-numeric value, is rejected.
    pub fn from_json(payload: &[u8], received_at: Timestamp) -> PipelineResult<Self> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| PipelineError::malformed(format!("invalid JSON: {e}")))?;

        let Value::Object(mut fields) = value else {
            return Err(PipelineError::malformed("payload is not a JSON object"));
        };

        let temperature = take_channel(&mut fields, KEY_TEMPERATURE)?;
        let humidity = take_channel(&mut fields, KEY_HUMIDITY)?;
        let gas = take_channel(&mut fields, KEY_GAS)?;
        let proximity = take_channel(&mut fields, KEY_PROXIMITY)?;

        Ok(Self {
            temperature,
            humidity,
            gas,
            proximity,
            timestamp: received_at,
            metadata: DeviceMetadata::new(fields),
        })
    }

    /// Reject non-finite channel values before they touch any state
    pub fn validate(&self) -> PipelineResult<()> {
        let channels = [
            (KEY_TEMPERATURE, self.temperature),
            (KEY_HUMIDITY, self.humidity),
            (KEY_GAS, self.gas),
            (KEY_PROXIMITY, self.proximity),
        ];

        for (name, value) in channels {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(PipelineError::malformed(format!(
                        "field `{name}` is not a finite number"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn take_channel(fields: &mut Map<String, Value>, key: &'static str) -> PipelineResult<Option<f64>> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| PipelineError::malformed(format!("field `{key}` is out of range"))),
        Some(_) => Err(PipelineError::malformed(format!(
            "field `{key}` is not a number"
        ))),
    }
}

/// How the proximity value of a filtered reading was obtained
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProximitySource {
    /// Raw value was within range and is passed through
    Measured,
    /// Raw value exceeded the ceiling; last valid value held
    HeldAfterArtifact {
        /// The discarded raw value
        rejected: f64,
    },
    /// No raw value this tick; last valid value held
    HeldMissing,
}

/// Output of the signal filter
///
/// Slow channels are smoothed; proximity is either the instantaneous value or
/// the last valid one. Invariant: `proximity` never exceeds the configured ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredReading {
    /// Smoothed temperature, `None` if the channel did not read this tick
    pub temperature: Option<f64>,
    /// Smoothed humidity
    pub humidity: Option<f64>,
    /// Smoothed gas level
    pub gas: Option<f64>,
    /// Spike-rejected proximity
    pub proximity: f64,
    /// Where `proximity` came from
    pub proximity_source: ProximitySource,
    /// Timestamp of the raw reading
    pub timestamp: Timestamp,
}

impl FilteredReading {
    /// Slow channels as a model sample, missing channels defaulted to zero
    pub fn sample(&self) -> ChannelSample {
        ChannelSample {
            temperature: self.temperature.unwrap_or(0.0),
            humidity: self.humidity.unwrap_or(0.0),
            gas: self.gas.unwrap_or(0.0),
        }
    }
}

/// One (temperature, humidity, gas) triple as seen by the anomaly detector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSample {
    /// Temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: f64,
    /// Gas concentration in ppm
    pub gas: f64,
}

impl ChannelSample {
    /// Build a sample from its three channels
    pub const fn new(temperature: f64, humidity: f64, gas: f64) -> Self {
        Self {
            temperature,
            humidity,
            gas,
        }
    }

    /// Channels in model feature order
    pub const fn to_array(self) -> [f64; 3] {
        [self.temperature, self.humidity, self.gas]
    }

    /// True when all three channels are finite
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}
