//! Configuration loading shared by every config struct
//!
//! Config structs implement `Default` with the stock values and derive
//! `Deserialize` with `#[serde(default)]`, so a JSON document only needs the
//! fields it changes:
//!
//! ```rust
//! use firewatch_core::{config::JsonConfig, pipeline::PipelineConfig};
//!
//! let config = PipelineConfig::from_json(r#"{ "offline_timeout_ms": 5000 }"#)?;
//! assert_eq!(config.offline_timeout_ms, 5000);
//! assert_eq!(config.filter.window_size, 3);
//! # Ok::<(), firewatch_core::ConfigError>(())
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::errors::ConfigResult;

/// A configuration document that can be parsed from JSON and checked
pub trait JsonConfig: DeserializeOwned {
    /// Reject parameter combinations the pipeline cannot run with
    fn validate(&self) -> ConfigResult<()>;

    /// Parse and validate a JSON document
    fn from_json(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
