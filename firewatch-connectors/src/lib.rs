//! Transport Connectors for the Fire Monitor
//!
//! ## Overview
//!
//! The core pipeline is synchronous and owns its state. This crate puts it
//! behind async plumbing so a broker, a serial reader or a test can feed it,
//! and a display can pull the latest result whenever it redraws.
//!
//! ```text
//!  MQTT broker ──▶ MqttIngest ──┐
//!                               │ PayloadSender (mpsc, stamped on receipt)
//!  serial thread ──────────────▶┤
//!                               ▼
//!                        PipelineWorker task ── owns TelemetryPipeline
//!                               │
//!                               │ watch::Sender<WorkerSnapshot>
//!                               ▼
//!             WorkerHandle::latest / link_status / subscribe
//!                               │
//!                               ▼
//!                     MqttPublisher (optional republish)
//! ```
//!
//! ## Why a Worker Task?
//!
//! One task owns the pipeline, so readings are applied strictly in arrival
//! order without a lock, and a slow display never blocks ingestion. Readers
//! get a cheap clone of the last snapshot from a `watch` channel.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use firewatch_connectors::PipelineWorker;
//! use firewatch_core::{PipelineConfig, SystemTime};
//! # use firewatch_core::{AnomalyScorer, ChannelSample, Verdict, WindowStatistics};
//! # struct Detector;
//! # impl AnomalyScorer for Detector {
//! #     fn add_sample(&mut self, _: ChannelSample) {}
//! #     fn predict(&self, _: ChannelSample) -> Verdict { Verdict::training(0, 20) }
//! #     fn statistics(&self) -> Option<WindowStatistics> { None }
//! #     fn is_trained(&self) -> bool { false }
//! # }
//!
//! # async fn run() -> Result<(), firewatch_connectors::ConnectorError> {
//! let worker = PipelineWorker::new(PipelineConfig::default(), Detector).spawn(SystemTime);
//!
//! worker
//!     .sender()
//!     .submit(br#"{"temp": 24.5, "hum": 40, "gas": 130, "distancia": 120}"#.to_vec())
//!     .await?;
//!
//! if let Some(bundle) = worker.latest() {
//!     println!("{} ({})", bundle.risk.level, bundle.risk.message);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub mod worker;

// Re-export common types
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConfig, MqttCredentials, MqttIngest, MqttPublisher};
pub use worker::{PayloadSender, PipelineWorker, WorkerHandle, WorkerSnapshot};

use thiserror::Error;

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Transport is not connected
    #[error("Not connected")]
    NotConnected,

    /// The pipeline worker is gone
    #[error("Worker channel closed")]
    ChannelClosed,

    /// Worker queue is full (non-blocking submit only)
    #[error("Worker queue full")]
    QueueFull,

    /// Transport-level failure
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unusable connector configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bundle could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Worker task panicked or was aborted
    #[error("Worker failed: {0}")]
    Worker(String),
}

/// Blocking connector, for hosts without an async runtime on the sending side
pub trait Connector {
    /// Error type
    type Error;

    /// Hand one message to the transport
    fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Check if connected
    fn is_connected(&self) -> bool;
}

/// Async version of the Connector trait
#[async_trait::async_trait]
pub trait AsyncConnector: Send {
    /// Error type
    type Error;

    /// Send one message asynchronously
    async fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Get connection statistics
    fn stats(&self) -> ConnectionStats;
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Messages delivered to the transport
    pub messages_sent: u64,
    /// Messages the transport refused
    pub messages_failed: u64,
    /// Messages received from the transport
    pub messages_received: u64,
    /// Payload bytes sent
    pub bytes_sent: u64,
    /// Number of reconnections
    pub reconnections: u32,
    /// Last error message
    pub last_error: Option<String>,
}

impl ConnectionStats {
    pub(crate) fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub(crate) fn record_failure(&mut self, error: impl ToString) {
        self.messages_failed += 1;
        self.last_error = Some(error.to_string());
    }
}
