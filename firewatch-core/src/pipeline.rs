//! Telemetry Pipeline: filter → detector → risk, one reading at a time
//!
//! ## Data Flow
//!
//! ```text
//! payload ──decode──▶ RawReading ──validate──▶ SignalFilter
//!                                                 │ FilteredReading
//!                                                 ▼
//!                                 AnomalyScorer::add_sample + predict
//!                                                 │ Verdict
//!                                                 ▼
//!                                          RiskEvaluator
//!                                                 │ RiskAssessment
//!                                                 ▼
//!                                   ProcessedBundle (latest + history)
//! ```
//!
//! The detector sees the *filtered* channels, which is also what it will be
//! scored against later. Channels missing after filtering are fed to the
//! detector and the evaluator as `0.0`.
//!
//! ## Pull, Don't Push
//!
//! The pipeline keeps the latest bundle and a short history. A display
//! collaborator calls [`TelemetryPipeline::poll`] on its own timer and gets a
//! [`PipelineView`]: waiting for the first reading, online with the latest
//! bundle, or offline because the device has been silent too long.
//!
//! ## Concurrency
//!
//! One pipeline instance per device, mutated in place. Hosts that deliver
//! readings from several threads wrap it in a [`SharedPipeline`], which
//! serializes every call behind a mutex so the bounded windows keep their
//! append order.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{
    buffer::BoundedWindow,
    config::JsonConfig,
    constants::{DEFAULT_HISTORY_CAPACITY, DEFAULT_OFFLINE_TIMEOUT_MS},
    errors::{ConfigError, ConfigResult, PipelineError, PipelineResult},
    filter::{FilterConfig, FilterStatus, SignalFilter},
    readings::{DeviceMetadata, FilteredReading, ProximitySource, RawReading},
    risk::{RiskAssessment, RiskEvaluator, RiskThresholds},
    time::{elapsed_ms, Timestamp},
    traits::{AnomalyScorer, Verdict, WindowStatistics},
};

/// Configuration for the telemetry pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Signal filter parameters
    pub filter: FilterConfig,
    /// Risk threshold table
    pub risk: RiskThresholds,
    /// Silence after which the device is reported offline (ms)
    pub offline_timeout_ms: u64,
    /// Filtered points kept for charting
    pub history_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            risk: RiskThresholds::default(),
            offline_timeout_ms: DEFAULT_OFFLINE_TIMEOUT_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl JsonConfig for PipelineConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.filter.validate()?;
        self.risk.validate()?;

        if self.offline_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "offline_timeout_ms",
                reason: "must be greater than zero",
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "history_capacity",
                reason: "must be at least 1",
            });
        }

        Ok(())
    }
}

/// Everything produced for one reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBundle {
    /// Filter output
    pub filtered: FilteredReading,
    /// Detector output
    pub verdict: Verdict,
    /// Risk assessment
    pub risk: RiskAssessment,
    /// Passthrough device metadata
    pub metadata: DeviceMetadata,
}

/// One charted point, missing channels already defaulted to zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Timestamp of the reading
    pub timestamp: Timestamp,
    /// Filtered temperature
    pub temperature: f64,
    /// Filtered humidity
    pub humidity: f64,
    /// Filtered gas
    pub gas: f64,
    /// Filtered proximity
    pub proximity: f64,
}

impl From<&FilteredReading> for HistoryPoint {
    fn from(filtered: &FilteredReading) -> Self {
        let sample = filtered.sample();
        Self {
            timestamp: filtered.timestamp,
            temperature: sample.temperature,
            humidity: sample.humidity,
            gas: sample.gas,
            proximity: filtered.proximity,
        }
    }
}

/// Connectivity of the edge device as seen from the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    /// Nothing received yet
    Waiting,
    /// Last reading is younger than the offline timeout
    Online {
        /// Age of the last reading (ms)
        age_ms: u64,
    },
    /// Device silent for at least the offline timeout
    Offline {
        /// Time since the last reading (ms)
        silent_for_ms: u64,
    },
}

impl LinkStatus {
    /// Status at `now` given the receipt time of the last accepted reading
    pub fn evaluate(last_received: Option<Timestamp>, now: Timestamp, offline_timeout_ms: u64) -> Self {
        match last_received {
            None => LinkStatus::Waiting,
            Some(last) => {
                let age = elapsed_ms(last, now);
                if age < offline_timeout_ms {
                    LinkStatus::Online { age_ms: age }
                } else {
                    LinkStatus::Offline { silent_for_ms: age }
                }
            }
        }
    }
}

/// What a display should render right now
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PipelineView<'a> {
    /// Waiting for the first reading
    Waiting,
    /// Device online; render the latest bundle
    Online {
        /// Latest bundle
        bundle: &'a ProcessedBundle,
        /// Its age (ms)
        age_ms: u64,
    },
    /// Device offline; the last bundle is stale and shown for reference only
    Offline {
        /// Time since the last reading (ms)
        silent_for_ms: u64,
        /// Last bundle before the silence
        last: &'a ProcessedBundle,
    },
}

/// Running counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Readings that went through the whole pipeline
    pub processed: u64,
    /// Payloads or readings rejected as malformed
    pub rejected: u64,
    /// Proximity values discarded as out-of-range artifacts
    pub proximity_artifacts: u64,
}

/// Per-device processing pipeline
pub struct TelemetryPipeline<D> {
    config: PipelineConfig,
    filter: SignalFilter,
    detector: D,
    evaluator: RiskEvaluator,
    history: BoundedWindow<HistoryPoint>,
    latest: Option<ProcessedBundle>,
    last_received: Option<Timestamp>,
    stats: PipelineStats,
}

impl<D: AnomalyScorer> TelemetryPipeline<D> {
    /// Assemble a pipeline around a detector
    pub fn new(config: PipelineConfig, detector: D) -> Self {
        Self {
            filter: SignalFilter::new(config.filter.clone()),
            evaluator: RiskEvaluator::new(config.risk.clone()),
            history: BoundedWindow::new(config.history_capacity),
            detector,
            latest: None,
            last_received: None,
            stats: PipelineStats::default(),
            config,
        }
    }

    /// Process one decoded reading
    ///
    /// A reading with non-finite channels is rejected before any state is touched.
    pub fn on_reading(&mut self, raw: RawReading) -> PipelineResult<ProcessedBundle> {
        if let Err(e) = raw.validate() {
            self.stats.rejected += 1;
            log::warn!("rejected reading at {}: {}", raw.timestamp, e);
            return Err(e);
        }

        let filtered = self.filter.process(
            raw.temperature,
            raw.humidity,
            raw.gas,
            raw.proximity,
            raw.timestamp,
        );
        if matches!(filtered.proximity_source, ProximitySource::HeldAfterArtifact { .. }) {
            self.stats.proximity_artifacts += 1;
        }

        let sample = filtered.sample();
        self.detector.add_sample(sample);
        let verdict = self.detector.predict(sample);

        let risk = self.evaluator.evaluate(
            sample.temperature,
            sample.gas,
            sample.humidity,
            filtered.proximity,
            &verdict,
        );

        log::debug!(
            "reading at {}: level={} score={} detector={:?}",
            raw.timestamp,
            risk.level,
            risk.score,
            verdict.status
        );

        self.history.push(HistoryPoint::from(&filtered));
        self.last_received = Some(raw.timestamp);
        self.stats.processed += 1;

        let bundle = ProcessedBundle {
            filtered,
            verdict,
            risk,
            metadata: raw.metadata,
        };
        self.latest = Some(bundle.clone());

        Ok(bundle)
    }

    /// Decode a wire payload received at `received_at` and process it
    pub fn ingest(&mut self, payload: &[u8], received_at: Timestamp) -> PipelineResult<ProcessedBundle> {
        let raw = match RawReading::from_json(payload, received_at) {
            Ok(raw) => raw,
            Err(e) => {
                self.stats.rejected += 1;
                log::warn!("rejected payload ({} bytes): {}", payload.len(), e);
                return Err(e);
            }
        };

        self.on_reading(raw)
    }

    /// Connectivity at `now`
    pub fn link_status(&self, now: Timestamp) -> LinkStatus {
        LinkStatus::evaluate(self.last_received, now, self.config.offline_timeout_ms)
    }

    /// Receipt time of the last accepted reading
    pub fn last_received(&self) -> Option<Timestamp> {
        self.last_received
    }

    /// What to render at `now`
    pub fn poll(&self, now: Timestamp) -> PipelineView<'_> {
        match (self.link_status(now), self.latest.as_ref()) {
            (LinkStatus::Online { age_ms }, Some(bundle)) => PipelineView::Online { bundle, age_ms },
            (LinkStatus::Offline { silent_for_ms }, Some(last)) => {
                PipelineView::Offline { silent_for_ms, last }
            }
            _ => PipelineView::Waiting,
        }
    }

    /// Latest bundle regardless of staleness
    pub fn latest(&self) -> Option<&ProcessedBundle> {
        self.latest.as_ref()
    }

    /// Charted history, oldest first
    pub fn history(&self) -> impl Iterator<Item = &HistoryPoint> + '_ {
        self.history.iter()
    }

    /// Filter introspection
    pub fn filter_status(&self) -> FilterStatus {
        self.filter.status()
    }

    /// Detector window statistics
    pub fn detector_statistics(&self) -> Option<WindowStatistics> {
        self.detector.statistics()
    }

    /// The detector
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Counters
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Move the pipeline behind a mutex for multi-threaded hosts
    pub fn into_shared(self) -> SharedPipeline<D> {
        SharedPipeline {
            inner: Arc::new(Mutex::new(self)),
        }
    }
}

/// Pipeline shared between threads; every call is serialized
pub struct SharedPipeline<D> {
    inner: Arc<Mutex<TelemetryPipeline<D>>>,
}

impl<D> Clone for SharedPipeline<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: AnomalyScorer> SharedPipeline<D> {
    fn lock(&self) -> PipelineResult<MutexGuard<'_, TelemetryPipeline<D>>> {
        self.inner.lock().map_err(|_| PipelineError::PoisonedLock)
    }

    /// See [`TelemetryPipeline::on_reading`]
    pub fn on_reading(&self, raw: RawReading) -> PipelineResult<ProcessedBundle> {
        self.lock()?.on_reading(raw)
    }

    /// See [`TelemetryPipeline::ingest`]
    pub fn ingest(&self, payload: &[u8], received_at: Timestamp) -> PipelineResult<ProcessedBundle> {
        self.lock()?.ingest(payload, received_at)
    }

    /// Run a read-only closure against the pipeline
    pub fn with<R>(&self, f: impl FnOnce(&TelemetryPipeline<D>) -> R) -> PipelineResult<R> {
        Ok(f(&*self.lock()?))
    }
}
