//! Pipeline worker task
//!
//! A single tokio task owns a [`TelemetryPipeline`]. Producers hand it raw
//! payloads through a [`PayloadSender`], which stamps each one with the
//! receipt time before queueing. The latest state is published on a `watch`
//! channel so any number of readers can see it without a lock. Every accepted
//! bundle is also sent on a `broadcast` channel for consumers that must see
//! each one, such as a republisher.

use std::sync::Arc;

use firewatch_core::{
    AnomalyScorer, LinkStatus, PipelineConfig, PipelineError, PipelineStats, ProcessedBundle,
    TelemetryPipeline, TimeSource, Timestamp,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::{Connector, ConnectorError, ConnectorResult};

/// Default depth of the inbound payload queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Bundles buffered per broadcast subscriber before it lags
pub const DEFAULT_BUNDLE_BUFFER: usize = 256;

type Clock = Arc<dyn TimeSource + Send + Sync>;

/// One payload as it arrived
#[derive(Debug)]
struct Inbound {
    payload: Vec<u8>,
    received_at: Timestamp,
}

/// State published after every payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerSnapshot {
    /// Bundle from the most recent accepted reading
    pub latest: Option<ProcessedBundle>,
    /// Pipeline counters at the time of publishing
    pub stats: PipelineStats,
    /// Why the most recent rejected payload was refused
    pub last_rejection: Option<PipelineError>,
}

/// Queues payloads for the worker, stamping the receipt time
#[derive(Clone)]
pub struct PayloadSender {
    tx: mpsc::Sender<Inbound>,
    clock: Clock,
}

impl PayloadSender {
    /// Queue a payload, waiting for room if the worker is behind
    pub async fn submit(&self, payload: Vec<u8>) -> ConnectorResult<()> {
        let inbound = Inbound {
            received_at: self.clock.now(),
            payload,
        };
        self.tx
            .send(inbound)
            .await
            .map_err(|_| ConnectorError::ChannelClosed)
    }

    /// Queue a payload without waiting
    pub fn try_submit(&self, payload: Vec<u8>) -> ConnectorResult<()> {
        let inbound = Inbound {
            received_at: self.clock.now(),
            payload,
        };
        self.tx.try_send(inbound).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ConnectorError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ConnectorError::ChannelClosed,
        })
    }
}

/// Lets a blocking producer (serial reader thread, replay tool) feed the worker
impl Connector for PayloadSender {
    type Error = ConnectorError;

    fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error> {
        log::trace!("payload on `{}` ({} bytes)", topic, data.len());
        self.try_submit(data.to_vec())
    }

    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Builder for the worker task
pub struct PipelineWorker<D> {
    pipeline: TelemetryPipeline<D>,
    queue_capacity: usize,
}

impl<D> PipelineWorker<D>
where
    D: AnomalyScorer + Send + 'static,
{
    /// Worker around a fresh pipeline
    pub fn new(config: PipelineConfig, detector: D) -> Self {
        Self::from_pipeline(TelemetryPipeline::new(config, detector))
    }

    /// Worker around an existing pipeline, keeping its state
    pub fn from_pipeline(pipeline: TelemetryPipeline<D>) -> Self {
        Self {
            pipeline,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Inbound queue depth (minimum 1)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Start the task on the current tokio runtime
    ///
    /// `clock` stamps payloads on receipt and drives [`WorkerHandle::link_status`].
    pub fn spawn<T>(self, clock: T) -> WorkerHandle
    where
        T: TimeSource + Send + Sync + 'static,
    {
        let clock: Clock = Arc::new(clock);
        let offline_timeout_ms = self.pipeline.config().offline_timeout_ms;

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(WorkerSnapshot {
            latest: self.pipeline.latest().cloned(),
            stats: self.pipeline.stats(),
            last_rejection: None,
        });
        let (bundle_tx, _) = broadcast::channel(DEFAULT_BUNDLE_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        log::info!(
            "pipeline worker started (queue capacity {}, offline after {}ms)",
            self.queue_capacity,
            offline_timeout_ms
        );

        let outputs = Outputs {
            snapshot_tx,
            bundle_tx: bundle_tx.clone(),
        };
        let task = tokio::spawn(run(self.pipeline, rx, outputs, shutdown_rx));

        WorkerHandle {
            sender: PayloadSender {
                tx,
                clock: clock.clone(),
            },
            snapshot_rx,
            bundle_tx,
            shutdown_tx,
            task,
            clock,
            offline_timeout_ms,
        }
    }
}

struct Outputs {
    snapshot_tx: watch::Sender<WorkerSnapshot>,
    bundle_tx: broadcast::Sender<ProcessedBundle>,
}

async fn run<D: AnomalyScorer>(
    mut pipeline: TelemetryPipeline<D>,
    mut rx: mpsc::Receiver<Inbound>,
    outputs: Outputs,
    mut shutdown_rx: watch::Receiver<bool>,
) -> PipelineStats {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            inbound = rx.recv() => match inbound {
                Some(inbound) => apply(&mut pipeline, inbound, &outputs),
                None => break,
            },
        }
    }

    // Payloads accepted before shutdown are still applied, in order
    rx.close();
    while let Some(inbound) = rx.recv().await {
        apply(&mut pipeline, inbound, &outputs);
    }

    let stats = pipeline.stats();
    log::info!(
        "pipeline worker stopped: processed={} rejected={} proximity_artifacts={}",
        stats.processed,
        stats.rejected,
        stats.proximity_artifacts
    );
    stats
}

fn apply<D: AnomalyScorer>(pipeline: &mut TelemetryPipeline<D>, inbound: Inbound, outputs: &Outputs) {
    let result = pipeline.ingest(&inbound.payload, inbound.received_at);
    let stats = pipeline.stats();

    match result {
        Ok(bundle) => {
            outputs.snapshot_tx.send_modify(|snapshot| {
                snapshot.latest = Some(bundle.clone());
                snapshot.stats = stats;
            });
            // No subscribers is fine
            let _ = outputs.bundle_tx.send(bundle);
        }
        Err(e) => outputs.snapshot_tx.send_modify(|snapshot| {
            snapshot.stats = stats;
            snapshot.last_rejection = Some(e);
        }),
    }
}

/// Handle to a running worker
pub struct WorkerHandle {
    sender: PayloadSender,
    snapshot_rx: watch::Receiver<WorkerSnapshot>,
    bundle_tx: broadcast::Sender<ProcessedBundle>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<PipelineStats>,
    clock: Clock,
    offline_timeout_ms: u64,
}

impl WorkerHandle {
    /// A sender for producers; clone freely
    pub fn sender(&self) -> PayloadSender {
        self.sender.clone()
    }

    /// Queue one payload
    pub async fn submit(&self, payload: Vec<u8>) -> ConnectorResult<()> {
        self.sender.submit(payload).await
    }

    /// Latest bundle, if any reading has been accepted
    pub fn latest(&self) -> Option<ProcessedBundle> {
        self.snapshot_rx.borrow().latest.clone()
    }

    /// Latest bundle together with counters
    pub fn snapshot(&self) -> WorkerSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that wakes on every processed payload
    pub fn subscribe(&self) -> watch::Receiver<WorkerSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Every bundle accepted from now on, in processing order
    ///
    /// The stream ends once the worker has stopped and this handle is gone. A
    /// subscriber more than [`DEFAULT_BUNDLE_BUFFER`] bundles behind gets
    /// `RecvError::Lagged`.
    pub fn bundles(&self) -> broadcast::Receiver<ProcessedBundle> {
        self.bundle_tx.subscribe()
    }

    /// Link status as of the worker's clock
    pub fn link_status(&self) -> LinkStatus {
        self.link_status_at(self.clock.now())
    }

    /// Link status as of `now`
    pub fn link_status_at(&self, now: Timestamp) -> LinkStatus {
        let last = self
            .snapshot_rx
            .borrow()
            .latest
            .as_ref()
            .map(|bundle| bundle.filtered.timestamp);
        LinkStatus::evaluate(last, now, self.offline_timeout_ms)
    }

    /// Stop the worker after draining queued payloads; returns final counters
    pub async fn shutdown(self) -> ConnectorResult<PipelineStats> {
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| ConnectorError::Worker(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firewatch_core::{FixedTime, RiskLevel};
    use firewatch_ml::AnomalyDetector;
    use std::time::Duration;

    fn payload(temp: f64, gas: f64) -> Vec<u8> {
        format!(r#"{{"temp": {temp}, "hum": 45, "gas": {gas}, "distancia": 150, "device": "kitchen"}}"#)
            .into_bytes()
    }

    fn spawn(clock: Arc<FixedTime>) -> WorkerHandle {
        PipelineWorker::new(PipelineConfig::default(), AnomalyDetector::default()).spawn(clock)
    }

    #[tokio::test]
    async fn drains_queue_on_shutdown() {
        let worker = spawn(Arc::new(FixedTime::new(0)));

        for i in 0..5 {
            worker.submit(payload(22.0 + i as f64 * 0.1, 110.0)).await.unwrap();
        }
        worker.submit(b"not json".to_vec()).await.unwrap();

        let stats = worker.shutdown().await.unwrap();
        assert_eq!(stats.processed, 5);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn snapshot_keeps_rejection_reason() {
        let worker = spawn(Arc::new(FixedTime::new(0)));
        let mut updates = worker.subscribe();

        worker.submit(br#"{"temp": "hot"}"#.to_vec()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), updates.changed())
            .await
            .unwrap()
            .unwrap();

        let snapshot = worker.snapshot();
        assert!(snapshot.latest.is_none());
        assert_eq!(snapshot.stats.rejected, 1);
        match snapshot.last_rejection {
            Some(PipelineError::MalformedReading { reason }) => assert!(reason.contains("temp")),
            other => panic!("unexpected rejection: {other:?}"),
        }

        // An accepted reading leaves the last reason in place
        worker.submit(payload(22.0, 100.0)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), updates.changed())
            .await
            .unwrap()
            .unwrap();
        let snapshot = worker.snapshot();
        assert!(snapshot.latest.is_some());
        assert!(snapshot.last_rejection.is_some());

        worker.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn bundles_stream_sees_same_millisecond_readings() {
        let worker = spawn(Arc::new(FixedTime::new(0)));
        let mut bundles = worker.bundles();

        worker.submit(payload(22.0, 100.0)).await.unwrap();
        worker.submit(b"{".to_vec()).await.unwrap();
        worker.submit(payload(70.0, 500.0)).await.unwrap();
        worker.shutdown().await.unwrap();

        let first = bundles.recv().await.unwrap();
        let second = bundles.recv().await.unwrap();
        assert_eq!(first.filtered.timestamp, second.filtered.timestamp);
        assert_ne!(first, second);
        assert!(matches!(
            bundles.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn publishes_latest_bundle() {
        let clock = Arc::new(FixedTime::new(5_000));
        let worker = spawn(clock.clone());
        let mut updates = worker.subscribe();

        assert!(worker.latest().is_none());
        assert_eq!(worker.link_status(), LinkStatus::Waiting);

        worker.submit(payload(24.0, 120.0)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), updates.changed())
            .await
            .unwrap()
            .unwrap();

        let bundle = worker.latest().unwrap();
        assert_eq!(bundle.filtered.timestamp, 5_000);
        assert_eq!(bundle.risk.level, RiskLevel::Normal);
        assert_eq!(bundle.metadata.get("device"), Some(&serde_json::json!("kitchen")));
        assert_eq!(worker.snapshot().stats.processed, 1);

        clock.advance(3_000);
        assert_eq!(worker.link_status(), LinkStatus::Online { age_ms: 3_000 });

        clock.advance(7_000);
        assert_eq!(
            worker.link_status(),
            LinkStatus::Offline {
                silent_for_ms: 10_000
            }
        );

        worker.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn sender_fails_after_shutdown() {
        let worker = spawn(Arc::new(FixedTime::new(0)));
        let sender = worker.sender();
        assert!(Connector::is_connected(&sender));

        worker.shutdown().await.unwrap();

        assert!(!Connector::is_connected(&sender));
        assert!(matches!(
            sender.submit(payload(22.0, 100.0)).await,
            Err(ConnectorError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn blocking_connector_feeds_worker() {
        let worker = spawn(Arc::new(FixedTime::new(0)));
        let mut sender = worker.sender();

        Connector::send(&mut sender, "serial", &payload(23.0, 105.0)).unwrap();

        let stats = worker.shutdown().await.unwrap();
        assert_eq!(stats.processed, 1);
    }
}
