//! MQTT transport
//!
//! [`MqttIngest`] subscribes to the device telemetry topic and feeds every
//! publish into a pipeline worker. [`MqttPublisher`] pushes processed bundles
//! back to the broker for dashboards that do not run the pipeline themselves.
//!
//! Both sides reconnect on their own: rumqttc re-dials on the next poll after
//! a connection error, and the ingest re-subscribes on every `ConnAck`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use firewatch_core::{ConfigError, ConfigResult, JsonConfig, ProcessedBundle};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::worker::PayloadSender;
use crate::{AsyncConnector, ConnectionStats, ConnectorError, ConnectorResult};

/// Request queue depth handed to rumqttc
const CLIENT_CAPACITY: usize = 32;

/// Broker login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttCredentials {
    /// User name
    pub username: String,
    /// Password
    pub password: String,
}

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host name or address
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Topic the device publishes raw readings on
    pub topic: String,
    /// Topic processed bundles are republished on
    pub publish_topic: String,
    /// Client identifier; must be unique per broker
    pub client_id: String,
    /// Optional login
    pub credentials: Option<MqttCredentials>,
    /// Connect over TLS with the platform roots
    pub use_tls: bool,
    /// Keep-alive interval (s)
    pub keep_alive_secs: u64,
    /// Pause after a connection error before polling again (ms)
    pub reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "firewatch/telemetry".to_string(),
            publish_topic: "firewatch/processed".to_string(),
            client_id: "firewatch-monitor".to_string(),
            credentials: None,
            use_tls: false,
            keep_alive_secs: 60,
            reconnect_delay_ms: 5_000,
        }
    }
}

impl JsonConfig for MqttConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "mqtt.host",
                reason: "must not be empty",
            });
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                field: "mqtt.port",
                reason: "must be non-zero",
            });
        }
        if self.topic.is_empty() || self.topic.contains(['+', '#']) {
            return Err(ConfigError::Invalid {
                field: "mqtt.topic",
                reason: "must be a concrete topic",
            });
        }
        if self.publish_topic.is_empty() || self.publish_topic.contains(['+', '#']) {
            return Err(ConfigError::Invalid {
                field: "mqtt.publish_topic",
                reason: "must be a concrete topic",
            });
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::Invalid {
                field: "mqtt.client_id",
                reason: "must not be empty",
            });
        }
        if self.keep_alive_secs < 5 {
            return Err(ConfigError::Invalid {
                field: "mqtt.keep_alive_secs",
                reason: "must be at least 5",
            });
        }
        Ok(())
    }
}

impl MqttConfig {
    /// rumqttc options for this configuration
    pub fn to_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));

        if let Some(credentials) = &self.credentials {
            options.set_credentials(credentials.username.clone(), credentials.password.clone());
        }
        if self.use_tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        options
    }

    fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    fn checked(self) -> ConnectorResult<Self> {
        self.validate()
            .map_err(|e| ConnectorError::Config(e.to_string()))?;
        Ok(self)
    }
}

/// Subscribes to device telemetry and forwards it to a pipeline worker
pub struct MqttIngest {
    config: MqttConfig,
    client: AsyncClient,
    eventloop: EventLoop,
    sender: PayloadSender,
    stats: ConnectionStats,
}

impl MqttIngest {
    /// Prepare the client; nothing is dialed until [`MqttIngest::run`]
    pub fn new(config: MqttConfig, sender: PayloadSender) -> ConnectorResult<Self> {
        let config = config.checked()?;
        let (client, eventloop) = AsyncClient::new(config.to_options(), CLIENT_CAPACITY);

        Ok(Self {
            config,
            client,
            eventloop,
            sender,
            stats: ConnectionStats::default(),
        })
    }

    /// Pump broker events until `shutdown` flips or the worker goes away
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ConnectionStats {
        log::info!(
            "mqtt ingest connecting to {}:{} (topic `{}`)",
            self.config.host,
            self.config.port,
            self.config.topic
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        log::info!("mqtt connected, subscribing to `{}`", self.config.topic);
                        if let Err(e) = self.client.subscribe(self.config.topic.clone(), QoS::AtLeastOnce).await {
                            log::warn!("mqtt subscribe failed: {}", e);
                            self.stats.last_error = Some(e.to_string());
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.stats.messages_received += 1;
                        match self.sender.submit(publish.payload.to_vec()).await {
                            Ok(()) => {}
                            Err(ConnectorError::ChannelClosed) => {
                                log::warn!("pipeline worker gone, stopping mqtt ingest");
                                break;
                            }
                            Err(e) => self.stats.record_failure(e),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.stats.reconnections += 1;
                        self.stats.last_error = Some(e.to_string());
                        log::warn!(
                            "mqtt connection error: {}; retrying in {}ms",
                            e,
                            self.config.reconnect_delay_ms
                        );
                        tokio::time::sleep(self.config.reconnect_delay()).await;
                    }
                },
            }
        }

        if let Err(e) = self.client.try_disconnect() {
            log::debug!("mqtt disconnect: {}", e);
        }
        log::info!(
            "mqtt ingest stopped: received={} reconnections={}",
            self.stats.messages_received,
            self.stats.reconnections
        );
        self.stats
    }
}

/// Publishes processed bundles to the broker
pub struct MqttPublisher {
    config: MqttConfig,
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    driver: JoinHandle<()>,
    stats: ConnectionStats,
}

impl MqttPublisher {
    /// Start the client's event loop on the current runtime
    pub fn connect(config: MqttConfig) -> ConnectorResult<Self> {
        let config = config.checked()?;
        let (client, mut eventloop) = AsyncClient::new(config.to_options(), CLIENT_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        let flag = connected.clone();
        let delay = config.reconnect_delay();
        let driver = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => flag.store(true, Ordering::Relaxed),
                    Ok(Event::Incoming(Packet::Disconnect)) => flag.store(false, Ordering::Relaxed),
                    Ok(_) => {}
                    Err(e) => {
                        flag.store(false, Ordering::Relaxed);
                        log::warn!("mqtt publisher connection error: {}", e);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        });

        Ok(Self {
            config,
            client,
            connected,
            driver,
            stats: ConnectionStats::default(),
        })
    }

    /// Publish one bundle as JSON on the configured topic
    pub async fn publish_bundle(&mut self, bundle: &ProcessedBundle) -> ConnectorResult<()> {
        let payload = serde_json::to_vec(bundle)?;
        let topic = self.config.publish_topic.clone();
        self.send(&topic, &payload).await
    }

    /// Republish every bundle from [`WorkerHandle::bundles`] until the stream ends
    ///
    /// [`WorkerHandle::bundles`]: crate::WorkerHandle::bundles
    pub async fn forward(mut self, mut bundles: broadcast::Receiver<ProcessedBundle>) -> ConnectionStats {
        loop {
            match bundles.recv().await {
                Ok(bundle) => {
                    if let Err(e) = self.publish_bundle(&bundle).await {
                        log::warn!("failed to republish bundle: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("republisher fell behind, {} bundles skipped", skipped);
                    self.stats.messages_failed += skipped;
                    self.stats.last_error = Some(format!("{skipped} bundles skipped while lagging"));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        self.stats.clone()
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[async_trait::async_trait]
impl AsyncConnector for MqttPublisher {
    type Error = ConnectorError;

    async fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error> {
        if !self.is_connected() {
            self.stats.record_failure(ConnectorError::NotConnected);
            return Err(ConnectorError::NotConnected);
        }

        match self
            .client
            .publish(topic, QoS::AtLeastOnce, false, data.to_vec())
            .await
        {
            Ok(()) => {
                self.stats.record_sent(data.len());
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure(&e);
                Err(ConnectorError::Protocol(e.to_string()))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn stats(&self) -> ConnectionStats {
        self.stats.clone()
    }
}
