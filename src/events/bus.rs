//! Durable pub/sub bus
//!
//! Events are published to one well-known subject. A background subscriber on the
//! same subject re-wraps every inbound message (including the ones this process
//! published) as `nats.inbound` and fans it out to live connections; that is how
//! bus traffic reaches connected clients.
//!
//! ## Implementations
//!
//! - [`NatsBus`]: a NATS connection (`async-nats`)
//! - [`LocalBus`]: in-process loopback with the same delivery semantics
//! - [`DisabledBus`]: never connected, every publish falls back to direct fan-out

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_nats::connection::State;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::BusConfig;

use super::connections::ConnectionRegistry;
use super::event::Event;

/// Subject all monitoring events are published on
pub const DEFAULT_SUBJECT: &str = "monitoring.events";

/// Outcome of one publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// The bus accepted the event
    Delivered,

    /// The bus is not connected; nothing was sent
    NotConnected,

    /// The publish was attempted and failed
    Failed(String),
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered)
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event; failures are reported, never raised
    async fn publish(&self, event: &Event) -> DeliveryResult;

    fn is_connected(&self) -> bool;

    /// Short name for logs and status output
    fn name(&self) -> &'static str;

    /// Flush outstanding publications
    async fn close(&self) {}
}

/// Bus that is never connected
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBus;

#[async_trait]
impl EventBus for DisabledBus {
    async fn publish(&self, _event: &Event) -> DeliveryResult {
        DeliveryResult::NotConnected
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// In-process loopback bus
///
/// Published events are delivered to every subscriber of the process-local
/// channel, mirroring how a NATS subscription on the publishing subject behaves.
pub struct LocalBus {
    subject: String,
    tx: broadcast::Sender<Vec<u8>>,
    connected: AtomicBool,
}

impl LocalBus {
    pub fn new(subject: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            subject: subject.into(),
            tx,
            connected: AtomicBool::new(true),
        }
    }

    /// Simulate losing or regaining the connection
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Re-deliver every published event to live connections as `nats.inbound`
    pub fn subscribe_connections(&self, connections: ConnectionRegistry) -> JoinHandle<()> {
        let mut rx = self.tx.subscribe();
        let subject = self.subject.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => {
                        let inbound = Event::from_bus_payload(&subject, &payload);
                        connections.broadcast(&inbound).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("local bus subscriber lagged, skipped {skipped} messages");
                    }
                    Err(RecvError::Closed) => {
                        debug!("local bus closed");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl EventBus for LocalBus {
    async fn publish(&self, event: &Event) -> DeliveryResult {
        if !self.connected.load(Ordering::SeqCst) {
            return DeliveryResult::NotConnected;
        }

        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => return DeliveryResult::Failed(e.to_string()),
        };

        // Like NATS, publishing with nobody listening still counts as delivered
        if self.tx.send(payload).is_err() {
            trace!("local bus has no subscribers");
        }

        DeliveryResult::Delivered
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// NATS-backed bus
///
/// When the initial connection fails the bus stays disconnected for the life of
/// the process and every publish reports [`DeliveryResult::NotConnected`].
pub struct NatsBus {
    client: Option<async_nats::Client>,
    subject: String,
}

impl NatsBus {
    /// Connect, and subscribe to the subject on behalf of live connections
    #[instrument(skip(connections))]
    pub async fn connect(
        url: &str,
        subject: &str,
        timeout: Duration,
        connections: ConnectionRegistry,
    ) -> Self {
        let client = match async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                warn!("NATS unavailable at {url} ({e}), continuing without bus");
                return Self::disconnected(subject);
            }
        };

        info!("NATS connected at {url}");

        match client.subscribe(subject.to_string()).await {
            Ok(mut subscriber) => {
                info!("subscribed to subject {subject}");
                tokio::spawn(async move {
                    while let Some(message) = subscriber.next().await {
                        let subject = message.subject.to_string();
                        let inbound = Event::from_bus_payload(&subject, &message.payload);
                        if let Event::BusError(ref err) = inbound {
                            warn!("undecodable NATS message on {subject}: {}", err.error);
                        }
                        connections.broadcast(&inbound).await;
                    }
                    debug!("NATS subscription ended");
                });
            }
            Err(e) => error!("failed to subscribe to {subject}: {e}"),
        }

        Self {
            client: Some(client),
            subject: subject.to_string(),
        }
    }

    pub fn disconnected(subject: &str) -> Self {
        Self {
            client: None,
            subject: subject.to_string(),
        }
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, event: &Event) -> DeliveryResult {
        let Some(client) = &self.client else {
            return DeliveryResult::NotConnected;
        };

        if !matches!(client.connection_state(), State::Connected) {
            return DeliveryResult::NotConnected;
        }

        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => return DeliveryResult::Failed(e.to_string()),
        };

        match client.publish(self.subject.clone(), payload.into()).await {
            Ok(()) => {
                trace!("published {} to NATS", event.kind());
                DeliveryResult::Delivered
            }
            Err(e) => DeliveryResult::Failed(e.to_string()),
        }
    }

    fn is_connected(&self) -> bool {
        self.client
            .as_ref()
            .is_some_and(|client| matches!(client.connection_state(), State::Connected))
    }

    fn name(&self) -> &'static str {
        "nats"
    }

    async fn close(&self) {
        if let Some(client) = &self.client {
            match client.flush().await {
                Ok(()) => info!("NATS connection flushed"),
                Err(e) => warn!("failed to flush NATS connection: {e}"),
            }
        }
    }
}

/// Build the bus described by the configuration
///
/// Subscriptions feeding live connections are started here.
pub async fn connect_bus(config: &BusConfig, connections: ConnectionRegistry) -> Arc<dyn EventBus> {
    match config {
        BusConfig::None => Arc::new(DisabledBus),
        BusConfig::Memory { subject } => {
            let bus = LocalBus::new(subject.clone());
            bus.subscribe_connections(connections);
            Arc::new(bus)
        }
        BusConfig::Nats {
            url,
            subject,
            connect_timeout_secs,
        } => Arc::new(
            NatsBus::connect(
                url,
                subject,
                Duration::from_secs(*connect_timeout_secs),
                connections,
            )
            .await,
        ),
    }
}
