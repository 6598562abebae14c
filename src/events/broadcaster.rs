//! Event broadcaster
//!
//! Delivery is either/or: the durable bus is tried first, and only when it does
//! not deliver is the event fanned out directly to live connections.
//!
//! ```text
//! publish(event) ──→ bus.publish ── Delivered ──→ done (subscribers see it as nats.inbound)
//!                        │
//!                        └─ NotConnected / Failed ──→ connections.broadcast(event)
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use super::bus::{DeliveryResult, EventBus};
use super::connections::ConnectionRegistry;
use super::event::Event;

/// Which channel handled a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    Bus,

    /// Direct fan-out; carries the number of connections reached
    FanOut(usize),
}

#[derive(Clone)]
pub struct EventBroadcaster {
    bus: Arc<dyn EventBus>,
    connections: ConnectionRegistry,
}

impl EventBroadcaster {
    pub fn new(bus: Arc<dyn EventBus>, connections: ConnectionRegistry) -> Self {
        Self { bus, connections }
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Publish an event to interested consumers
    ///
    /// Never fails: bus problems trigger the fallback, fan-out problems are
    /// logged by the connection registry.
    pub async fn publish(&self, event: Event) -> DeliveryChannel {
        match self.bus.publish(&event).await {
            DeliveryResult::Delivered => {
                debug!("{} delivered via {} bus", event.kind(), self.bus.name());
                DeliveryChannel::Bus
            }
            DeliveryResult::NotConnected => {
                debug!("bus not connected, fanning out {} directly", event.kind());
                DeliveryChannel::FanOut(self.connections.broadcast(&event).await)
            }
            DeliveryResult::Failed(reason) => {
                warn!(
                    "bus publish of {} failed ({reason}), fanning out directly",
                    event.kind()
                );
                DeliveryChannel::FanOut(self.connections.broadcast(&event).await)
            }
        }
    }
}
