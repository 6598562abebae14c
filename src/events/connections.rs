//! Registry of open live connections
//!
//! Each live connection is represented by the sending half of a bounded queue.
//! The queue is drained by a writer task that owns the socket; when the socket
//! goes away the writer task ends, the receiver is dropped, and the next send to
//! that connection fails. Such connections are removed lazily by the broadcast or
//! heartbeat that discovers them.
//!
//! ## Message Flow
//!
//! ```text
//! broadcast(event) → serialize once → snapshot senders → try_send to each
//!                                                          │
//!                                            closed queue ─┴→ removed in the same pass
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, trace, warn};

use super::event::Event;

/// Period between heartbeats sent to each connection
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);

/// Capacity of each connection's outbound queue
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

pub type ConnectionId = u64;

/// Create the outbound queue for a new live connection
pub fn outbound_channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
}

/// Tracks currently open live connections
///
/// Cloning is cheap; all clones share the same set.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection and queue its welcome message
    pub async fn register(&self, sender: mpsc::Sender<String>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        // Queued before insertion so the welcome precedes any broadcast
        match serde_json::to_string(&Event::welcome()) {
            Ok(text) => {
                if let Err(e) = sender.try_send(text) {
                    warn!("failed to queue welcome for connection {id}: {e}");
                }
            }
            Err(e) => error!("failed to serialize welcome message: {e}"),
        }

        self.connections.write().await.insert(id, sender);
        debug!("registered live connection {id}");
        id
    }

    /// Stop tracking a connection; returns whether it was tracked
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(&id).is_some();
        if removed {
            debug!("unregistered live connection {id}");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Deliver an event to every tracked connection
    ///
    /// Returns the number of connections the event was queued for.
    pub async fn broadcast(&self, event: &Event) -> usize {
        match serde_json::to_string(event) {
            Ok(text) => self.broadcast_text(text).await,
            Err(e) => {
                error!("failed to serialize {} event: {e}", event.kind());
                0
            }
        }
    }

    /// Deliver an already serialized message to every tracked connection
    ///
    /// Connections whose queue is closed are removed. A full queue drops this
    /// message for that connection only.
    pub async fn broadcast_text(&self, text: String) -> usize {
        let snapshot: Vec<(ConnectionId, mpsc::Sender<String>)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut stale = Vec::new();

        for (id, sender) in snapshot {
            match sender.try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("outbound queue of connection {id} is full, dropping message");
                }
                Err(TrySendError::Closed(_)) => stale.push(id),
            }
        }

        if !stale.is_empty() {
            let mut connections = self.connections.write().await;
            for id in &stale {
                connections.remove(id);
            }
            debug!("removed {} stale connections", stale.len());
        }

        trace!("broadcast delivered to {delivered} connections");
        delivered
    }

    /// Send a heartbeat to one connection every `period`
    ///
    /// The task ends, and the connection is unregistered, once a heartbeat cannot
    /// be delivered. Other connections are unaffected.
    pub fn spawn_heartbeat(
        &self,
        id: ConnectionId,
        sender: mpsc::Sender<String>,
        period: Duration,
    ) -> JoinHandle<()> {
        let registry = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                ticker.tick().await;

                let text = match serde_json::to_string(&Event::heartbeat()) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("failed to serialize heartbeat: {e}");
                        continue;
                    }
                };

                if sender.send(text).await.is_err() {
                    debug!("heartbeat failed for connection {id}");
                    registry.unregister(id).await;
                    break;
                }
            }
        })
    }
}
