//! Helper functions for integration tests

use site_monitor::{
    events::{ConnectionRegistry, EventBroadcaster, bus::DisabledBus, connections::outbound_channel},
    storage::{MonitoredTarget, NewTarget, Protocol, TargetRegistry},
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Broadcaster without a bus, plus one registered connection with its welcome consumed
pub async fn broadcaster_with_listener() -> (EventBroadcaster, mpsc::Receiver<String>) {
    let connections = ConnectionRegistry::new();
    let (tx, mut rx) = outbound_channel();
    connections.register(tx).await;
    rx.recv().await.unwrap();

    (EventBroadcaster::new(Arc::new(DisabledBus), connections), rx)
}

pub async fn seed_target(
    registry: &dyn TargetRegistry,
    name: &str,
    address: &str,
    protocol: Protocol,
) -> MonitoredTarget {
    registry
        .create_target(NewTarget::new(name, address, protocol))
        .await
        .unwrap()
}

/// Every queued message, parsed as JSON
pub fn drain_events(rx: &mut mpsc::Receiver<String>) -> Vec<serde_json::Value> {
    let mut events = vec![];
    while let Ok(text) = rx.try_recv() {
        events.push(serde_json::from_str(&text).unwrap());
    }
    events
}
