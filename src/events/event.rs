//! Event envelope shared by the bus and live connections
//!
//! Every event travels as `{"type": ..., "payload": ...}`. The set of types is
//! closed; each variant carries its own typed payload and JSON is only produced
//! or parsed at the edges (bus publish/subscribe, WebSocket send).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::schema::MonitoredTarget;

/// Literal a client sends to receive [`Event::ChallengeAccepted`]
pub const CHALLENGE_PHRASE: &str = "Who are you, warrior?";

/// Answer carried by [`Event::ChallengeAccepted`]
pub const CHALLENGE_ANSWER: &str = "I am Achilles, son of Peleus";

/// Event types a live connection may observe from broadcasts
pub const SUPPORTED_EVENTS: &[&str] = &[
    "target.created",
    "target.updated",
    "target.deleted",
    "check.completed",
    "check.cycle.completed",
    "nats.inbound",
    "nats.error",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    #[serde(rename = "check.completed")]
    CheckCompleted(CheckCompleted),

    #[serde(rename = "check.cycle.completed")]
    CycleCompleted(CycleCompleted),

    #[serde(rename = "target.created")]
    TargetCreated(MonitoredTarget),

    #[serde(rename = "target.updated")]
    TargetUpdated(MonitoredTarget),

    #[serde(rename = "target.deleted")]
    TargetDeleted(TargetDeleted),

    /// A message received from the durable bus, re-wrapped for live connections
    #[serde(rename = "nats.inbound")]
    BusInbound(BusInbound),

    /// A bus message that could not be decoded
    #[serde(rename = "nats.error")]
    BusError(BusError),

    #[serde(rename = "welcome")]
    Welcome(Welcome),

    #[serde(rename = "heartbeat")]
    Heartbeat(Heartbeat),

    #[serde(rename = "subscription")]
    Subscription(Subscription),

    #[serde(rename = "echo")]
    Echo(Echo),

    #[serde(rename = "challenge.accepted")]
    ChallengeAccepted(ChallengeAccepted),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckCompleted {
    pub target_id: i64,
    pub target_name: String,
    pub is_up: bool,
    pub latency_ms: Option<f64>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleCompleted {
    pub targets_checked: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDeleted {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusInbound {
    pub subject: String,
    pub event: InboundPayload,
}

/// Body of a bus message: one of our events, or JSON from another publisher on the subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundPayload {
    Known(Box<Event>),
    Foreign(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusError {
    pub error: String,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Welcome {
    pub message: String,
    pub supported_events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub event: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub received: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeAccepted {
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// The wire name of this event's type
    pub fn kind(&self) -> &'static str {
        match self {
            Event::CheckCompleted(_) => "check.completed",
            Event::CycleCompleted(_) => "check.cycle.completed",
            Event::TargetCreated(_) => "target.created",
            Event::TargetUpdated(_) => "target.updated",
            Event::TargetDeleted(_) => "target.deleted",
            Event::BusInbound(_) => "nats.inbound",
            Event::BusError(_) => "nats.error",
            Event::Welcome(_) => "welcome",
            Event::Heartbeat(_) => "heartbeat",
            Event::Subscription(_) => "subscription",
            Event::Echo(_) => "echo",
            Event::ChallengeAccepted(_) => "challenge.accepted",
        }
    }

    pub fn welcome() -> Self {
        Event::Welcome(Welcome {
            message: "Connected to the site monitoring system".to_string(),
            supported_events: SUPPORTED_EVENTS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn heartbeat() -> Self {
        Event::Heartbeat(Heartbeat {
            timestamp: Utc::now(),
        })
    }

    /// Decode a payload received from the bus into a `nats.inbound` or `nats.error` event
    ///
    /// Any JSON is re-delivered as `nats.inbound`; only bytes that are not JSON
    /// become `nats.error`.
    pub fn from_bus_payload(subject: &str, payload: &[u8]) -> Self {
        match serde_json::from_slice::<InboundPayload>(payload) {
            Ok(event) => Event::BusInbound(BusInbound {
                subject: subject.to_string(),
                event,
            }),
            Err(e) => Event::BusError(BusError {
                error: e.to_string(),
                raw: String::from_utf8_lossy(payload).into_owned(),
            }),
        }
    }
}

/// Reply to a text command received from a live connection
///
/// - the challenge phrase is answered
/// - `subscribe:<type>` is acknowledged (no filtering is applied afterwards)
/// - anything else is echoed back
pub fn reply_to_command(text: &str) -> Event {
    if text == CHALLENGE_PHRASE {
        return Event::ChallengeAccepted(ChallengeAccepted {
            answer: CHALLENGE_ANSWER.to_string(),
            timestamp: Utc::now(),
        });
    }

    if let Some(rest) = text.strip_prefix("subscribe:") {
        let event = rest.split(':').next().unwrap_or_default();
        return Event::Subscription(Subscription {
            event: event.to_string(),
            status: "subscribed".to_string(),
        });
    }

    Event::Echo(Echo {
        received: text.to_string(),
        timestamp: Utc::now(),
    })
}
