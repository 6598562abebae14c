//! Event distribution
//!
//! ## Architecture Overview
//!
//! ```text
//!   check cycle runner / admin API
//!               │ publish(Event)
//!       ┌───────▼─────────┐
//!       │ EventBroadcaster│
//!       └───┬─────────┬───┘
//!  delivered│         │not delivered
//!   ┌───────▼──┐   ┌──▼─────────────────┐
//!   │ EventBus │   │ ConnectionRegistry │──→ live connections
//!   └───────┬──┘   └──▲─────────────────┘
//!           │ subscription (nats.inbound)
//!           └─────────┘
//! ```
//!
//! ## Components
//!
//! - **Event**: closed set of event kinds with typed payloads
//! - **EventBus**: durable pub/sub channel (NATS, in-process, or disabled)
//! - **EventBroadcaster**: either/or delivery with fallback to direct fan-out
//! - **ConnectionRegistry**: open live connections, lazy stale cleanup, heartbeats

pub mod broadcaster;
pub mod bus;
pub mod connections;
pub mod event;

pub use broadcaster::{DeliveryChannel, EventBroadcaster};
pub use bus::{DeliveryResult, DisabledBus, EventBus, LocalBus, NatsBus};
pub use connections::{ConnectionId, ConnectionRegistry};
pub use event::{Event, InboundPayload};
