//! Site availability monitor
//!
//! Keeps a registry of network targets, probes every active target on a fixed
//! interval, records each outcome and pushes live events to connected clients,
//! optionally through a durable message bus.

pub mod api;
pub mod config;
pub mod events;
pub mod monitoring;
pub mod storage;
