//! Recurring availability checks
//!
//! ## Message Flow
//!
//! ```text
//! CycleScheduler (every 60s) ─┐
//!                             ├─→ CycleRunner.run_cycle()
//! ad-hoc trigger (API) ───────┘        │
//!                                      ├─→ Probe per active target
//!                                      ├─→ TargetRegistry.insert_outcomes (batch)
//!                                      └─→ EventBroadcaster (check.*)
//! ```

pub mod cycle;
pub mod probe;
pub mod scheduler;

pub use cycle::{CycleRunner, CycleSummary};
pub use probe::{HttpProbe, Probe, ProbeOutcome, ProtocolProbe, TcpProbe};
pub use scheduler::{CHECK_INTERVAL, CycleScheduler, StartStatus};
