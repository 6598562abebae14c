//! Target registry backends
//!
//! The registry owns monitored targets and their check outcomes. It is an
//! external collaborator of the monitoring core: the check cycle runner reads the
//! active targets and writes outcome batches, while the administrative API
//! performs CRUD on targets.
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database with migrations
//! - **In-Memory**: No persistence, for testing or ephemeral runs
//!
//! ## Usage
//!
//! ```no_run
//! use site_monitor::storage::{TargetRegistry, sqlite::SqliteRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = SqliteRegistry::new("./monitoring.db").await?;
//!     let active = registry.list_active_targets().await?;
//!     println!("{} active targets", active.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::TargetRegistry;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryRegistry;
pub use schema::{CheckOutcome, MonitoredTarget, NewTarget, Protocol, TargetUpdate};
