//! Target registry trait definition
//!
//! The registry is the collaborator that owns targets and check outcomes. The
//! monitoring core reads active targets from it and writes outcome batches to it;
//! the administrative API performs the CRUD operations.

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::{CheckOutcome, MonitoredTarget, NewTarget, TargetUpdate};

/// Trait for target registries
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared between the
/// scheduler task, ad-hoc cycle triggers and API handlers.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>`. Implementations convert backend-specific
/// errors to `StorageError` variants. "Not found" is never an error: lookups
/// return `Option` and deletes return `bool`.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    /// List targets ordered by id, optionally filtered by the active flag
    async fn list_targets(&self, active: Option<bool>) -> StorageResult<Vec<MonitoredTarget>>;

    /// Snapshot of all targets with `is_active = true`
    async fn list_active_targets(&self) -> StorageResult<Vec<MonitoredTarget>> {
        self.list_targets(Some(true)).await
    }

    async fn get_target(&self, id: i64) -> StorageResult<Option<MonitoredTarget>>;

    /// Look up a target by its exact address
    async fn find_by_address(&self, address: &str) -> StorageResult<Option<MonitoredTarget>>;

    async fn create_target(&self, target: NewTarget) -> StorageResult<MonitoredTarget>;

    /// Apply a partial update; `None` if the target does not exist
    async fn update_target(
        &self,
        id: i64,
        update: TargetUpdate,
    ) -> StorageResult<Option<MonitoredTarget>>;

    /// Delete a target together with its outcomes; `false` if it did not exist
    async fn delete_target(&self, id: i64) -> StorageResult<bool>;

    /// Persist a batch of outcomes in a single commit
    ///
    /// Either the whole batch is stored or none of it is.
    async fn insert_outcomes(&self, outcomes: Vec<CheckOutcome>) -> StorageResult<()>;

    /// The `limit` most recent outcomes of a target, newest first
    async fn latest_outcomes(&self, target_id: i64, limit: usize)
    -> StorageResult<Vec<CheckOutcome>>;

    /// Human-readable backend status
    async fn health_check(&self) -> StorageResult<String>;

    /// Close the registry and release resources
    async fn close(&self) -> StorageResult<()>;
}
