//! In-memory target registry (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Running without the `storage-sqlite` feature
//!
//! All data is lost on restart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::TargetRegistry;
use super::error::{StorageError, StorageResult};
use super::schema::{CheckOutcome, MonitoredTarget, NewTarget, TargetUpdate};

#[derive(Default)]
struct Inner {
    targets: BTreeMap<i64, MonitoredTarget>,
    outcomes: Vec<CheckOutcome>,
    next_target_id: i64,
    next_outcome_id: i64,
}

/// In-memory registry
///
/// Targets are kept in id order so listings match the SQLite backend.
#[derive(Default)]
pub struct MemoryRegistry {
    inner: RwLock<Inner>,
}

impl Inner {
    fn address_taken(&self, address: &str, except: Option<i64>) -> bool {
        self.targets
            .values()
            .any(|t| t.address == address && Some(t.id) != except)
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outcomes stored across all targets
    pub async fn outcome_count(&self) -> usize {
        self.inner.read().await.outcomes.len()
    }
}

#[async_trait]
impl TargetRegistry for MemoryRegistry {
    async fn list_targets(&self, active: Option<bool>) -> StorageResult<Vec<MonitoredTarget>> {
        let inner = self.inner.read().await;
        Ok(inner
            .targets
            .values()
            .filter(|t| active.is_none_or(|active| t.is_active == active))
            .cloned()
            .collect())
    }

    async fn get_target(&self, id: i64) -> StorageResult<Option<MonitoredTarget>> {
        Ok(self.inner.read().await.targets.get(&id).cloned())
    }

    async fn find_by_address(&self, address: &str) -> StorageResult<Option<MonitoredTarget>> {
        let inner = self.inner.read().await;
        Ok(inner
            .targets
            .values()
            .find(|t| t.address == address)
            .cloned())
    }

    async fn create_target(&self, target: NewTarget) -> StorageResult<MonitoredTarget> {
        let mut inner = self.inner.write().await;
        if inner.address_taken(&target.address, None) {
            return Err(StorageError::DuplicateAddress(target.address));
        }
        inner.next_target_id += 1;
        let target = target.into_target(inner.next_target_id, Utc::now());
        inner.targets.insert(target.id, target.clone());
        debug!("in-memory registry: created target {}", target.id);
        Ok(target)
    }

    async fn update_target(
        &self,
        id: i64,
        update: TargetUpdate,
    ) -> StorageResult<Option<MonitoredTarget>> {
        let mut inner = self.inner.write().await;
        if let Some(address) = &update.address
            && inner.address_taken(address, Some(id))
        {
            return Err(StorageError::DuplicateAddress(address.clone()));
        }
        Ok(inner.targets.get_mut(&id).map(|target| {
            update.apply(target, Utc::now());
            target.clone()
        }))
    }

    async fn delete_target(&self, id: i64) -> StorageResult<bool> {
        let mut inner = self.inner.write().await;
        let existed = inner.targets.remove(&id).is_some();
        if existed {
            inner.outcomes.retain(|o| o.target_id != id);
        }
        Ok(existed)
    }

    async fn insert_outcomes(&self, outcomes: Vec<CheckOutcome>) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        for mut outcome in outcomes {
            inner.next_outcome_id += 1;
            outcome.id = Some(inner.next_outcome_id);
            inner.outcomes.push(outcome);
        }
        Ok(())
    }

    async fn latest_outcomes(
        &self,
        target_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<CheckOutcome>> {
        let inner = self.inner.read().await;
        Ok(inner
            .outcomes
            .iter()
            .rev()
            .filter(|o| o.target_id == target_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StorageResult<String> {
        let inner = self.inner.read().await;
        Ok(format!(
            "In-Memory: {} targets, {} outcomes",
            inner.targets.len(),
            inner.outcomes.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory registry (no-op)");
        Ok(())
    }
}
