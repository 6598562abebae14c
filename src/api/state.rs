//! API shared state

use std::sync::Arc;

use crate::events::EventBroadcaster;
use crate::monitoring::{CycleRunner, CycleScheduler};
use crate::storage::TargetRegistry;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Target registry backing the CRUD routes
    pub registry: Arc<dyn TargetRegistry>,

    /// Event delivery for lifecycle events
    pub broadcaster: EventBroadcaster,

    /// Singleton recurring check loop
    pub scheduler: Arc<CycleScheduler>,
}

impl ApiState {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        broadcaster: EventBroadcaster,
        scheduler: Arc<CycleScheduler>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            scheduler,
        }
    }

    /// The cycle runner shared by the scheduler and ad-hoc triggers
    pub fn runner(&self) -> &Arc<CycleRunner> {
        self.scheduler.runner()
    }
}
