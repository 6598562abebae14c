//! Check cycle runner
//!
//! One cycle is one pass over every active target:
//!
//! ```text
//! list active targets (snapshot) → for each target, in order:
//!     probe → build CheckOutcome → stage for the batch → publish check.completed
//! → commit the batch → publish check.cycle.completed
//! ```
//!
//! A target whose probe fails (or panics) is logged and skipped; the rest of the
//! cycle is unaffected. A failure to list targets or to commit the batch fails
//! the whole cycle.
//!
//! The recurring scheduler and ad-hoc triggers call the same [`CycleRunner::run_cycle`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::events::EventBroadcaster;
use crate::events::event::{CheckCompleted, CycleCompleted, Event};
use crate::storage::{CheckOutcome, MonitoredTarget, TargetRegistry};

use super::probe::Probe;

/// What one cycle did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Active targets in the snapshot the cycle worked on
    pub targets_checked: usize,
    pub up: usize,
    pub down: usize,
    /// Targets skipped because their check failed
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct CycleRunner {
    registry: Arc<dyn TargetRegistry>,
    probe: Arc<dyn Probe>,
    broadcaster: EventBroadcaster,
    last_cycle: RwLock<Option<CycleSummary>>,
}

impl CycleRunner {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        probe: Arc<dyn Probe>,
        broadcaster: EventBroadcaster,
    ) -> Self {
        Self {
            registry,
            probe,
            broadcaster,
            last_cycle: RwLock::new(None),
        }
    }

    /// Run one pass over all active targets
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let started_at = Utc::now();

        let targets = self
            .registry
            .list_active_targets()
            .await
            .context("failed to list active targets")?;

        debug!("starting check cycle over {} targets", targets.len());

        let mut outcomes = Vec::with_capacity(targets.len());
        let mut failed = 0;

        for target in &targets {
            match self.check_target(target).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    failed += 1;
                    warn!("check of {} (id {}) failed: {:#}", target.name, target.id, e);
                }
            }
        }

        let up = outcomes.iter().filter(|o| o.is_up).count();
        let down = outcomes.len() - up;

        self.registry
            .insert_outcomes(outcomes)
            .await
            .context("failed to commit check outcomes")?;

        self.broadcaster
            .publish(Event::CycleCompleted(CycleCompleted {
                targets_checked: targets.len(),
            }))
            .await;

        let summary = CycleSummary {
            targets_checked: targets.len(),
            up,
            down,
            failed,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            "check cycle complete: {} targets, {} up, {} down, {} failed",
            summary.targets_checked, up, down, failed
        );

        *self.last_cycle.write().await = Some(summary.clone());

        Ok(summary)
    }

    /// Summary of the most recent successful cycle
    pub async fn last_cycle(&self) -> Option<CycleSummary> {
        self.last_cycle.read().await.clone()
    }

    async fn check_target(&self, target: &MonitoredTarget) -> Result<CheckOutcome> {
        let result = AssertUnwindSafe(self.probe.probe(target))
            .catch_unwind()
            .await
            .map_err(|panic| anyhow!("probe panicked: {}", panic_message(panic.as_ref())))?;

        let probed = result?;

        let outcome = CheckOutcome {
            id: None,
            target_id: target.id,
            is_up: probed.is_up,
            status_code: probed.status_code,
            latency_ms: probed.latency_ms,
            error: probed.error,
            checked_at: Utc::now(),
        };

        self.broadcaster
            .publish(Event::CheckCompleted(CheckCompleted {
                target_id: target.id,
                target_name: target.name.clone(),
                is_up: outcome.is_up,
                latency_ms: outcome.latency_ms,
                checked_at: outcome.checked_at,
            }))
            .await;

        Ok(outcome)
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
