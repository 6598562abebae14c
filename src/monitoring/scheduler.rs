//! Recurring check scheduler
//!
//! Owns at most one background loop per scheduler instance. The loop runs a check
//! cycle, logs and swallows any failure, sleeps for the fixed interval, and
//! repeats for the life of the process.
//!
//! ```text
//! Stopped ──start()──→ Running (forever)
//!                        │
//!                        └── start() again → AlreadyRunning (no second loop)
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use super::cycle::{CycleRunner, panic_message};

/// Pause between the end of one cycle and the start of the next
pub const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartStatus {
    Started,
    AlreadyRunning,
}

impl StartStatus {
    pub fn message(&self) -> &'static str {
        match self {
            StartStatus::Started => "background checker started",
            StartStatus::AlreadyRunning => "background checker is already running",
        }
    }
}

/// Singleton owner of the recurring check loop
///
/// Created once in the composition root and shared through `Arc`.
pub struct CycleScheduler {
    runner: Arc<CycleRunner>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CycleScheduler {
    pub fn new(runner: Arc<CycleRunner>, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            task: Mutex::new(None),
        }
    }

    /// Start the loop unless one is already active
    ///
    /// Check and spawn happen under one lock, so concurrent callers cannot
    /// create two loops.
    pub async fn start(&self) -> StartStatus {
        let mut task = self.task.lock().await;

        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("start requested while background checker is running");
            return StartStatus::AlreadyRunning;
        }

        let runner = self.runner.clone();
        *task = Some(tokio::spawn(run_loop(runner, self.interval)));

        info!(
            "background checker started, interval {}s",
            self.interval.as_secs()
        );
        StartStatus::Started
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn runner(&self) -> &Arc<CycleRunner> {
        &self.runner
    }
}

#[instrument(skip(runner))]
async fn run_loop(runner: Arc<CycleRunner>, interval: Duration) {
    loop {
        match AssertUnwindSafe(runner.run_cycle()).catch_unwind().await {
            Ok(Ok(summary)) => {
                debug!("scheduled cycle checked {} targets", summary.targets_checked)
            }
            Ok(Err(e)) => error!("check cycle failed: {:#}", e),
            Err(panic) => error!("check cycle panicked: {}", panic_message(panic.as_ref())),
        }

        tokio::time::sleep(interval).await;
    }
}
