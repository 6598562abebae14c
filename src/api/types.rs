//! Request and response types of the administrative API

use serde::{Deserialize, Serialize};

use crate::monitoring::{CycleSummary, StartStatus};
use crate::storage::{CheckOutcome, MonitoredTarget};

/// Default page size for GET /api/v1/targets/:id/checks
pub const DEFAULT_CHECKS_LIMIT: usize = 50;

/// Largest page size accepted by GET /api/v1/targets/:id/checks
pub const MAX_CHECKS_LIMIT: usize = 200;

/// Response for GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Query for GET /api/v1/targets
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetListQuery {
    pub is_active: Option<bool>,
}

/// Query for GET /api/v1/targets/:id/checks
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChecksQuery {
    pub limit: Option<usize>,
}

impl ChecksQuery {
    /// The requested page size, validated against 1..=200
    pub fn limit(&self) -> Result<usize, String> {
        match self.limit {
            None => Ok(DEFAULT_CHECKS_LIMIT),
            Some(limit) if (1..=MAX_CHECKS_LIMIT).contains(&limit) => Ok(limit),
            Some(limit) => Err(format!(
                "limit must be between 1 and {MAX_CHECKS_LIMIT}, got {limit}"
            )),
        }
    }
}

/// Response for GET /api/v1/targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsResponse {
    pub targets: Vec<MonitoredTarget>,
    pub count: usize,
}

/// Response for GET /api/v1/targets/:id/checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksResponse {
    pub target_id: i64,
    pub count: usize,
    pub checks: Vec<CheckOutcome>,
}

/// Response for POST /api/v1/monitoring/run-check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCheckResponse {
    pub message: String,
    pub summary: CycleSummary,
}

/// Response for POST /api/v1/monitoring/start-background
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub message: String,
    pub started: bool,
}

impl From<StartStatus> for StartResponse {
    fn from(status: StartStatus) -> Self {
        Self {
            message: status.message().to_string(),
            started: status == StartStatus::Started,
        }
    }
}

/// Scheduler state reported by GET /api/v1/monitoring/status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerStatus {
    Active,
    Stopped,
}

/// Response for GET /api/v1/monitoring/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: SchedulerStatus,
    pub description: String,
    pub check_interval_secs: u64,
    pub last_cycle: Option<CycleSummary>,
}
