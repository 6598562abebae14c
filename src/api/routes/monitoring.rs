//! Check cycle triggers and scheduler status

use axum::{Json, extract::State};
use tracing::info;

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{RunCheckResponse, SchedulerStatus, StartResponse, StatusResponse},
};

/// POST /api/v1/monitoring/run-check
///
/// Runs one cycle and waits for it to finish.
pub async fn run_check(State(state): State<ApiState>) -> ApiResult<Json<RunCheckResponse>> {
    info!("ad-hoc check cycle requested");
    let summary = state.runner().run_cycle().await?;

    Ok(Json(RunCheckResponse {
        message: format!("checked {} targets", summary.targets_checked),
        summary,
    }))
}

/// POST /api/v1/monitoring/start-background
pub async fn start_background(State(state): State<ApiState>) -> Json<StartResponse> {
    Json(state.scheduler.start().await.into())
}

/// GET /api/v1/monitoring/status
pub async fn status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let interval = state.scheduler.interval().as_secs();

    let (status, description) = if state.scheduler.is_running().await {
        (
            SchedulerStatus::Active,
            format!("checking all active targets every {interval}s"),
        )
    } else {
        (
            SchedulerStatus::Stopped,
            "background checker has not been started".to_string(),
        )
    };

    Json(StatusResponse {
        status,
        description,
        check_interval_secs: interval,
        last_cycle: state.runner().last_cycle().await,
    })
}
