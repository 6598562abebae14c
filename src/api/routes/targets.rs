//! Target registry endpoints
//!
//! Every successful mutation publishes a lifecycle event. Delivery of that event
//! never changes the response.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{debug, info};

use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::{ChecksQuery, ChecksResponse, TargetListQuery, TargetsResponse},
    },
    events::event::{Event, TargetDeleted},
    storage::{MonitoredTarget, NewTarget, TargetUpdate},
};

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("target {id} not found"))
}

fn validate_text(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Reject an address already used by a target other than `except`
///
/// Names the existing target in the error. Concurrent writers are still caught by the
/// registry's unique address constraint.
async fn ensure_unique_address(
    state: &ApiState,
    address: &str,
    except: Option<i64>,
) -> ApiResult<()> {
    match state.registry.find_by_address(address).await? {
        Some(existing) if Some(existing.id) != except => Err(ApiError::Conflict(format!(
            "a target with address {address} already exists (id {})",
            existing.id
        ))),
        _ => Ok(()),
    }
}

/// GET /api/v1/targets
pub async fn list_targets(
    State(state): State<ApiState>,
    Query(query): Query<TargetListQuery>,
) -> ApiResult<Json<TargetsResponse>> {
    let targets = state.registry.list_targets(query.is_active).await?;

    Ok(Json(TargetsResponse {
        count: targets.len(),
        targets,
    }))
}

/// POST /api/v1/targets
pub async fn create_target(
    State(state): State<ApiState>,
    Json(new_target): Json<NewTarget>,
) -> ApiResult<(StatusCode, Json<MonitoredTarget>)> {
    validate_text("name", &new_target.name)?;
    validate_text("address", &new_target.address)?;
    ensure_unique_address(&state, &new_target.address, None).await?;

    let target = state.registry.create_target(new_target).await?;
    info!("registered target {} ({}) as id {}", target.name, target.address, target.id);

    let channel = state
        .broadcaster
        .publish(Event::TargetCreated(target.clone()))
        .await;
    debug!("target.created delivered via {channel:?}");

    Ok((StatusCode::CREATED, Json(target)))
}

/// GET /api/v1/targets/:id
pub async fn get_target(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MonitoredTarget>> {
    state
        .registry
        .get_target(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// PATCH /api/v1/targets/:id
pub async fn update_target(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(update): Json<TargetUpdate>,
) -> ApiResult<Json<MonitoredTarget>> {
    if let Some(name) = &update.name {
        validate_text("name", name)?;
    }
    if let Some(address) = &update.address {
        validate_text("address", address)?;
        ensure_unique_address(&state, address, Some(id)).await?;
    }

    let target = state
        .registry
        .update_target(id, update)
        .await?
        .ok_or_else(|| not_found(id))?;

    let channel = state
        .broadcaster
        .publish(Event::TargetUpdated(target.clone()))
        .await;
    debug!("target.updated delivered via {channel:?}");

    Ok(Json(target))
}

/// DELETE /api/v1/targets/:id
pub async fn delete_target(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.registry.delete_target(id).await? {
        return Err(not_found(id));
    }
    info!("deleted target {id}");

    let channel = state
        .broadcaster
        .publish(Event::TargetDeleted(TargetDeleted { id }))
        .await;
    debug!("target.deleted delivered via {channel:?}");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/targets/:id/checks
///
/// Most recent outcomes first.
pub async fn get_target_checks(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(query): Query<ChecksQuery>,
) -> ApiResult<Json<ChecksResponse>> {
    let limit = query.limit().map_err(ApiError::InvalidRequest)?;

    if state.registry.get_target(id).await?.is_none() {
        return Err(not_found(id));
    }

    let checks = state.registry.latest_outcomes(id, limit).await?;

    Ok(Json(ChecksResponse {
        target_id: id,
        count: checks.len(),
        checks,
    }))
}
