//! # Sync API Handlers
//!
//! Manual sync triggers, the administrative scheduler trigger and the sync
//! log listing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::{CallerId, OperatorAuth, UserHeader};
use crate::error::{ApiError, forbidden, not_found, validation_error};
use crate::handlers::types::{SyncLogInfo, SyncLogsResponse};
use crate::orchestrator::SyncRunSummary;
use crate::repositories::{IntegrationRepository, SyncLogRepository};
use crate::scheduler::TickSummary;
use crate::server::AppState;

const DEFAULT_LOG_LIMIT: u64 = 20;
const MAX_LOG_LIMIT: u64 = 100;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SyncLogsQuery {
    /// Maximum number of logs to return (default: 20, max: 100)
    pub limit: Option<u64>,
}

/// Runs one sync for an integration owned by the caller
#[utoipa::path(
    post,
    path = "/integrations/{id}/sync",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Integration identifier"),
        UserHeader
    ),
    responses(
        (status = 200, description = "Run finished; per-item write failures are reported with status error", body = SyncRunSummary),
        (status = 403, description = "Integration belongs to another user", body = ApiError),
        (status = 404, description = "Integration not found", body = ApiError),
        (status = 409, description = "Source is push-only", body = ApiError),
        (status = 422, description = "Invalid integration settings", body = ApiError),
        (status = 502, description = "Source API failed", body = ApiError),
        (status = 504, description = "Run exceeded the time limit", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn trigger_sync(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<SyncRunSummary>, ApiError> {
    let summary = state.orchestrator.run(id, Some(caller)).await?;
    Ok(Json(summary))
}

/// Evaluates every active integration once and dispatches the due ones
#[utoipa::path(
    post,
    path = "/scheduler/run",
    security(("bearer_auth" = [])),
    responses(
        (status = 202, description = "Due integrations dispatched", body = TickSummary),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn run_scheduler(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
) -> Result<(StatusCode, Json<TickSummary>), ApiError> {
    let report = state.scheduler.tick(Utc::now()).await.map_err(|err| {
        tracing::error!(error = %err, "Scheduler trigger failed");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Scheduler tick failed",
        )
    })?;
    // Runs continue in the background
    Ok((StatusCode::ACCEPTED, Json(report.summary)))
}

/// Lists recent sync runs of an integration owned by the caller
#[utoipa::path(
    get,
    path = "/integrations/{id}/sync-logs",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Integration identifier"),
        SyncLogsQuery,
        UserHeader
    ),
    responses(
        (status = 200, description = "Most recent runs first", body = SyncLogsResponse),
        (status = 400, description = "Invalid query parameters", body = ApiError),
        (status = 403, description = "Integration belongs to another user", body = ApiError),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn list_sync_logs(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
    Query(query): Query<SyncLogsQuery>,
) -> Result<Json<SyncLogsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    if !(1..=MAX_LOG_LIMIT).contains(&limit) {
        return Err(validation_error(
            "Invalid limit",
            serde_json::json!({ "limit": "Must be between 1 and 100" }),
        ));
    }

    let integration = IntegrationRepository::new(state.db.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(&format!("Integration {} not found", id)))?;
    if integration.owner_id != caller {
        return Err(forbidden(Some("Integration belongs to another user")));
    }

    let logs = SyncLogRepository::new(state.db.clone())
        .list_for_integration(id, limit)
        .await?;
    Ok(Json(SyncLogsResponse {
        sync_logs: logs.into_iter().map(SyncLogInfo::from).collect(),
    }))
}
