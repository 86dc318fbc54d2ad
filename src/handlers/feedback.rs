//! # Feedback API Handlers
//!
//! Listing, manual import and analysis updates for stored feedback.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::{CallerId, OperatorAuth, UserHeader};
use crate::error::{ApiError, forbidden, not_found, validation_error};
use crate::handlers::types::{AnalysisPayload, FeedbackInfo, FeedbackListResponse, ImportRequest};
use crate::models::{FeedbackStatus, Priority, Source, feedback::normalize_tags};
use crate::reconciler::ImportOutcome;
use crate::repositories::{FeedbackFilter, FeedbackRepository, IntegrationRepository};
use crate::server::AppState;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 500;
const MAX_IMPORT_ROWS: usize = 1_000;

/// Query parameters for listing feedback
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListFeedbackQuery {
    /// One of: jira, notion, zoho, manual, zapier
    pub source: Option<String>,
    /// One of: new, in_progress, resolved, closed
    pub status: Option<String>,
    /// One of: low, medium, high, critical
    pub priority: Option<String>,
    pub integration_id: Option<Uuid>,
    /// Maximum number of records to return (default: 50, max: 500)
    pub limit: Option<u64>,
}

fn parse_filter<T: FromStr>(field: &str, value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|err| {
                validation_error(
                    &format!("Invalid {}", field),
                    serde_json::json!({ field: err.to_string() }),
                )
            })
        })
        .transpose()
}

/// Lists the caller's feedback, newest first
#[utoipa::path(
    get,
    path = "/feedback",
    security(("bearer_auth" = [])),
    params(ListFeedbackQuery, UserHeader),
    responses(
        (status = 200, description = "Matching feedback", body = FeedbackListResponse),
        (status = 400, description = "Invalid query parameters", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "feedback"
)]
pub async fn list_feedback(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    CallerId(caller): CallerId,
    Query(query): Query<ListFeedbackQuery>,
) -> Result<Json<FeedbackListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(validation_error(
            "Invalid limit",
            serde_json::json!({ "limit": "Must be between 1 and 500" }),
        ));
    }

    let filter = FeedbackFilter {
        owner_id: Some(caller),
        source: parse_filter::<Source>("source", query.source.as_deref())?,
        status: parse_filter::<FeedbackStatus>("status", query.status.as_deref())?,
        priority: parse_filter::<Priority>("priority", query.priority.as_deref())?,
        integration_id: query.integration_id,
    };

    let repo = FeedbackRepository::new(state.db.clone());
    let total = repo.count(&filter).await?;
    let feedback = repo.list(&filter, limit).await?;

    Ok(Json(FeedbackListResponse {
        feedback: feedback.into_iter().map(FeedbackInfo::from).collect(),
        total,
    }))
}

/// Imports client-parsed rows as new manual feedback
#[utoipa::path(
    post,
    path = "/feedback/import",
    security(("bearer_auth" = [])),
    params(UserHeader),
    request_body = ImportRequest,
    responses(
        (status = 201, description = "Rows imported", body = ImportOutcome),
        (status = 400, description = "Malformed body or too many rows", body = ApiError),
        (status = 403, description = "Integration belongs to another user", body = ApiError),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "feedback"
)]
pub async fn import_feedback(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    CallerId(caller): CallerId,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ImportOutcome>), ApiError> {
    let Json(request) = payload?;
    if request.rows.len() > MAX_IMPORT_ROWS {
        return Err(validation_error(
            "Too many rows",
            serde_json::json!({ "rows": format!("At most {} rows per import", MAX_IMPORT_ROWS) }),
        ));
    }

    if let Some(integration_id) = request.integration_id {
        let integration = IntegrationRepository::new(state.db.clone())
            .find_by_id(integration_id)
            .await?
            .ok_or_else(|| not_found(&format!("Integration {} not found", integration_id)))?;
        if integration.owner_id != caller {
            return Err(forbidden(Some("Integration belongs to another user")));
        }
    }

    let outcome = state
        .reconciler
        .import_manual(caller, request.integration_id, &request.rows)
        .await?;
    tracing::info!(
        owner_id = %caller,
        imported = outcome.imported,
        failed = outcome.failed,
        "Manual import stored"
    );
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Stores enrichment output for one of the caller's feedback records
#[utoipa::path(
    put,
    path = "/feedback/{id}/analysis",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Feedback identifier"), UserHeader),
    request_body = AnalysisPayload,
    responses(
        (status = 200, description = "Updated feedback", body = FeedbackInfo),
        (status = 400, description = "Malformed body", body = ApiError),
        (status = 403, description = "Feedback belongs to another user", body = ApiError),
        (status = 404, description = "Feedback not found", body = ApiError)
    ),
    tag = "feedback"
)]
pub async fn put_analysis(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
    payload: Result<Json<AnalysisPayload>, JsonRejection>,
) -> Result<Json<FeedbackInfo>, ApiError> {
    let Json(analysis) = payload?;
    if analysis.sentiment.trim().is_empty() {
        return Err(validation_error(
            "Invalid analysis",
            serde_json::json!({ "sentiment": "Must not be empty" }),
        ));
    }

    let repo = FeedbackRepository::new(state.db.clone());
    let existing = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(&format!("Feedback {} not found", id)))?;
    if existing.owner_id != caller {
        return Err(forbidden(Some("Feedback belongs to another user")));
    }

    let stored = serde_json::json!({
        "sentiment": analysis.sentiment.trim(),
        "summary": analysis.summary,
        "tags": normalize_tags(&analysis.tags),
    });
    let updated = repo.set_analysis(id, stored).await?;
    Ok(Json(FeedbackInfo::from(updated)))
}
