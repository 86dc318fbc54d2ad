//! # Zapier Webhook Handler

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::connectors::ZapierPayload;
use crate::error::{ApiError, not_found};
use crate::models::Source;
use crate::reconciler::WebhookOutcome;
use crate::repositories::IntegrationRepository;
use crate::server::AppState;

/// Receives a batch of pre-shaped feedback from Zapier and upserts it on
/// `(integration_id, external_id)`
#[utoipa::path(
    post,
    path = "/zapier-sync/{integration_id}",
    security(("bearer_auth" = [])),
    params(("integration_id" = Uuid, Path, description = "Zapier integration identifier")),
    request_body = ZapierPayload,
    responses(
        (status = 200, description = "Batch upserted", body = WebhookOutcome),
        (status = 400, description = "Malformed body", body = ApiError),
        (status = 404, description = "Integration not found", body = ApiError),
        (status = 409, description = "Integration is not an active Zapier integration", body = ApiError)
    ),
    tag = "webhooks"
)]
pub async fn zapier_sync(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(integration_id): Path<Uuid>,
    payload: Result<Json<ZapierPayload>, JsonRejection>,
) -> Result<Json<WebhookOutcome>, ApiError> {
    let Json(payload) = payload?;

    let integration = IntegrationRepository::new(state.db.clone())
        .find_by_id(integration_id)
        .await?
        .ok_or_else(|| not_found(&format!("Integration {} not found", integration_id)))?;

    if integration.source_kind().ok() != Some(Source::Zapier) {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "UNSUPPORTED_SOURCE",
            "Integration does not accept Zapier pushes",
        ));
    }
    if !integration.is_active {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "CONFLICT",
            "Integration is inactive",
        ));
    }

    let outcome = state
        .reconciler
        .upsert_webhook_batch(&integration, &payload.feedbacks)
        .await?;
    tracing::info!(
        integration_id = %integration_id,
        received = payload.feedbacks.len(),
        upserted = outcome.upserted,
        rejected = outcome.rejected,
        "Zapier batch stored"
    );
    Ok(Json(outcome))
}
