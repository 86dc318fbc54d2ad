//! # Sources API Handlers

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::OperatorAuth;
use crate::connectors::ProviderMetadata;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SourcesResponse {
    pub sources: Vec<ProviderMetadata>,
}

/// Lists supported feedback sources and how each one delivers items
#[utoipa::path(
    get,
    path = "/sources",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Supported sources", body = SourcesResponse, example = json!({
            "sources": [
                {"source": "jira", "auth_type": "basic", "delivery": "polling", "paginated": false},
                {"source": "zapier", "auth_type": "none", "delivery": "push", "paginated": false}
            ]
        })),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "sources"
)]
pub async fn list_sources(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: state.registry.list_metadata(),
    })
}
