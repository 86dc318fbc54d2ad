//! # Common API Types
//!
//! Response and request bodies shared by the feedback and sync handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::connectors::ManualImportRow;
use crate::models::{feedback, sync_log};

/// Stored feedback record
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackInfo {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: String,
    pub owner_id: String,
    #[schema(example = "PROJ-1")]
    pub external_id: Option<String>,
    #[schema(example = "jira")]
    pub source: String,
    pub integration_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "high")]
    pub priority: Option<String>,
    #[schema(example = "new")]
    pub status: Option<String>,
    pub tags: Vec<String>,
    #[schema(value_type = Object)]
    pub metadata: Value,
    #[schema(value_type = Option<Object>)]
    pub analysis: Option<Value>,
    pub customer_name: Option<String>,
    pub interviewee_name: Option<String>,
    pub conversation_at: Option<String>,
    pub external_created_at: Option<String>,
    pub external_updated_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<feedback::Model> for FeedbackInfo {
    fn from(model: feedback::Model) -> Self {
        let tags = model.tag_list();
        Self {
            id: model.id.to_string(),
            owner_id: model.owner_id.to_string(),
            external_id: model.external_id,
            source: model.source,
            integration_id: model.integration_id.map(|id| id.to_string()),
            title: model.title,
            description: model.description,
            priority: model.priority,
            status: model.status,
            tags,
            metadata: model.metadata,
            analysis: model.analysis,
            customer_name: model.customer_name,
            interviewee_name: model.interviewee_name,
            conversation_at: model.conversation_at.map(|dt| dt.to_rfc3339()),
            external_created_at: model.external_created_at.map(|dt| dt.to_rfc3339()),
            external_updated_at: model.external_updated_at.map(|dt| dt.to_rfc3339()),
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackListResponse {
    pub feedback: Vec<FeedbackInfo>,
    /// Number of records matching the filters, ignoring `limit`
    pub total: u64,
}

/// One sync run
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncLogInfo {
    pub id: String,
    pub integration_id: String,
    #[schema(example = "success")]
    pub status: String,
    pub items_processed: i32,
    pub items_created: i32,
    pub items_updated: i32,
    pub error_message: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl From<sync_log::Model> for SyncLogInfo {
    fn from(model: sync_log::Model) -> Self {
        Self {
            id: model.id.to_string(),
            integration_id: model.integration_id.to_string(),
            status: model.status,
            items_processed: model.items_processed,
            items_created: model.items_created,
            items_updated: model.items_updated,
            error_message: model.error_message,
            started_at: model.started_at.to_rfc3339(),
            completed_at: model.completed_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncLogsResponse {
    pub sync_logs: Vec<SyncLogInfo>,
}

/// Enrichment output stored on a feedback record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisPayload {
    #[schema(example = "negative")]
    pub sentiment: String,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of a manual import
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportRequest {
    pub rows: Vec<ManualImportRow>,
    /// Optional manual integration the rows are attributed to
    pub integration_id: Option<uuid::Uuid>,
}
