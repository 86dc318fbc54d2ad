//! # Sync Run Tracker
//!
//! Owns the `sync_logs` lifecycle. A log is opened as `running` before any
//! fetch and receives exactly one terminal update (`success` or `error`).
//! Terminal updates are guarded on the `running` status, so a second
//! completion of the same log is rejected instead of overwriting it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::SyncStatus;
use crate::models::sync_log::{ActiveModel, Column, Entity, Model};

/// Longest error message stored on a log
pub const MAX_ERROR_MESSAGE_CHARS: usize = 2_000;

pub const STALE_RUN_MESSAGE: &str = "abandoned: exceeded stale run timeout";

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("sync log {0} not found")]
    NotFound(Uuid),
    #[error("sync log {0} is already completed")]
    AlreadyCompleted(Uuid),
    #[error("sync log database error: {0}")]
    Database(#[from] DbErr),
}

/// Counters written on completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub processed: u32,
    pub created: u32,
    pub updated: u32,
}

fn to_column(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

fn truncate_message(message: &str) -> String {
    if message.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
    } else {
        message.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct SyncRunTracker {
    db: Arc<DatabaseConnection>,
}

impl SyncRunTracker {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Opens a `running` log for `integration_id`.
    pub async fn begin(&self, integration_id: Uuid) -> Result<Model, TrackerError> {
        let log = ActiveModel {
            id: Set(Uuid::new_v4()),
            integration_id: Set(integration_id),
            status: Set(SyncStatus::Running.as_str().to_string()),
            items_processed: Set(0),
            items_created: Set(0),
            items_updated: Set(0),
            error_message: Set(None),
            started_at: Set(Utc::now().fixed_offset()),
            completed_at: Set(None),
        }
        .insert(&*self.db)
        .await?;

        info!(sync_log_id = %log.id, integration_id = %integration_id, "Sync run started");
        Ok(log)
    }

    pub async fn complete_success(&self, log_id: Uuid, counts: RunCounts) -> Result<Model, TrackerError> {
        self.complete(log_id, SyncStatus::Success, counts, None).await
    }

    pub async fn complete_error(
        &self,
        log_id: Uuid,
        counts: RunCounts,
        message: &str,
    ) -> Result<Model, TrackerError> {
        self.complete(log_id, SyncStatus::Error, counts, Some(truncate_message(message)))
            .await
    }

    async fn complete(
        &self,
        log_id: Uuid,
        status: SyncStatus,
        counts: RunCounts,
        message: Option<String>,
    ) -> Result<Model, TrackerError> {
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(status.as_str()))
            .col_expr(Column::ItemsProcessed, Expr::value(to_column(counts.processed)))
            .col_expr(Column::ItemsCreated, Expr::value(to_column(counts.created)))
            .col_expr(Column::ItemsUpdated, Expr::value(to_column(counts.updated)))
            .col_expr(Column::ErrorMessage, Expr::value(message))
            .col_expr(Column::CompletedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::Id.eq(log_id))
            .filter(Column::Status.eq(SyncStatus::Running.as_str()))
            .exec(&*self.db)
            .await?;

        let log = Entity::find_by_id(log_id)
            .one(&*self.db)
            .await?
            .ok_or(TrackerError::NotFound(log_id))?;
        if result.rows_affected == 0 {
            return Err(TrackerError::AlreadyCompleted(log_id));
        }

        info!(
            sync_log_id = %log_id,
            status = %status,
            processed = counts.processed,
            created = counts.created,
            updated = counts.updated,
            "Sync run completed"
        );
        Ok(log)
    }

    /// Marks `running` logs started before `now - older_than` as errored.
    /// Returns how many logs were reclaimed.
    pub async fn reclaim_stale(
        &self,
        now: DateTime<Utc>,
        older_than: Duration,
    ) -> Result<u64, TrackerError> {
        let cutoff = (now - older_than).fixed_offset();
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(SyncStatus::Error.as_str()))
            .col_expr(Column::ErrorMessage, Expr::value(STALE_RUN_MESSAGE))
            .col_expr(Column::CompletedAt, Expr::value(now.fixed_offset()))
            .filter(Column::Status.eq(SyncStatus::Running.as_str()))
            .filter(Column::StartedAt.lt(cutoff))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            warn!(reclaimed = result.rows_affected, "Reclaimed abandoned sync runs");
        }
        Ok(result.rows_affected)
    }
}
