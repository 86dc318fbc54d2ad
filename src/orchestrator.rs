//! # Sync Orchestrator
//!
//! Coordinates one sync run for one integration:
//!
//! 1. load the integration and check ownership when a caller is given
//! 2. resolve the connector and validate its settings
//! 3. open a sync log
//! 4. fetch (bounded by the run timeout) and map raw items
//! 5. reconcile the mapped records
//! 6. close the log and, on success only, advance `last_synced_at`
//!
//! Failures before step 3 leave no sync log behind. Every failure after it is
//! recorded on the log before being returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::connectors::{ConnectorError, Registry};
use crate::error::{ApiError, RepositoryError, provider_error};
use crate::models::{FeedbackDraft, Source, SyncStatus};
use crate::reconciler::Reconciler;
use crate::repositories::IntegrationRepository;
use crate::tracker::{RunCounts, SyncRunTracker, TrackerError};

#[derive(Debug, Error)]
pub enum SyncRunError {
    #[error("integration {0} not found")]
    NotFound(Uuid),

    #[error("caller does not own integration {0}")]
    Forbidden(Uuid),

    #[error("source '{0}' is not synced by polling")]
    UnsupportedSource(Source),

    #[error("{0}")]
    Configuration(String),

    #[error("sync failed: {error}")]
    Upstream {
        sync_log_id: Uuid,
        source_name: Source,
        error: ConnectorError,
    },

    #[error("sync timed out after {seconds}s")]
    Timeout { sync_log_id: Uuid, seconds: u64 },

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SyncRunError {
    /// Log that recorded this failure, if one was opened.
    pub fn sync_log_id(&self) -> Option<Uuid> {
        match self {
            Self::Upstream { sync_log_id, .. } | Self::Timeout { sync_log_id, .. } => {
                Some(*sync_log_id)
            }
            _ => None,
        }
    }
}

impl From<SyncRunError> for ApiError {
    fn from(error: SyncRunError) -> Self {
        match error {
            SyncRunError::NotFound(id) => ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Integration {} not found", id),
            ),
            SyncRunError::Forbidden(_) => ApiError::new(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Integration belongs to another user",
            ),
            SyncRunError::UnsupportedSource(source) => ApiError::new(
                StatusCode::CONFLICT,
                "UNSUPPORTED_SOURCE",
                &format!("Source '{}' does not support pull sync", source),
            ),
            SyncRunError::Configuration(details) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "CONFIGURATION_ERROR", &details)
            }
            SyncRunError::Upstream {
                sync_log_id,
                source_name,
                error,
            } => {
                let body = match &error {
                    ConnectorError::Http { body, .. } => body.clone(),
                    other => Some(other.to_string()),
                };
                let mut api_error =
                    provider_error(source_name.as_str(), error.upstream_status(), body);
                if let ConnectorError::RateLimited {
                    retry_after: Some(seconds),
                    ..
                } = error
                {
                    api_error = api_error.with_retry_after(seconds);
                }
                let mut details = api_error.details.take().map(|d| *d).unwrap_or_default();
                if let Some(map) = details.as_object_mut() {
                    map.insert("sync_log_id".into(), sync_log_id.to_string().into());
                }
                api_error.with_details(details)
            }
            SyncRunError::Timeout {
                sync_log_id,
                seconds,
            } => ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "SYNC_TIMEOUT",
                &format!("Sync did not finish within {}s", seconds),
            )
            .with_details(serde_json::json!({ "sync_log_id": sync_log_id })),
            SyncRunError::Tracker(err) => {
                error!(error = %err, "Sync log bookkeeping failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Failed to record sync run",
                )
            }
            SyncRunError::Repository(err) => err.into(),
        }
    }
}

/// Outcome of one run, mirroring its terminal sync log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncRunSummary {
    pub sync_log_id: Uuid,
    pub integration_id: Uuid,
    pub status: SyncStatus,
    pub items_processed: u32,
    pub items_created: u32,
    pub items_updated: u32,
    /// Items skipped because they could not be mapped or written
    pub items_failed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub struct SyncOrchestrator {
    integrations: IntegrationRepository,
    registry: Arc<Registry>,
    reconciler: Reconciler,
    tracker: SyncRunTracker,
    max_run: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        integrations: IntegrationRepository,
        registry: Arc<Registry>,
        reconciler: Reconciler,
        tracker: SyncRunTracker,
        max_run: Duration,
    ) -> Self {
        Self {
            integrations,
            registry,
            reconciler,
            tracker,
            max_run,
        }
    }

    /// Runs one sync for `integration_id`. `caller` is the requesting user for
    /// manual triggers and `None` for system-initiated runs.
    pub async fn run(
        &self,
        integration_id: Uuid,
        caller: Option<Uuid>,
    ) -> Result<SyncRunSummary, SyncRunError> {
        let span = info_span!(
            "sync_run",
            integration_id = %integration_id,
            source = tracing::field::Empty,
            sync_log_id = tracing::field::Empty,
        );
        self.run_inner(integration_id, caller).instrument(span).await
    }

    async fn run_inner(
        &self,
        integration_id: Uuid,
        caller: Option<Uuid>,
    ) -> Result<SyncRunSummary, SyncRunError> {
        let integration = self
            .integrations
            .find_by_id(integration_id)
            .await?
            .ok_or(SyncRunError::NotFound(integration_id))?;

        if let Some(caller) = caller
            && caller != integration.owner_id
        {
            warn!(caller = %caller, "Rejected sync trigger from non-owner");
            return Err(SyncRunError::Forbidden(integration_id));
        }

        let source = integration
            .source_kind()
            .map_err(|err| SyncRunError::Configuration(err.to_string()))?;
        tracing::Span::current().record("source", source.as_str());
        if !source.is_polling() {
            return Err(SyncRunError::UnsupportedSource(source));
        }
        let connector = self
            .registry
            .get(source)
            .map_err(|_| SyncRunError::UnsupportedSource(source))?;
        connector
            .validate_config(&integration)
            .map_err(|err| SyncRunError::Configuration(err.to_string()))?;

        let log = self.tracker.begin(integration_id).await?;
        tracing::Span::current().record("sync_log_id", tracing::field::display(log.id));
        let started = Instant::now();
        let run_started_at = Utc::now();

        let fetched = tokio::time::timeout(self.max_run, connector.fetch(&integration)).await;
        let raw_items = match fetched {
            Ok(Ok(items)) => items,
            Ok(Err(err)) => {
                let retryable = err.is_retryable();
                error!(error = %err, retryable, "Fetch failed");
                counter!(
                    "sync_fetch_failures_total",
                    "source" => source.as_str(),
                    "retryable" => if retryable { "true" } else { "false" }
                )
                .increment(1);
                self.tracker
                    .complete_error(log.id, RunCounts::default(), &err.to_string())
                    .await?;
                record_run(source, SyncStatus::Error, started);
                return Err(SyncRunError::Upstream {
                    sync_log_id: log.id,
                    source_name: source,
                    error: err,
                });
            }
            Err(_) => {
                let seconds = self.max_run.as_secs();
                error!(timeout_seconds = seconds, "Fetch timed out");
                self.tracker
                    .complete_error(
                        log.id,
                        RunCounts::default(),
                        &format!("sync timed out after {}s", seconds),
                    )
                    .await?;
                record_run(source, SyncStatus::Error, started);
                return Err(SyncRunError::Timeout {
                    sync_log_id: log.id,
                    seconds,
                });
            }
        };

        let mut mapping_failures: u32 = 0;
        let drafts: Vec<FeedbackDraft> = raw_items
            .iter()
            .filter_map(|raw| match connector.map_to_feedback(raw, &integration) {
                Ok(draft) => Some(draft),
                Err(err) => {
                    warn!(error = %err, "Skipped unmappable item");
                    counter!("sync_items_total", "source" => source.as_str(), "outcome" => "unmappable")
                        .increment(1);
                    mapping_failures += 1;
                    None
                }
            })
            .collect();

        let outcome = self.reconciler.reconcile(&drafts).await;
        let counts = RunCounts {
            processed: raw_items.len() as u32,
            created: outcome.created,
            updated: outcome.updated,
        };

        let (status, error_message) = match outcome.failures.first() {
            None => {
                // A success log always has a stamped cursor behind it.
                if let Err(err) = self
                    .integrations
                    .mark_synced(integration_id, run_started_at)
                    .await
                {
                    error!(error = %err, "Cursor update failed after a clean write pass");
                    self.tracker
                        .complete_error(log.id, counts, &format!("cursor update failed: {}", err))
                        .await?;
                    record_run(source, SyncStatus::Error, started);
                    return Err(err.into());
                }
                self.tracker.complete_success(log.id, counts).await?;
                (SyncStatus::Success, None)
            }
            Some(first) => {
                let message = format!(
                    "{} of {} items failed to write; first error: {}",
                    outcome.failed(),
                    counts.processed,
                    first.error
                );
                self.tracker
                    .complete_error(log.id, counts, &message)
                    .await?;
                (SyncStatus::Error, Some(message))
            }
        };

        record_run(source, status, started);
        info!(
            status = %status,
            processed = counts.processed,
            created = counts.created,
            updated = counts.updated,
            unmappable = mapping_failures,
            write_failures = outcome.failed(),
            "Sync run finished"
        );

        Ok(SyncRunSummary {
            sync_log_id: log.id,
            integration_id,
            status,
            items_processed: counts.processed,
            items_created: counts.created,
            items_updated: counts.updated,
            items_failed: mapping_failures + outcome.failed(),
            error_message,
        })
    }
}

fn record_run(source: Source, status: SyncStatus, started: Instant) {
    counter!("sync_runs_total", "source" => source.as_str(), "status" => status.as_str())
        .increment(1);
    histogram!("sync_run_duration_seconds", "source" => source.as_str())
        .record(started.elapsed().as_secs_f64());
}
