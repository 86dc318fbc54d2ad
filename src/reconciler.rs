//! # Reconciler
//!
//! Decides insert versus update for each canonical record of a run and
//! applies the write through a [`FeedbackStore`]. Items are processed in the
//! order given; one failing item never aborts the rest of the batch.
//!
//! Zapier batches and manual imports have their own entry points: the former
//! is a single bulk upsert on `(integration_id, external_id)`, the latter
//! always inserts.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::connectors::{ManualImportRow, ZapierItem};
use crate::error::{RepositoryError, is_unique_violation};
use crate::models::{FeedbackDraft, integration::Model as Integration};
use crate::repositories::FeedbackStore;

/// What happened to one item that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub external_id: Option<String>,
    pub error: String,
}

/// Counts for one reconciled batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub processed: u32,
    pub created: u32,
    pub updated: u32,
    pub failures: Vec<ItemFailure>,
}

impl ReconcileOutcome {
    pub fn failed(&self) -> u32 {
        self.failures.len() as u32
    }
}

/// Result of a Zapier push
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct WebhookOutcome {
    /// Rows inserted or updated
    pub upserted: u64,
    /// Items dropped because they could not be mapped
    pub rejected: u32,
}

/// Result of a manual import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportOutcome {
    pub imported: u64,
    pub failed: u32,
}

enum Written {
    Created,
    Updated,
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn FeedbackStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    /// Inserts records with an unseen natural key and fully overwrites the
    /// ones that match.
    pub async fn reconcile(&self, drafts: &[FeedbackDraft]) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for draft in drafts {
            outcome.processed += 1;
            let source = draft.source.as_str();
            match self.write_one(draft).await {
                Ok(Written::Created) => {
                    outcome.created += 1;
                    counter!("sync_items_total", "source" => source, "outcome" => "created")
                        .increment(1);
                }
                Ok(Written::Updated) => {
                    outcome.updated += 1;
                    counter!("sync_items_total", "source" => source, "outcome" => "updated")
                        .increment(1);
                }
                Err(err) => {
                    warn!(
                        source,
                        external_id = ?draft.external_id,
                        error = %err,
                        "Failed to write feedback item"
                    );
                    counter!("sync_items_total", "source" => source, "outcome" => "failed")
                        .increment(1);
                    outcome.failures.push(ItemFailure {
                        external_id: draft.external_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        debug!(
            processed = outcome.processed,
            created = outcome.created,
            updated = outcome.updated,
            failed = outcome.failed(),
            "Reconciled batch"
        );
        outcome
    }

    async fn write_one(&self, draft: &FeedbackDraft) -> Result<Written, RepositoryError> {
        let Some(key) = draft.natural_key() else {
            self.store.insert(draft).await?;
            return Ok(Written::Created);
        };

        if let Some(existing) = self.store.find_by_natural_key(&key).await? {
            self.store.update(existing, draft).await?;
            return Ok(Written::Updated);
        }

        match self.store.insert(draft).await {
            Ok(_) => Ok(Written::Created),
            // Another run inserted the same key between lookup and insert
            Err(RepositoryError::Database(err)) if is_unique_violation(&err) => {
                let existing = self.store.find_by_natural_key(&key).await?.ok_or_else(|| {
                    RepositoryError::Database(err)
                })?;
                self.store.update(existing, draft).await?;
                Ok(Written::Updated)
            }
            Err(err) => Err(err),
        }
    }

    /// Maps a Zapier batch and bulk-upserts it for `integration`.
    pub async fn upsert_webhook_batch(
        &self,
        integration: &Integration,
        items: &[ZapierItem],
    ) -> Result<WebhookOutcome, RepositoryError> {
        let mut rejected = 0;
        let drafts: Vec<FeedbackDraft> = items
            .iter()
            .filter_map(|item| match item.to_draft(integration) {
                Ok(draft) => Some(draft),
                Err(err) => {
                    warn!(integration_id = %integration.id, error = %err, "Rejected Zapier item");
                    rejected += 1;
                    None
                }
            })
            .collect();

        let upserted = self.store.upsert_on_integration(&drafts).await?;
        counter!("sync_items_total", "source" => "zapier", "outcome" => "upserted")
            .increment(upserted);
        Ok(WebhookOutcome { upserted, rejected })
    }

    /// Inserts every valid row as a new manual record.
    pub async fn import_manual(
        &self,
        owner_id: Uuid,
        integration_id: Option<Uuid>,
        rows: &[ManualImportRow],
    ) -> Result<ImportOutcome, RepositoryError> {
        let mut failed = 0;
        let drafts: Vec<FeedbackDraft> = rows
            .iter()
            .filter_map(|row| match row.to_draft(owner_id, integration_id) {
                Ok(draft) => Some(draft),
                Err(err) => {
                    warn!(owner_id = %owner_id, error = %err, "Skipped import row");
                    failed += 1;
                    None
                }
            })
            .collect();

        let imported = self.store.insert_many(&drafts).await?;
        counter!("sync_items_total", "source" => "manual", "outcome" => "created")
            .increment(imported);
        Ok(ImportOutcome { imported, failed })
    }
}
