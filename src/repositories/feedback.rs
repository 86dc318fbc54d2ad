//! # Feedback Repository
//!
//! Storage gateway for canonical feedback rows. The reconciler talks to it
//! through the [`FeedbackStore`] trait; the HTTP listing and analysis
//! endpoints use the inherent query methods.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::feedback::{ActiveModel, Column, Entity, Model};
use crate::models::{FeedbackDraft, FeedbackStatus, NaturalKey, Priority, Source};

/// Write operations the reconciler needs from the store.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn find_by_natural_key(&self, key: &NaturalKey) -> Result<Option<Model>, RepositoryError>;

    async fn insert(&self, draft: &FeedbackDraft) -> Result<Model, RepositoryError>;

    /// Full overwrite of the mapped fields of `existing`.
    async fn update(&self, existing: Model, draft: &FeedbackDraft) -> Result<Model, RepositoryError>;

    /// Insert-or-update on `(integration_id, external_id)`, all or nothing.
    /// Returns the number of rows written.
    async fn upsert_on_integration(&self, drafts: &[FeedbackDraft]) -> Result<u64, RepositoryError>;

    /// Plain batch insert with no conflict handling.
    async fn insert_many(&self, drafts: &[FeedbackDraft]) -> Result<u64, RepositoryError>;
}

/// Filters for [`FeedbackRepository::list`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedbackFilter {
    pub owner_id: Option<Uuid>,
    pub source: Option<Source>,
    pub status: Option<FeedbackStatus>,
    pub priority: Option<Priority>,
    pub integration_id: Option<Uuid>,
}

/// Rows per multi-row statement. Keeps the bind count well under the
/// SQLite and Postgres parameter limits.
pub const WRITE_CHUNK_ROWS: usize = 500;

#[derive(Debug, Clone)]
pub struct FeedbackRepository {
    db: Arc<DatabaseConnection>,
}

impl FeedbackRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn filtered(filter: &FeedbackFilter) -> Select<Entity> {
        let mut query = Entity::find();
        if let Some(owner_id) = filter.owner_id {
            query = query.filter(Column::OwnerId.eq(owner_id));
        }
        if let Some(source) = filter.source {
            query = query.filter(Column::Source.eq(source.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(Column::Status.eq(status.as_str()));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(Column::Priority.eq(priority.as_str()));
        }
        if let Some(integration_id) = filter.integration_id {
            query = query.filter(Column::IntegrationId.eq(integration_id));
        }
        query
    }

    /// Newest first, capped at `limit`.
    pub async fn list(
        &self,
        filter: &FeedbackFilter,
        limit: u64,
    ) -> Result<Vec<Model>, RepositoryError> {
        Ok(Self::filtered(filter)
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }

    pub async fn count(&self, filter: &FeedbackFilter) -> Result<u64, RepositoryError> {
        Ok(Self::filtered(filter).count(&*self.db).await?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, RepositoryError> {
        Ok(Entity::find_by_id(id).one(&*self.db).await?)
    }

    /// Stores enrichment output. Sync passes never touch this column.
    pub async fn set_analysis(
        &self,
        id: Uuid,
        analysis: JsonValue,
    ) -> Result<Model, RepositoryError> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(format!("feedback {}", id)))?;
        let mut active = existing.into_active_model();
        active.analysis = Set(Some(analysis));
        active.updated_at = Set(Utc::now().fixed_offset());
        Ok(active.update(&*self.db).await?)
    }
}

#[async_trait]
impl FeedbackStore for FeedbackRepository {
    async fn find_by_natural_key(&self, key: &NaturalKey) -> Result<Option<Model>, RepositoryError> {
        let integration = match key.integration_id {
            Some(id) => Column::IntegrationId.eq(id),
            None => Column::IntegrationId.is_null(),
        };
        Ok(Entity::find()
            .filter(Column::Source.eq(key.source.as_str()))
            .filter(Column::OwnerId.eq(key.owner_id))
            .filter(integration)
            .filter(Column::ExternalId.eq(key.external_id.as_str()))
            .one(&*self.db)
            .await?)
    }

    async fn insert(&self, draft: &FeedbackDraft) -> Result<Model, RepositoryError> {
        Ok(draft.to_new_active_model(Utc::now()).insert(&*self.db).await?)
    }

    async fn update(&self, existing: Model, draft: &FeedbackDraft) -> Result<Model, RepositoryError> {
        let mut active: ActiveModel = existing.into_active_model();
        draft.apply_to(&mut active, Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    async fn upsert_on_integration(&self, drafts: &[FeedbackDraft]) -> Result<u64, RepositoryError> {
        if drafts.is_empty() {
            return Ok(0);
        }

        // One statement cannot touch the same conflict key twice; the last
        // occurrence of a repeated external_id wins.
        let mut positions: HashMap<(Option<Uuid>, &str), usize> = HashMap::new();
        let mut unique: Vec<&FeedbackDraft> = Vec::with_capacity(drafts.len());
        for draft in drafts {
            match draft.external_id.as_deref() {
                Some(external_id) => match positions.get(&(draft.integration_id, external_id)) {
                    Some(&index) => unique[index] = draft,
                    None => {
                        positions.insert((draft.integration_id, external_id), unique.len());
                        unique.push(draft);
                    }
                },
                None => unique.push(draft),
            }
        }

        let now = Utc::now();
        let on_conflict = OnConflict::columns([Column::IntegrationId, Column::ExternalId])
            .update_columns([
                Column::Title,
                Column::Description,
                Column::Priority,
                Column::Tags,
                Column::Metadata,
                Column::CustomerName,
                Column::IntervieweeName,
                Column::ConversationAt,
                Column::ExternalCreatedAt,
                Column::ExternalUpdatedAt,
                Column::UpdatedAt,
            ])
            .to_owned();

        let txn = self.db.begin().await?;
        let mut written = 0;
        for chunk in unique.chunks(WRITE_CHUNK_ROWS) {
            written += Entity::insert_many(chunk.iter().map(|d| d.to_new_active_model(now)))
                .on_conflict(on_conflict.clone())
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;
        Ok(written)
    }

    async fn insert_many(&self, drafts: &[FeedbackDraft]) -> Result<u64, RepositoryError> {
        if drafts.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut written = 0;
        for chunk in drafts.chunks(WRITE_CHUNK_ROWS) {
            written += Entity::insert_many(chunk.iter().map(|d| d.to_new_active_model(now)))
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;
        Ok(written)
    }
}
