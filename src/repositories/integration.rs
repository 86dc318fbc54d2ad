//! # Integration Repository
//!
//! Lookup and cursor bookkeeping for configured integrations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::integration::{ActiveModel, Column, Entity, Model};
use crate::models::{Source, SyncFrequency};

/// Values needed to create an integration
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub owner_id: Uuid,
    pub source: Source,
    pub name: String,
    pub config: JsonValue,
    pub sync_frequency: SyncFrequency,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct IntegrationRepository {
    db: Arc<DatabaseConnection>,
}

impl IntegrationRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, RepositoryError> {
        Ok(Entity::find_by_id(id).one(&*self.db).await?)
    }

    /// Active integrations, oldest cursor first so long-starved ones are
    /// dispatched before the worker pool fills up.
    pub async fn list_active(&self) -> Result<Vec<Model>, RepositoryError> {
        Ok(Entity::find()
            .filter(Column::IsActive.eq(true))
            .order_by_asc(Column::LastSyncedAt)
            .order_by_asc(Column::Id)
            .all(&*self.db)
            .await?)
    }

    pub async fn create(&self, new: NewIntegration) -> Result<Model, RepositoryError> {
        if new.name.trim().is_empty() {
            return Err(RepositoryError::validation("integration name is required"));
        }
        let now = Utc::now().fixed_offset();
        let active = ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(new.owner_id),
            source: Set(new.source.as_str().to_string()),
            name: Set(new.name),
            config: Set(new.config),
            is_active: Set(new.is_active),
            sync_frequency: Set(new.sync_frequency.as_str().to_string()),
            last_synced_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(active.insert(&*self.db).await?)
    }

    /// Advances the incremental cursor after a successful run.
    pub async fn mark_synced(
        &self,
        id: Uuid,
        synced_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = Entity::update_many()
            .col_expr(Column::LastSyncedAt, Some(synced_at.fixed_offset()).into())
            .col_expr(Column::UpdatedAt, Utc::now().fixed_offset().into())
            .filter(Column::Id.eq(id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::not_found(format!("integration {}", id)));
        }
        Ok(())
    }
}
