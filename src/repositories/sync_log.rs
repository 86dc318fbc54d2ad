//! # SyncLog Repository
//!
//! Read side of the sync audit trail. Writes go through
//! [`SyncRunTracker`](crate::tracker::SyncRunTracker).

use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::sync_log::{Column, Entity, Model};

#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    db: Arc<DatabaseConnection>,
}

impl SyncLogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, RepositoryError> {
        Ok(Entity::find_by_id(id).one(&*self.db).await?)
    }

    /// Most recent runs of one integration first.
    pub async fn list_for_integration(
        &self,
        integration_id: Uuid,
        limit: u64,
    ) -> Result<Vec<Model>, RepositoryError> {
        Ok(Entity::find()
            .filter(Column::IntegrationId.eq(integration_id))
            .order_by_desc(Column::StartedAt)
            .order_by_desc(Column::Id)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }
}
