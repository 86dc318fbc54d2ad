//! Integration entity model
//!
//! A configured connection to one external feedback source. `config` holds the
//! source-specific credentials and settings; its shape depends on `source`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::enums::{Source, SyncFrequency, UnknownVariant};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "integrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User that owns this integration and every record it produces
    pub owner_id: Uuid,

    /// One of `jira`, `notion`, `zoho`, `manual`, `zapier`
    pub source: String,

    pub name: String,

    /// Source-specific credentials and settings
    #[sea_orm(column_type = "JsonBinary")]
    pub config: JsonValue,

    /// Inactive integrations are ignored by the scheduler
    pub is_active: bool,

    /// One of `manual`, `hourly`, `twice_daily`, `daily`
    pub sync_frequency: String,

    /// Scheduling gate and incremental-fetch cursor. Only advanced by a
    /// successful run.
    pub last_synced_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sync_log::Entity")]
    SyncLogs,
}

impl Related<super::sync_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn source_kind(&self) -> Result<Source, UnknownVariant> {
        self.source.parse()
    }

    pub fn frequency(&self) -> Result<SyncFrequency, UnknownVariant> {
        self.sync_frequency.parse()
    }
}
