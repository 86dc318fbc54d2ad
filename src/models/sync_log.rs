//! SyncLog entity model
//!
//! Append-only audit record of one sync run. Created as `running`, receives
//! exactly one terminal update, never touched afterwards.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub integration_id: Uuid,

    /// One of `running`, `success`, `error`
    pub status: String,

    /// Items seen in the run, including the ones that failed
    pub items_processed: i32,

    pub items_created: i32,

    pub items_updated: i32,

    pub error_message: Option<String>,

    pub started_at: DateTimeWithTimeZone,

    /// `None` while the run is still in progress
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::integration::Entity",
        from = "Column::IntegrationId",
        to = "super::integration::Column::Id"
    )]
    Integration,
}

impl Related<super::integration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Integration.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
