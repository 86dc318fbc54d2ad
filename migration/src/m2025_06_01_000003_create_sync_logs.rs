//! Creates the `sync_logs` table: the append-only audit trail of sync runs.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SyncLogs::IntegrationId).uuid().not_null())
                    .col(
                        ColumnDef::new(SyncLogs::Status)
                            .text()
                            .not_null()
                            .default("running"),
                    )
                    .col(
                        ColumnDef::new(SyncLogs::ItemsProcessed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncLogs::ItemsCreated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncLogs::ItemsUpdated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncLogs::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(SyncLogs::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SyncLogs::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_logs_integration_id")
                            .from(SyncLogs::Table, SyncLogs::IntegrationId)
                            .to(Integrations::Table, Integrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_logs_integration_started")
                    .table(SyncLogs::Table)
                    .col(SyncLogs::IntegrationId)
                    .col(SyncLogs::StartedAt)
                    .to_owned(),
            )
            .await?;

        // Stale run reclamation scans running rows by age
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_logs_status_started")
                    .table(SyncLogs::Table)
                    .col(SyncLogs::Status)
                    .col(SyncLogs::StartedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_sync_logs_status_started").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_sync_logs_integration_started")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(SyncLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncLogs {
    Table,
    Id,
    IntegrationId,
    Status,
    ItemsProcessed,
    ItemsCreated,
    ItemsUpdated,
    ErrorMessage,
    StartedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum Integrations {
    Table,
    Id,
}
