//! Creates the `integrations` table: one configured connection to an external
//! feedback source, owned by a single user.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Integrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Integrations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Integrations::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Integrations::Source).text().not_null())
                    .col(ColumnDef::new(Integrations::Name).text().not_null())
                    .col(ColumnDef::new(Integrations::Config).json_binary().not_null())
                    .col(
                        ColumnDef::new(Integrations::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Integrations::SyncFrequency)
                            .text()
                            .not_null()
                            .default("manual"),
                    )
                    .col(
                        ColumnDef::new(Integrations::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Integrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Integrations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Scheduler scans active integrations every tick
        manager
            .create_index(
                Index::create()
                    .name("idx_integrations_active_frequency")
                    .table(Integrations::Table)
                    .col(Integrations::IsActive)
                    .col(Integrations::SyncFrequency)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_integrations_owner")
                    .table(Integrations::Table)
                    .col(Integrations::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_integrations_owner").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_integrations_active_frequency")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Integrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Integrations {
    Table,
    Id,
    OwnerId,
    Source,
    Name,
    Config,
    IsActive,
    SyncFrequency,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}
