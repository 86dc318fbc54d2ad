//! Creates the `feedback` table holding canonical feedback records from every
//! source.
//!
//! `integration_id` is a weak reference: feedback survives the removal of the
//! integration that produced it, so no foreign key is declared.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Feedback::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Feedback::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Feedback::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Feedback::ExternalId).text().null())
                    .col(ColumnDef::new(Feedback::Source).text().not_null())
                    .col(ColumnDef::new(Feedback::IntegrationId).uuid().null())
                    .col(ColumnDef::new(Feedback::Title).text().not_null())
                    .col(ColumnDef::new(Feedback::Description).text().null())
                    .col(ColumnDef::new(Feedback::Priority).text().null())
                    .col(ColumnDef::new(Feedback::Status).text().null().default("new"))
                    .col(ColumnDef::new(Feedback::Tags).json_binary().not_null())
                    .col(ColumnDef::new(Feedback::Metadata).json_binary().not_null())
                    .col(ColumnDef::new(Feedback::Analysis).json_binary().null())
                    .col(ColumnDef::new(Feedback::CustomerName).text().null())
                    .col(ColumnDef::new(Feedback::IntervieweeName).text().null())
                    .col(
                        ColumnDef::new(Feedback::ConversationAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Feedback::ExternalCreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Feedback::ExternalUpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Feedback::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Feedback::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key and bulk upsert conflict target. Rows without an
        // external id (manual entries) never collide because NULLs are distinct.
        manager
            .create_index(
                Index::create()
                    .name("uq_feedback_integration_external")
                    .table(Feedback::Table)
                    .col(Feedback::IntegrationId)
                    .col(Feedback::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_feedback_source_owner_external")
                    .table(Feedback::Table)
                    .col(Feedback::Source)
                    .col(Feedback::OwnerId)
                    .col(Feedback::ExternalId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_feedback_owner_created")
                    .table(Feedback::Table)
                    .col(Feedback::OwnerId)
                    .col(Feedback::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_feedback_owner_created",
            "idx_feedback_source_owner_external",
            "uq_feedback_integration_external",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }
        manager
            .drop_table(Table::drop().table(Feedback::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Feedback {
    Table,
    Id,
    OwnerId,
    ExternalId,
    Source,
    IntegrationId,
    Title,
    Description,
    Priority,
    Status,
    Tags,
    Metadata,
    Analysis,
    CustomerName,
    IntervieweeName,
    ConversationAt,
    ExternalCreatedAt,
    ExternalUpdatedAt,
    CreatedAt,
    UpdatedAt,
}
