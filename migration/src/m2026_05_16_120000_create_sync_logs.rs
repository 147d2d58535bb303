//! Migration to create the sync_sessions and sync_item_logs tables.
//!
//! A sync session records one execution of a sync pass. Item logs are
//! per-record outcomes, written for manual runs only to bound log volume on
//! scheduled jobs.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncSessions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncSessions::ConnectorId).uuid().not_null())
                    .col(ColumnDef::new(SyncSessions::SyncType).text().not_null())
                    .col(
                        ColumnDef::new(SyncSessions::Status)
                            .text()
                            .not_null()
                            .default("running"),
                    )
                    .col(
                        ColumnDef::new(SyncSessions::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncSessions::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncSessions::TotalCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncSessions::SuccessCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncSessions::FailedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncSessions::ErrorMessage).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_sessions_connector_id")
                            .from(SyncSessions::Table, SyncSessions::ConnectorId)
                            .to(Connectors::Table, Connectors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_sessions_connector_started")
                    .table(SyncSessions::Table)
                    .col(SyncSessions::ConnectorId)
                    .col(SyncSessions::StartedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SyncItemLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncItemLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncItemLogs::SessionId).uuid().not_null())
                    .col(ColumnDef::new(SyncItemLogs::TargetType).text().not_null())
                    .col(ColumnDef::new(SyncItemLogs::RemoteId).text().not_null())
                    .col(ColumnDef::new(SyncItemLogs::Status).text().not_null())
                    .col(ColumnDef::new(SyncItemLogs::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(SyncItemLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_item_logs_session_id")
                            .from(SyncItemLogs::Table, SyncItemLogs::SessionId)
                            .to(SyncSessions::Table, SyncSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncItemLogs::Table).to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_sync_sessions_connector_started")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SyncSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncSessions {
    Table,
    Id,
    ConnectorId,
    SyncType,
    Status,
    StartedAt,
    FinishedAt,
    TotalCount,
    SuccessCount,
    FailedCount,
    ErrorMessage,
}

#[derive(DeriveIden)]
enum SyncItemLogs {
    Table,
    Id,
    SessionId,
    TargetType,
    RemoteId,
    Status,
    ErrorMessage,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Connectors {
    Table,
    Id,
}
