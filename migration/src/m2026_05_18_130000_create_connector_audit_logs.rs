//! Migration to create the connector_audit_logs table.
//!
//! Persists connector status transitions and token lifecycle events so the
//! dashboard can reflect a stale or broken connection after the fact.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConnectorAuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConnectorAuditLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConnectorAuditLogs::ConnectorId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ConnectorAuditLogs::Event).text().not_null())
                    .col(
                        ColumnDef::new(ConnectorAuditLogs::Detail)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ConnectorAuditLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_connector_audit_logs_connector_id")
                            .from(
                                ConnectorAuditLogs::Table,
                                ConnectorAuditLogs::ConnectorId,
                            )
                            .to(Connectors::Table, Connectors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_connector_audit_logs_connector_created")
                    .table(ConnectorAuditLogs::Table)
                    .col(ConnectorAuditLogs::ConnectorId)
                    .col(ConnectorAuditLogs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_connector_audit_logs_connector_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ConnectorAuditLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ConnectorAuditLogs {
    Table,
    Id,
    ConnectorId,
    Event,
    Detail,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Connectors {
    Table,
    Id,
}
