//! Migration to create the connectors and connector_secrets tables.
//!
//! Connectors are tenant-scoped integration instances against an external
//! provider. Client credentials live in a separate one-to-one table so the
//! ciphertext column is never selected by ordinary connector queries.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Connectors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Connectors::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Connectors::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Connectors::Provider).text().not_null())
                    .col(ColumnDef::new(Connectors::DisplayName).text().not_null())
                    .col(ColumnDef::new(Connectors::Config).json_binary().null())
                    .col(ColumnDef::new(Connectors::Scopes).json_binary().null())
                    .col(
                        ColumnDef::new(Connectors::Status)
                            .text()
                            .not_null()
                            .default("disconnected"),
                    )
                    .col(ColumnDef::new(Connectors::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(Connectors::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Connectors::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_connectors_tenant_id")
                            .from(Connectors::Table, Connectors::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_connectors_tenant_id")
                    .table(Connectors::Table)
                    .col(Connectors::TenantId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ConnectorSecrets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConnectorSecrets::ConnectorId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConnectorSecrets::CredentialsCiphertext)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConnectorSecrets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ConnectorSecrets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_connector_secrets_connector_id")
                            .from(ConnectorSecrets::Table, ConnectorSecrets::ConnectorId)
                            .to(Connectors::Table, Connectors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConnectorSecrets::Table).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_connectors_tenant_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Connectors::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Connectors {
    Table,
    Id,
    TenantId,
    Provider,
    DisplayName,
    Config,
    Scopes,
    Status,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ConnectorSecrets {
    Table,
    ConnectorId,
    CredentialsCiphertext,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
