//! Migration to create the remote_apps and remote_fields tables.
//!
//! These tables are a read-through cache of the provider's application and
//! field schemas, refreshed by explicit sync actions. They are never treated
//! as authoritative.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RemoteApps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RemoteApps::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RemoteApps::ConnectorId).uuid().not_null())
                    .col(ColumnDef::new(RemoteApps::AppId).text().not_null())
                    .col(ColumnDef::new(RemoteApps::Code).text().not_null())
                    .col(ColumnDef::new(RemoteApps::Name).text().not_null())
                    .col(
                        ColumnDef::new(RemoteApps::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RemoteApps::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_remote_apps_connector_id")
                            .from(RemoteApps::Table, RemoteApps::ConnectorId)
                            .to(Connectors::Table, Connectors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_remote_apps_connector_app")
                    .table(RemoteApps::Table)
                    .col(RemoteApps::ConnectorId)
                    .col(RemoteApps::AppId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RemoteFields::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RemoteFields::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RemoteFields::ConnectorId).uuid().not_null())
                    .col(ColumnDef::new(RemoteFields::AppId).text().not_null())
                    .col(ColumnDef::new(RemoteFields::FieldCode).text().not_null())
                    .col(ColumnDef::new(RemoteFields::Label).text().not_null())
                    .col(ColumnDef::new(RemoteFields::FieldType).text().not_null())
                    .col(
                        ColumnDef::new(RemoteFields::Required)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(RemoteFields::Options).json_binary().null())
                    .col(
                        ColumnDef::new(RemoteFields::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RemoteFields::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_remote_fields_connector_id")
                            .from(RemoteFields::Table, RemoteFields::ConnectorId)
                            .to(Connectors::Table, Connectors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_remote_fields_connector_app_code")
                    .table(RemoteFields::Table)
                    .col(RemoteFields::ConnectorId)
                    .col(RemoteFields::AppId)
                    .col(RemoteFields::FieldCode)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_remote_fields_connector_app_code")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(RemoteFields::Table).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_remote_apps_connector_app").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(RemoteApps::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RemoteApps {
    Table,
    Id,
    ConnectorId,
    AppId,
    Code,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RemoteFields {
    Table,
    Id,
    ConnectorId,
    AppId,
    FieldCode,
    Label,
    FieldType,
    Required,
    Options,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Connectors {
    Table,
    Id,
}
