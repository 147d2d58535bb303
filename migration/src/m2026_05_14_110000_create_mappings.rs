//! Migration to create the app_mappings, field_mappings and value_mappings
//! tables.
//!
//! An app mapping binds one remote application to one internal target entity
//! type. Field mappings bind remote field codes to internal fields, value
//! mappings are the ordered substitution rules scanned first-match-wins.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AppMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AppMappings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AppMappings::ConnectorId).uuid().not_null())
                    .col(ColumnDef::new(AppMappings::RemoteAppId).text().not_null())
                    .col(ColumnDef::new(AppMappings::TargetType).text().not_null())
                    .col(
                        ColumnDef::new(AppMappings::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AppMappings::SkipMissingUpdateTarget)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AppMappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AppMappings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_mappings_connector_id")
                            .from(AppMappings::Table, AppMappings::ConnectorId)
                            .to(Connectors::Table, Connectors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_app_mappings_connector_app")
                    .table(AppMappings::Table)
                    .col(AppMappings::ConnectorId)
                    .col(AppMappings::RemoteAppId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FieldMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FieldMappings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FieldMappings::AppMappingId).uuid().not_null())
                    .col(ColumnDef::new(FieldMappings::FieldCode).text().not_null())
                    .col(ColumnDef::new(FieldMappings::FieldType).text().not_null())
                    .col(ColumnDef::new(FieldMappings::TargetField).text().not_null())
                    .col(
                        ColumnDef::new(FieldMappings::IsUpdateKey)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(FieldMappings::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FieldMappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_field_mappings_app_mapping_id")
                            .from(FieldMappings::Table, FieldMappings::AppMappingId)
                            .to(AppMappings::Table, AppMappings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ValueMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ValueMappings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ValueMappings::AppMappingId).uuid().not_null())
                    .col(ColumnDef::new(ValueMappings::TargetField).text().not_null())
                    .col(ColumnDef::new(ValueMappings::SourceValue).text().not_null())
                    .col(ColumnDef::new(ValueMappings::TargetValue).text().not_null())
                    .col(
                        ColumnDef::new(ValueMappings::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ValueMappings::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ValueMappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_value_mappings_app_mapping_id")
                            .from(ValueMappings::Table, ValueMappings::AppMappingId)
                            .to(AppMappings::Table, AppMappings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_value_mappings_mapping_field_order")
                    .table(ValueMappings::Table)
                    .col(ValueMappings::AppMappingId)
                    .col(ValueMappings::TargetField)
                    .col(ValueMappings::SortOrder)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_value_mappings_mapping_field_order")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ValueMappings::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(FieldMappings::Table).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_app_mappings_connector_app").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(AppMappings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AppMappings {
    Table,
    Id,
    ConnectorId,
    RemoteAppId,
    TargetType,
    IsActive,
    SkipMissingUpdateTarget,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum FieldMappings {
    Table,
    Id,
    AppMappingId,
    FieldCode,
    FieldType,
    TargetField,
    IsUpdateKey,
    SortOrder,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ValueMappings {
    Table,
    Id,
    AppMappingId,
    TargetField,
    SourceValue,
    TargetValue,
    IsActive,
    SortOrder,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Connectors {
    Table,
    Id,
}
