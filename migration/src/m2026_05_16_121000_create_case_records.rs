//! Migration to create the case_records table.
//!
//! Internal upsert store for synchronized records. The source_key is a
//! deterministic provider-prefixed remote id, so re-running a sync against an
//! unchanged remote data set is idempotent.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CaseRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CaseRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CaseRecords::TenantId).uuid().not_null())
                    .col(ColumnDef::new(CaseRecords::ConnectorId).uuid().not_null())
                    .col(ColumnDef::new(CaseRecords::TargetType).text().not_null())
                    .col(ColumnDef::new(CaseRecords::SourceKey).text().not_null())
                    .col(
                        ColumnDef::new(CaseRecords::Data)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CaseRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CaseRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_case_records_connector_id")
                            .from(CaseRecords::Table, CaseRecords::ConnectorId)
                            .to(Connectors::Table, Connectors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_case_records_tenant_type_source")
                    .table(CaseRecords::Table)
                    .col(CaseRecords::TenantId)
                    .col(CaseRecords::TargetType)
                    .col(CaseRecords::SourceKey)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_case_records_tenant_type_source")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(CaseRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CaseRecords {
    Table,
    Id,
    TenantId,
    ConnectorId,
    TargetType,
    SourceKey,
    Data,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Connectors {
    Table,
    Id,
}
