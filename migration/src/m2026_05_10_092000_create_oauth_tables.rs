//! Migration to create the oauth_credentials and oauth_states tables.
//!
//! oauth_credentials holds the single active token row per connector; the
//! row is replaced wholesale on refresh (delete then insert), never updated
//! in place. oauth_states holds the single-use PKCE verifier keyed by the
//! signed state token issued at authorization time.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OauthCredentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OauthCredentials::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OauthCredentials::ConnectorId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthCredentials::AccessTokenCiphertext)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthCredentials::RefreshTokenCiphertext)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OauthCredentials::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthCredentials::TokenType)
                            .text()
                            .not_null()
                            .default("Bearer"),
                    )
                    .col(
                        ColumnDef::new(OauthCredentials::RawResponse)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OauthCredentials::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth_credentials_connector_id")
                            .from(OauthCredentials::Table, OauthCredentials::ConnectorId)
                            .to(Connectors::Table, Connectors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One active credentials row per connector
        manager
            .create_index(
                Index::create()
                    .name("idx_oauth_credentials_connector_id")
                    .table(OauthCredentials::Table)
                    .col(OauthCredentials::ConnectorId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OauthStates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OauthStates::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OauthStates::TenantId).uuid().not_null())
                    .col(ColumnDef::new(OauthStates::ConnectorId).uuid().not_null())
                    .col(ColumnDef::new(OauthStates::Provider).text().not_null())
                    .col(ColumnDef::new(OauthStates::State).text().not_null())
                    .col(ColumnDef::new(OauthStates::CodeVerifier).text().not_null())
                    .col(
                        ColumnDef::new(OauthStates::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthStates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth_states_connector_id")
                            .from(OauthStates::Table, OauthStates::ConnectorId)
                            .to(Connectors::Table, Connectors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_oauth_states_state")
                    .table(OauthStates::Table)
                    .col(OauthStates::State)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_oauth_states_state").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(OauthStates::Table).to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_oauth_credentials_connector_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(OauthCredentials::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OauthCredentials {
    Table,
    Id,
    ConnectorId,
    AccessTokenCiphertext,
    RefreshTokenCiphertext,
    ExpiresAt,
    TokenType,
    RawResponse,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OauthStates {
    Table,
    Id,
    TenantId,
    ConnectorId,
    Provider,
    State,
    CodeVerifier,
    ExpiresAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Connectors {
    Table,
    Id,
}
