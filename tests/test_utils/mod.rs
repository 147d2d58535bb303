//! Test utilities for database testing.
//!
//! Sets up in-memory SQLite databases with migrations applied and provides
//! fixture helpers for tenants, connectors and stored credentials.

use anyhow::Result;
use casebridge::repositories::oauth_credential::NewCredentials;
use casebridge::repositories::{
    ConnectorRepository, OAuthCredentialRepository, TenantRepository,
};
use casebridge::vault::{ClientCredentials, CredentialCodec};
use chrono::{DateTime, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<Arc<DatabaseConnection>> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(Arc::new(db))
}

/// Creates a tenant row and returns its id.
#[allow(dead_code)]
pub async fn create_tenant(db: &Arc<DatabaseConnection>) -> Result<Uuid> {
    let tenant_id = Uuid::new_v4();
    TenantRepository::new(db.clone()).ensure(tenant_id).await?;
    Ok(tenant_id)
}

/// Creates a connector with encrypted client credentials.
///
/// `config` becomes the provider configuration (e.g. domain / test-double
/// base URLs).
#[allow(dead_code)]
pub async fn create_connector(
    db: &Arc<DatabaseConnection>,
    codec: &dyn CredentialCodec,
    tenant_id: Uuid,
    provider: &str,
    config: serde_json::Value,
) -> Result<Uuid> {
    let credentials = ClientCredentials {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
    };
    let ciphertext = codec.encrypt(&credentials.to_value())?;

    let connector = ConnectorRepository::new(db.clone())
        .create_with_secrets(
            tenant_id,
            provider,
            "Test Connector",
            Some(config),
            None,
            &ciphertext,
        )
        .await?;

    Ok(connector.id)
}

/// Stores an encrypted credentials row for a connector.
#[allow(dead_code)]
pub async fn seed_credentials(
    db: &Arc<DatabaseConnection>,
    codec: &dyn CredentialCodec,
    connector_id: Uuid,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<Uuid> {
    let refresh_ciphertext = match refresh_token {
        Some(token) => Some(codec.encrypt(&json!(token))?),
        None => None,
    };

    let row = OAuthCredentialRepository::new(db.clone())
        .replace(
            connector_id,
            NewCredentials {
                access_token_ciphertext: codec.encrypt(&json!(access_token))?,
                refresh_token_ciphertext: refresh_ciphertext,
                expires_at,
                token_type: "Bearer".to_string(),
                raw_response: None,
            },
        )
        .await?;

    Ok(row.id)
}
