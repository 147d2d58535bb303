//! Integration tests for the token lifecycle manager
//!
//! Verifies the expiry-skew refresh behavior against a wiremock provider
//! token endpoint: exactly one refresh inside the window, none outside, and
//! the delete-then-insert credentials replacement.

use casebridge::config::AppConfig;
use casebridge::models::oauth_credential;
use casebridge::providers::AdapterRegistry;
use casebridge::repositories::{
    AuditLogRepository, ConnectorRepository, OAuthCredentialRepository,
};
use casebridge::tokens::{TokenError, TokenLifecycleManager};
use casebridge::vault::{CredentialCodec, MockCodec};
use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "test_utils/mod.rs"]
mod test_utils;

fn manager(db: &Arc<DatabaseConnection>) -> TokenLifecycleManager {
    let config = AppConfig::default();
    TokenLifecycleManager::new(
        Arc::new(MockCodec),
        AdapterRegistry::from_config(&config),
        ConnectorRepository::new(db.clone()),
        OAuthCredentialRepository::new(db.clone()),
        AuditLogRepository::new(db.clone()),
    )
}

async fn kintone_connector(
    db: &Arc<DatabaseConnection>,
    token_base: &str,
) -> anyhow::Result<Uuid> {
    let tenant_id = test_utils::create_tenant(db).await?;
    test_utils::create_connector(
        db,
        &MockCodec,
        tenant_id,
        "kintone",
        json!({
            "domain": "https://example.cybozu.com",
            "token_base": token_base,
        }),
    )
    .await
}

async fn credentials_row_count(
    db: &Arc<DatabaseConnection>,
    connector_id: Uuid,
) -> anyhow::Result<u64> {
    Ok(oauth_credential::Entity::find()
        .filter(oauth_credential::Column::ConnectorId.eq(connector_id))
        .count(db.as_ref())
        .await?)
}

#[tokio::test]
async fn token_outside_skew_window_triggers_zero_refresh_calls() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let db = test_utils::setup_test_db().await?;
    let connector_id =
        kintone_connector(&db, &format!("{}/oauth2/token", server.uri())).await?;

    let original_row = test_utils::seed_credentials(
        &db,
        &MockCodec,
        connector_id,
        "current-access-token",
        Some("refresh-token"),
        Utc::now() + Duration::hours(2),
    )
    .await?;

    let valid = manager(&db).ensure_valid_token(connector_id).await?;
    assert_eq!(valid.access_token, "current-access-token");

    // Same row, untouched.
    let stored = OAuthCredentialRepository::new(db.clone())
        .find_by_connector(connector_id)
        .await?
        .expect("row still present");
    assert_eq!(stored.id, original_row);
    assert_eq!(credentials_row_count(&db, connector_id).await?, 1);

    Ok(())
}

#[tokio::test]
async fn token_inside_skew_window_refreshes_exactly_once_and_replaces_row() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=stored-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "refreshed-access",
            "refresh_token": "rotated-refresh",
            "expires_in": 3600,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = test_utils::setup_test_db().await?;
    let connector_id =
        kintone_connector(&db, &format!("{}/oauth2/token", server.uri())).await?;

    let original_row = test_utils::seed_credentials(
        &db,
        &MockCodec,
        connector_id,
        "stale-access",
        Some("stored-refresh"),
        Utc::now() + Duration::seconds(30),
    )
    .await?;

    let valid = manager(&db).ensure_valid_token(connector_id).await?;
    assert_eq!(valid.access_token, "refreshed-access");

    // Old row removed, exactly one new row persisted.
    let stored = OAuthCredentialRepository::new(db.clone())
        .find_by_connector(connector_id)
        .await?
        .expect("replacement row present");
    assert_ne!(stored.id, original_row);
    assert_eq!(credentials_row_count(&db, connector_id).await?, 1);

    let rotated = MockCodec.decrypt(
        stored
            .refresh_token_ciphertext
            .as_deref()
            .expect("refresh token kept"),
    )?;
    assert_eq!(rotated, json!("rotated-refresh"));

    Ok(())
}

#[tokio::test]
async fn refresh_failure_marks_connector_error_and_is_distinct() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let db = test_utils::setup_test_db().await?;
    let connector_id =
        kintone_connector(&db, &format!("{}/oauth2/token", server.uri())).await?;

    test_utils::seed_credentials(
        &db,
        &MockCodec,
        connector_id,
        "stale-access",
        Some("revoked-refresh"),
        Utc::now() + Duration::seconds(10),
    )
    .await?;

    let result = manager(&db).ensure_valid_token(connector_id).await;
    assert!(matches!(result, Err(TokenError::RefreshFailed { .. })));

    let connector = ConnectorRepository::new(db.clone())
        .get_by_id(connector_id)
        .await?
        .expect("connector exists");
    assert_eq!(connector.status, "error");

    let entries = AuditLogRepository::new(db.clone())
        .list_for_connector(connector_id, 10)
        .await?;
    assert!(entries.iter().any(|e| e.event == "token_refresh_failed"));

    Ok(())
}

#[tokio::test]
async fn missing_refresh_token_requires_reauthorization() -> anyhow::Result<()> {
    let db = test_utils::setup_test_db().await?;
    let connector_id = kintone_connector(&db, "https://unused.invalid/token").await?;

    test_utils::seed_credentials(
        &db,
        &MockCodec,
        connector_id,
        "stale-access",
        None,
        Utc::now() - Duration::seconds(5),
    )
    .await?;

    let result = manager(&db).ensure_valid_token(connector_id).await;
    assert!(matches!(result, Err(TokenError::RefreshFailed { .. })));

    Ok(())
}

#[tokio::test]
async fn missing_credentials_row_is_not_found_not_decryption_failure() -> anyhow::Result<()> {
    let db = test_utils::setup_test_db().await?;
    let connector_id = kintone_connector(&db, "https://unused.invalid/token").await?;

    let result = manager(&db).ensure_valid_token(connector_id).await;
    assert!(matches!(
        result,
        Err(TokenError::CredentialsNotFound { .. })
    ));

    Ok(())
}
