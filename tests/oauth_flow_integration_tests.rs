//! Integration tests for the OAuth flow controller
//!
//! Exercises the authorize -> callback -> exchange -> persist sequence over
//! an in-memory database with the mock provider adapter.

use casebridge::config::AppConfig;
use casebridge::oauth::{CallbackQuery, FlowError, OAuthFlowController, StateTokenSigner};
use casebridge::providers::{AdapterRegistry, ProviderKind};
use casebridge::repositories::{
    AuditLogRepository, ConnectorRepository, OAuthCredentialRepository, OAuthStateRepository,
};
use casebridge::vault::{CredentialCodec, MockCodec};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;

fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig {
        use_mock_oauth: true,
        ..AppConfig::default()
    })
}

fn controller(db: &Arc<DatabaseConnection>, config: Arc<AppConfig>) -> OAuthFlowController {
    let codec: Arc<dyn CredentialCodec> = Arc::new(MockCodec);
    OAuthFlowController::new(
        config.clone(),
        codec,
        AdapterRegistry::from_config(&config),
        StateTokenSigner::from_config(&config),
        ConnectorRepository::new(db.clone()),
        OAuthCredentialRepository::new(db.clone()),
        OAuthStateRepository::new(db.clone()),
        AuditLogRepository::new(db.clone()),
    )
}

async fn setup() -> anyhow::Result<(Arc<DatabaseConnection>, Uuid, Uuid)> {
    let db = test_utils::setup_test_db().await?;
    let tenant_id = test_utils::create_tenant(&db).await?;
    let connector_id =
        test_utils::create_connector(&db, &MockCodec, tenant_id, "mock", json!({})).await?;
    Ok((db, tenant_id, connector_id))
}

#[tokio::test]
async fn begin_authorization_builds_pkce_url_and_persists_state() -> anyhow::Result<()> {
    let (db, tenant_id, connector_id) = setup().await?;
    let config = test_config();
    let controller = controller(&db, config);

    let start = controller
        .begin_authorization(tenant_id, connector_id, ProviderKind::Mock, Some("/settings/connectors".into()))
        .await?;

    let query: std::collections::HashMap<_, _> = start.authorize_url.query_pairs().collect();
    assert_eq!(query["response_type"], "code");
    assert_eq!(query["code_challenge_method"], "S256");
    assert!(!query["code_challenge"].is_empty());
    assert_eq!(query["state"], start.state.as_str());
    assert!(query["redirect_uri"].ends_with("/connect/mock/callback"));

    Ok(())
}

#[tokio::test]
async fn callback_happy_path_persists_credentials_and_connects() -> anyhow::Result<()> {
    let (db, tenant_id, connector_id) = setup().await?;
    let config = test_config();
    let controller = controller(&db, config);

    let start = controller
        .begin_authorization(tenant_id, connector_id, ProviderKind::Mock, Some("/settings".into()))
        .await?;

    let outcome = controller
        .handle_callback(
            ProviderKind::Mock,
            CallbackQuery {
                code: Some("code-77".to_string()),
                state: Some(start.state),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(outcome.tenant_id, tenant_id);
    assert_eq!(outcome.connector_id, connector_id);
    assert_eq!(outcome.return_to.as_deref(), Some("/settings"));

    let stored = OAuthCredentialRepository::new(db.clone())
        .find_by_connector(connector_id)
        .await?
        .expect("credentials persisted");
    let access = MockCodec.decrypt(&stored.access_token_ciphertext)?;
    assert_eq!(access, json!("mock-access-code-77"));
    assert!(stored.refresh_token_ciphertext.is_some());

    // Raw payload is kept for diagnostics with tokens redacted
    let raw = stored.raw_response.expect("raw payload stored");
    assert_eq!(raw["access_token"], "***");

    let connector = ConnectorRepository::new(db.clone())
        .get_by_id(connector_id)
        .await?
        .expect("connector exists");
    assert_eq!(connector.status, "connected");
    assert!(connector.error_message.is_none());

    Ok(())
}

#[tokio::test]
async fn provider_mismatch_rejected_before_any_exchange() -> anyhow::Result<()> {
    let (db, tenant_id, connector_id) = setup().await?;
    let config = test_config();
    let controller = controller(&db, config);

    let start = controller
        .begin_authorization(tenant_id, connector_id, ProviderKind::Mock, None)
        .await?;

    let result = controller
        .handle_callback(
            ProviderKind::Kintone,
            CallbackQuery {
                code: Some("code-1".to_string()),
                state: Some(start.state),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(FlowError::ProviderMismatch { .. })));

    // No exchange happened: no credentials row, connector untouched.
    let stored = OAuthCredentialRepository::new(db.clone())
        .find_by_connector(connector_id)
        .await?;
    assert!(stored.is_none());

    let connector = ConnectorRepository::new(db.clone())
        .get_by_id(connector_id)
        .await?
        .expect("connector exists");
    assert_eq!(connector.status, "disconnected");

    Ok(())
}

#[tokio::test]
async fn replayed_callback_fails_without_corrupting_credentials() -> anyhow::Result<()> {
    let (db, tenant_id, connector_id) = setup().await?;
    let config = test_config();
    let controller = controller(&db, config);

    let start = controller
        .begin_authorization(tenant_id, connector_id, ProviderKind::Mock, None)
        .await?;

    let query = CallbackQuery {
        code: Some("code-1".to_string()),
        state: Some(start.state),
        ..Default::default()
    };

    controller
        .handle_callback(ProviderKind::Mock, query.clone())
        .await?;

    // Replaying the same callback: the verifier was consumed, terminal.
    let replay = controller.handle_callback(ProviderKind::Mock, query).await;
    assert!(matches!(replay, Err(FlowError::MissingVerifier)));

    // First exchange's credentials are intact.
    let stored = OAuthCredentialRepository::new(db.clone())
        .find_by_connector(connector_id)
        .await?
        .expect("credentials still present");
    let access = MockCodec.decrypt(&stored.access_token_ciphertext)?;
    assert_eq!(access, json!("mock-access-code-1"));

    Ok(())
}

#[tokio::test]
async fn tampered_state_rejected_with_state_invalid() -> anyhow::Result<()> {
    let (db, tenant_id, connector_id) = setup().await?;
    let config = test_config();
    let controller = controller(&db, config);

    let start = controller
        .begin_authorization(tenant_id, connector_id, ProviderKind::Mock, None)
        .await?;

    let mut tampered = start.state.clone();
    tampered.push('x');

    let result = controller
        .handle_callback(
            ProviderKind::Mock,
            CallbackQuery {
                code: Some("code-1".to_string()),
                state: Some(tampered),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(FlowError::StateInvalid(_))));
    Ok(())
}

#[tokio::test]
async fn provider_denial_is_terminal_without_side_effects() -> anyhow::Result<()> {
    let (db, _tenant_id, connector_id) = setup().await?;
    let config = test_config();
    let controller = controller(&db, config);

    let result = controller
        .handle_callback(
            ProviderKind::Mock,
            CallbackQuery {
                error: Some("access_denied".to_string()),
                error_description: Some("user cancelled".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(FlowError::ProviderDenied { .. })));

    let connector = ConnectorRepository::new(db.clone())
        .get_by_id(connector_id)
        .await?
        .expect("connector exists");
    assert_eq!(connector.status, "disconnected");

    Ok(())
}

#[tokio::test]
async fn exchange_failure_marks_connector_error_and_audits_fragment() -> anyhow::Result<()> {
    let (db, tenant_id, connector_id) = setup().await?;
    let config = test_config();
    let controller = controller(&db, config);

    let start = controller
        .begin_authorization(tenant_id, connector_id, ProviderKind::Mock, None)
        .await?;

    // The mock adapter rejects the literal code "invalid" like a provider
    // rejecting an already-consumed code.
    let result = controller
        .handle_callback(
            ProviderKind::Mock,
            CallbackQuery {
                code: Some("invalid".to_string()),
                state: Some(start.state),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(FlowError::ExchangeFailed(_))));

    let connector = ConnectorRepository::new(db.clone())
        .get_by_id(connector_id)
        .await?
        .expect("connector exists");
    assert_eq!(connector.status, "error");
    assert!(connector.error_message.is_some());

    let entries = AuditLogRepository::new(db.clone())
        .list_for_connector(connector_id, 10)
        .await?;
    let exchange_failed = entries
        .iter()
        .find(|e| e.event == "token_exchange_failed")
        .expect("audit entry written");
    let detail = exchange_failed.detail.as_ref().expect("detail recorded");
    assert_eq!(detail["code_fragment"], "invalid");

    // No credentials row was written on the failure path.
    let stored = OAuthCredentialRepository::new(db.clone())
        .find_by_connector(connector_id)
        .await?;
    assert!(stored.is_none());

    Ok(())
}
