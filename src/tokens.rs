//! # Token Lifecycle Manager
//!
//! Loads stored OAuth credentials for a connector, detects imminent expiry
//! and transparently refreshes through the provider adapter before handing
//! a valid access token to callers. Refresh persists via the same
//! delete-then-insert discipline as the initial token exchange.
//!
//! A failed refresh is not a transient fault: the connector is transitioned
//! to the error status and callers must route the user back through
//! authorization.

use chrono::{Duration, Utc};
use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::connector::{self, ConnectorStatus};
use crate::providers::{AdapterRegistry, ProviderError, ProviderKind, RefreshTokenParams};
use crate::repositories::audit_log::events;
use crate::repositories::oauth_credential::NewCredentials;
use crate::repositories::{AuditLogRepository, ConnectorRepository, OAuthCredentialRepository};
use crate::vault::{ClientCredentials, CredentialCodec, VaultError};

/// Proactive refresh window before actual token expiry.
pub const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Fallback access token lifetime when the provider does not report one.
const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

/// Errors raised by the token lifecycle manager.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("connector {connector_id} not found")]
    ConnectorNotFound { connector_id: Uuid },
    #[error("no stored credentials for connector {connector_id}")]
    CredentialsNotFound { connector_id: Uuid },
    #[error("token expired and refresh failed for connector {connector_id}: {reason}")]
    RefreshFailed { connector_id: Uuid, reason: String },
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("storage error: {0}")]
    Db(String),
}

impl From<anyhow::Error> for TokenError {
    fn from(error: anyhow::Error) -> Self {
        TokenError::Db(error.to_string())
    }
}

/// A connector together with a currently valid bearer token.
#[derive(Debug, Clone)]
pub struct ValidToken {
    pub connector: connector::Model,
    pub access_token: String,
}

/// Token lifecycle manager.
pub struct TokenLifecycleManager {
    codec: Arc<dyn CredentialCodec>,
    registry: AdapterRegistry,
    connectors: ConnectorRepository,
    credentials: OAuthCredentialRepository,
    audit: AuditLogRepository,
}

impl TokenLifecycleManager {
    pub fn new(
        codec: Arc<dyn CredentialCodec>,
        registry: AdapterRegistry,
        connectors: ConnectorRepository,
        credentials: OAuthCredentialRepository,
        audit: AuditLogRepository,
    ) -> Self {
        Self {
            codec,
            registry,
            connectors,
            credentials,
            audit,
        }
    }

    /// Load the connector's token, refreshing first when wall-clock time is
    /// within the skew window of the stored expiry.
    #[instrument(skip_all, fields(connector_id = %connector_id))]
    pub async fn ensure_valid_token(&self, connector_id: Uuid) -> Result<ValidToken, TokenError> {
        let connector = self
            .connectors
            .get_by_id(connector_id)
            .await?
            .ok_or(TokenError::ConnectorNotFound { connector_id })?;

        let stored = self
            .credentials
            .find_by_connector(connector_id)
            .await?
            .ok_or(TokenError::CredentialsNotFound { connector_id })?;

        let refresh_cutoff = Utc::now() + Duration::seconds(EXPIRY_SKEW_SECONDS);
        if stored.expires_at.with_timezone(&Utc) > refresh_cutoff {
            let access_token = self.decrypt_token(&stored.access_token_ciphertext)?;
            return Ok(ValidToken {
                connector,
                access_token,
            });
        }

        info!(
            connector_id = %connector_id,
            expires_at = %stored.expires_at,
            "Access token within expiry skew window, refreshing"
        );

        self.refresh(connector, stored).await
    }

    /// Refresh the connector's token and persist the replacement row.
    async fn refresh(
        &self,
        connector: connector::Model,
        stored: crate::models::oauth_credential::Model,
    ) -> Result<ValidToken, TokenError> {
        counter!("token_refresh_attempts_total").increment(1);
        let connector_id = connector.id;

        let refresh_ciphertext = match stored.refresh_token_ciphertext.as_deref() {
            Some(ciphertext) => ciphertext.to_string(),
            None => {
                return self
                    .fail_refresh(connector_id, "no refresh token stored".to_string())
                    .await;
            }
        };

        let refresh_token = self.decrypt_token(&refresh_ciphertext)?;
        let client = self.load_client_credentials(connector_id).await?;

        let kind: ProviderKind = connector.provider.parse()?;
        let adapter = self.registry.get(kind)?;
        let config = connector.config.clone().unwrap_or(json!({}));

        let response = match adapter
            .refresh_token(RefreshTokenParams {
                config: &config,
                client_id: &client.client_id,
                client_secret: &client.client_secret,
                refresh_token: &refresh_token,
            })
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return self.fail_refresh(connector_id, err.to_string()).await;
            }
        };

        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);
        let access_ciphertext = self.codec.encrypt(&json!(response.access_token))?;
        let refresh_token_ciphertext = match response.refresh_token.as_deref() {
            // Providers may rotate the refresh token or keep it; persist
            // whichever is current.
            Some(rotated) => Some(self.codec.encrypt(&json!(rotated))?),
            None => Some(refresh_ciphertext),
        };

        let replaced = self
            .credentials
            .replace(
                connector_id,
                NewCredentials {
                    access_token_ciphertext: access_ciphertext,
                    refresh_token_ciphertext,
                    expires_at: Utc::now() + Duration::seconds(expires_in),
                    token_type: response.token_type.clone(),
                    raw_response: Some(response.redacted_raw()),
                },
            )
            .await?;

        self.audit
            .record(
                connector_id,
                events::TOKEN_REFRESHED,
                Some(json!({ "expires_at": replaced.expires_at.to_rfc3339() })),
            )
            .await?;

        counter!("token_refresh_success_total").increment(1);
        info!(connector_id = %connector_id, "Token refreshed and credentials replaced");

        Ok(ValidToken {
            connector,
            access_token: response.access_token,
        })
    }

    /// Record a refresh failure: audit it, flip the connector to error and
    /// surface the distinct refresh-failed error.
    async fn fail_refresh(
        &self,
        connector_id: Uuid,
        reason: String,
    ) -> Result<ValidToken, TokenError> {
        counter!("token_refresh_failure_total").increment(1);
        warn!(
            connector_id = %connector_id,
            reason = %reason,
            "Token refresh failed; connector requires re-authorization"
        );

        self.audit
            .record(
                connector_id,
                events::TOKEN_REFRESH_FAILED,
                Some(json!({ "reason": reason })),
            )
            .await?;

        self.connectors
            .set_status(connector_id, ConnectorStatus::Error, Some(reason.clone()))
            .await?;

        Err(TokenError::RefreshFailed {
            connector_id,
            reason,
        })
    }

    /// Decrypt a stored token ciphertext into the bare token string.
    fn decrypt_token(&self, ciphertext: &str) -> Result<String, TokenError> {
        let value = self.codec.decrypt(ciphertext)?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                VaultError::DecryptionFailed("token payload is not a string".to_string()).into()
            })
    }

    /// Decrypt the connector's client credentials.
    async fn load_client_credentials(
        &self,
        connector_id: Uuid,
    ) -> Result<ClientCredentials, TokenError> {
        let secrets = self
            .connectors
            .get_secrets(connector_id)
            .await?
            .ok_or(TokenError::CredentialsNotFound { connector_id })?;

        let value = self.codec.decrypt(&secrets.credentials_ciphertext)?;
        Ok(ClientCredentials::from_value(&value)?)
    }
}
