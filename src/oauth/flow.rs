//! OAuth flow controller
//!
//! Drives one authorization attempt through an explicit state machine:
//!
//! ```text
//! START -> AUTHORIZE_REDIRECTED -> CALLBACK_RECEIVED -> STATE_VERIFIED
//!       -> TOKEN_EXCHANGED -> CREDENTIALS_PERSISTED -> CONNECTOR_CONNECTED
//! ```
//!
//! `ERROR` is reachable from every step. State verification happens before
//! any side effect, and the credentials row is only replaced after a
//! successful exchange, so a replayed callback with a consumed code cannot
//! corrupt existing valid credentials.

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::pkce::PkcePair;
use super::state_token::StateTokenSigner;
use super::FlowError;
use crate::config::AppConfig;
use crate::models::connector::{self, ConnectorStatus};
use crate::providers::{
    AdapterRegistry, AuthorizeUrlParams, ExchangeTokenParams, ProviderKind, TokenResponse,
};
use crate::repositories::audit_log::events;
use crate::repositories::oauth_credential::NewCredentials;
use crate::repositories::{
    AuditLogRepository, ConnectorRepository, OAuthCredentialRepository, OAuthStateRepository,
};
use crate::vault::{ClientCredentials, CredentialCodec};

/// Fallback access token lifetime when the provider does not report one.
const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

/// Length of the authorization-code fragment kept in audit logs. Enough for
/// forensic correlation without persisting the secret-bearing code.
const AUDIT_CODE_FRAGMENT_LEN: usize = 8;

/// Named states of one authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Start,
    AuthorizeRedirected,
    CallbackReceived,
    StateVerified,
    TokenExchanged,
    CredentialsPersisted,
    ConnectorConnected,
    Error,
}

impl FlowStage {
    /// Transition table: the happy path is strictly linear and `Error` is
    /// reachable from every non-terminal state.
    pub fn can_transition_to(&self, next: FlowStage) -> bool {
        use FlowStage::*;

        if next == Error {
            return *self != ConnectorConnected && *self != Error;
        }

        matches!(
            (self, next),
            (Start, AuthorizeRedirected)
                | (AuthorizeRedirected, CallbackReceived)
                | (Start, CallbackReceived)
                | (CallbackReceived, StateVerified)
                | (StateVerified, TokenExchanged)
                | (TokenExchanged, CredentialsPersisted)
                | (CredentialsPersisted, ConnectorConnected)
        )
    }
}

impl std::fmt::Display for FlowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FlowStage::Start => "START",
            FlowStage::AuthorizeRedirected => "AUTHORIZE_REDIRECTED",
            FlowStage::CallbackReceived => "CALLBACK_RECEIVED",
            FlowStage::StateVerified => "STATE_VERIFIED",
            FlowStage::TokenExchanged => "TOKEN_EXCHANGED",
            FlowStage::CredentialsPersisted => "CREDENTIALS_PERSISTED",
            FlowStage::ConnectorConnected => "CONNECTOR_CONNECTED",
            FlowStage::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Query parameters the provider sends to the callback endpoint.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Result of starting an authorization: the URL to send the user to.
#[derive(Debug, Clone)]
pub struct AuthorizationStart {
    pub authorize_url: Url,
    pub state: String,
}

/// Result of a successfully completed callback.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub tenant_id: Uuid,
    pub connector_id: Uuid,
    pub return_to: Option<String>,
}

/// Orchestrates the authorize -> callback -> exchange -> persist sequence.
pub struct OAuthFlowController {
    config: Arc<AppConfig>,
    codec: Arc<dyn CredentialCodec>,
    registry: AdapterRegistry,
    signer: StateTokenSigner,
    connectors: ConnectorRepository,
    credentials: OAuthCredentialRepository,
    states: OAuthStateRepository,
    audit: AuditLogRepository,
}

impl OAuthFlowController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<AppConfig>,
        codec: Arc<dyn CredentialCodec>,
        registry: AdapterRegistry,
        signer: StateTokenSigner,
        connectors: ConnectorRepository,
        credentials: OAuthCredentialRepository,
        states: OAuthStateRepository,
        audit: AuditLogRepository,
    ) -> Self {
        Self {
            config,
            codec,
            registry,
            signer,
            connectors,
            credentials,
            states,
            audit,
        }
    }

    /// The redirect URI registered with providers for a given kind.
    pub fn callback_redirect_uri(&self, kind: ProviderKind) -> String {
        format!(
            "{}/connect/{}/callback",
            self.config.public_base_url.trim_end_matches('/'),
            kind
        )
    }

    /// Begin an authorization attempt: generate PKCE material, issue the
    /// signed state token, persist the single-use verifier and build the
    /// provider authorize URL.
    ///
    /// `route_provider` is the provider named in the request path; it must
    /// match the connector's configured provider.
    pub async fn begin_authorization(
        &self,
        tenant_id: Uuid,
        connector_id: Uuid,
        route_provider: ProviderKind,
        return_to: Option<String>,
    ) -> Result<AuthorizationStart, FlowError> {
        let mut stage = FlowStage::Start;

        let connector = self
            .connectors
            .find_by_id(tenant_id, connector_id)
            .await
            .map_err(db_err)?
            .ok_or(FlowError::ConnectorNotFound)?;

        let kind: ProviderKind = connector.provider.parse()?;
        if kind != route_provider {
            return Err(FlowError::ProviderMismatch {
                expected: connector.provider.clone(),
                got: route_provider.as_str().to_string(),
            });
        }
        let adapter = self.registry.get(kind)?;

        let provider_config = connector.config.clone().unwrap_or(json!({}));
        adapter.validate_config(&provider_config)?;

        let client = self.load_client_credentials(connector_id).await?;

        let pkce = PkcePair::generate();
        let state = self
            .signer
            .sign(tenant_id, kind.as_str(), connector_id, return_to)?;

        self.states
            .create(
                tenant_id,
                connector_id,
                kind.as_str(),
                &state,
                &pkce.verifier,
                self.config.oauth_state_ttl_minutes,
            )
            .await
            .map_err(db_err)?;

        let redirect_uri = self.callback_redirect_uri(kind);
        let scopes = requested_scopes(&connector, kind);

        let authorize_url = adapter.build_authorize_url(AuthorizeUrlParams {
            config: &provider_config,
            client_id: &client.client_id,
            redirect_uri: &redirect_uri,
            scopes: &scopes,
            state: &state,
            code_challenge: &pkce.challenge,
        })?;

        stage = advance(stage, FlowStage::AuthorizeRedirected);
        info!(
            tenant_id = %tenant_id,
            connector_id = %connector_id,
            provider = %kind,
            stage = %stage,
            "Authorization flow started"
        );

        Ok(AuthorizationStart {
            authorize_url,
            state,
        })
    }

    /// Complete a callback: verify the state token, consume the held
    /// verifier, exchange the code and persist credentials.
    pub async fn handle_callback(
        &self,
        route_provider: ProviderKind,
        query: CallbackQuery,
    ) -> Result<CallbackOutcome, FlowError> {
        let mut stage = FlowStage::CallbackReceived;

        // Provider-reported denial; terminal, no side effects.
        if let Some(error) = query.error {
            stage = advance(stage, FlowStage::Error);
            debug!(stage = %stage, error = %error, "Provider denied authorization");
            return Err(FlowError::ProviderDenied {
                error,
                description: query.error_description,
            });
        }

        let state = query
            .state
            .as_deref()
            .ok_or_else(|| FlowError::StateInvalid("missing state parameter".to_string()))?;

        // Signature + expiry + payload shape, before any side effect.
        let claims = self.signer.verify(state)?;

        let state_provider: ProviderKind = claims.provider.parse()?;
        if state_provider != route_provider {
            return Err(FlowError::ProviderMismatch {
                expected: claims.provider.clone(),
                got: route_provider.as_str().to_string(),
            });
        }

        stage = advance(stage, FlowStage::StateVerified);

        // Consume the single-use verifier. Absent means the flow expired,
        // was replayed, or crossed devices; terminal either way.
        let held = self
            .states
            .find_and_consume(state)
            .await
            .map_err(db_err)?
            .ok_or(FlowError::MissingVerifier)?;

        let code = query
            .code
            .as_deref()
            .ok_or_else(|| FlowError::StateInvalid("missing code parameter".to_string()))?;

        let connector = self
            .connectors
            .find_by_id(claims.tenant_id, claims.connector_id)
            .await
            .map_err(db_err)?
            .ok_or(FlowError::ConnectorNotFound)?;

        let adapter = self.registry.get(route_provider)?;
        let provider_config = connector.config.clone().unwrap_or(json!({}));
        let client = self.load_client_credentials(connector.id).await?;
        let redirect_uri = self.callback_redirect_uri(route_provider);

        let response = match adapter
            .exchange_token(ExchangeTokenParams {
                config: &provider_config,
                client_id: &client.client_id,
                client_secret: &client.client_secret,
                code,
                redirect_uri: &redirect_uri,
                code_verifier: &held.code_verifier,
            })
            .await
        {
            Ok(response) => response,
            Err(err) => {
                stage = advance(stage, FlowStage::Error);
                return self
                    .fail_exchange(connector.id, code, err, stage)
                    .await;
            }
        };

        stage = advance(stage, FlowStage::TokenExchanged);

        self.persist_credentials(&connector, &response).await?;
        stage = advance(stage, FlowStage::CredentialsPersisted);

        self.connectors
            .set_status(connector.id, ConnectorStatus::Connected, None)
            .await
            .map_err(db_err)?;
        self.audit
            .record(
                connector.id,
                events::STATUS_CHANGED,
                Some(json!({ "to": ConnectorStatus::Connected.as_str() })),
            )
            .await
            .map_err(db_err)?;

        stage = advance(stage, FlowStage::ConnectorConnected);
        info!(
            tenant_id = %claims.tenant_id,
            connector_id = %claims.connector_id,
            provider = %route_provider,
            stage = %stage,
            "Authorization flow completed"
        );

        Ok(CallbackOutcome {
            tenant_id: claims.tenant_id,
            connector_id: claims.connector_id,
            return_to: claims.return_to,
        })
    }

    /// Encrypt both tokens independently and replace the credentials row.
    /// Delete-then-insert happens only after a successful exchange.
    async fn persist_credentials(
        &self,
        connector: &connector::Model,
        response: &TokenResponse,
    ) -> Result<(), FlowError> {
        let access_ciphertext = self.codec.encrypt(&json!(response.access_token))?;
        let refresh_ciphertext = match response.refresh_token.as_deref() {
            Some(token) => Some(self.codec.encrypt(&json!(token))?),
            None => None,
        };

        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);

        self.credentials
            .replace(
                connector.id,
                NewCredentials {
                    access_token_ciphertext: access_ciphertext,
                    refresh_token_ciphertext: refresh_ciphertext,
                    expires_at: Utc::now() + Duration::seconds(expires_in),
                    token_type: response.token_type.clone(),
                    raw_response: Some(response.redacted_raw()),
                },
            )
            .await
            .map_err(db_err)?;

        if let Some(scope) = response.scope.as_deref() {
            let granted: Vec<&str> = scope.split_whitespace().collect();
            self.connectors
                .set_granted_scopes(connector.id, Some(json!(granted)))
                .await
                .map_err(db_err)?;
        }

        Ok(())
    }

    /// Exchange failure: audit with a truncated code fragment, flip the
    /// connector to error and surface the provider message. Existing valid
    /// credentials are left untouched.
    async fn fail_exchange(
        &self,
        connector_id: Uuid,
        code: &str,
        err: crate::providers::ProviderError,
        stage: FlowStage,
    ) -> Result<CallbackOutcome, FlowError> {
        let message = err.to_string();
        warn!(
            connector_id = %connector_id,
            stage = %stage,
            error = %message,
            "Token exchange failed"
        );

        self.audit
            .record(
                connector_id,
                events::TOKEN_EXCHANGE_FAILED,
                Some(json!({
                    "code_fragment": truncate_code(code),
                    "error": message,
                })),
            )
            .await
            .map_err(db_err)?;

        self.connectors
            .set_status(connector_id, ConnectorStatus::Error, Some(message))
            .await
            .map_err(db_err)?;

        Err(FlowError::ExchangeFailed(err))
    }

    async fn load_client_credentials(
        &self,
        connector_id: Uuid,
    ) -> Result<ClientCredentials, FlowError> {
        let secrets = self
            .connectors
            .get_secrets(connector_id)
            .await
            .map_err(db_err)?
            .ok_or(FlowError::SecretsMissing)?;

        let value = self.codec.decrypt(&secrets.credentials_ciphertext)?;
        Ok(ClientCredentials::from_value(&value)?)
    }
}

/// Record a stage transition, asserting it is legal per the transition table.
fn advance(current: FlowStage, next: FlowStage) -> FlowStage {
    debug_assert!(
        current.can_transition_to(next),
        "illegal flow transition {} -> {}",
        current,
        next
    );
    debug!(from = %current, to = %next, "OAuth flow transition");
    next
}

/// Scopes requested at authorization time: the connector's configured scopes
/// or the provider defaults.
fn requested_scopes(connector: &connector::Model, kind: ProviderKind) -> Vec<String> {
    if let Some(scopes) = connector
        .scopes
        .as_ref()
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect::<Vec<_>>()
        })
        && !scopes.is_empty()
    {
        return scopes;
    }

    match kind {
        ProviderKind::Kintone => vec!["k:app_record:read".to_string()],
        ProviderKind::Mock => vec!["records:read".to_string()],
    }
}

/// First characters of an authorization code, for audit correlation.
fn truncate_code(code: &str) -> String {
    code.chars().take(AUDIT_CODE_FRAGMENT_LEN).collect()
}

fn db_err(error: anyhow::Error) -> FlowError {
    match error.downcast::<sea_orm::DbErr>() {
        Ok(db) => FlowError::Db(db),
        Err(other) => FlowError::Internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        use FlowStage::*;

        let path = [
            Start,
            AuthorizeRedirected,
            CallbackReceived,
            StateVerified,
            TokenExchanged,
            CredentialsPersisted,
            ConnectorConnected,
        ];

        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} must be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn error_reachable_from_every_step_except_terminal() {
        use FlowStage::*;

        for stage in [
            Start,
            AuthorizeRedirected,
            CallbackReceived,
            StateVerified,
            TokenExchanged,
            CredentialsPersisted,
        ] {
            assert!(stage.can_transition_to(Error), "{} -> ERROR", stage);
        }

        assert!(!ConnectorConnected.can_transition_to(Error));
        assert!(!Error.can_transition_to(Error));
    }

    #[test]
    fn skipping_stages_is_illegal() {
        use FlowStage::*;

        assert!(!Start.can_transition_to(TokenExchanged));
        assert!(!CallbackReceived.can_transition_to(TokenExchanged));
        assert!(!StateVerified.can_transition_to(ConnectorConnected));
        assert!(!ConnectorConnected.can_transition_to(Start));
    }

    #[test]
    fn code_fragment_is_truncated() {
        assert_eq!(truncate_code("abcdefghijklmnop"), "abcdefgh");
        assert_eq!(truncate_code("short"), "short");
    }
}
