//! Mock provider adapter
//!
//! Deterministic, network-free adapter used by the local development profile
//! (`CASEBRIDGE_USE_MOCK_OAUTH`) and by integration tests. It exercises the
//! exact same flow-controller code paths as a real provider.

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use url::Url;

use super::adapter::{
    AuthorizeUrlParams, ExchangeTokenParams, ProviderAdapter, RefreshTokenParams, TokenResponse,
};
use super::{ProviderError, ProviderKind};

const MOCK_AUTHORIZE_BASE: &str = "https://auth.mock.invalid/oauth2/authorize";

/// Mock adapter
pub struct MockAdapter;

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn validate_config(&self, _config: &JsonValue) -> Result<(), ProviderError> {
        Ok(())
    }

    fn build_authorize_url(&self, params: AuthorizeUrlParams<'_>) -> Result<Url, ProviderError> {
        let mut url = Url::parse(MOCK_AUTHORIZE_BASE)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", params.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", params.redirect_uri)
            .append_pair("scope", &params.scopes.join(" "))
            .append_pair("state", params.state)
            .append_pair("code_challenge", params.code_challenge)
            .append_pair("code_challenge_method", "S256");
        Ok(url)
    }

    async fn exchange_token(
        &self,
        params: ExchangeTokenParams<'_>,
    ) -> Result<TokenResponse, ProviderError> {
        // A code of "invalid" simulates a provider rejection, e.g. a replayed
        // callback whose code was already consumed.
        if params.code == "invalid" {
            return Err(ProviderError::Http {
                status: 400,
                body: json!({"error": "invalid_grant"}).to_string(),
            });
        }

        TokenResponse::from_payload(json!({
            "access_token": format!("mock-access-{}", params.code),
            "refresh_token": format!("mock-refresh-{}", params.code),
            "expires_in": 3600,
            "token_type": "Bearer",
            "scope": "records:read",
        }))
    }

    async fn refresh_token(
        &self,
        params: RefreshTokenParams<'_>,
    ) -> Result<TokenResponse, ProviderError> {
        if params.refresh_token == "revoked" {
            return Err(ProviderError::Http {
                status: 400,
                body: json!({"error": "invalid_grant"}).to_string(),
            });
        }

        TokenResponse::from_payload(json!({
            "access_token": "mock-access-refreshed",
            "refresh_token": params.refresh_token,
            "expires_in": 3600,
            "token_type": "Bearer",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn exchange_produces_deterministic_tokens() {
        let adapter = MockAdapter;
        let config = json!({});

        let token = adapter
            .exchange_token(ExchangeTokenParams {
                config: &config,
                client_id: "c",
                client_secret: "s",
                code: "code-42",
                redirect_uri: "https://localhost/callback",
                code_verifier: "verifier",
            })
            .await
            .expect("exchange succeeds");

        assert_eq!(token.access_token, "mock-access-code-42");
        assert_eq!(token.refresh_token.as_deref(), Some("mock-refresh-code-42"));
        assert_eq!(token.expires_in, Some(3600));
    }

    #[tokio::test]
    async fn consumed_code_is_rejected() {
        let adapter = MockAdapter;
        let config = json!({});

        let result = adapter
            .exchange_token(ExchangeTokenParams {
                config: &config,
                client_id: "c",
                client_secret: "s",
                code: "invalid",
                redirect_uri: "https://localhost/callback",
                code_verifier: "verifier",
            })
            .await;

        assert!(matches!(
            result,
            Err(ProviderError::Http { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn revoked_refresh_token_fails() {
        let adapter = MockAdapter;
        let config = json!({});

        let result = adapter
            .refresh_token(RefreshTokenParams {
                config: &config,
                client_id: "c",
                client_secret: "s",
                refresh_token: "revoked",
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Http { .. })));
    }
}
