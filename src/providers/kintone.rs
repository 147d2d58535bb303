//! Kintone provider adapter
//!
//! Implements the OAuth surface of a Kintone tenant: authorize URL on the
//! tenant domain, form-encoded token exchange and refresh against the
//! `/oauth2/token` endpoint.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;
use url::Url;

use super::adapter::{
    AuthorizeUrlParams, ExchangeTokenParams, ProviderAdapter, RefreshTokenParams, TokenResponse,
};
use super::{ProviderError, ProviderKind};

/// Kintone adapter
pub struct KintoneAdapter {
    http: reqwest::Client,
}

impl KintoneAdapter {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Resolve the tenant domain from connector configuration.
    fn domain(config: &JsonValue) -> Result<Url, ProviderError> {
        let domain = config
            .get("domain")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::InvalidConfig {
                details: "missing 'domain'".to_string(),
            })?;

        Url::parse(domain).map_err(|e| ProviderError::InvalidConfig {
            details: format!("invalid 'domain': {}", e),
        })
    }

    /// Authorization endpoint base; overridable for test doubles.
    fn auth_base(config: &JsonValue) -> Result<Url, ProviderError> {
        match config.get("auth_base").and_then(|v| v.as_str()) {
            Some(base) => Url::parse(base).map_err(|e| ProviderError::InvalidConfig {
                details: format!("invalid 'auth_base': {}", e),
            }),
            None => {
                let mut url = Self::domain(config)?;
                url.set_path("/oauth2/authorization");
                Ok(url)
            }
        }
    }

    /// Token endpoint base; overridable for test doubles.
    fn token_endpoint(config: &JsonValue) -> Result<Url, ProviderError> {
        match config.get("token_base").and_then(|v| v.as_str()) {
            Some(base) => Url::parse(base).map_err(|e| ProviderError::InvalidConfig {
                details: format!("invalid 'token_base': {}", e),
            }),
            None => {
                let mut url = Self::domain(config)?;
                url.set_path("/oauth2/token");
                Ok(url)
            }
        }
    }

    async fn post_token_form(
        &self,
        endpoint: Url,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, ProviderError> {
        let response = self
            .http
            .post(endpoint)
            .header("Accept", "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        TokenResponse::from_payload(payload)
    }
}

impl Default for KintoneAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for KintoneAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kintone
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        let domain = Self::domain(config)?;
        if domain.scheme() != "https" {
            return Err(ProviderError::InvalidConfig {
                details: "'domain' must use https".to_string(),
            });
        }
        Ok(())
    }

    fn build_authorize_url(&self, params: AuthorizeUrlParams<'_>) -> Result<Url, ProviderError> {
        let mut url = Self::auth_base(params.config)?;
        url.query_pairs_mut()
            .append_pair("client_id", params.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", params.redirect_uri)
            .append_pair("scope", &params.scopes.join(" "))
            .append_pair("state", params.state)
            .append_pair("code_challenge", params.code_challenge)
            .append_pair("code_challenge_method", "S256");

        debug!(authorize_url = %url, "Built Kintone authorization URL");
        Ok(url)
    }

    async fn exchange_token(
        &self,
        params: ExchangeTokenParams<'_>,
    ) -> Result<TokenResponse, ProviderError> {
        let endpoint = Self::token_endpoint(params.config)?;
        self.post_token_form(
            endpoint,
            &[
                ("grant_type", "authorization_code"),
                ("client_id", params.client_id),
                ("client_secret", params.client_secret),
                ("code", params.code),
                ("redirect_uri", params.redirect_uri),
                ("code_verifier", params.code_verifier),
            ],
        )
        .await
    }

    async fn refresh_token(
        &self,
        params: RefreshTokenParams<'_>,
    ) -> Result<TokenResponse, ProviderError> {
        let endpoint = Self::token_endpoint(params.config)?;
        self.post_token_form(
            endpoint,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", params.client_id),
                ("client_secret", params.client_secret),
                ("refresh_token", params.refresh_token),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> JsonValue {
        json!({"domain": "https://example.cybozu.com"})
    }

    #[test]
    fn validate_config_requires_https_domain() {
        let adapter = KintoneAdapter::new();

        assert!(adapter.validate_config(&config()).is_ok());
        assert!(matches!(
            adapter.validate_config(&json!({"domain": "http://example.cybozu.com"})),
            Err(ProviderError::InvalidConfig { .. })
        ));
        assert!(matches!(
            adapter.validate_config(&json!({})),
            Err(ProviderError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn authorize_url_carries_oauth_and_pkce_params() {
        let adapter = KintoneAdapter::new();
        let config = config();
        let scopes = vec!["k:app_record:read".to_string()];

        let url = adapter
            .build_authorize_url(AuthorizeUrlParams {
                config: &config,
                client_id: "client-1",
                redirect_uri: "https://dashboard.example.com/connect/kintone/callback",
                scopes: &scopes,
                state: "signed-state",
                code_challenge: "challenge-abc",
            })
            .expect("builds URL");

        assert_eq!(url.host_str(), Some("example.cybozu.com"));
        assert_eq!(url.path(), "/oauth2/authorization");

        let query: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(query["client_id"], "client-1");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["scope"], "k:app_record:read");
        assert_eq!(query["state"], "signed-state");
        assert_eq!(query["code_challenge"], "challenge-abc");
        assert_eq!(query["code_challenge_method"], "S256");
    }

    #[test]
    fn auth_base_override_wins() {
        let config = json!({
            "domain": "https://example.cybozu.com",
            "auth_base": "https://sso.example.com/authorize",
        });

        let url = KintoneAdapter::auth_base(&config).expect("parses");
        assert_eq!(url.host_str(), Some("sso.example.com"));
        assert_eq!(url.path(), "/authorize");
    }
}
