//! Provider adapter trait definition
//!
//! Defines the uniform contract every provider implementation follows:
//! build an authorize URL, exchange an authorization code, refresh a token,
//! validate connector configuration.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use url::Url;

use super::{ProviderError, ProviderKind};

/// Parameters for building an authorization URL.
#[derive(Debug, Clone)]
pub struct AuthorizeUrlParams<'a> {
    /// Connector configuration (e.g. the remote domain)
    pub config: &'a JsonValue,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scopes: &'a [String],
    /// Signed state token
    pub state: &'a str,
    /// PKCE S256 code challenge
    pub code_challenge: &'a str,
}

/// Parameters for exchanging an authorization code.
#[derive(Debug, Clone)]
pub struct ExchangeTokenParams<'a> {
    pub config: &'a JsonValue,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code: &'a str,
    pub redirect_uri: &'a str,
    /// PKCE code verifier held since authorization start
    pub code_verifier: &'a str,
}

/// Parameters for refreshing an access token.
#[derive(Debug, Clone)]
pub struct RefreshTokenParams<'a> {
    pub config: &'a JsonValue,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub refresh_token: &'a str,
}

/// Normalized provider token payload.
///
/// The raw payload is retained for diagnostics only and is never used for
/// logic; every decision reads the normalized fields.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds, when the provider reports one
    pub expires_in: Option<i64>,
    pub token_type: String,
    pub scope: Option<String>,
    pub raw: JsonValue,
}

impl TokenResponse {
    /// Normalize a provider token payload.
    pub fn from_payload(raw: JsonValue) -> Result<Self, ProviderError> {
        let access_token = raw
            .get("access_token")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ProviderError::Malformed("token payload missing access_token".to_string())
            })?
            .to_string();

        let refresh_token = raw
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        let expires_in = raw.get("expires_in").and_then(|v| {
            // Some providers report expires_in as a string
            v.as_i64().or_else(|| v.as_str()?.parse().ok())
        });

        let token_type = raw
            .get("token_type")
            .and_then(|v| v.as_str())
            .unwrap_or("Bearer")
            .to_string();

        let scope = raw
            .get("scope")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(Self {
            access_token,
            refresh_token,
            expires_in,
            token_type,
            scope,
            raw,
        })
    }

    /// The raw payload with token-bearing fields redacted, safe to persist
    /// for diagnostics.
    pub fn redacted_raw(&self) -> JsonValue {
        let mut raw = self.raw.clone();
        if let Some(obj) = raw.as_object_mut() {
            for key in ["access_token", "refresh_token", "id_token"] {
                if obj.contains_key(key) {
                    obj.insert(key.to_string(), JsonValue::String("***".to_string()));
                }
            }
        }
        raw
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter implements.
    fn kind(&self) -> ProviderKind;

    /// Validate connector configuration at creation time. Fails fast; never
    /// retried.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;

    /// Build the provider authorization URL for the user to visit.
    fn build_authorize_url(&self, params: AuthorizeUrlParams<'_>) -> Result<Url, ProviderError>;

    /// Exchange an authorization code for tokens.
    async fn exchange_token(
        &self,
        params: ExchangeTokenParams<'_>,
    ) -> Result<TokenResponse, ProviderError>;

    /// Whether this provider issues refresh tokens.
    fn supports_refresh(&self) -> bool {
        true
    }

    /// Refresh an access token. Default rejects for providers without
    /// refresh support.
    async fn refresh_token(
        &self,
        _params: RefreshTokenParams<'_>,
    ) -> Result<TokenResponse, ProviderError> {
        Err(ProviderError::RefreshUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_response_normalizes_full_payload() {
        let raw = json!({
            "access_token": "at-123",
            "refresh_token": "rt-456",
            "expires_in": 3600,
            "token_type": "Bearer",
            "scope": "k:app_record:read",
        });

        let token = TokenResponse::from_payload(raw).expect("normalizes");
        assert_eq!(token.access_token, "at-123");
        assert_eq!(token.refresh_token.as_deref(), Some("rt-456"));
        assert_eq!(token.expires_in, Some(3600));
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.scope.as_deref(), Some("k:app_record:read"));
    }

    #[test]
    fn token_response_handles_string_expiry_and_missing_fields() {
        let raw = json!({
            "access_token": "at-123",
            "expires_in": "7200",
        });

        let token = TokenResponse::from_payload(raw).expect("normalizes");
        assert_eq!(token.expires_in, Some(7200));
        assert!(token.refresh_token.is_none());
        assert_eq!(token.token_type, "Bearer");
    }

    #[test]
    fn missing_access_token_is_malformed() {
        let raw = json!({"token_type": "Bearer"});
        assert!(matches!(
            TokenResponse::from_payload(raw),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn redacted_raw_masks_token_fields() {
        let raw = json!({
            "access_token": "at-123",
            "refresh_token": "rt-456",
            "expires_in": 3600,
        });

        let token = TokenResponse::from_payload(raw).expect("normalizes");
        let redacted = token.redacted_raw();
        assert_eq!(redacted["access_token"], "***");
        assert_eq!(redacted["refresh_token"], "***");
        assert_eq!(redacted["expires_in"], 3600);
    }
}
