//! Signed OAuth state token
//!
//! The state parameter carried through the provider round-trip is an HS256
//! JWT embedding the tenant, provider, connector and post-auth return path,
//! with a short expiry. Verification (signature + expiry + payload shape)
//! happens before any callback side effect.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FlowError;
use crate::config::AppConfig;

/// Claims embedded in the state token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateClaims {
    /// Tenant that initiated the flow
    pub tenant_id: Uuid,
    /// Provider slug the flow was started for
    pub provider: String,
    /// Connector being authorized
    pub connector_id: Uuid,
    /// Post-auth redirect path on the dashboard, if requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Issued-at (unix seconds)
    pub iat: i64,
}

/// Signs and verifies state tokens with a process-wide secret.
#[derive(Clone)]
pub struct StateTokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
}

// Only used when no vault key is configured, which config validation
// restricts to the local profile.
const LOCAL_DEV_SECRET: &[u8] = b"casebridge-local-dev-state-secret";

impl StateTokenSigner {
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_minutes,
        }
    }

    /// Build the signer from configuration, keying off the vault master key.
    pub fn from_config(config: &AppConfig) -> Self {
        match config.vault_key_b64.as_deref() {
            Some(key) => Self::new(key.as_bytes(), config.oauth_state_ttl_minutes),
            None => Self::new(LOCAL_DEV_SECRET, config.oauth_state_ttl_minutes),
        }
    }

    /// Issue a signed state token for one authorization attempt.
    pub fn sign(
        &self,
        tenant_id: Uuid,
        provider: &str,
        connector_id: Uuid,
        return_to: Option<String>,
    ) -> Result<String, FlowError> {
        let now = Utc::now();
        let claims = StateClaims {
            tenant_id,
            provider: provider.to_string(),
            connector_id,
            return_to,
            exp: (now + Duration::minutes(self.ttl_minutes)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| FlowError::StateInvalid(e.to_string()))
    }

    /// Verify signature, expiry and payload shape, returning the claims.
    pub fn verify(&self, token: &str) -> Result<StateClaims, FlowError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.required_spec_claims.insert("exp".to_string());

        decode::<StateClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => FlowError::StateExpired,
                _ => FlowError::StateInvalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> StateTokenSigner {
        StateTokenSigner::new(b"test-secret", 15)
    }

    #[test]
    fn sign_verify_roundtrip() {
        let signer = signer();
        let tenant = Uuid::new_v4();
        let connector = Uuid::new_v4();

        let token = signer
            .sign(tenant, "kintone", connector, Some("/settings".to_string()))
            .expect("signs");
        let claims = signer.verify(&token).expect("verifies");

        assert_eq!(claims.tenant_id, tenant);
        assert_eq!(claims.provider, "kintone");
        assert_eq!(claims.connector_id, connector);
        assert_eq!(claims.return_to.as_deref(), Some("/settings"));
    }

    #[test]
    fn tampered_token_rejected() {
        let signer = signer();
        let token = signer
            .sign(Uuid::new_v4(), "kintone", Uuid::new_v4(), None)
            .expect("signs");

        // Flip a character in the payload segment
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let mut payload: Vec<char> = parts[1].chars().collect();
        payload[0] = if payload[0] == 'A' { 'B' } else { 'A' };
        parts[1] = payload.into_iter().collect();
        let tampered = parts.join(".");

        assert!(matches!(
            signer.verify(&tampered),
            Err(FlowError::StateInvalid(_))
        ));
    }

    #[test]
    fn wrong_key_rejected() {
        let token = signer()
            .sign(Uuid::new_v4(), "kintone", Uuid::new_v4(), None)
            .expect("signs");

        let other = StateTokenSigner::new(b"another-secret", 15);
        assert!(matches!(
            other.verify(&token),
            Err(FlowError::StateInvalid(_))
        ));
    }

    #[test]
    fn expired_token_is_distinct_error() {
        let signer = StateTokenSigner::new(b"test-secret", -1);
        let token = signer
            .sign(Uuid::new_v4(), "kintone", Uuid::new_v4(), None)
            .expect("signs");

        assert!(matches!(signer.verify(&token), Err(FlowError::StateExpired)));
    }

    #[test]
    fn garbage_shapes_rejected() {
        let signer = signer();
        for garbage in ["", "abc", "a.b.c", "not-a-jwt-at-all"] {
            assert!(matches!(
                signer.verify(garbage),
                Err(FlowError::StateInvalid(_))
            ));
        }
    }
}
