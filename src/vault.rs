//! Credential vault using AES-256-GCM
//!
//! Encrypts and decrypts OAuth client secrets and tokens stored in the
//! database. Ciphertexts are opaque strings carrying a versioned prefix, so
//! storage columns stay plain text and the encoding can be sniffed before
//! attempting real decryption. A mock codec exists for local development;
//! callers always go through the [`CredentialCodec`] trait and never branch
//! on the encoding themselves.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::AppConfig;

/// Prefix marking a real AES-256-GCM ciphertext.
pub const ENC_PREFIX: &str = "enc:v1:";
/// Prefix marking a mock (plaintext) payload, local development only.
pub const MOCK_PREFIX: &str = "mock:";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Vault error types
#[derive(Debug, Clone, Error)]
pub enum VaultError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid vault key: {0}")]
    InvalidKey(String),
}

/// Secure wrapper for the vault master key with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey(Vec<u8>);

impl VaultKey {
    /// Create a new vault key from raw bytes
    pub fn new(bytes: Vec<u8>) -> Result<Self, VaultError> {
        if bytes.len() != 32 {
            return Err(VaultError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(VaultKey(bytes))
    }

    /// Decode a key from its base64 configuration form
    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| VaultError::InvalidKey(format!("invalid base64: {}", e)))?;
        Self::new(bytes)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Strategy interface for credential encryption.
///
/// Selected once at startup by configuration; calling code never sniffs
/// encoding formats itself.
pub trait CredentialCodec: Send + Sync {
    /// Encrypt a plaintext JSON object into an opaque string.
    fn encrypt(&self, plaintext: &serde_json::Value) -> Result<String, VaultError>;

    /// Decrypt an opaque string back into the plaintext JSON object.
    ///
    /// A failure here is always [`VaultError::DecryptionFailed`], distinct
    /// from a missing row.
    fn decrypt(&self, opaque: &str) -> Result<serde_json::Value, VaultError>;
}

/// Real codec: AES-256-GCM, random nonce, `enc:v1:<base64(nonce || ct+tag)>`.
///
/// Decryption also accepts `mock:` payloads so a database seeded under the
/// mock codec stays readable after switching to real encryption.
pub struct AesGcmCodec {
    key: VaultKey,
}

impl AesGcmCodec {
    pub fn new(key: VaultKey) -> Self {
        Self { key }
    }
}

impl CredentialCodec for AesGcmCodec {
    fn encrypt(&self, plaintext: &serde_json::Value) -> Result<String, VaultError> {
        let serialized = serde_json::to_vec(plaintext)
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

        let cipher_key = Key::<Aes256Gcm>::from_slice(self.key.as_bytes());
        let cipher = Aes256Gcm::new(cipher_key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, serialized.as_slice())
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", ENC_PREFIX, BASE64.encode(payload)))
    }

    fn decrypt(&self, opaque: &str) -> Result<serde_json::Value, VaultError> {
        if let Some(mock_payload) = opaque.strip_prefix(MOCK_PREFIX) {
            return serde_json::from_str(mock_payload)
                .map_err(|e| VaultError::DecryptionFailed(format!("invalid mock payload: {}", e)));
        }

        let encoded = opaque.strip_prefix(ENC_PREFIX).ok_or_else(|| {
            VaultError::DecryptionFailed("unrecognized credential encoding".to_string())
        })?;

        let payload = BASE64
            .decode(encoded)
            .map_err(|e| VaultError::DecryptionFailed(format!("invalid base64: {}", e)))?;

        if payload.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::DecryptionFailed(
                "ciphertext too short".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher_key = Key::<Aes256Gcm>::from_slice(self.key.as_bytes());
        let cipher = Aes256Gcm::new(cipher_key);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::DecryptionFailed(format!("invalid plaintext: {}", e)))
    }
}

/// Mock codec: `mock:<json>`, local development only.
pub struct MockCodec;

impl CredentialCodec for MockCodec {
    fn encrypt(&self, plaintext: &serde_json::Value) -> Result<String, VaultError> {
        let serialized = serde_json::to_string(plaintext)
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;
        Ok(format!("{}{}", MOCK_PREFIX, serialized))
    }

    fn decrypt(&self, opaque: &str) -> Result<serde_json::Value, VaultError> {
        let payload = opaque.strip_prefix(MOCK_PREFIX).ok_or_else(|| {
            VaultError::DecryptionFailed(
                "payload was not produced by the mock codec".to_string(),
            )
        })?;

        serde_json::from_str(payload)
            .map_err(|e| VaultError::DecryptionFailed(format!("invalid mock payload: {}", e)))
    }
}

/// Select the credential codec once at startup.
pub fn codec_from_config(config: &AppConfig) -> Result<Arc<dyn CredentialCodec>, VaultError> {
    if config.use_mock_vault {
        return Ok(Arc::new(MockCodec));
    }

    let encoded = config
        .vault_key_b64
        .as_deref()
        .ok_or_else(|| VaultError::InvalidKey("vault key not configured".to_string()))?;

    Ok(Arc::new(AesGcmCodec::new(VaultKey::from_base64(encoded)?)))
}

/// OAuth client credentials stored encrypted per connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
        })
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, VaultError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            VaultError::DecryptionFailed(format!("credential payload has wrong shape: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec() -> AesGcmCodec {
        AesGcmCodec::new(VaultKey::new(vec![7u8; 32]).expect("valid test key"))
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let codec = test_codec();
        let plaintext = serde_json::json!({"client_id": "abc", "client_secret": "s3cr3t"});

        let opaque = codec.encrypt(&plaintext).expect("encryption succeeds");
        assert!(opaque.starts_with(ENC_PREFIX));

        let decrypted = codec.decrypt(&opaque).expect("decryption succeeds");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn corrupted_ciphertext_reports_decryption_failure() {
        let codec = test_codec();
        let plaintext = serde_json::json!({"token": "value"});

        let opaque = codec.encrypt(&plaintext).expect("encryption succeeds");
        // Flip a character inside the base64 body
        let mut corrupted: Vec<char> = opaque.chars().collect();
        let idx = ENC_PREFIX.len() + 4;
        corrupted[idx] = if corrupted[idx] == 'A' { 'B' } else { 'A' };
        let corrupted: String = corrupted.into_iter().collect();

        let result = codec.decrypt(&corrupted);
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn garbage_input_is_decryption_failure_not_parse_error() {
        let codec = test_codec();
        for garbage in ["", "enc:v1:", "enc:v1:!!!", "plaintext-token", "enc:v2:AAAA"] {
            let result = codec.decrypt(garbage);
            assert!(
                matches!(result, Err(VaultError::DecryptionFailed(_))),
                "input {:?} must map to DecryptionFailed",
                garbage
            );
        }
    }

    #[test]
    fn nonce_uniqueness() {
        let codec = test_codec();
        let plaintext = serde_json::json!("token");

        let first = codec.encrypt(&plaintext).expect("encryption succeeds");
        let second = codec.encrypt(&plaintext).expect("encryption succeeds");

        assert_ne!(first, second);
        assert_eq!(codec.decrypt(&first).expect("decrypts"), plaintext);
        assert_eq!(codec.decrypt(&second).expect("decrypts"), plaintext);
    }

    #[test]
    fn real_codec_reads_mock_payloads() {
        let mock = MockCodec;
        let plaintext = serde_json::json!({"client_id": "dev", "client_secret": "dev"});

        let opaque = mock.encrypt(&plaintext).expect("mock encode succeeds");
        assert!(opaque.starts_with(MOCK_PREFIX));

        let real = test_codec();
        let decrypted = real.decrypt(&opaque).expect("mock payload readable");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn mock_codec_roundtrip() {
        let mock = MockCodec;
        let plaintext = serde_json::json!({"access_token": "tok"});

        let opaque = mock.encrypt(&plaintext).expect("mock encode succeeds");
        let decrypted = mock.decrypt(&opaque).expect("mock decode succeeds");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn mock_codec_rejects_real_ciphertext() {
        let real = test_codec();
        let opaque = real
            .encrypt(&serde_json::json!("tok"))
            .expect("encryption succeeds");

        let result = MockCodec.decrypt(&opaque);
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert!(VaultKey::new(vec![0u8; 16]).is_err());
        assert!(VaultKey::new(vec![0u8; 64]).is_err());
        assert!(VaultKey::new(vec![0u8; 32]).is_ok());
    }

    #[test]
    fn client_credentials_shape_mismatch_is_distinct_error() {
        let bad = serde_json::json!({"user": "x"});
        assert!(matches!(
            ClientCredentials::from_value(&bad),
            Err(VaultError::DecryptionFailed(_))
        ));
    }
}
