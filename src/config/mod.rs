//! Configuration loading for the Casebridge connectors service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `CASEBRIDGE_`, producing a typed [`AppConfig`].

use std::{env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration derived from `CASEBRIDGE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Runtime profile: `local`, `dev` or `prod`
    pub profile: String,
    /// Bind address for the HTTP API, e.g. `0.0.0.0:8080`
    pub api_bind_addr: String,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Log output format: `json` or `pretty`
    pub log_format: String,
    /// SeaORM connection string (Postgres in deployment, SQLite in tests)
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_ms: u64,
    /// Bearer tokens accepted from dashboard operators
    pub operator_tokens: Vec<String>,
    /// Public base URL used to construct OAuth callback redirect URIs
    pub public_base_url: String,
    /// 32-byte vault master key, base64-encoded. Required outside `local`.
    pub vault_key_b64: Option<String>,
    /// Select the mock credential codec instead of AES-GCM (local only)
    pub use_mock_vault: bool,
    /// Route OAuth token exchange to the mock provider surface (local only)
    pub use_mock_oauth: bool,
    /// Static shared secret authenticating scheduled sync triggers
    pub scheduled_sync_secret: Option<String>,
    /// Lifetime of a pending OAuth authorization attempt
    pub oauth_state_ttl_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: "local".to_string(),
            api_bind_addr: "127.0.0.1:8080".to_string(),
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 10,
            db_acquire_timeout_ms: 5_000,
            operator_tokens: Vec::new(),
            public_base_url: "http://localhost:8080".to_string(),
            vault_key_b64: None,
            use_mock_vault: true,
            use_mock_oauth: false,
            scheduled_sync_secret: None,
            oauth_state_ttl_minutes: 15,
        }
    }
}

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("missing required configuration: {key}")]
    MissingRequired { key: String },
    #[error("invalid bind address '{addr}': {message}")]
    InvalidBindAddr { addr: String, message: String },
}

impl AppConfig {
    /// Resolve the configured bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.api_bind_addr
            .parse()
            .map_err(|e| ConfigError::InvalidBindAddr {
                addr: self.api_bind_addr.clone(),
                message: format!("{}", e),
            })
    }

    /// True when running under the local development profile.
    pub fn is_local(&self) -> bool {
        self.profile == "local"
    }

    /// Validate cross-field constraints that plain parsing cannot catch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.profile.as_str(), "local" | "dev" | "prod") {
            return Err(ConfigError::InvalidValue {
                key: "CASEBRIDGE_PROFILE".to_string(),
                message: format!("unknown profile '{}'", self.profile),
            });
        }

        if !self.is_local() {
            if self.use_mock_vault {
                return Err(ConfigError::InvalidValue {
                    key: "CASEBRIDGE_USE_MOCK_VAULT".to_string(),
                    message: "mock credential codec is only allowed in the local profile"
                        .to_string(),
                });
            }
            if self.vault_key_b64.is_none() {
                return Err(ConfigError::MissingRequired {
                    key: "CASEBRIDGE_VAULT_KEY".to_string(),
                });
            }
            if self.scheduled_sync_secret.is_none() {
                return Err(ConfigError::MissingRequired {
                    key: "CASEBRIDGE_SCHEDULED_SYNC_SECRET".to_string(),
                });
            }
        }

        if self.oauth_state_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "CASEBRIDGE_OAUTH_STATE_TTL_MINUTES".to_string(),
                message: "must be positive".to_string(),
            });
        }

        self.bind_addr().map(|_| ())
    }

    /// Serialize the configuration with secret-bearing fields redacted, for
    /// startup logging.
    pub fn redacted_json(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            for key in ["operator_tokens", "vault_key_b64", "scheduled_sync_secret"] {
                if obj.get(key).is_some_and(|v| !v.is_null()) {
                    obj.insert(key.to_string(), serde_json::Value::String("***".into()));
                }
            }
        }
        serde_json::to_string(&value)
    }
}

/// Loads configuration from layered `.env` files and process environment.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Load configuration. Precedence: process env > `.env.{profile}` > `.env`.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        // dotenvy never overrides variables already present, so loading the
        // profile file before the base file preserves the precedence order.
        let profile = env::var("CASEBRIDGE_PROFILE").unwrap_or_else(|_| "local".to_string());
        let _ = dotenvy::from_path(self.base_dir.join(format!(".env.{}", profile)));
        let _ = dotenvy::from_path(self.base_dir.join(".env"));

        let defaults = AppConfig::default();

        let config = AppConfig {
            profile,
            api_bind_addr: string_var("CASEBRIDGE_API_BIND_ADDR", defaults.api_bind_addr),
            log_level: string_var("CASEBRIDGE_LOG_LEVEL", defaults.log_level),
            log_format: string_var("CASEBRIDGE_LOG_FORMAT", defaults.log_format),
            database_url: string_var("CASEBRIDGE_DATABASE_URL", defaults.database_url),
            db_max_connections: parsed_var(
                "CASEBRIDGE_DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            )?,
            db_acquire_timeout_ms: parsed_var(
                "CASEBRIDGE_DB_ACQUIRE_TIMEOUT_MS",
                defaults.db_acquire_timeout_ms,
            )?,
            operator_tokens: list_var("CASEBRIDGE_OPERATOR_TOKENS"),
            public_base_url: string_var("CASEBRIDGE_PUBLIC_BASE_URL", defaults.public_base_url),
            vault_key_b64: optional_var("CASEBRIDGE_VAULT_KEY"),
            use_mock_vault: bool_var("CASEBRIDGE_USE_MOCK_VAULT", defaults.use_mock_vault)?,
            use_mock_oauth: bool_var("CASEBRIDGE_USE_MOCK_OAUTH", defaults.use_mock_oauth)?,
            scheduled_sync_secret: optional_var("CASEBRIDGE_SCHEDULED_SYNC_SECRET"),
            oauth_state_ttl_minutes: parsed_var(
                "CASEBRIDGE_OAUTH_STATE_TTL_MINUTES",
                defaults.oauth_state_ttl_minutes,
            )?,
        };

        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn string_var(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn list_var(key: &str) -> Vec<String> {
    env::var(key)
        .map(|raw| {
            raw.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn bool_var(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected boolean, got '{}'", other),
            }),
        },
        Err(_) => Ok(default),
    }
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{}", e),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_local() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_local());
    }

    #[test]
    fn non_local_profile_requires_vault_key_and_sync_secret() {
        let config = AppConfig {
            profile: "prod".to_string(),
            use_mock_vault: false,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired { key }) if key == "CASEBRIDGE_VAULT_KEY"
        ));
    }

    #[test]
    fn mock_vault_rejected_outside_local() {
        let config = AppConfig {
            profile: "prod".to_string(),
            use_mock_vault: true,
            vault_key_b64: Some("AAAA".to_string()),
            scheduled_sync_secret: Some("secret".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "CASEBRIDGE_USE_MOCK_VAULT"
        ));
    }

    #[test]
    fn redacted_json_masks_secrets() {
        let config = AppConfig {
            operator_tokens: vec!["op-token".to_string()],
            vault_key_b64: Some("a-key".to_string()),
            scheduled_sync_secret: Some("cron-secret".to_string()),
            ..AppConfig::default()
        };
        let json = config.redacted_json().expect("serializes");
        assert!(!json.contains("op-token"));
        assert!(!json.contains("a-key"));
        assert!(!json.contains("cron-secret"));
        assert!(json.contains("***"));
    }

    #[test]
    fn invalid_bind_addr_rejected() {
        let config = AppConfig {
            api_bind_addr: "not-an-addr".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBindAddr { .. })
        ));
    }
}
