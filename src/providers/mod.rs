//! Provider adapters
//!
//! This module provides the provider SDK:
//! - The closed [`ProviderKind`] enumeration of supported providers
//! - The [`ProviderAdapter`] trait every provider implements
//! - [`TokenResponse`] normalization of provider token payloads
//! - The [`AdapterRegistry`] lookup table built once at startup

pub mod adapter;
pub mod kintone;
pub mod mock;
pub mod registry;

pub use adapter::{
    AuthorizeUrlParams, ExchangeTokenParams, ProviderAdapter, RefreshTokenParams, TokenResponse,
};
pub use kintone::KintoneAdapter;
pub use mock::MockAdapter;
pub use registry::AdapterRegistry;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by provider adapters and the registry.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("unknown provider '{slug}'")]
    UnknownProvider { slug: String },
    #[error("invalid provider configuration: {details}")]
    InvalidConfig { details: String },
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("provider does not support token refresh")]
    RefreshUnsupported,
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        ProviderError::Network(error.to_string())
    }
}

/// Closed enumeration of supported providers.
///
/// Unknown slugs are rejected at the boundary with a configuration error;
/// nothing downstream ever handles a free-form provider string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Kintone,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Kintone => "kintone",
            ProviderKind::Mock => "mock",
        }
    }

    /// All supported providers, in stable order.
    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::Kintone, ProviderKind::Mock]
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(slug: &str) -> Result<Self, Self::Err> {
        match slug {
            "kintone" => Ok(ProviderKind::Kintone),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(ProviderError::UnknownProvider {
                slug: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn known_slugs_parse() {
        assert_eq!(
            ProviderKind::from_str("kintone").unwrap(),
            ProviderKind::Kintone
        );
        assert_eq!(ProviderKind::from_str("mock").unwrap(), ProviderKind::Mock);
    }

    #[test]
    fn unknown_slug_rejected_at_boundary() {
        let err = ProviderKind::from_str("salesforce").unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider { slug } if slug == "salesforce"));
    }

    #[test]
    fn slug_roundtrip() {
        for kind in ProviderKind::all() {
            assert_eq!(ProviderKind::from_str(kind.as_str()).unwrap(), *kind);
        }
    }
}
