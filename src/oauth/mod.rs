//! OAuth authorization flow
//!
//! This module implements one authorization attempt end to end:
//! - PKCE verifier/challenge generation ([`pkce`])
//! - The signed, time-bound state token ([`state_token`])
//! - The flow controller state machine ([`flow`])

pub mod flow;
pub mod pkce;
pub mod state_token;

pub use flow::{AuthorizationStart, CallbackOutcome, CallbackQuery, FlowStage, OAuthFlowController};
pub use pkce::PkcePair;
pub use state_token::{StateClaims, StateTokenSigner};

use thiserror::Error;

use crate::providers::ProviderError;
use crate::vault::VaultError;

/// Errors raised during an OAuth flow attempt.
///
/// Protocol errors (invalid state, provider mismatch, missing verifier) are
/// terminal for the attempt: the user must restart authorization.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("state token invalid: {0}")]
    StateInvalid(String),
    #[error("state token expired")]
    StateExpired,
    #[error("state token was issued for provider '{expected}', callback arrived on '{got}'")]
    ProviderMismatch { expected: String, got: String },
    #[error("code verifier missing; the authorization flow expired or crossed devices")]
    MissingVerifier,
    #[error("provider denied authorization: {error}")]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },
    #[error("token exchange failed: {0}")]
    ExchangeFailed(ProviderError),
    #[error("connector not found")]
    ConnectorNotFound,
    #[error("connector has no stored client credentials")]
    SecretsMissing,
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("internal error: {0}")]
    Internal(String),
}

impl FlowError {
    /// Short machine-readable code carried on error redirects.
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::StateInvalid(_) => "STATE_INVALID",
            FlowError::StateExpired => "STATE_EXPIRED",
            FlowError::ProviderMismatch { .. } => "PROVIDER_MISMATCH",
            FlowError::MissingVerifier => "MISSING_VERIFIER",
            FlowError::ProviderDenied { .. } => "PROVIDER_DENIED",
            FlowError::ExchangeFailed(_) => "TOKEN_EXCHANGE_FAILED",
            FlowError::ConnectorNotFound => "NOT_FOUND",
            FlowError::SecretsMissing => "SECRETS_MISSING",
            FlowError::Vault(_) => "CREDENTIAL_DECRYPTION_FAILED",
            FlowError::Provider(_) => "PROVIDER_ERROR",
            FlowError::Db(_) | FlowError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}
