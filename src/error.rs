//! # Error Handling
//!
//! This module provides unified error handling for the Casebridge connectors
//! service, implementing a consistent problem+json response format with trace
//! ID propagation.
//!
//! The error taxonomy follows the connector subsystem design: configuration
//! errors fail fast, protocol errors are terminal for the current OAuth flow
//! attempt, credential and token errors additionally persist to the connector
//! status, transport errors propagate remote status/body, and per-record
//! errors are swallowed into sync counts by design.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Extract current trace ID from the active tracing span (falls back to a generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Standard error types with predefined status codes
#[derive(Debug, Error)]
pub enum ErrorType {
    #[error("Bad Request")]
    BadRequest,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not Found")]
    NotFound,
    #[error("Conflict")]
    Conflict,
    #[error("Internal Server Error")]
    InternalServerError,
    #[error("Bad Gateway")]
    BadGateway,
}

impl ErrorType {
    /// Get the appropriate HTTP status code for this error type
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorType::Forbidden => StatusCode::FORBIDDEN,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::Conflict => StatusCode::CONFLICT,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::BadGateway => StatusCode::BAD_GATEWAY,
        }
    }

    /// Get the error code string for this error type (SCREAMING_SNAKE_CASE)
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorType::BadRequest => "VALIDATION_FAILED",
            ErrorType::Unauthorized => "UNAUTHORIZED",
            ErrorType::Forbidden => "FORBIDDEN",
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::Conflict => "CONFLICT",
            ErrorType::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorType::BadGateway => "PROVIDER_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

// Convenience constructors used across handlers and middleware

/// 401 with an optional message override
pub fn unauthorized(message: Option<&str>) -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        "UNAUTHORIZED",
        message.unwrap_or("Unauthorized"),
    )
}

/// 400 with structured field details
pub fn validation_error(message: &str, details: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(details)
}

/// 404 for a missing resource
pub fn not_found(resource: &str) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        &format!("{} not found", resource),
    )
}

// Error mappers for common sources

impl From<ErrorType> for ApiError {
    fn from(error_type: ErrorType) -> Self {
        Self::new(
            error_type.status_code(),
            error_type.error_code(),
            &error_type.to_string(),
        )
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        tracing::error!(?error, "Database error");

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "A database error occurred",
        )
    }
}

impl From<crate::vault::VaultError> for ApiError {
    fn from(error: crate::vault::VaultError) -> Self {
        use crate::vault::VaultError;

        match error {
            VaultError::DecryptionFailed(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "CREDENTIAL_DECRYPTION_FAILED",
                "Stored credential could not be decrypted",
            ),
            other => {
                tracing::error!(error = %other, "Credential vault error");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Credential vault operation failed",
                )
            }
        }
    }
}

impl From<crate::providers::ProviderError> for ApiError {
    fn from(error: crate::providers::ProviderError) -> Self {
        use crate::providers::ProviderError;

        match &error {
            ProviderError::UnknownProvider { slug } => Self::new(
                StatusCode::BAD_REQUEST,
                "UNKNOWN_PROVIDER",
                &format!("provider '{}' is not supported", slug),
            ),
            ProviderError::InvalidConfig { details } => Self::new(
                StatusCode::BAD_REQUEST,
                "CONFIG_INVALID",
                &format!("provider configuration invalid: {}", details),
            ),
            ProviderError::Http { status, body } => Self::new(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                &format!("provider returned {}", status),
            )
            .with_details(serde_json::json!({ "status": status, "body": body })),
            ProviderError::Network(details) => Self::new(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                &format!("provider unreachable: {}", details),
            ),
            ProviderError::RefreshUnsupported => Self::new(
                StatusCode::BAD_REQUEST,
                "CONFIG_INVALID",
                "provider does not support token refresh",
            ),
            ProviderError::Malformed(details) => Self::new(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                &format!("provider response malformed: {}", details),
            ),
        }
    }
}

impl From<crate::oauth::FlowError> for ApiError {
    fn from(error: crate::oauth::FlowError) -> Self {
        use crate::oauth::FlowError;

        let status = match &error {
            FlowError::ConnectorNotFound => StatusCode::NOT_FOUND,
            FlowError::StateInvalid(_)
            | FlowError::StateExpired
            | FlowError::ProviderMismatch { .. }
            | FlowError::MissingVerifier
            | FlowError::ProviderDenied { .. } => StatusCode::BAD_REQUEST,
            FlowError::ExchangeFailed(_) | FlowError::Provider(_) => StatusCode::BAD_GATEWAY,
            FlowError::SecretsMissing => StatusCode::CONFLICT,
            FlowError::Vault(_) | FlowError::Db(_) | FlowError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        Self::new(status, error.code(), &error.to_string())
    }
}

impl From<crate::tokens::TokenError> for ApiError {
    fn from(error: crate::tokens::TokenError) -> Self {
        use crate::tokens::TokenError;

        match &error {
            TokenError::ConnectorNotFound { connector_id } => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("connector {} not found", connector_id),
            ),
            TokenError::CredentialsNotFound { connector_id } => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("no stored credentials for connector {}", connector_id),
            ),
            TokenError::RefreshFailed { .. } => Self::new(
                StatusCode::CONFLICT,
                "TOKEN_REFRESH_FAILED",
                "token expired and refresh failed; connector requires re-authorization",
            ),
            TokenError::Vault(inner) => inner.clone().into(),
            TokenError::Provider(_) | TokenError::Db(_) => {
                tracing::error!(error = %error, "Token lifecycle error");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Token lifecycle operation failed",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_type_maps_to_expected_status_and_code() {
        assert_eq!(ErrorType::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorType::BadRequest.error_code(), "VALIDATION_FAILED");
        assert_eq!(ErrorType::BadGateway.error_code(), "PROVIDER_ERROR");
    }

    #[test]
    fn decryption_failure_maps_to_distinct_code() {
        let api: ApiError =
            crate::vault::VaultError::DecryptionFailed("aead error".to_string()).into();
        assert_eq!(api.code.as_ref(), "CREDENTIAL_DECRYPTION_FAILED");
        assert_ne!(api.code.as_ref(), "NOT_FOUND");
    }

    #[test]
    fn unknown_provider_maps_to_config_error() {
        let api: ApiError = crate::providers::ProviderError::UnknownProvider {
            slug: "salesforce".to_string(),
        }
        .into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code.as_ref(), "UNKNOWN_PROVIDER");
    }
}
