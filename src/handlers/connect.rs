//! # OAuth Connect Handlers
//!
//! Starts authorization flows and receives provider callbacks.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Json, Redirect},
};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

use crate::auth::{OperatorAuth, TenantExtension};
use crate::error::ApiError;
use crate::oauth::CallbackQuery;
use crate::providers::ProviderKind;
use crate::server::AppState;

/// Request path parameter for provider name
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProviderPath {
    /// Provider identifier (snake_case, e.g. "kintone")
    pub provider: String,
}

/// Query parameters for starting an OAuth flow
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartOAuthQuery {
    /// Connector to authorize
    pub connector_id: uuid::Uuid,
    /// Dashboard path to return to after authorization
    pub return_to: Option<String>,
}

/// OAuth authorization URL response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeUrlResponse {
    /// Complete authorization URL for user redirection
    pub authorize_url: String,
}

/// Start OAuth flow for a provider
///
/// Generates PKCE material and a signed state token, persists the pending
/// flow and returns the provider authorization URL.
#[utoipa::path(
    post,
    path = "/connect/{provider}",
    security(("bearer_auth" = [])),
    params(
        ("provider" = String, Path, description = "Provider identifier"),
        ("connector_id" = uuid::Uuid, Query, description = "Connector to authorize"),
        ("return_to" = Option<String>, Query, description = "Post-auth dashboard path")
    ),
    responses(
        (status = 200, description = "Authorization URL generated", body = AuthorizeUrlResponse),
        (status = 400, description = "Unknown provider or invalid configuration", body = ApiError),
        (status = 401, description = "Missing or invalid authorization token", body = ApiError),
        (status = 404, description = "Connector not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "connect"
)]
pub async fn start_oauth(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path(provider_path): Path<ProviderPath>,
    Query(query): Query<StartOAuthQuery>,
) -> Result<Json<AuthorizeUrlResponse>, ApiError> {
    // Reject unknown providers at the boundary.
    let kind: ProviderKind = provider_path.provider.parse()?;

    let controller = state.flow_controller();
    let start = controller
        .begin_authorization(tenant.0, query.connector_id, kind, query.return_to)
        .await?;

    validate_authorize_url(&state, &start.authorize_url)?;

    tracing::info!(
        tenant_id = %tenant.0,
        connector_id = %query.connector_id,
        provider = %provider_path.provider,
        "OAuth flow initiated"
    );

    Ok(Json(AuthorizeUrlResponse {
        authorize_url: start.authorize_url.to_string(),
    }))
}

/// OAuth callback endpoint
///
/// Receives the provider redirect, verifies the signed state, exchanges the
/// code and redirects back to the dashboard. Errors redirect to the admin
/// error view carrying the error code; no ApiError bodies leave this
/// endpoint.
#[utoipa::path(
    get,
    path = "/connect/{provider}/callback",
    params(
        ("provider" = String, Path, description = "Provider identifier"),
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "Signed state token"),
        ("error" = Option<String>, Query, description = "Provider error code"),
        ("error_description" = Option<String>, Query, description = "Provider error description")
    ),
    responses(
        (status = 303, description = "Redirect to dashboard")
    ),
    tag = "connect"
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider_path): Path<ProviderPath>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let kind: ProviderKind = match provider_path.provider.parse() {
        Ok(kind) => kind,
        Err(_) => return error_redirect(&state, "UNKNOWN_PROVIDER"),
    };

    let controller = state.flow_controller();
    match controller.handle_callback(kind, query).await {
        Ok(outcome) => {
            let path = outcome.return_to.as_deref().unwrap_or("/connectors");
            let target = format!(
                "{}{}?connected=true&tenant_id={}&connector_id={}",
                state.config.public_base_url.trim_end_matches('/'),
                path,
                outcome.tenant_id,
                outcome.connector_id,
            );
            Redirect::to(&target)
        }
        Err(err) => {
            tracing::warn!(
                provider = %provider_path.provider,
                error = %err,
                code = err.code(),
                "OAuth callback failed"
            );
            error_redirect(&state, err.code())
        }
    }
}

fn error_redirect(state: &AppState, code: &str) -> Redirect {
    let target = format!(
        "{}/connectors/error?error={}",
        state.config.public_base_url.trim_end_matches('/'),
        code,
    );
    Redirect::to(&target)
}

/// Validate the generated authorization URL before handing it to a browser.
/// HTTPS is enforced outside the local profile (test doubles run plain HTTP).
fn validate_authorize_url(state: &AppState, url: &Url) -> Result<(), ApiError> {
    if url.scheme() != "https" && !state.config.is_local() {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Adapter bug: authorization URL must use HTTPS",
        ));
    }

    if url.fragment().is_some() {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Adapter bug: authorization URL must not include a fragment",
        ));
    }

    if url.as_str().len() > 2048 {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Adapter bug: authorization URL exceeds 2048 characters",
        ));
    }

    Ok(())
}
