//! # Connector Handlers
//!
//! Admin CRUD over connector instances. Client credentials are encrypted at
//! intake and never returned by any endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{OperatorAuth, TenantExtension};
use crate::error::{ApiError, not_found};
use crate::models::connector;
use crate::providers::ProviderKind;
use crate::repositories::{AuditLogRepository, ConnectorRepository, TenantRepository};
use crate::server::AppState;
use crate::vault::ClientCredentials;

/// Request body for creating a connector
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConnectorRequest {
    /// Provider identifier (e.g. "kintone")
    pub provider: String,
    /// Human-facing connector name
    pub display_name: String,
    /// Provider-specific configuration, e.g. `{"domain": "https://x.cybozu.com"}`
    pub config: Option<serde_json::Value>,
    /// OAuth scopes to request; provider defaults when omitted
    pub scopes: Option<Vec<String>>,
    /// OAuth client id issued by the provider
    pub client_id: String,
    /// OAuth client secret issued by the provider
    pub client_secret: String,
}

/// Connector representation returned by the API (no secrets)
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectorResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider: String,
    pub display_name: String,
    pub config: Option<serde_json::Value>,
    pub scopes: Option<serde_json::Value>,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<connector::Model> for ConnectorResponse {
    fn from(model: connector::Model) -> Self {
        Self {
            id: model.id,
            tenant_id: model.tenant_id,
            provider: model.provider,
            display_name: model.display_name,
            config: model.config,
            scopes: model.scopes,
            status: model.status,
            error_message: model.error_message,
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }
}

/// Create a connector
///
/// Validates the provider configuration against the adapter, encrypts the
/// client credentials and stores the connector in the disconnected status.
#[utoipa::path(
    post,
    path = "/connectors",
    security(("bearer_auth" = [])),
    request_body = CreateConnectorRequest,
    responses(
        (status = 201, description = "Connector created", body = ConnectorResponse),
        (status = 400, description = "Unknown provider or invalid configuration", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "connectors"
)]
pub async fn create_connector(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Json(body): Json<CreateConnectorRequest>,
) -> Result<(StatusCode, Json<ConnectorResponse>), ApiError> {
    let kind = ProviderKind::from_str(&body.provider)?;

    let adapter = state.registry.get(kind)?;
    let config = body.config.clone().unwrap_or(serde_json::json!({}));
    adapter.validate_config(&config)?;

    let credentials = ClientCredentials {
        client_id: body.client_id,
        client_secret: body.client_secret,
    };
    let ciphertext = state.codec.encrypt(&credentials.to_value())?;

    let db = state.db_arc();
    TenantRepository::new(db.clone()).ensure(tenant.0).await?;

    let connector = ConnectorRepository::new(db)
        .create_with_secrets(
            tenant.0,
            kind.as_str(),
            &body.display_name,
            Some(config),
            body.scopes.map(|s| serde_json::json!(s)),
            &ciphertext,
        )
        .await?;

    tracing::info!(
        tenant_id = %tenant.0,
        connector_id = %connector.id,
        provider = %kind,
        "Connector created"
    );

    Ok((StatusCode::CREATED, Json(connector.into())))
}

/// List connectors for the tenant
#[utoipa::path(
    get,
    path = "/connectors",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Connectors for the tenant", body = [ConnectorResponse]),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "connectors"
)]
pub async fn list_connectors(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
) -> Result<Json<Vec<ConnectorResponse>>, ApiError> {
    let connectors = ConnectorRepository::new(state.db_arc())
        .find_by_tenant(tenant.0)
        .await?;

    Ok(Json(connectors.into_iter().map(Into::into).collect()))
}

/// Get one connector
#[utoipa::path(
    get,
    path = "/connectors/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Connector id")),
    responses(
        (status = 200, description = "Connector", body = ConnectorResponse),
        (status = 404, description = "Connector not found", body = ApiError)
    ),
    tag = "connectors"
)]
pub async fn get_connector(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path(id): Path<Uuid>,
) -> Result<Json<ConnectorResponse>, ApiError> {
    let connector = ConnectorRepository::new(state.db_arc())
        .find_by_id(tenant.0, id)
        .await?
        .ok_or_else(|| not_found("connector"))?;

    Ok(Json(connector.into()))
}

/// Delete a connector
///
/// Cascades secrets, credentials, schema cache, mappings, sessions and
/// synced records.
#[utoipa::path(
    delete,
    path = "/connectors/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Connector id")),
    responses(
        (status = 204, description = "Connector deleted"),
        (status = 404, description = "Connector not found", body = ApiError)
    ),
    tag = "connectors"
)]
pub async fn delete_connector(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = ConnectorRepository::new(state.db_arc())
        .delete(tenant.0, id)
        .await?;

    if !deleted {
        return Err(not_found("connector"));
    }

    tracing::info!(tenant_id = %tenant.0, connector_id = %id, "Connector deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Audit log entry returned by the API
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub event: String,
    pub detail: Option<serde_json::Value>,
    pub created_at: String,
}

/// List audit log entries for a connector
#[utoipa::path(
    get,
    path = "/connectors/{id}/audit",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Connector id")),
    responses(
        (status = 200, description = "Audit entries, newest first", body = [AuditLogResponse]),
        (status = 404, description = "Connector not found", body = ApiError)
    ),
    tag = "connectors"
)]
pub async fn list_audit_log(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditLogResponse>>, ApiError> {
    let db = state.db_arc();

    ConnectorRepository::new(db.clone())
        .find_by_id(tenant.0, id)
        .await?
        .ok_or_else(|| not_found("connector"))?;

    let entries = AuditLogRepository::new(db)
        .list_for_connector(id, 100)
        .await?;

    Ok(Json(
        entries
            .into_iter()
            .map(|entry| AuditLogResponse {
                event: entry.event,
                detail: entry.detail,
                created_at: entry.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}
