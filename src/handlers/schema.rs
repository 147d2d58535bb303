//! # Remote Schema Handlers
//!
//! Explicit refresh actions for the cached remote application and field
//! schemas, plus read access to the cache.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{OperatorAuth, TenantExtension};
use crate::error::{ApiError, not_found};
use crate::remote::RemoteClient;
use crate::repositories::{ConnectorRepository, RemoteSchemaRepository};
use crate::server::AppState;

/// Result of a schema refresh action
#[derive(Debug, Serialize, ToSchema)]
pub struct SchemaSyncResponse {
    /// Number of cached entries after the refresh
    pub count: usize,
}

/// Cached remote application
#[derive(Debug, Serialize, ToSchema)]
pub struct RemoteAppResponse {
    pub app_id: String,
    pub code: String,
    pub name: String,
}

/// Cached remote field
#[derive(Debug, Serialize, ToSchema)]
pub struct RemoteFieldResponse {
    pub field_code: String,
    pub label: String,
    pub field_type: String,
    pub required: bool,
    pub options: Option<serde_json::Value>,
}

/// Query parameter selecting a remote application
#[derive(Debug, Deserialize, ToSchema)]
pub struct AppQuery {
    pub app: String,
}

/// Refresh the cached application list from the provider
#[utoipa::path(
    post,
    path = "/connectors/{id}/apps/sync",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Connector id")),
    responses(
        (status = 200, description = "Application cache refreshed", body = SchemaSyncResponse),
        (status = 404, description = "Connector not found", body = ApiError),
        (status = 502, description = "Remote API error", body = ApiError)
    ),
    tag = "schema"
)]
pub async fn sync_apps(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path(id): Path<Uuid>,
) -> Result<Json<SchemaSyncResponse>, ApiError> {
    let db = state.db_arc();

    let connector = ConnectorRepository::new(db.clone())
        .find_by_id(tenant.0, id)
        .await?
        .ok_or_else(|| not_found("connector"))?;

    let valid = state.token_manager().ensure_valid_token(id).await?;
    let config = connector.config.unwrap_or(serde_json::json!({}));
    let client = RemoteClient::from_config(&config, valid.access_token)
        .map_err(remote_err)?;

    let apps = client.list_apps().await.map_err(remote_err)?;
    let count = RemoteSchemaRepository::new(db).replace_apps(id, &apps).await?;

    tracing::info!(connector_id = %id, apps = count, "Remote application cache refreshed");
    Ok(Json(SchemaSyncResponse { count }))
}

/// Refresh the cached field schema for one application
#[utoipa::path(
    post,
    path = "/connectors/{id}/fields/sync",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Connector id"),
        ("app" = String, Query, description = "Remote application id")
    ),
    responses(
        (status = 200, description = "Field cache refreshed", body = SchemaSyncResponse),
        (status = 404, description = "Connector not found", body = ApiError),
        (status = 502, description = "Remote API error", body = ApiError)
    ),
    tag = "schema"
)]
pub async fn sync_fields(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path(id): Path<Uuid>,
    Query(query): Query<AppQuery>,
) -> Result<Json<SchemaSyncResponse>, ApiError> {
    let db = state.db_arc();

    let connector = ConnectorRepository::new(db.clone())
        .find_by_id(tenant.0, id)
        .await?
        .ok_or_else(|| not_found("connector"))?;

    let valid = state.token_manager().ensure_valid_token(id).await?;
    let config = connector.config.unwrap_or(serde_json::json!({}));
    let client = RemoteClient::from_config(&config, valid.access_token)
        .map_err(remote_err)?;

    let fields = client.list_fields(&query.app).await.map_err(remote_err)?;
    let count = RemoteSchemaRepository::new(db)
        .replace_fields(id, &query.app, &fields)
        .await?;

    tracing::info!(
        connector_id = %id,
        app_id = %query.app,
        fields = count,
        "Remote field cache refreshed"
    );
    Ok(Json(SchemaSyncResponse { count }))
}

/// List cached applications
#[utoipa::path(
    get,
    path = "/connectors/{id}/apps",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Connector id")),
    responses(
        (status = 200, description = "Cached applications", body = [RemoteAppResponse]),
        (status = 404, description = "Connector not found", body = ApiError)
    ),
    tag = "schema"
)]
pub async fn list_apps(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RemoteAppResponse>>, ApiError> {
    let db = state.db_arc();

    ConnectorRepository::new(db.clone())
        .find_by_id(tenant.0, id)
        .await?
        .ok_or_else(|| not_found("connector"))?;

    let apps = RemoteSchemaRepository::new(db).list_apps(id).await?;

    Ok(Json(
        apps.into_iter()
            .map(|app| RemoteAppResponse {
                app_id: app.app_id,
                code: app.code,
                name: app.name,
            })
            .collect(),
    ))
}

/// List cached fields for one application
#[utoipa::path(
    get,
    path = "/connectors/{id}/fields",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Connector id"),
        ("app" = String, Query, description = "Remote application id")
    ),
    responses(
        (status = 200, description = "Cached fields", body = [RemoteFieldResponse]),
        (status = 404, description = "Connector not found", body = ApiError)
    ),
    tag = "schema"
)]
pub async fn list_fields(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path(id): Path<Uuid>,
    Query(query): Query<AppQuery>,
) -> Result<Json<Vec<RemoteFieldResponse>>, ApiError> {
    let db = state.db_arc();

    ConnectorRepository::new(db.clone())
        .find_by_id(tenant.0, id)
        .await?
        .ok_or_else(|| not_found("connector"))?;

    let fields = RemoteSchemaRepository::new(db)
        .list_fields(id, &query.app)
        .await?;

    Ok(Json(
        fields
            .into_iter()
            .map(|field| RemoteFieldResponse {
                field_code: field.field_code,
                label: field.label,
                field_type: field.field_type,
                required: field.required,
                options: field.options,
            })
            .collect(),
    ))
}

/// Remote API failures propagate status and body for diagnostics.
fn remote_err(error: crate::remote::RemoteApiError) -> ApiError {
    use crate::remote::RemoteApiError;
    use axum::http::StatusCode;

    match &error {
        RemoteApiError::Http { status, body } => ApiError::new(
            StatusCode::BAD_GATEWAY,
            "PROVIDER_ERROR",
            &format!("remote API returned {}", status),
        )
        .with_details(serde_json::json!({ "status": status, "body": body })),
        RemoteApiError::InvalidBaseUrl(details) => ApiError::new(
            StatusCode::BAD_REQUEST,
            "CONFIG_INVALID",
            &format!("invalid remote configuration: {}", details),
        ),
        _ => ApiError::new(
            StatusCode::BAD_GATEWAY,
            "PROVIDER_ERROR",
            &error.to_string(),
        ),
    }
}
