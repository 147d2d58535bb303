//! # Mapping Handlers
//!
//! Management of app mappings (drafts until activated), field mappings with
//! type inference from the schema cache, and ordered value mapping rules.

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
use crate::error::{ApiError, not_found, validation_error};
use crate::mapping::{self, TargetType};
use crate::models::app_mapping;
use crate::repositories::mapping::{NewFieldMapping, NewValueRule};
use crate::repositories::{ConnectorRepository, MappingRepository, RemoteSchemaRepository};
use crate::server::AppState;

/// Request body for creating an app mapping draft
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAppMappingRequest {
    /// Remote application id
    pub remote_app_id: String,
    /// Internal target entity type: people|visas|meetings|support_records
    pub target_type: String,
    /// Skip records whose update key matches no existing internal record
    #[serde(default)]
    pub skip_missing_update_target: bool,
}

/// One field mapping entry in a replacement request
#[derive(Debug, Deserialize, ToSchema)]
pub struct FieldMappingEntry {
    pub field_code: String,
    pub target_field: String,
    #[serde(default)]
    pub is_update_key: bool,
}

/// Request body replacing the field mappings of an app mapping
#[derive(Debug, Deserialize, ToSchema)]
pub struct PutFieldMappingsRequest {
    pub fields: Vec<FieldMappingEntry>,
}

/// One value rule in a replacement request; order is significant
#[derive(Debug, Deserialize, ToSchema)]
pub struct ValueRuleEntry {
    pub source_value: String,
    pub target_value: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Request body replacing the value rules for one internal field
#[derive(Debug, Deserialize, ToSchema)]
pub struct PutValueRulesRequest {
    pub target_field: String,
    pub rules: Vec<ValueRuleEntry>,
}

/// App mapping representation returned by the API
#[derive(Debug, Serialize, ToSchema)]
pub struct AppMappingResponse {
    pub id: Uuid,
    pub connector_id: Uuid,
    pub remote_app_id: String,
    pub target_type: String,
    pub is_active: bool,
    pub skip_missing_update_target: bool,
}

impl From<app_mapping::Model> for AppMappingResponse {
    fn from(model: app_mapping::Model) -> Self {
        Self {
            id: model.id,
            connector_id: model.connector_id,
            remote_app_id: model.remote_app_id,
            target_type: model.target_type,
            is_active: model.is_active,
            skip_missing_update_target: model.skip_missing_update_target,
        }
    }
}

/// Count response for replacement endpoints
#[derive(Debug, Serialize, ToSchema)]
pub struct ReplacedResponse {
    pub count: usize,
}

async fn require_connector(
    state: &AppState,
    tenant_id: Uuid,
    connector_id: Uuid,
) -> Result<(), ApiError> {
    ConnectorRepository::new(state.db_arc())
        .find_by_id(tenant_id, connector_id)
        .await?
        .ok_or_else(|| not_found("connector"))?;
    Ok(())
}

async fn require_app_mapping(
    state: &AppState,
    tenant_id: Uuid,
    connector_id: Uuid,
    mapping_id: Uuid,
) -> Result<app_mapping::Model, ApiError> {
    require_connector(state, tenant_id, connector_id).await?;

    let mapping = MappingRepository::new(state.db_arc())
        .get_app_mapping(mapping_id)
        .await?
        .filter(|m| m.connector_id == connector_id)
        .ok_or_else(|| not_found("app mapping"))?;

    Ok(mapping)
}

/// Create an app mapping draft
#[utoipa::path(
    post,
    path = "/connectors/{id}/mappings",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Connector id")),
    request_body = CreateAppMappingRequest,
    responses(
        (status = 201, description = "Draft created (inactive)", body = AppMappingResponse),
        (status = 400, description = "Unknown target type", body = ApiError),
        (status = 404, description = "Connector not found", body = ApiError)
    ),
    tag = "mappings"
)]
pub async fn create_app_mapping(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateAppMappingRequest>,
) -> Result<(StatusCode, Json<AppMappingResponse>), ApiError> {
    require_connector(&state, tenant.0, id).await?;

    let target = TargetType::from_str(&body.target_type).map_err(|e| {
        validation_error(
            "Unknown target type",
            serde_json::json!({ "target_type": e.to_string() }),
        )
    })?;

    let mapping = MappingRepository::new(state.db_arc())
        .create_app_mapping(
            id,
            &body.remote_app_id,
            target,
            body.skip_missing_update_target,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(mapping.into())))
}

/// List app mappings for a connector
#[utoipa::path(
    get,
    path = "/connectors/{id}/mappings",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Connector id")),
    responses(
        (status = 200, description = "App mappings", body = [AppMappingResponse]),
        (status = 404, description = "Connector not found", body = ApiError)
    ),
    tag = "mappings"
)]
pub async fn list_app_mappings(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AppMappingResponse>>, ApiError> {
    require_connector(&state, tenant.0, id).await?;

    let mappings = MappingRepository::new(state.db_arc())
        .list_for_connector(id)
        .await?;

    Ok(Json(mappings.into_iter().map(Into::into).collect()))
}

/// Activate an app mapping draft
#[utoipa::path(
    post,
    path = "/connectors/{id}/mappings/{mapping_id}/activate",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Connector id"),
        ("mapping_id" = Uuid, Path, description = "App mapping id")
    ),
    responses(
        (status = 200, description = "Mapping activated", body = AppMappingResponse),
        (status = 404, description = "Connector or mapping not found", body = ApiError)
    ),
    tag = "mappings"
)]
pub async fn activate_app_mapping(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path((id, mapping_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AppMappingResponse>, ApiError> {
    require_app_mapping(&state, tenant.0, id, mapping_id).await?;

    let mapping = MappingRepository::new(state.db_arc())
        .activate_app_mapping(mapping_id)
        .await?;

    tracing::info!(connector_id = %id, app_mapping_id = %mapping_id, "App mapping activated");
    Ok(Json(mapping.into()))
}

/// Replace the field mappings of an app mapping
///
/// Field types are inferred from the schema cache by field code; unknown
/// codes get the explicit unknown kind instead of failing the request.
#[utoipa::path(
    put,
    path = "/connectors/{id}/mappings/{mapping_id}/fields",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Connector id"),
        ("mapping_id" = Uuid, Path, description = "App mapping id")
    ),
    request_body = PutFieldMappingsRequest,
    responses(
        (status = 200, description = "Field mappings replaced", body = ReplacedResponse),
        (status = 404, description = "Connector or mapping not found", body = ApiError)
    ),
    tag = "mappings"
)]
pub async fn put_field_mappings(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path((id, mapping_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<PutFieldMappingsRequest>,
) -> Result<Json<ReplacedResponse>, ApiError> {
    let app_mapping = require_app_mapping(&state, tenant.0, id, mapping_id).await?;

    let schema = RemoteSchemaRepository::new(state.db_arc())
        .list_fields(id, &app_mapping.remote_app_id)
        .await?;

    let entries: Vec<NewFieldMapping> = body
        .fields
        .into_iter()
        .map(|entry| {
            let kind =
                mapping::infer_field_kind(&schema, &app_mapping.remote_app_id, &entry.field_code);
            NewFieldMapping {
                field_code: entry.field_code,
                field_type: kind.as_stored().to_string(),
                target_field: entry.target_field,
                is_update_key: entry.is_update_key,
            }
        })
        .collect();

    let count = MappingRepository::new(state.db_arc())
        .replace_field_mappings(mapping_id, &entries)
        .await?;

    Ok(Json(ReplacedResponse { count }))
}

/// Replace the value rules for one internal field
///
/// Submission order becomes the scan order; the first active rule whose
/// source matches wins at sync time.
#[utoipa::path(
    put,
    path = "/connectors/{id}/mappings/{mapping_id}/values",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Connector id"),
        ("mapping_id" = Uuid, Path, description = "App mapping id")
    ),
    request_body = PutValueRulesRequest,
    responses(
        (status = 200, description = "Value rules replaced", body = ReplacedResponse),
        (status = 404, description = "Connector or mapping not found", body = ApiError)
    ),
    tag = "mappings"
)]
pub async fn put_value_rules(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    TenantExtension(tenant): TenantExtension,
    Path((id, mapping_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<PutValueRulesRequest>,
) -> Result<Json<ReplacedResponse>, ApiError> {
    require_app_mapping(&state, tenant.0, id, mapping_id).await?;

    let rules: Vec<NewValueRule> = body
        .rules
        .into_iter()
        .map(|rule| NewValueRule {
            source_value: rule.source_value,
            target_value: rule.target_value,
            is_active: rule.is_active,
        })
        .collect();

    let count = MappingRepository::new(state.db_arc())
        .replace_value_rules(mapping_id, &body.target_field, &rules)
        .await?;

    Ok(Json(ReplacedResponse { count }))
}
