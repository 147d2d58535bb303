//! # HTTP Handlers
//!
//! Axum handlers for the connector subsystem API.

pub mod connect;
pub mod connectors;
pub mod mappings;
pub mod schema;
pub mod sync;

use axum::extract::State;
use axum::response::Json;

use crate::db;
use crate::error::ApiError;
use crate::models::ServiceInfo;
use crate::server::AppState;

/// Service information
///
/// Returns basic service name and version.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "service"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Health check
///
/// Verifies database connectivity.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service healthy"),
        (status = 500, description = "Database unreachable", body = ApiError)
    ),
    tag = "service"
)]
pub async fn healthz(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    db::health_check(&state.db).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
