//! # Server Configuration
//!
//! Application state, router assembly and server startup.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth;
use crate::config::AppConfig;
use crate::handlers;
use crate::locks::ConnectorLocks;
use crate::oauth::{OAuthFlowController, StateTokenSigner};
use crate::providers::AdapterRegistry;
use crate::repositories::{
    AuditLogRepository, CaseRecordRepository, ConnectorRepository, MappingRepository,
    OAuthCredentialRepository, OAuthStateRepository, SyncSessionRepository,
};
use crate::sync::SyncOrchestrator;
use crate::tokens::TokenLifecycleManager;
use crate::vault::CredentialCodec;

/// Application state containing shared resources.
///
/// Every component gets its dependencies from here explicitly; there are no
/// module-level singletons, so tests can assemble a state around an
/// in-memory database and whatever adapter doubles they need.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub registry: AdapterRegistry,
    pub codec: Arc<dyn CredentialCodec>,
    pub signer: StateTokenSigner,
    pub locks: ConnectorLocks,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        registry: AdapterRegistry,
        codec: Arc<dyn CredentialCodec>,
    ) -> Self {
        let signer = StateTokenSigner::from_config(&config);
        Self {
            config,
            db,
            registry,
            codec,
            signer,
            locks: ConnectorLocks::new(),
        }
    }

    /// Shared handle to the database connection for repository construction.
    pub fn db_arc(&self) -> Arc<DatabaseConnection> {
        Arc::new(self.db.clone())
    }

    /// Assemble an OAuth flow controller over this state.
    pub fn flow_controller(&self) -> OAuthFlowController {
        let db = self.db_arc();
        OAuthFlowController::new(
            self.config.clone(),
            self.codec.clone(),
            self.registry.clone(),
            self.signer.clone(),
            ConnectorRepository::new(db.clone()),
            OAuthCredentialRepository::new(db.clone()),
            OAuthStateRepository::new(db.clone()),
            AuditLogRepository::new(db),
        )
    }

    /// Assemble a token lifecycle manager over this state.
    pub fn token_manager(&self) -> Arc<TokenLifecycleManager> {
        let db = self.db_arc();
        Arc::new(TokenLifecycleManager::new(
            self.codec.clone(),
            self.registry.clone(),
            ConnectorRepository::new(db.clone()),
            OAuthCredentialRepository::new(db.clone()),
            AuditLogRepository::new(db),
        ))
    }

    /// Assemble a sync orchestrator over this state.
    pub fn orchestrator(&self) -> SyncOrchestrator {
        let db = self.db_arc();
        SyncOrchestrator::new(
            self.token_manager(),
            ConnectorRepository::new(db.clone()),
            MappingRepository::new(db.clone()),
            SyncSessionRepository::new(db.clone()),
            CaseRecordRepository::new(db.clone()),
            AuditLogRepository::new(db),
            self.locks.clone(),
        )
    }
}

/// Creates and configures the Axum application router.
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/connect/{provider}", post(handlers::connect::start_oauth))
        .route(
            "/connectors",
            post(handlers::connectors::create_connector)
                .get(handlers::connectors::list_connectors),
        )
        .route(
            "/connectors/{id}",
            get(handlers::connectors::get_connector)
                .delete(handlers::connectors::delete_connector),
        )
        .route(
            "/connectors/{id}/audit",
            get(handlers::connectors::list_audit_log),
        )
        .route(
            "/connectors/{id}/apps/sync",
            post(handlers::schema::sync_apps),
        )
        .route(
            "/connectors/{id}/fields/sync",
            post(handlers::schema::sync_fields),
        )
        .route("/connectors/{id}/apps", get(handlers::schema::list_apps))
        .route("/connectors/{id}/fields", get(handlers::schema::list_fields))
        .route(
            "/connectors/{id}/mappings",
            post(handlers::mappings::create_app_mapping)
                .get(handlers::mappings::list_app_mappings),
        )
        .route(
            "/connectors/{id}/mappings/{mapping_id}/activate",
            post(handlers::mappings::activate_app_mapping),
        )
        .route(
            "/connectors/{id}/mappings/{mapping_id}/fields",
            put(handlers::mappings::put_field_mappings),
        )
        .route(
            "/connectors/{id}/mappings/{mapping_id}/values",
            put(handlers::mappings::put_value_rules),
        )
        .route("/connectors/{id}/sync", post(handlers::sync::trigger_manual_sync))
        .route(
            "/connectors/{id}/sync/sessions",
            get(handlers::sync::list_sync_sessions),
        )
        .route(
            "/connectors/{id}/sync/sessions/{session_id}/items",
            get(handlers::sync::list_sync_items),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        // Provider redirects carry no operator credentials
        .route(
            "/connect/{provider}/callback",
            get(handlers::connect::oauth_callback),
        )
        // Scheduled triggers authenticate with the static shared secret
        .route(
            "/connectors/{id}/sync/scheduled",
            post(handlers::sync::trigger_scheduled_sync),
        )
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given state.
pub async fn run_server(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state
        .config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = state.config.profile.clone();

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::connect::start_oauth,
        crate::handlers::connect::oauth_callback,
        crate::handlers::connectors::create_connector,
        crate::handlers::connectors::list_connectors,
        crate::handlers::connectors::get_connector,
        crate::handlers::connectors::delete_connector,
        crate::handlers::connectors::list_audit_log,
        crate::handlers::schema::sync_apps,
        crate::handlers::schema::sync_fields,
        crate::handlers::schema::list_apps,
        crate::handlers::schema::list_fields,
        crate::handlers::mappings::create_app_mapping,
        crate::handlers::mappings::list_app_mappings,
        crate::handlers::mappings::activate_app_mapping,
        crate::handlers::mappings::put_field_mappings,
        crate::handlers::mappings::put_value_rules,
        crate::handlers::sync::trigger_manual_sync,
        crate::handlers::sync::trigger_scheduled_sync,
        crate::handlers::sync::list_sync_sessions,
        crate::handlers::sync::list_sync_items,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::connect::AuthorizeUrlResponse,
            crate::handlers::connectors::CreateConnectorRequest,
            crate::handlers::connectors::ConnectorResponse,
            crate::handlers::connectors::AuditLogResponse,
            crate::handlers::schema::SchemaSyncResponse,
            crate::handlers::schema::RemoteAppResponse,
            crate::handlers::schema::RemoteFieldResponse,
            crate::handlers::mappings::CreateAppMappingRequest,
            crate::handlers::mappings::AppMappingResponse,
            crate::handlers::mappings::PutFieldMappingsRequest,
            crate::handlers::mappings::FieldMappingEntry,
            crate::handlers::mappings::PutValueRulesRequest,
            crate::handlers::mappings::ValueRuleEntry,
            crate::handlers::mappings::ReplacedResponse,
            crate::handlers::sync::SyncSessionResponse,
            crate::handlers::sync::SyncItemResponse,
            crate::sync::SyncReport,
            crate::sync::TypeCounts,
        )
    ),
    info(
        title = "Casebridge Connectors API",
        description = "External-system connector subsystem for the case-management dashboard",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
