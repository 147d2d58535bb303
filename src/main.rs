//! # Casebridge Connectors Main Entry Point

use std::sync::Arc;

use casebridge::{
    config::ConfigLoader,
    db,
    providers::AdapterRegistry,
    server::{AppState, run_server},
    telemetry, vault,
};
use migration::{Migrator, MigratorTrait};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;

    telemetry::init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::info!(config = %redacted_json, "Effective configuration");
    }

    let db = db::init_pool(&config).await?;
    Migrator::up(&db, None).await?;

    let config = Arc::new(config);
    let codec = vault::codec_from_config(&config)?;
    let registry = AdapterRegistry::from_config(&config);

    let state = AppState::new(config, db, registry, codec);
    run_server(state).await
}
