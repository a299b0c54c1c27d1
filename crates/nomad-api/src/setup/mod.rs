//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;

use crate::state::{AppState, DbState};
use anyhow::{Context, Result};
use nomad_core::Config;
use nomad_db::{PgTripMembership, PgWalletAuditRepository, PgWalletDocumentRepository};
use nomad_storage::Storage;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_tracing(&config)?;

    validation::validate_config(&config).context("Configuration validation failed")?;
    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;
    let db = DbState {
        documents: Arc::new(PgWalletDocumentRepository::new(pool.clone())),
        memberships: Arc::new(PgTripMembership::new(pool.clone())),
        audit: Arc::new(PgWalletAuditRepository::new(pool)),
    };

    let storage = storage::setup_storage(&config).await?;

    build_app(config, storage, db).await
}

/// Assemble state and routes from already constructed backends
pub async fn build_app(
    config: Config,
    storage: Arc<dyn Storage>,
    db: DbState,
) -> Result<(Arc<AppState>, axum::Router)> {
    let state = Arc::new(AppState::new(config, storage, db)?);
    let router = routes::setup_routes(&state.config, state.clone()).await?;
    Ok((state, router))
}
