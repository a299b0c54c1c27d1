//! Storage setup and initialization

use anyhow::{Context, Result};
use nomad_core::Config;
use nomad_storage::{create_storage, Storage};
use std::sync::Arc;

/// Create the configured storage backend and the upload spool directory.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage backend")?;
    tracing::info!(backend = ?storage.backend_type(), "Storage initialized");

    let spool_dir = &config.upload().spool_dir;
    tokio::fs::create_dir_all(spool_dir)
        .await
        .with_context(|| format!("Failed to create spool directory {}", spool_dir.display()))?;
    tracing::info!(spool_dir = %spool_dir.display(), "Upload spool directory ready");

    Ok(storage)
}
