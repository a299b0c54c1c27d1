//! Configuration validation
//!
//! Runs the config's own checks, then the ones that only matter to the
//! HTTP server.

use anyhow::Result;
use nomad_core::Config;

pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.db_max_connections() == 0 {
        return Err(anyhow::anyhow!("Database max connections cannot be 0"));
    }

    if config.db_timeout_seconds() == 0 {
        return Err(anyhow::anyhow!("Database timeout cannot be 0"));
    }

    let upload = config.upload();
    if upload.wallet_url_ttl_secs == 0 || upload.poll_image_url_ttl_secs == 0 {
        return Err(anyhow::anyhow!("Download URL lifetimes must be greater than zero"));
    }

    if upload.cleanup_timeout_secs == 0 {
        return Err(anyhow::anyhow!("UPLOAD_CLEANUP_TIMEOUT_SECS cannot be 0"));
    }

    if config.is_production() && config.public_base_url().is_empty() {
        tracing::warn!("PUBLIC_BASE_URL is not set - download URLs will be relative");
    }

    if upload.wallet_max_file_size > upload.wallet_personal_quota {
        tracing::warn!(
            max_file_size = upload.wallet_max_file_size,
            personal_quota = upload.wallet_personal_quota,
            "Wallet file size limit exceeds the personal quota"
        );
    }

    tracing::info!("Configuration validation passed");
    Ok(())
}
