//! Application state shared by every handler.

use crate::constants::{FORM_FIELD_SLACK, POLL_IMAGE_MIME_TYPES};
use crate::upload::sniff::MimePolicy;
use crate::upload::writer::StoreWriter;
use crate::utils::{SigningKey, UrlSigner};
use nomad_core::{AppError, Config};
use nomad_db::{TripMembership, WalletAuditRepository, WalletDocumentRepository};
use nomad_storage::{Storage, UploadClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Repositories behind the upload and download paths
#[derive(Clone)]
pub struct DbState {
    pub documents: Arc<dyn WalletDocumentRepository>,
    pub memberships: Arc<dyn TripMembership>,
    pub audit: Arc<dyn WalletAuditRepository>,
}

/// Limits of one upload endpoint
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_file_size: u64,
    pub mime_policy: MimePolicy,
    pub url_validity: Duration,
}

impl UploadPolicy {
    /// Request body cap: the file cap plus room for the rest of the form
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_file_size.saturating_add(FORM_FIELD_SLACK)).unwrap_or(usize::MAX)
    }
}

/// Storage, spooling and per-endpoint policies of the upload pipeline
#[derive(Clone)]
pub struct UploadState {
    pub storage: Arc<dyn Storage>,
    pub clock: Arc<UploadClock>,
    pub spool_dir: PathBuf,
    pub cleanup_timeout: Duration,
    pub poll_images: UploadPolicy,
    pub wallet: UploadPolicy,
    pub personal_quota: u64,
    pub group_quota: u64,
}

impl UploadState {
    pub fn writer(&self) -> StoreWriter {
        StoreWriter::new(self.storage.clone(), self.cleanup_timeout)
    }
}

pub struct AppState {
    pub config: Config,
    pub db: DbState,
    pub uploads: UploadState,
    pub url_signer: UrlSigner,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn Storage>, db: DbState) -> Result<Self, AppError> {
        let upload = config.upload();
        let uploads = UploadState {
            storage,
            clock: Arc::new(UploadClock::new()),
            spool_dir: upload.spool_dir.clone(),
            cleanup_timeout: Duration::from_secs(upload.cleanup_timeout_secs),
            poll_images: UploadPolicy {
                max_file_size: upload.poll_image_max_file_size,
                mime_policy: MimePolicy::new(POLL_IMAGE_MIME_TYPES.iter().copied()),
                url_validity: Duration::from_secs(upload.poll_image_url_ttl_secs),
            },
            wallet: UploadPolicy {
                max_file_size: upload.wallet_max_file_size,
                mime_policy: MimePolicy::new(
                    upload.wallet_allowed_mime_types.iter().map(String::as_str),
                ),
                url_validity: Duration::from_secs(upload.wallet_url_ttl_secs),
            },
            personal_quota: upload.wallet_personal_quota,
            group_quota: upload.wallet_group_quota,
        };

        let key = SigningKey::new(config.wallet_signing_key().as_bytes())?;
        let url_signer = UrlSigner::new(key, config.public_base_url());

        Ok(Self {
            config,
            db,
            uploads,
            url_signer,
        })
    }
}
