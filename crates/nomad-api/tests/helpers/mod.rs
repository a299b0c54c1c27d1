//! Test helpers: build the router over in-memory backends.
//!
//! Storage is a [`RecordingStorage`], repositories are the in-memory ones, and
//! multipart spool files go to a per-test temp directory.

#![allow(dead_code)]

pub mod auth;
pub mod fixtures;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use nomad_api::setup::build_app;
use nomad_api::state::{AppState, DbState};
use nomad_core::{BaseConfig, Config, StorageBackend, UploadConfig};
use nomad_core::models::WalletAuditEntry;
use nomad_db::{
    InMemoryTripMembership, InMemoryWalletAuditRepository, InMemoryWalletDocumentRepository,
};
use nomad_storage::test_helpers::RecordingStorage;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub const MEMBER: &str = "user-1";
pub const OUTSIDER: &str = "user-2";

/// Test application: server plus handles on every backend it uses.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub storage: Arc<RecordingStorage>,
    pub documents: Arc<InMemoryWalletDocumentRepository>,
    pub memberships: Arc<InMemoryTripMembership>,
    pub audit: Arc<InMemoryWalletAuditRepository>,
    pub trip_id: Uuid,
    pub spool: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Number of spool files left behind
    pub fn spool_entries(&self) -> usize {
        std::fs::read_dir(self.spool.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Audit entries once at least `count` have been written. Entries are
    /// inserted from detached tasks, so this polls for a short while.
    pub async fn audit_entries(&self, count: usize) -> Vec<WalletAuditEntry> {
        for _ in 0..100 {
            let entries = self.audit.entries();
            if entries.len() >= count {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.audit.entries()
    }
}

pub fn create_test_config(spool: &TempDir) -> Config {
    Config {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            db_max_connections: 1,
            db_timeout_seconds: 1,
            jwt_secret: auth::TEST_JWT_SECRET.to_string(),
            environment: "test".to_string(),
            log_format: None,
        },
        database_url: "postgres://unused".to_string(),
        wallet_signing_key: "test-wallet-signing-key-at-least-32-bytes".to_string(),
        public_base_url: String::new(),
        storage_backend: StorageBackend::Local,
        local_storage_path: spool.path().display().to_string(),
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        upload: UploadConfig {
            spool_dir: spool.path().to_path_buf(),
            ..UploadConfig::default()
        },
    }
}

/// Setup a test app with default upload limits. `MEMBER` belongs to the
/// returned trip, `OUTSIDER` does not.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

pub async fn setup_test_app_with(configure: impl FnOnce(&mut UploadConfig)) -> TestApp {
    let spool = tempfile::tempdir().expect("Failed to create spool directory");
    let mut config = create_test_config(&spool);
    configure(&mut config.upload);

    let storage = RecordingStorage::new();
    let documents = Arc::new(InMemoryWalletDocumentRepository::new());
    let memberships = Arc::new(InMemoryTripMembership::new());
    let audit = Arc::new(InMemoryWalletAuditRepository::new());
    let trip_id = Uuid::new_v4();
    memberships.add_member(trip_id, MEMBER);

    let db = DbState {
        documents: documents.clone(),
        memberships: memberships.clone(),
        audit: audit.clone(),
    };
    let (state, router) = build_app(config, storage.clone(), db)
        .await
        .expect("Failed to build app");
    let server = TestServer::new(router.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        storage,
        documents,
        memberships,
        audit,
        trip_id,
        spool,
    }
}

/// Multipart form with a single `file` part
pub fn file_form(bytes: Vec<u8>, file_name: &str, mime_type: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(bytes).file_name(file_name).mime_type(mime_type),
    )
}

/// Wallet form: a `file` part plus the JSON `metadata` field
pub fn wallet_form(
    bytes: Vec<u8>,
    file_name: &str,
    mime_type: &str,
    metadata: &serde_json::Value,
) -> MultipartForm {
    file_form(bytes, file_name, mime_type).add_text("metadata", metadata.to_string())
}
