use std::sync::Mutex;

use nomad_core::models::WalletAuditEntry;
use nomad_core::AppError;
use sqlx::{PgPool, Postgres};

/// Append-only audit trail of wallet operations
#[async_trait::async_trait]
pub trait WalletAuditRepository: Send + Sync {
    async fn log_access(&self, entry: WalletAuditEntry) -> Result<(), AppError>;
}

/// PostgreSQL wallet audit log
#[derive(Clone)]
pub struct PgWalletAuditRepository {
    pool: PgPool,
}

impl PgWalletAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl WalletAuditRepository for PgWalletAuditRepository {
    #[tracing::instrument(
        skip(self, entry),
        fields(db.table = "wallet_audit_log", db.operation = "insert", action = %entry.action)
    )]
    async fn log_access(&self, entry: WalletAuditEntry) -> Result<(), AppError> {
        sqlx::query::<Postgres>(
            "INSERT INTO wallet_audit_log (user_id, document_id, action, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&entry.user_id)
        .bind(entry.document_id)
        .bind(entry.action.as_str())
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory wallet audit log
#[derive(Default)]
pub struct InMemoryWalletAuditRepository {
    entries: Mutex<Vec<WalletAuditEntry>>,
}

impl InMemoryWalletAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<WalletAuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl WalletAuditRepository for InMemoryWalletAuditRepository {
    async fn log_access(&self, entry: WalletAuditEntry) -> Result<(), AppError> {
        self.entries
            .lock()
            .map_err(|_| AppError::Internal("audit log poisoned".to_string()))?
            .push(entry);
        Ok(())
    }
}
