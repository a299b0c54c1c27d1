use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use nomad_core::models::{NewWalletDocument, WalletDocument, WalletType};
use nomad_core::AppError;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = "id, user_id, trip_id, wallet_type, document_type, name, description, \
     file_path, file_size, mime_type, tags, metadata, created_at, updated_at";

/// Wallet document persistence used by the upload and download paths
#[async_trait::async_trait]
pub trait WalletDocumentRepository: Send + Sync {
    async fn create_document(&self, doc: NewWalletDocument) -> Result<WalletDocument, AppError>;

    /// Live (not soft-deleted) document by id
    async fn get_document(&self, id: Uuid) -> Result<Option<WalletDocument>, AppError>;

    /// Live (not soft-deleted) document stored at `file_path`
    async fn get_document_by_file_path(
        &self,
        file_path: &str,
    ) -> Result<Option<WalletDocument>, AppError>;

    /// Bytes used by a user's live personal documents
    async fn user_storage_usage(&self, user_id: &str) -> Result<i64, AppError>;

    /// Bytes used by a trip's live group documents
    async fn trip_storage_usage(&self, trip_id: Uuid) -> Result<i64, AppError>;

    /// Page of a user's live personal documents, newest first, and their total count
    async fn list_personal_documents(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WalletDocument>, i64), AppError>;

    /// Page of a trip's live group documents, newest first, and their total count
    async fn list_group_documents(
        &self,
        trip_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WalletDocument>, i64), AppError>;

    /// Mark a live document deleted. Returns false when no live row matched.
    async fn soft_delete_document(&self, id: Uuid) -> Result<bool, AppError>;
}

/// PostgreSQL wallet document repository
#[derive(Clone)]
pub struct PgWalletDocumentRepository {
    pool: PgPool,
}

impl PgWalletDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_column<T: std::str::FromStr<Err = anyhow::Error>>(
    row: &PgRow,
    column: &str,
) -> Result<T, AppError> {
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(AppError::from)
}

fn row_to_document(row: &PgRow) -> Result<WalletDocument, AppError> {
    Ok(WalletDocument {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        trip_id: row.try_get("trip_id")?,
        wallet_type: parse_column(row, "wallet_type")?,
        document_type: parse_column(row, "document_type")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        file_path: row.try_get("file_path")?,
        file_size: row.try_get("file_size")?,
        mime_type: row.try_get("mime_type")?,
        tags: row.try_get("tags")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait::async_trait]
impl WalletDocumentRepository for PgWalletDocumentRepository {
    #[tracing::instrument(skip(self, doc), fields(db.table = "wallet_documents", db.operation = "insert"))]
    async fn create_document(&self, doc: NewWalletDocument) -> Result<WalletDocument, AppError> {
        let sql = format!(
            r#"
            INSERT INTO wallet_documents (
                user_id, trip_id, wallet_type, document_type, name, description,
                file_path, file_size, mime_type, tags, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        );

        let row = sqlx::query::<Postgres>(&sql)
            .bind(&doc.user_id)
            .bind(doc.trip_id)
            .bind(doc.wallet_type.as_str())
            .bind(doc.document_type.as_str())
            .bind(&doc.name)
            .bind(&doc.description)
            .bind(&doc.file_path)
            .bind(doc.file_size)
            .bind(&doc.mime_type)
            .bind(&doc.tags)
            .bind(&doc.metadata)
            .fetch_one(&self.pool)
            .await?;

        row_to_document(&row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "wallet_documents", db.operation = "select"))]
    async fn get_document(&self, id: Uuid) -> Result<Option<WalletDocument>, AppError> {
        let sql = format!(
            "SELECT {} FROM wallet_documents WHERE id = $1 AND deleted_at IS NULL",
            DOCUMENT_COLUMNS
        );

        let row = sqlx::query::<Postgres>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "wallet_documents", db.operation = "select"))]
    async fn get_document_by_file_path(
        &self,
        file_path: &str,
    ) -> Result<Option<WalletDocument>, AppError> {
        let sql = format!(
            "SELECT {} FROM wallet_documents WHERE file_path = $1 AND deleted_at IS NULL",
            DOCUMENT_COLUMNS
        );

        let row = sqlx::query::<Postgres>(&sql)
            .bind(file_path)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "wallet_documents", db.operation = "select"))]
    async fn user_storage_usage(&self, user_id: &str) -> Result<i64, AppError> {
        let usage = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COALESCE(SUM(file_size), 0)::BIGINT FROM wallet_documents \
             WHERE user_id = $1 AND wallet_type = 'personal' AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(usage)
    }

    #[tracing::instrument(skip(self), fields(db.table = "wallet_documents", db.operation = "select"))]
    async fn trip_storage_usage(&self, trip_id: Uuid) -> Result<i64, AppError> {
        let usage = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COALESCE(SUM(file_size), 0)::BIGINT FROM wallet_documents \
             WHERE trip_id = $1 AND wallet_type = 'group' AND deleted_at IS NULL",
        )
        .bind(trip_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(usage)
    }

    #[tracing::instrument(skip(self), fields(db.table = "wallet_documents", db.operation = "select"))]
    async fn list_personal_documents(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WalletDocument>, i64), AppError> {
        let total = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM wallet_documents \
             WHERE user_id = $1 AND wallet_type = 'personal' AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM wallet_documents \
             WHERE user_id = $1 AND wallet_type = 'personal' AND deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query::<Postgres>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let documents = rows
            .iter()
            .map(row_to_document)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((documents, total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "wallet_documents", db.operation = "select"))]
    async fn list_group_documents(
        &self,
        trip_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WalletDocument>, i64), AppError> {
        let total = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM wallet_documents \
             WHERE trip_id = $1 AND wallet_type = 'group' AND deleted_at IS NULL",
        )
        .bind(trip_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM wallet_documents \
             WHERE trip_id = $1 AND wallet_type = 'group' AND deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query::<Postgres>(&sql)
            .bind(trip_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let documents = rows
            .iter()
            .map(row_to_document)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((documents, total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "wallet_documents", db.operation = "update"))]
    async fn soft_delete_document(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query::<Postgres>(
            "UPDATE wallet_documents SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory wallet document repository
///
/// Rows are keyed by file path and soft deletion removes them. `fail_creates`
/// makes inserts fail, which lets tests drive the row-write compensation path.
#[derive(Default)]
pub struct InMemoryWalletDocumentRepository {
    documents: Mutex<HashMap<String, WalletDocument>>,
    fail_creates: AtomicBool,
}

impl InMemoryWalletDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    pub fn insert(&self, doc: WalletDocument) {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(doc.file_path.clone(), doc);
        }
    }

    pub fn documents(&self) -> Vec<WalletDocument> {
        self.documents
            .lock()
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, WalletDocument>>, AppError> {
        self.documents
            .lock()
            .map_err(|_| AppError::Internal("wallet document store poisoned".to_string()))
    }

    fn usage(&self, matches: impl Fn(&WalletDocument) -> bool) -> Result<i64, AppError> {
        Ok(self.lock()?.values().filter(|d| matches(d)).map(|d| d.file_size).sum())
    }

    fn page(
        &self,
        matches: impl Fn(&WalletDocument) -> bool,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WalletDocument>, i64), AppError> {
        let mut matching: Vec<WalletDocument> = self
            .lock()?
            .values()
            .filter(|d| matches(d))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect();
        Ok((page, total))
    }
}

#[async_trait::async_trait]
impl WalletDocumentRepository for InMemoryWalletDocumentRepository {
    async fn create_document(&self, doc: NewWalletDocument) -> Result<WalletDocument, AppError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected insert failure".to_string()));
        }

        let now = Utc::now();
        let document = WalletDocument {
            id: Uuid::new_v4(),
            user_id: doc.user_id,
            trip_id: doc.trip_id,
            wallet_type: doc.wallet_type,
            document_type: doc.document_type,
            name: doc.name,
            description: doc.description,
            file_path: doc.file_path,
            file_size: doc.file_size,
            mime_type: doc.mime_type,
            tags: doc.tags,
            metadata: doc.metadata,
            created_at: now,
            updated_at: now,
        };

        let mut documents = self.lock()?;
        if documents.contains_key(&document.file_path) {
            return Err(AppError::Internal(
                "duplicate wallet document file path".to_string(),
            ));
        }
        documents.insert(document.file_path.clone(), document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<WalletDocument>, AppError> {
        Ok(self.lock()?.values().find(|d| d.id == id).cloned())
    }

    async fn get_document_by_file_path(
        &self,
        file_path: &str,
    ) -> Result<Option<WalletDocument>, AppError> {
        Ok(self.lock()?.get(file_path).cloned())
    }

    async fn user_storage_usage(&self, user_id: &str) -> Result<i64, AppError> {
        self.usage(|d| d.user_id == user_id && d.wallet_type == WalletType::Personal)
    }

    async fn trip_storage_usage(&self, trip_id: Uuid) -> Result<i64, AppError> {
        self.usage(|d| d.trip_id == Some(trip_id) && d.wallet_type == WalletType::Group)
    }

    async fn list_personal_documents(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WalletDocument>, i64), AppError> {
        self.page(
            |d| d.user_id == user_id && d.wallet_type == WalletType::Personal,
            limit,
            offset,
        )
    }

    async fn list_group_documents(
        &self,
        trip_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WalletDocument>, i64), AppError> {
        self.page(
            |d| d.trip_id == Some(trip_id) && d.wallet_type == WalletType::Group,
            limit,
            offset,
        )
    }

    async fn soft_delete_document(&self, id: Uuid) -> Result<bool, AppError> {
        let mut documents = self.lock()?;
        let path = documents
            .values()
            .find(|d| d.id == id)
            .map(|d| d.file_path.clone());
        Ok(path.is_some_and(|path| documents.remove(&path).is_some()))
    }
}
