//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Stream of object bytes returned by [`Storage::open`]
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// The upload pipeline only ever writes an object once and either keeps it or
/// deletes it again, so the surface is deliberately small. Implementations must
/// be safe to share between concurrent requests.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stream `reader` to `path` until EOF and return the number of bytes written.
    ///
    /// `size_hint` is the client-declared size. Backends may use it to size
    /// buffers but must not rely on it: the reader is the source of truth.
    async fn save(
        &self,
        path: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        size_hint: Option<u64>,
    ) -> StorageResult<u64>;

    /// Remove the object at `path`. Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Backend-direct URL for `path` (presigned where supported)
    async fn get_url(&self, path: &str, expires_in: Duration) -> StorageResult<String>;

    /// Open the object at `path` as a stream of chunks
    async fn open(&self, path: &str) -> StorageResult<ByteStream>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

impl From<StorageError> for nomad_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => nomad_core::AppError::NotFound("File not found".to_string()),
            other => nomad_core::AppError::Storage(other.to_string()),
        }
    }
}
