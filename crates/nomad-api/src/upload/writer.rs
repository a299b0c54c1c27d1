//! Streaming store writer.
//!
//! Streams an accepted upload into storage through a [`CountingReader`] and
//! keeps a [`PendingObject`] guard armed from the moment `save` starts. Every
//! path that does not end in [`PendingObject::commit`] deletes the object
//! again: inline on handled failures, from a detached task when the request
//! future is dropped.

use nomad_core::AppError;
use nomad_storage::Storage;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};

/// Reader that counts the bytes it yields and fails once more than `limit`
/// have passed through.
pub struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
    limit: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            count: Arc::new(AtomicU64::new(0)),
            limit,
        }
    }

    /// Shared counter, readable after the reader has been moved into storage
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.count.clone()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let n = (buf.filled().len() - before) as u64;
                let total = this.count.fetch_add(n, Ordering::SeqCst) + n;
                if total > this.limit {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("upload exceeds {} bytes", this.limit),
                    )));
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Object that has been written but not yet accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub size: u64,
}

async fn delete_with_retry(storage: &dyn Storage, path: &str, timeout: Duration) -> bool {
    for attempt in 1..=2 {
        match tokio::time::timeout(timeout, storage.delete(path)).await {
            Ok(Ok(())) => {
                tracing::warn!(storage_path = %path, attempt, "Compensating delete succeeded");
                return true;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, storage_path = %path, attempt, "Compensating delete failed");
            }
            Err(_) => {
                tracing::warn!(storage_path = %path, attempt, "Compensating delete timed out");
            }
        }
    }
    tracing::error!(storage_path = %path, "Giving up on compensating delete, object may be orphaned");
    false
}

/// Guard over a stored object. Dropping it while armed deletes the object
/// from a detached task bounded by the cleanup timeout.
pub struct PendingObject {
    storage: Arc<dyn Storage>,
    path: String,
    size: u64,
    cleanup_timeout: Duration,
    armed: bool,
}

impl PendingObject {
    fn arm(storage: Arc<dyn Storage>, path: String, cleanup_timeout: Duration) -> Self {
        Self {
            storage,
            path,
            size: 0,
            cleanup_timeout,
            armed: true,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Keep the object
    pub fn commit(mut self) -> StoredObject {
        self.armed = false;
        StoredObject {
            path: std::mem::take(&mut self.path),
            size: self.size,
        }
    }

    /// Delete the object before returning. If this future is itself dropped
    /// the guard falls back to the detached delete.
    pub async fn discard(mut self) {
        delete_with_retry(self.storage.as_ref(), &self.path, self.cleanup_timeout).await;
        self.armed = false;
    }
}

impl Drop for PendingObject {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let storage = self.storage.clone();
        let path = std::mem::take(&mut self.path);
        let timeout = self.cleanup_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(storage_path = %path, "Upload abandoned, deleting stored object in background");
                handle.spawn(async move {
                    delete_with_retry(storage.as_ref(), &path, timeout).await;
                });
            }
            Err(_) => {
                tracing::error!(storage_path = %path, "No runtime available for compensating delete");
            }
        }
    }
}

/// Writes accepted uploads to storage
#[derive(Clone)]
pub struct StoreWriter {
    storage: Arc<dyn Storage>,
    cleanup_timeout: Duration,
}

impl StoreWriter {
    pub fn new(storage: Arc<dyn Storage>, cleanup_timeout: Duration) -> Self {
        Self {
            storage,
            cleanup_timeout,
        }
    }

    /// Stream `reader` to `path`. At most `max_size` bytes are accepted; the
    /// count of bytes actually read decides, `declared_size` is only a hint
    /// for the backend.
    #[tracing::instrument(skip(self, reader, path), fields(storage_path = %path))]
    pub async fn write<R>(
        &self,
        path: String,
        reader: R,
        declared_size: Option<u64>,
        max_size: u64,
    ) -> Result<PendingObject, AppError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let start = std::time::Instant::now();
        let reader = CountingReader::new(reader, max_size);
        let counter = reader.counter();

        let mut pending = PendingObject::arm(self.storage.clone(), path, self.cleanup_timeout);
        let result = self
            .storage
            .save(pending.path(), Box::pin(reader), declared_size)
            .await;
        let written = counter.load(Ordering::SeqCst);

        if written > max_size {
            tracing::info!(
                size_bytes = written,
                max_size_bytes = max_size,
                "Upload exceeded size limit"
            );
            pending.discard().await;
            return Err(AppError::validation(
                "file_too_large",
                format!("file size exceeds maximum of {} bytes", max_size),
            ));
        }

        if let Err(e) = result {
            tracing::error!(error = %e, size_bytes = written, "Storage save failed");
            pending.discard().await;
            return Err(e.into());
        }

        pending.size = written;
        tracing::info!(
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload stored"
        );
        Ok(pending)
    }
}
