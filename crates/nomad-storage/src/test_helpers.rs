//! In-memory storage that records every call, for tests

use crate::keys::validate_path;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A storage call observed by [`RecordingStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Save(String),
    Delete(String),
}

/// Storage double that keeps objects in memory, records Save/Delete calls and
/// can be told to fail.
///
/// A failing save still consumes the reader and keeps whatever it read, so
/// tests can observe that compensation removes the partial object.
#[derive(Default)]
pub struct RecordingStorage {
    files: Mutex<HashMap<String, Bytes>>,
    calls: Mutex<Vec<StorageCall>>,
    fail_save: AtomicBool,
    fail_deletes: AtomicUsize,
}

impl RecordingStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent save fail after reading its input
    pub fn fail_saves(&self) {
        self.fail_save.store(true, Ordering::SeqCst);
    }

    /// Make the next `count` deletes fail
    pub fn fail_next_deletes(&self, count: usize) {
        self.fail_deletes.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StorageCall::Save(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StorageCall::Delete(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Put an object directly, without recording a call
    pub fn insert(&self, path: &str, data: impl Into<Bytes>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.into());
    }

    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    fn record(&self, call: StorageCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn save(
        &self,
        path: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        _size_hint: Option<u64>,
    ) -> StorageResult<u64> {
        validate_path(path)?;
        self.record(StorageCall::Save(path.to_string()));

        let mut buffer = Vec::new();
        let read_result = reader.read_to_end(&mut buffer).await;
        let size = buffer.len() as u64;
        self.insert(path, buffer);

        read_result.map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(
                "injected save failure".to_string(),
            ));
        }
        Ok(size)
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        validate_path(path)?;
        self.record(StorageCall::Delete(path.to_string()));

        let failing = self
            .fail_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::DeleteFailed(
                "injected delete failure".to_string(),
            ));
        }

        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    async fn get_url(&self, path: &str, _expires_in: Duration) -> StorageResult<String> {
        validate_path(path)?;
        Ok(format!("memory://{}", path))
    }

    async fn open(&self, path: &str) -> StorageResult<ByteStream> {
        validate_path(path)?;
        let data = self
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;

        // Two chunks so readers that only look at the first one are exercised.
        let split = data.len().min(4);
        let chunks = vec![Ok(data.slice(..split)), Ok(data.slice(split..))];
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
