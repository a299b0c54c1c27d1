//! Shared storage path generation for all backends.
//!
//! - Wallet: `wallet/{wallet_type}/{owner_id}/{timestamp_ns}_{filename}`
//! - Poll image: `poll-images/{trip_id}/{user_id}/{timestamp_ns}_{filename}`

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::traits::{StorageError, StorageResult};

pub const WALLET_PREFIX: &str = "wallet";
pub const POLL_IMAGE_PREFIX: &str = "poll-images";

const MAX_FILENAME_LENGTH: usize = 255;
const FALLBACK_FILENAME: &str = "upload";

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'
}

/// Reduce a client-supplied filename to a safe leaf name.
///
/// Directory components are dropped, every character outside `[A-Za-z0-9._-]`
/// becomes `_`, and names longer than 255 bytes are truncated while keeping
/// the extension.
pub fn sanitize_filename(name: &str) -> String {
    let leaf = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let mut cleaned: String = leaf
        .chars()
        .map(|c| if is_safe_char(c) { c } else { '_' })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        cleaned = FALLBACK_FILENAME.to_string();
    }

    // Only ASCII remains, so byte offsets are char boundaries.
    if cleaned.len() > MAX_FILENAME_LENGTH {
        let ext = match cleaned.rfind('.') {
            Some(idx) if idx > 0 => cleaned[idx..].to_string(),
            _ => String::new(),
        };
        let stem_len = cleaned.len() - ext.len();
        let max_stem = MAX_FILENAME_LENGTH.saturating_sub(ext.len()).max(1);
        let stem = &cleaned[..stem_len.min(max_stem)];
        cleaned = format!("{}{}", stem, ext);
        cleaned.truncate(MAX_FILENAME_LENGTH);
    }

    cleaned
}

/// Make an owner/user id usable as a single path segment.
fn path_segment(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if is_safe_char(c) { c } else { '_' })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Storage path of a wallet document
pub fn wallet_document_path(
    wallet_type: &str,
    owner_id: &str,
    timestamp_ns: u64,
    filename: &str,
) -> String {
    format!(
        "{}/{}/{}/{}_{}",
        WALLET_PREFIX,
        path_segment(wallet_type),
        path_segment(owner_id),
        timestamp_ns,
        sanitize_filename(filename)
    )
}

/// Storage path of a poll-option image
pub fn poll_image_path(trip_id: &str, user_id: &str, timestamp_ns: u64, filename: &str) -> String {
    format!(
        "{}/{}/{}/{}_{}",
        POLL_IMAGE_PREFIX,
        path_segment(trip_id),
        path_segment(user_id),
        timestamp_ns,
        sanitize_filename(filename)
    )
}

/// Reject paths that could escape the storage root.
pub fn validate_path(path: &str) -> StorageResult<()> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage path contains invalid characters".to_string(),
        ));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(
            "Storage path contains traversal segments".to_string(),
        ));
    }
    Ok(())
}

/// Last path segment, used as the download filename.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Nanosecond timestamps for storage paths.
///
/// Readings are anchored to the wall clock once at construction and advanced
/// with a monotonic clock afterwards, so they never go backwards. Every call
/// returns a value strictly greater than the previous one, even when two
/// uploads land on the same clock tick.
#[derive(Debug)]
pub struct UploadClock {
    epoch_ns: u64,
    started: Instant,
    last: AtomicU64,
}

impl UploadClock {
    pub fn new() -> Self {
        let epoch_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self {
            epoch_ns,
            started: Instant::now(),
            last: AtomicU64::new(0),
        }
    }

    pub fn now_ns(&self) -> u64 {
        let reading = self
            .epoch_ns
            .saturating_add(self.started.elapsed().as_nanos() as u64);
        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let next = reading.max(previous.saturating_add(1));
            match self.last.compare_exchange_weak(
                previous,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }
}

impl Default for UploadClock {
    fn default() -> Self {
        Self::new()
    }
}
