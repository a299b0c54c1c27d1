//! NomadCrew Storage Library
//!
//! Storage abstraction for uploaded wallet documents and poll images, with
//! local filesystem and S3-compatible implementations.
//!
//! # Storage path format
//!
//! - **Wallet documents**: `wallet/{wallet_type}/{owner_id}/{timestamp_ns}_{filename}`
//! - **Poll images**: `poll-images/{trip_id}/{user_id}/{timestamp_ns}_{filename}`
//!
//! Paths must not contain `.` or `..` segments, empty segments or a leading `/`.
//! Path generation is centralized in the `keys` module so all backends stay
//! consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{poll_image_path, sanitize_filename, wallet_document_path, UploadClock};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use nomad_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
