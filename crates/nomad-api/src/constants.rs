//! API constants

use std::time::Duration;

/// API version prefix shared by every route
pub const API_PREFIX: &str = "/v1";

/// Allowance for multipart framing and small form fields on top of a file cap
pub const FORM_FIELD_SLACK: u64 = 1024 * 1024;

/// Number of leading bytes inspected to detect a file's MIME type
pub const SNIFF_LEN: usize = 512;

/// Types accepted for poll-option images
pub const POLL_IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/heic",
    "image/heif",
    "image/webp",
];

/// MIME type reported when the prefix matches no known signature
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Bound on the detached audit log insert
pub const AUDIT_LOG_TIMEOUT: Duration = Duration::from_secs(5);
