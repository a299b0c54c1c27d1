//! Wallet document metadata validation
//!
//! Metadata is a free-form JSON object whose keys are restricted per document
//! type. Unknown keys are dropped silently; oversized payloads are rejected.

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::DocumentType;

/// Maximum JSON-encoded size of a document's metadata
pub const MAX_METADATA_SIZE: usize = 64 * 1024;

/// Keep only the keys allowed for `document_type`.
pub fn sanitize_metadata(document_type: DocumentType, metadata: Map<String, Value>) -> Value {
    let allowed = document_type.allowed_metadata_keys();
    let kept: Map<String, Value> = metadata
        .into_iter()
        .filter(|(key, _)| allowed.contains(&key.as_str()))
        .collect();
    Value::Object(kept)
}

/// Reject metadata whose JSON encoding exceeds [`MAX_METADATA_SIZE`].
pub fn validate_metadata_size(metadata: &Value) -> Result<(), AppError> {
    let encoded = serde_json::to_vec(metadata)
        .map_err(|e| AppError::validation("invalid_metadata", format!("Invalid metadata: {}", e)))?;
    if encoded.len() > MAX_METADATA_SIZE {
        return Err(AppError::validation(
            "metadata_too_large",
            format!(
                "Metadata exceeds maximum size of {} bytes",
                MAX_METADATA_SIZE
            ),
        ));
    }
    Ok(())
}
