//! Download route: streams a stored file identified by a signed token.
//! The token is the only credential; no session is required.

use crate::error::HttpAppError;
use crate::state::AppState;
use crate::upload::sniff::sniff_stream;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use nomad_core::AppError;
use nomad_storage::keys::{file_name, validate_path, POLL_IMAGE_PREFIX, WALLET_PREFIX};
use nomad_storage::ByteStream;
use std::sync::Arc;

fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Open the object behind a verified path and resolve its content type.
async fn open_object(state: &AppState, path: &str) -> Result<(String, ByteStream), AppError> {
    let storage = &state.uploads.storage;

    if is_under(path, WALLET_PREFIX) {
        let document = state
            .db
            .documents
            .get_document_by_file_path(path)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("document has been deleted or does not exist".to_string())
            })?;
        let body = storage.open(path).await?;
        return Ok((document.mime_type, body));
    }

    if is_under(path, POLL_IMAGE_PREFIX) {
        let body = storage.open(path).await?;
        let (mime_type, body) = sniff_stream(body).await?;
        return Ok((mime_type.to_string(), body));
    }

    Err(AppError::NotFound("File not found".to_string()))
}

/// Serve a file by signed token
#[tracing::instrument(
    skip(state, token),
    fields(operation = "serve_file", storage_path = tracing::field::Empty)
)]
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Response, HttpAppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(HttpAppError::from(AppError::validation(
            "missing_token",
            "download token is required",
        )));
    }

    let path = state.url_signer.verify(token).map_err(AppError::from)?;
    validate_path(&path).map_err(|_| AppError::NotFound("File not found".to_string()))?;
    tracing::Span::current().record("storage_path", path.as_str());

    let (mime_type, stream) = open_object(&state, &path).await?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name(&path)),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    tracing::debug!(mime_type = %mime_type, "Serving stored file");
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_match_is_segment_aware() {
        assert!(is_under("wallet/personal/u/1_a.pdf", WALLET_PREFIX));
        assert!(is_under("poll-images/t/u/1_a.png", POLL_IMAGE_PREFIX));
        assert!(!is_under("wallets/personal/u/1_a.pdf", WALLET_PREFIX));
        assert!(!is_under("wallet", WALLET_PREFIX));
    }
}
