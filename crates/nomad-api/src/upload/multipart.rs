//! Multipart decoding.
//!
//! The `file` part is spooled to a temporary file so form fields may arrive in
//! any order. The spool is removed when the returned [`SpooledFile`] is
//! dropped, which happens on every exit path of a request.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use nomad_core::models::WalletDocumentCreate;
use nomad_core::AppError;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt, ReadBuf};

const FILE_FIELD: &str = "file";
const METADATA_FIELD: &str = "metadata";

/// The uploaded file part, readable from the start
pub struct SpooledFile {
    file: File,
    _spool: TempPath,
    file_name: String,
    content_type: Option<String>,
    size: u64,
}

impl SpooledFile {
    /// Client-supplied file name, unsanitized
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Content type declared in the part header. Advisory only.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Size of the part as received
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl std::fmt::Debug for SpooledFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpooledFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish()
    }
}

impl AsyncRead for SpooledFile {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_read(cx, buf)
    }
}

fn invalid_form(err: MultipartError) -> AppError {
    tracing::debug!(error = %err, status = %err.status(), "Failed to parse multipart form");
    AppError::validation("invalid_form", "failed to parse multipart form")
}

fn invalid_file(err: io::Error) -> AppError {
    tracing::error!(error = %err, "Failed to spool uploaded file");
    AppError::validation("invalid_file", "failed to open uploaded file")
}

async fn spool_field(mut field: Field<'_>, spool_dir: &Path) -> Result<SpooledFile, AppError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);

    let (file, spool) = tempfile::Builder::new()
        .prefix("nomad-upload-")
        .tempfile_in(spool_dir)
        .map_err(invalid_file)?
        .into_parts();
    let mut file = File::from_std(file);

    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(invalid_form)? {
        size += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(invalid_file)?;
    }
    file.flush().await.map_err(invalid_file)?;
    file.seek(SeekFrom::Start(0)).await.map_err(invalid_file)?;

    Ok(SpooledFile {
        file,
        _spool: spool,
        file_name,
        content_type,
        size,
    })
}

struct RawForm {
    file: Option<SpooledFile>,
    metadata: Option<String>,
}

async fn read_form(
    mut multipart: Multipart,
    spool_dir: &Path,
    with_metadata: bool,
) -> Result<RawForm, AppError> {
    let mut form = RawForm {
        file: None,
        metadata: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                if form.file.is_some() {
                    return Err(AppError::validation(
                        "invalid_form",
                        "send exactly one field named 'file'",
                    ));
                }
                form.file = Some(spool_field(field, spool_dir).await?);
            }
            Some(METADATA_FIELD) if with_metadata => {
                form.metadata = Some(field.text().await.map_err(invalid_form)?);
            }
            // Unread fields are skipped by the next `next_field` call.
            _ => {}
        }
    }

    Ok(form)
}

/// Decode a form that carries only a `file` part
pub async fn decode_file_upload(
    multipart: Multipart,
    spool_dir: &Path,
) -> Result<SpooledFile, AppError> {
    read_form(multipart, spool_dir, false)
        .await?
        .file
        .ok_or_else(|| AppError::validation("missing_file", "file field is required"))
}

/// Decode a wallet form: a `file` part and a JSON `metadata` field
pub async fn decode_wallet_upload(
    multipart: Multipart,
    spool_dir: &Path,
) -> Result<(SpooledFile, WalletDocumentCreate), AppError> {
    let form = read_form(multipart, spool_dir, true).await?;

    let file = form
        .file
        .ok_or_else(|| AppError::validation("missing_file", "file field is required"))?;

    // `file` is dropped, and its spool removed, on both early returns below.
    let metadata = match form.metadata {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => {
            return Err(AppError::validation(
                "missing_metadata",
                "metadata field is required (JSON)",
            ))
        }
    };

    let create = serde_json::from_str::<WalletDocumentCreate>(&metadata).map_err(|e| {
        tracing::debug!(error = %e, "Rejected wallet metadata");
        AppError::validation("invalid_metadata", "metadata must be valid JSON")
    })?;

    Ok((file, create))
}
