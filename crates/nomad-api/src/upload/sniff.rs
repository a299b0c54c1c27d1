//! Content sniffing and MIME allow-lists.
//!
//! The declared `Content-Type` of a part is never trusted. The first
//! [`SNIFF_LEN`] bytes are read, matched against known signatures, and handed
//! back in front of the rest of the stream so nothing has to seek.

use crate::constants::{FALLBACK_MIME_TYPE, SNIFF_LEN};
use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};
use nomad_core::AppError;
use nomad_storage::ByteStream;
use std::collections::BTreeSet;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// MIME type of `prefix` by magic number
pub fn detect_mime(prefix: &[u8]) -> &'static str {
    infer::get(prefix)
        .map(|kind| kind.mime_type())
        .unwrap_or(FALLBACK_MIME_TYPE)
}

/// Set of MIME types an endpoint accepts
#[derive(Debug, Clone)]
pub struct MimePolicy {
    allowed: Arc<BTreeSet<String>>,
}

impl MimePolicy {
    pub fn new<'a>(allowed: impl IntoIterator<Item = &'a str>) -> Self {
        let allowed = allowed
            .into_iter()
            .map(|mime| mime.trim().to_lowercase())
            .filter(|mime| !mime.is_empty())
            .collect();
        Self {
            allowed: Arc::new(allowed),
        }
    }

    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed.contains(mime_type)
    }

    pub fn check(&self, mime_type: &str) -> Result<(), AppError> {
        if self.allows(mime_type) {
            return Ok(());
        }
        Err(AppError::validation(
            "invalid_mime_type",
            format!(
                "MIME type {} is not allowed. Allowed: {}",
                mime_type,
                self.allowed.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
        ))
    }
}

/// Reader that replays a sniffed prefix before the rest of `inner`
pub struct SniffedReader<R> {
    prefix: Vec<u8>,
    position: usize,
    mime_type: &'static str,
    inner: R,
}

impl<R: AsyncRead + Unpin> SniffedReader<R> {
    /// Read up to [`SNIFF_LEN`] bytes from `inner` and detect their type.
    /// A stream shorter than that is sniffed on whatever it holds.
    pub async fn new(mut inner: R) -> io::Result<Self> {
        let mut prefix = vec![0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < SNIFF_LEN {
            let n = inner.read(&mut prefix[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        prefix.truncate(filled);

        let mime_type = detect_mime(&prefix);
        Ok(Self {
            prefix,
            position: 0,
            mime_type,
            inner,
        })
    }
}

impl<R> SniffedReader<R> {
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for SniffedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.position < this.prefix.len() {
            let remaining = &this.prefix[this.position..];
            let n = remaining.len().min(buf.remaining());
            buf.put_slice(&remaining[..n]);
            this.position += n;
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

/// Sniff `reader` and enforce `policy` on the detected type.
pub async fn sniff_upload<R: AsyncRead + Unpin>(
    reader: R,
    policy: &MimePolicy,
) -> Result<SniffedReader<R>, AppError> {
    let sniffed = SniffedReader::new(reader).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to read file header");
        AppError::Internal(format!("failed to read file header: {}", e))
    })?;

    tracing::debug!(
        mime_type = sniffed.mime_type(),
        prefix_len = sniffed.prefix().len(),
        "Detected upload content type"
    );
    policy.check(sniffed.mime_type())?;
    Ok(sniffed)
}

/// Sniff the head of a stored object. Chunks consumed while sniffing are
/// replayed in front of the returned stream.
pub async fn sniff_stream(mut body: ByteStream) -> Result<(&'static str, ByteStream), AppError> {
    let mut prefix = BytesMut::with_capacity(SNIFF_LEN);
    let mut consumed: Vec<Bytes> = Vec::new();

    while prefix.len() < SNIFF_LEN {
        match body.next().await {
            Some(chunk) => {
                let chunk = chunk?;
                prefix.extend_from_slice(&chunk);
                consumed.push(chunk);
            }
            None => break,
        }
    }

    let mime_type = detect_mime(&prefix);
    let replay: ByteStream = Box::pin(stream::iter(consumed.into_iter().map(Ok)).chain(body));
    Ok((mime_type, replay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::POLL_IMAGE_MIME_TYPES;
    use nomad_storage::StorageError;
    use std::io::Cursor;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn poll_policy() -> MimePolicy {
        MimePolicy::new(POLL_IMAGE_MIME_TYPES.iter().copied())
    }

    /// Reader that hands out at most one byte per read
    struct Trickle(Cursor<Vec<u8>>);

    impl AsyncRead for Trickle {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let mut one = [0u8; 1];
            let mut small = ReadBuf::new(&mut one);
            match Pin::new(&mut self.0).poll_read(cx, &mut small) {
                Poll::Ready(Ok(())) => {
                    buf.put_slice(small.filled());
                    Poll::Ready(Ok(()))
                }
                other => other,
            }
        }
    }

    #[test]
    fn test_detect_mime() {
        assert_eq!(detect_mime(JPEG), "image/jpeg");
        assert_eq!(detect_mime(PNG), "image/png");
        assert_eq!(detect_mime(b"%PDF-1.4\n"), "application/pdf");
        assert_eq!(detect_mime(b""), FALLBACK_MIME_TYPE);
        assert_eq!(detect_mime(b"plain words"), FALLBACK_MIME_TYPE);
    }

    #[test]
    fn test_policy_is_data() {
        let policy = MimePolicy::new([" Application/PDF ", "image/png", ""]);
        assert!(policy.allows("application/pdf"));
        assert!(policy.allows("image/png"));
        assert!(!policy.allows("image/jpeg"));
    }

    #[test]
    fn test_rejection_names_detected_type() {
        match poll_policy().check("application/pdf") {
            Err(AppError::Validation { code, message }) => {
                assert_eq!(code, "invalid_mime_type");
                assert!(message.contains("application/pdf"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prefix_is_replayed() {
        let mut body = JPEG.to_vec();
        body.extend(std::iter::repeat(7u8).take(2000));

        let mut reader = sniff_upload(Cursor::new(body.clone()), &poll_policy())
            .await
            .unwrap();
        assert_eq!(reader.mime_type(), "image/jpeg");
        assert_eq!(reader.prefix().len(), SNIFF_LEN);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, body);
    }

    #[tokio::test]
    async fn test_short_reads_are_not_errors() {
        let mut reader = SniffedReader::new(Trickle(Cursor::new(JPEG.to_vec())))
            .await
            .unwrap();
        assert_eq!(reader.prefix(), JPEG);
        assert_eq!(reader.mime_type(), "image/jpeg");

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, JPEG);
    }

    #[tokio::test]
    async fn test_disallowed_bytes_rejected_whatever_the_name() {
        let err = sniff_upload(Cursor::new(b"%PDF-1.4 fake.jpg".to_vec()), &poll_policy())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation { code: "invalid_mime_type", .. }));
    }

    #[tokio::test]
    async fn test_sniff_stream_replays_chunks() {
        let chunks: Vec<Result<Bytes, StorageError>> = vec![
            Ok(Bytes::from_static(&PNG[..4])),
            Ok(Bytes::from_static(&PNG[4..])),
            Ok(Bytes::from_static(b"tail")),
        ];
        let (mime, body) = sniff_stream(Box::pin(stream::iter(chunks))).await.unwrap();
        assert_eq!(mime, "image/png");

        let collected: Vec<u8> = body
            .map(|chunk| chunk.unwrap().to_vec())
            .concat()
            .await;
        let mut expected = PNG.to_vec();
        expected.extend_from_slice(b"tail");
        assert_eq!(collected, expected);
    }
}
