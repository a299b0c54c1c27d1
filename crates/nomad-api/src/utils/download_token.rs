//! Signed download tokens.
//!
//! Layout before encoding:
//! issued_at (u64 BE, unix seconds) || validity (u64 BE, seconds) || path (UTF-8) || HMAC-SHA256.
//! The tag covers everything before it. Token = base64url without padding.
//!
//! Nothing is stored server-side; a token is valid for as long as the key that
//! signed it is loaded.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use hmac::{Hmac, Mac};
use nomad_core::config::MIN_SECRET_LEN;
use nomad_core::AppError;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::constants::API_PREFIX;

type HmacSha256 = Hmac<Sha256>;

const HEADER_LEN: usize = 8 + 8;
const MAC_LEN: usize = 32;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed download token")]
    Malformed,
    #[error("download token signature mismatch")]
    BadSignature,
    #[error("download token expired")]
    Expired,
}

/// Every verification failure looks the same to the client.
impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        tracing::debug!(reason = %err, "Download token rejected");
        AppError::Unauthenticated("Invalid or expired download link".to_string())
    }
}

/// Process-wide HMAC key. Never printed, never serialized.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, AppError> {
        let key = key.into();
        if key.len() < MIN_SECRET_LEN {
            return Err(AppError::Internal(format!(
                "signing key must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self(key))
    }

    fn tag(&self, message: &[u8]) -> Result<Vec<u8>, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.0)
            .map_err(|e| AppError::Internal(format!("invalid HMAC key: {}", e)))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Issues and verifies download tokens and the URLs that carry them
#[derive(Debug, Clone)]
pub struct UrlSigner {
    key: SigningKey,
    base_url: String,
}

impl UrlSigner {
    /// `base_url` is prepended to issued URLs; empty yields relative URLs.
    pub fn new(key: SigningKey, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { key, base_url }
    }

    pub fn issue_token(&self, path: &str, validity: Duration) -> Result<String, AppError> {
        self.issue_token_at(path, unix_now(), validity)
    }

    fn issue_token_at(
        &self,
        path: &str,
        issued_at: u64,
        validity: Duration,
    ) -> Result<String, AppError> {
        let mut token = Vec::with_capacity(HEADER_LEN + path.len() + MAC_LEN);
        token.extend_from_slice(&issued_at.to_be_bytes());
        token.extend_from_slice(&validity.as_secs().to_be_bytes());
        token.extend_from_slice(path.as_bytes());

        let tag = self.key.tag(&token)?;
        token.extend_from_slice(&tag);

        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token))
    }

    /// Download URL for `path`, valid for `validity`
    pub fn issue_url(&self, path: &str, validity: Duration) -> Result<String, AppError> {
        let token = self.issue_token(path, validity)?;
        Ok(format!(
            "{}{}/wallet/files/{}",
            self.base_url, API_PREFIX, token
        ))
    }

    /// Storage path bound into `token`, if the signature holds and the
    /// validity window has not passed.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        self.verify_at(token, unix_now())
    }

    fn verify_at(&self, token: &str, now: u64) -> Result<String, TokenError> {
        let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| TokenError::Malformed)?;
        if raw.len() <= HEADER_LEN + MAC_LEN {
            return Err(TokenError::Malformed);
        }

        let (message, tag) = raw.split_at(raw.len() - MAC_LEN);
        let expected = self.key.tag(message).map_err(|_| TokenError::BadSignature)?;
        if !bool::from(expected.as_slice().ct_eq(tag)) {
            return Err(TokenError::BadSignature);
        }

        let (header, path) = message.split_at(HEADER_LEN);
        let (issued_at, validity) = header.split_at(8);
        let issued_at = u64::from_be_bytes(issued_at.try_into().map_err(|_| TokenError::Malformed)?);
        let validity = u64::from_be_bytes(validity.try_into().map_err(|_| TokenError::Malformed)?);

        let expires_at = issued_at.checked_add(validity).ok_or(TokenError::Malformed)?;
        if now >= expires_at {
            return Err(TokenError::Expired);
        }

        String::from_utf8(path.to_vec()).map_err(|_| TokenError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const PATH: &str = "wallet/personal/user-1/1700000000000000000_passport.pdf";

    fn signer(key: &str) -> UrlSigner {
        UrlSigner::new(SigningKey::new(key.repeat(32)).unwrap(), "")
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(SigningKey::new("too-short").is_err());
    }

    #[test]
    fn test_key_is_redacted() {
        let key = SigningKey::new("s".repeat(32)).unwrap();
        assert_eq!(format!("{:?}", key), "SigningKey(<redacted>)");
    }

    #[test]
    fn test_issue_then_verify() {
        let signer = signer("a");
        let token = signer.issue_token(PATH, Duration::from_secs(900)).unwrap();
        assert_eq!(signer.verify(&token).unwrap(), PATH);
        assert!(!token.contains('/'));
        assert!(!token.contains("passport"));
    }

    #[test]
    fn test_url_shape() {
        let signer = UrlSigner::new(
            SigningKey::new("k".repeat(32)).unwrap(),
            "https://api.example.com/",
        );
        let url = signer.issue_url(PATH, Duration::from_secs(60)).unwrap();
        assert!(url.starts_with("https://api.example.com/v1/wallet/files/"));
    }

    #[test]
    fn test_expired_token() {
        let signer = signer("a");
        let token = signer
            .issue_token_at(PATH, 1_000, Duration::from_secs(60))
            .unwrap();
        assert_eq!(signer.verify_at(&token, 1_059).unwrap(), PATH);
        assert_eq!(signer.verify_at(&token, 1_060), Err(TokenError::Expired));
    }

    #[test]
    fn test_other_key_rejected() {
        let token = signer("a").issue_token(PATH, Duration::from_secs(60)).unwrap();
        assert_eq!(signer("b").verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_path_rejected() {
        let signer = signer("a");
        let token = signer.issue_token(PATH, Duration::from_secs(60)).unwrap();
        let mut raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(&token)
            .unwrap();
        raw[HEADER_LEN] ^= 0x01;
        let tampered = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw);
        assert_eq!(signer.verify(&tampered), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_extended_validity_rejected() {
        let signer = signer("a");
        let token = signer
            .issue_token_at(PATH, 1_000, Duration::from_secs(60))
            .unwrap();
        let mut raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(&token)
            .unwrap();
        raw[8..16].copy_from_slice(&u64::MAX.to_be_bytes());
        let tampered = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw);
        assert_eq!(signer.verify_at(&tampered, 2_000), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = signer("a");
        assert_eq!(signer.verify("not base64 !"), Err(TokenError::Malformed));
        assert_eq!(signer.verify("AAAA"), Err(TokenError::Malformed));
        assert_eq!(signer.verify(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_token_errors_are_opaque() {
        for err in [TokenError::Malformed, TokenError::BadSignature, TokenError::Expired] {
            match AppError::from(err) {
                AppError::Unauthenticated(message) => {
                    assert_eq!(message, "Invalid or expired download link")
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    /// Tags that differ in their first byte and in their last byte must take
    /// the same time to reject. Ignored by default since wall-clock timing is
    /// noisy on shared machines; run with `cargo test -- --ignored`.
    #[test]
    #[ignore]
    fn test_tag_mismatch_timing_does_not_depend_on_position() {
        let signer = signer("a");
        let token = signer.issue_token(PATH, Duration::from_secs(900)).unwrap();
        let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(&token)
            .unwrap();
        let flip = |index: usize| {
            let mut raw = raw.clone();
            raw[index] ^= 0x01;
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw)
        };
        let first_byte = flip(raw.len() - MAC_LEN);
        let last_byte = flip(raw.len() - 1);

        let median_ns = |token: &str| {
            let mut samples: Vec<u128> = (0..2_000)
                .map(|_| {
                    let start = std::time::Instant::now();
                    let result = std::hint::black_box(signer.verify(token));
                    let elapsed = start.elapsed().as_nanos();
                    assert_eq!(result, Err(TokenError::BadSignature));
                    elapsed
                })
                .collect();
            samples.sort_unstable();
            samples[samples.len() / 2]
        };

        // Alternate rounds so drift in machine load hits both sides
        let (mut first_total, mut last_total) = (0u128, 0u128);
        for _ in 0..5 {
            first_total += median_ns(&first_byte);
            last_total += median_ns(&last_byte);
        }

        let ratio = first_total as f64 / last_total.max(1) as f64;
        assert!(
            (0.8..1.25).contains(&ratio),
            "first-byte/last-byte rejection time ratio {:.3}",
            ratio
        );
    }

    #[test]
    fn test_parallel_issuance_does_not_interfere() {
        let signer = Arc::new(signer("a"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let signer = signer.clone();
                std::thread::spawn(move || {
                    (0..200)
                        .map(|j| {
                            let path = format!("poll-images/trip/user-{}/{}_img.jpg", i, j);
                            let token = signer.issue_token(&path, Duration::from_secs(60)).unwrap();
                            (path, token)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for (path, token) in handle.join().unwrap() {
                assert_eq!(signer.verify(&token).unwrap(), path);
            }
        }
    }
}
