pub mod client_meta;
pub mod download_token;

pub use client_meta::ClientMeta;
pub use download_token::{SigningKey, TokenError, UrlSigner};
