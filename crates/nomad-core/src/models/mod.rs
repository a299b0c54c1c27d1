//! Data models for the upload pipeline
//!
//! Wallet documents (personal and trip-group) and poll-option images.

mod poll_image;
mod wallet;

pub use poll_image::*;
pub use wallet::*;
