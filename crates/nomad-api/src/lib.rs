//! NomadCrew upload API
//!
//! HTTP handlers, middleware and application setup for trip poll images and
//! wallet documents.

pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;
pub mod upload;
pub mod utils;

pub use error::{ErrorResponse, HttpAppError};
pub use state::{AppState, DbState};
