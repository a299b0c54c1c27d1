//! Caller identity and trip membership checks

pub mod membership;
pub mod middleware;
pub mod models;

pub use membership::require_trip_membership;
pub use middleware::{auth_middleware, AuthState};
pub use models::{CallerIdentity, JwtClaims};
