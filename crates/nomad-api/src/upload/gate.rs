//! Request gate: checks that run before any of the body is read.

use axum::extract::DefaultBodyLimit;
use nomad_core::validation::parse_uuid;
use nomad_core::AppError;
use uuid::Uuid;

use crate::state::UploadPolicy;

/// Trip id route parameter in canonical UUID form
pub fn parse_trip_id(raw: &str) -> Result<Uuid, AppError> {
    parse_uuid(raw, "trip ID")
}

/// Body cap layer for an upload route. Reads past the cap fail inside
/// multipart parsing and surface as `invalid_form`.
pub fn body_limit(policy: &UploadPolicy) -> DefaultBodyLimit {
    DefaultBodyLimit::max(policy.body_limit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_id_must_be_canonical() {
        assert!(parse_trip_id("6f1c2e2a-3b4d-4c5e-8f60-718293a4b5c6").is_ok());
        for raw in ["", "not-a-uuid", "6f1c2e2a3b4d4c5e8f60718293a4b5c6"] {
            match parse_trip_id(raw) {
                Err(AppError::Validation { code, .. }) => assert_eq!(code, "validation_failed"),
                other => panic!("unexpected result for {:?}: {:?}", raw, other),
            }
        }
    }
}
