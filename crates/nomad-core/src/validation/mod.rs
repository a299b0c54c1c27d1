//! Validation modules

pub mod metadata;

use uuid::Uuid;

use crate::error::AppError;

pub use metadata::{sanitize_metadata, validate_metadata_size, MAX_METADATA_SIZE};

/// Parse a route parameter that must be a canonical hyphenated UUID.
pub fn parse_uuid(value: &str, field: &str) -> Result<Uuid, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(
            "validation_failed",
            format!("{} is required", field),
        ));
    }
    if value.len() != 36 {
        return Err(AppError::validation(
            "validation_failed",
            format!("Invalid {} format", field),
        ));
    }
    Uuid::parse_str(value).map_err(|_| {
        AppError::validation("validation_failed", format!("Invalid {} format", field))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid_accepts_canonical_form() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string(), "trip ID").unwrap(), id);
    }

    #[test]
    fn test_parse_uuid_rejects_other_forms() {
        assert!(parse_uuid("", "trip ID").is_err());
        assert!(parse_uuid("not-a-uuid", "trip ID").is_err());
        // simple (unhyphenated) form is not canonical
        assert!(parse_uuid(&Uuid::new_v4().simple().to_string(), "trip ID").is_err());
    }
}
