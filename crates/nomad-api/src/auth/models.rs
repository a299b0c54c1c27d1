use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use nomad_core::AppError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// JWT claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Authenticated user id, placed in request extensions by the auth middleware.
///
/// Upload handlers only use it as a lookup key and a path segment. It is never
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn new(user_id: impl Into<String>) -> Option<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return None;
        }
        Some(Self(user_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CallerIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

// Read from parts so it composes with body extractors such as Multipart.
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthenticated(
                    "user not authenticated".to_string(),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_blank_identity_rejected() {
        assert!(CallerIdentity::new("").is_none());
        assert!(CallerIdentity::new("   ").is_none());
        assert_eq!(CallerIdentity::new("user-1").unwrap().as_str(), "user-1");
    }

    #[tokio::test]
    async fn test_extractor_requires_extension() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let err = CallerIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err.0, AppError::Unauthenticated(_)));

        parts
            .extensions
            .insert(CallerIdentity::new("user-1").unwrap());
        let identity = CallerIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(identity.as_str(), "user-1");
    }
}
