use crate::auth::models::{CallerIdentity, JwtClaims};
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use nomad_core::AppError;
use std::sync::Arc;

/// HS256 verification settings for bearer tokens
#[derive(Clone)]
pub struct AuthState {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthState {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    fn verify(&self, token: &str) -> Result<CallerIdentity, AppError> {
        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => {
                        AppError::Unauthenticated("Token has expired".to_string())
                    }
                    ErrorKind::ImmatureSignature => {
                        AppError::Unauthenticated("Token is not yet valid (nbf)".to_string())
                    }
                    _ => AppError::Unauthenticated("Invalid authentication token".to_string()),
                }
            })?;

        CallerIdentity::new(token_data.claims.sub)
            .ok_or_else(|| AppError::Unauthenticated("Token has no subject".to_string()))
    }
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    let Some(token) = token else {
        return HttpAppError(AppError::Unauthenticated(
            "Missing or malformed authorization header".to_string(),
        ))
        .into_response();
    };

    match auth_state.verify(token) {
        Ok(identity) => {
            tracing::debug!(user_id = %identity, "Caller authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-jwt-secret-that-is-at-least-32-chars";

    fn token(sub: &str, exp_offset: i64) -> String {
        let claims = JwtClaims {
            sub: sub.to_string(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
            iat: None,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_identity() {
        let state = AuthState::new(SECRET);
        let identity = state.verify(&token("user-1", 3600)).unwrap();
        assert_eq!(identity.as_str(), "user-1");
    }

    #[test]
    fn test_expired_token_rejected() {
        let state = AuthState::new(SECRET);
        match state.verify(&token("user-1", -3600)) {
            Err(AppError::Unauthenticated(msg)) => assert_eq!(msg, "Token has expired"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_wrong_secret_and_empty_subject_rejected() {
        let other = AuthState::new("another-secret-that-is-also-32-chars-long");
        assert!(other.verify(&token("user-1", 3600)).is_err());

        let state = AuthState::new(SECRET);
        assert!(state.verify(&token("", 3600)).is_err());
    }
}
