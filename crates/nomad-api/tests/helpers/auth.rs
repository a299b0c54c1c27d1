use jsonwebtoken::{encode, EncodingKey, Header};
use nomad_api::auth::JwtClaims;

/// Must match the config built by `create_test_config`
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-that-is-at-least-32-chars";

/// `Authorization` header value for `user_id`
pub fn bearer(user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: Some(now),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token");
    format!("Bearer {}", token)
}
