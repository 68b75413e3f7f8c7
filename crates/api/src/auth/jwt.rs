//! Bearer token validation.
//!
//! Tokens are issued by the hosted auth platform and signed HS256 with a
//! shared secret. The `sub` claim is the platform's stable user id; this
//! service never issues tokens itself.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims read from a hosted-auth access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the auth platform's user id.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

/// Configuration for validating hosted-auth tokens.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC-SHA256 secret shared with the auth platform.
    pub secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig").field("secret", &"<redacted>").finish()
    }
}

impl AuthConfig {
    /// Load from the environment.
    ///
    /// | Env Var           | Required | Default |
    /// |-------------------|----------|---------|
    /// | `AUTH_JWT_SECRET` | **yes**  | --      |
    ///
    /// # Panics
    ///
    /// Panics if `AUTH_JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret = std::env::var("AUTH_JWT_SECRET")
            .expect("AUTH_JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "AUTH_JWT_SECRET must not be empty");
        Self { secret }
    }
}

/// Validate and decode a bearer token, returning its [`Claims`].
///
/// Checks the HS256 signature and expiry; an empty subject is rejected.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    if data.claims.sub.trim().is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            secret: "test-secret".into(),
        }
    }

    fn token(sub: &str, exp_offset: i64, secret: &str) -> String {
        let claims = Claims {
            sub: sub.into(),
            email: Some("roastee@example.com".into()),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_claims() {
        let claims = validate_token(&token("user_abc", 600, "test-secret"), &config()).unwrap();
        assert_eq!(claims.sub, "user_abc");
        assert_eq!(claims.email.as_deref(), Some("roastee@example.com"));
    }

    #[test]
    fn wrong_secret_and_expired_tokens_are_rejected() {
        assert!(validate_token(&token("user_abc", 600, "other"), &config()).is_err());
        assert!(validate_token(&token("user_abc", -600, "test-secret"), &config()).is_err());
    }

    #[test]
    fn empty_subject_is_rejected() {
        assert!(validate_token(&token(" ", 600, "test-secret"), &config()).is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        assert!(!format!("{:?}", config()).contains("test-secret"));
    }
}
