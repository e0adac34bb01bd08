use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::cookies::{cookie_value, ACCESS_TOKEN_COOKIE};

/// Authenticated user extracted from a hosted-auth access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// User ID (`sub` claim)
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing access token")]
    MissingToken,
    #[error("Invalid Authorization header format")]
    InvalidFormat,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Please enter both email and password")]
    MissingCredentials,
    #[error("Too many sign-in attempts, try again shortly")]
    RateLimited,
    #[error("{0}")]
    Rejected(String),
    #[error("Auth service error: {0}")]
    Upstream(String),
}

/// Access token claims.
#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    exp: u64,
}

/// Verifies access tokens signed by the hosted auth service.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let token_data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(AuthUser {
            id: token_data.claims.sub,
            email: token_data.claims.email,
            role: token_data.claims.role,
        })
    }

    /// Authenticate a request from its Bearer token or session cookie.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = extract_access_token(headers)?;
        self.verify(&token)
    }
}

/// Pull the access token from `Authorization: Bearer`, falling back to the
/// session cookie.
pub fn extract_access_token(headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(value) = headers.get("authorization") {
        let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;
        return value
            .strip_prefix("Bearer ")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidFormat);
    }

    cookie_value(headers, ACCESS_TOKEN_COOKIE).ok_or(AuthError::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, COOKIE};
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-jwt-secret";

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        email: Option<&'a str>,
        role: &'a str,
        aud: &'a str,
        exp: u64,
    }

    fn token(sub: &str, aud: &str, exp_offset: Duration, secret: &str) -> String {
        let claims = TestClaims {
            sub,
            email: Some("user@example.com"),
            role: "authenticated",
            aud,
            exp: (Utc::now() + exp_offset).timestamp() as u64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(SECRET, "authenticated")
    }

    #[test]
    fn test_verify_valid_token() {
        let user = verifier()
            .verify(&token("user-1", "authenticated", Duration::hours(1), SECRET))
            .unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("user@example.com"));
        assert_eq!(user.role.as_deref(), Some("authenticated"));
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let result = verifier().verify(&token("user-1", "authenticated", Duration::hours(-2), SECRET));
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let result = verifier().verify(&token("user-1", "authenticated", Duration::hours(1), "other"));
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_verify_rejects_wrong_audience() {
        let result = verifier().verify(&token("user-1", "anon", Duration::hours(1), SECRET));
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_prefers_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer header-token".parse().unwrap());
        headers.insert(COOKIE, "sb-access-token=cookie-token".parse().unwrap());
        assert_eq!(extract_access_token(&headers).unwrap(), "header-token");
    }

    #[test]
    fn test_extract_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "theme=dark; sb-access-token=cookie-token".parse().unwrap());
        assert_eq!(extract_access_token(&headers).unwrap(), "cookie-token");
    }

    #[test]
    fn test_extract_rejects_basic_auth() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        assert!(matches!(extract_access_token(&headers), Err(AuthError::InvalidFormat)));
    }

    #[test]
    fn test_extract_missing_token() {
        assert!(matches!(extract_access_token(&HeaderMap::new()), Err(AuthError::MissingToken)));
    }

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(AuthError::MissingToken.to_string(), "Missing access token");
        assert_eq!(
            AuthError::MissingCredentials.to_string(),
            "Please enter both email and password"
        );
        assert!(AuthError::InvalidToken("bad".to_string()).to_string().contains("Invalid token"));
    }
}
