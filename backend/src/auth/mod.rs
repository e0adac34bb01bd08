mod client;
pub mod cookies;
mod jwt;

pub use client::{AccountUser, AuthClient, Session, SignUpOutcome};
pub use cookies::CookieJar;
pub use jwt::{extract_access_token, AuthError, AuthUser, JwtVerifier};
