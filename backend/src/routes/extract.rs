//! Request extractors shared by the API routes.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::AppState;

/// Runs before any body extractor, so a request without a valid session is
/// answered 401 whatever its body holds.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        Ok(state.verifier.authenticate(&parts.headers)?)
    }
}
