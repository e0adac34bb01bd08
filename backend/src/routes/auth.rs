use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{extract_access_token, AuthError, SignUpOutcome};
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl Credentials {
    fn validated(&self) -> std::result::Result<(&str, &str), AuthError> {
        let email = self.email.trim();
        if email.is_empty() || self.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        Ok((email, &self.password))
    }
}

/// POST /auth/signup
async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Response> {
    let (email, password) = credentials.validated()?;

    match state.auth_client.sign_up(email, password).await? {
        SignUpOutcome::SignedIn(session) => {
            tracing::info!("Signed up {}", session.user.id);
            let mut headers = HeaderMap::new();
            state.cookies.write_session(
                &mut headers,
                &session.access_token,
                &session.refresh_token,
                session.expires_in,
            );
            let body = json!({ "user": session.user, "confirmation_required": false });
            Ok((StatusCode::CREATED, headers, Json(body)).into_response())
        }
        SignUpOutcome::ConfirmationSent(user) => {
            tracing::info!("Signed up {}, awaiting email confirmation", user.id);
            let body = json!({
                "user": user,
                "confirmation_required": true,
                "message": "Check your email for the confirmation link",
            });
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
    }
}

/// POST /auth/signin
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Response> {
    let (email, password) = credentials.validated()?;

    if state.signin_limiter.check_key(&email.to_lowercase()).is_err() {
        tracing::warn!("Sign-in rate limit hit for {}", email);
        return Err(AuthError::RateLimited.into());
    }

    let session = state.auth_client.sign_in_with_password(email, password).await?;
    tracing::info!("Signed in {}", session.user.id);

    let mut headers = HeaderMap::new();
    state.cookies.write_session(
        &mut headers,
        &session.access_token,
        &session.refresh_token,
        session.expires_in,
    );
    Ok((headers, Json(json!({ "user": session.user }))).into_response())
}

/// POST /auth/signout
///
/// Always clears the cookies, even when the token can no longer be revoked.
async fn sign_out(State(state): State<Arc<AppState>>, request_headers: HeaderMap) -> Response {
    if let Ok(token) = extract_access_token(&request_headers) {
        if let Err(e) = state.auth_client.sign_out(&token).await {
            tracing::warn!("Failed to revoke session: {}", e);
        }
    }

    let mut headers = HeaderMap::new();
    state.cookies.clear_session(&mut headers);
    headers.insert(header::LOCATION, HeaderValue::from_static("/"));
    (StatusCode::SEE_OTHER, headers).into_response()
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .with_state(state)
}
