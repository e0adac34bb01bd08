//! HTTP-facing error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::AuthError;
use crate::documents::DocumentError;
use crate::payments::PaymentError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    SubscriptionRequired(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Auth(AuthError::MissingCredentials) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::Auth(AuthError::RateLimited) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            AppError::Auth(AuthError::Rejected(_)) => (StatusCode::BAD_REQUEST, "auth_rejected"),
            AppError::Auth(AuthError::Upstream(_)) => (StatusCode::BAD_GATEWAY, "auth_unavailable"),
            AppError::Auth(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::SubscriptionRequired(_) => (StatusCode::PAYMENT_REQUIRED, "subscription_required"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "generation_in_progress"),
            AppError::Document(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            AppError::Payment(_) => (StatusCode::BAD_GATEWAY, "payment_failed"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();

        if status.is_server_error() {
            tracing::error!(error_type, "{}", self);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_subscription_required_is_402() {
        let (status, body) = body_json(AppError::SubscriptionRequired("Subscribe to continue".to_string())).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"]["type"], "subscription_required");
        assert_eq!(body["error"]["message"], "Subscribe to continue");
    }

    #[tokio::test]
    async fn test_auth_errors_map_by_kind() {
        let (status, _) = body_json(AuthError::MissingToken.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = body_json(AuthError::MissingCredentials.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Please enter both email and password");

        let (status, _) = body_json(AuthError::RateLimited.into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_store_error_is_500() {
        let (status, body) = body_json(StoreError::DatabaseError("locked".to_string()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["type"], "storage_error");
    }
}
