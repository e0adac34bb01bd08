use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docsmith_common::{CreatePaymentResponse, PaymentOutcome};
use serde::Deserialize;
use serde_json::{json, Value};
use url::{form_urlencoded, Url};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::payments::{CallbackParams, CallbackSource};
use crate::AppState;

/// URL the gateway sends the browser back to, bound to `user_id`.
fn redirection_url(state: &AppState, user_id: &str) -> Result<String> {
    let base = state.config.server.public_base_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{}/payments/callback", base))
        .map_err(|e| AppError::Internal(format!("invalid public_base_url: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("user_id", user_id)
        .append_pair("state", &state.processor.signatures().state_token(user_id));
    Ok(url.into())
}

/// Where the browser lands after a gateway redirect.
fn outcome_location(app_base_url: &str, outcome: &PaymentOutcome) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(outcome.query_pairs())
        .finish();
    format!("{}/create?{}", app_base_url.trim_end_matches('/'), query)
}

/// POST /api/payments/checkout
async fn checkout(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<CreatePaymentResponse>> {
    let redirection_url = redirection_url(&state, &user.id)?;

    tracing::info!(user_id = %user.id, "Starting checkout");
    let payment = state
        .payments
        .create_payment(state.config.payments.amount, &redirection_url)
        .await?;

    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
struct VerifyBody {
    #[serde(default)]
    payment_id: String,
}

/// POST /api/payments/verify
///
/// Success is read from the recorded subscription, never from the client.
async fn verify(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<VerifyBody>,
) -> Result<Json<Value>> {
    let payment_id = body.payment_id.trim();
    if payment_id.is_empty() {
        return Err(AppError::InvalidRequest("Missing payment_id".to_string()));
    }

    match state.store.subscription_by_reference(payment_id).await? {
        Some(subscription) if subscription.user_id == user.id => {
            Ok(Json(json!({ "success": true, "subscription": subscription })))
        }
        _ => {
            tracing::info!(user_id = %user.id, payment_id, "Payment verification failed");
            Ok(Json(json!({ "success": false, "message": "Payment verification failed" })))
        }
    }
}

/// GET /api/payments/history
async fn history(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Value>> {
    let transactions = state.store.transactions_for_user(&user.id).await?;
    Ok(Json(json!({ "transactions": transactions })))
}

async fn redirect(state: &AppState, params: &CallbackParams, source: CallbackSource) -> Response {
    let outcome = state.processor.process(params, source).await;
    let location = outcome_location(&state.config.server.app_base_url, &outcome);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// GET /payments/callback
async fn callback(State(state): State<Arc<AppState>>, Query(params): Query<CallbackParams>) -> Response {
    redirect(&state, &params, CallbackSource::Callback).await
}

/// GET /payments/fallback
async fn fallback(State(state): State<Arc<AppState>>, Query(params): Query<CallbackParams>) -> Response {
    redirect(&state, &params, CallbackSource::Fallback).await
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/payments/checkout", post(checkout))
        .route("/api/payments/verify", post(verify))
        .route("/api/payments/history", get(history))
        .route("/payments/callback", get(callback))
        .route("/payments/fallback", get(fallback))
        .with_state(state)
}
