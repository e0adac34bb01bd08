use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::entitlement::Entitlement;
use crate::error::Result;
use crate::AppState;

/// GET /api/me - current user and what they may do
async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Value>> {
    let record = state.store.user_subscription(&user.id).await?;
    let entitlement = Entitlement::evaluate(record.as_ref(), Utc::now());

    Ok(Json(json!({
        "user": { "id": user.id, "email": user.email, "role": user.role },
        "entitlement": entitlement.status(record.as_ref()),
    })))
}

/// POST /api/usage - mark the caller's free trial as used
async fn record_usage(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Value>> {
    let update = state.store.mark_trial_used(&user.id).await?;
    tracing::info!(user_id = %user.id, result = ?update, "Trial usage recorded");

    Ok(Json(json!({
        "success": true,
        "result": update,
        "message": update.message(),
    })))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/usage", post(record_usage))
        .with_state(state)
}
