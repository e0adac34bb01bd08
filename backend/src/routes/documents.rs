use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use docsmith_common::{EntitlementKind, EntitlementStatus, GenerateDocumentRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::entitlement::Entitlement;
use crate::error::{AppError, Result};
use crate::models::DocumentUsage;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct CreateDocumentBody {
    #[serde(default)]
    topic: String,
    #[serde(default)]
    num_pages: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CreateDocumentResponse {
    download_url: String,
    filename: String,
    entitlement: EntitlementStatus,
}

async fn current_entitlement(state: &AppState, user: &AuthUser) -> Result<Entitlement> {
    let record = state.store.user_subscription(&user.id).await?;
    Ok(Entitlement::evaluate(record.as_ref(), Utc::now()))
}

fn blocked(entitlement: &Entitlement) -> AppError {
    let message = match entitlement.kind() {
        EntitlementKind::Expired => "Your subscription has expired. Renew to keep generating documents",
        _ => "You have used your free document. Subscribe to generate more",
    };
    AppError::SubscriptionRequired(message.to_string())
}

/// POST /api/documents - gate, generate, then consume the trial
async fn create_document(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CreateDocumentBody>,
) -> Result<Json<CreateDocumentResponse>> {
    let settings = &state.config.documents;

    let topic = body.topic.trim();
    if topic.is_empty() {
        return Err(AppError::InvalidRequest("Please enter a topic".to_string()));
    }
    let num_pages = body.num_pages.unwrap_or(settings.default_pages);
    if num_pages == 0 || num_pages > settings.max_pages {
        return Err(AppError::InvalidRequest(format!(
            "num_pages must be between 1 and {}",
            settings.max_pages
        )));
    }

    let mut entitlement = current_entitlement(&state, &user).await?;
    if !entitlement.can_generate() {
        return Err(blocked(&entitlement));
    }

    // Trial generations hold the user's slot until the flag is written.
    let _slot = if entitlement.consumes_trial() {
        let slot = state
            .slots
            .claim(&user.id)
            .ok_or_else(|| AppError::Conflict("A document is already being generated".to_string()))?;
        // a generation may have finished between the first read and the claim
        entitlement = current_entitlement(&state, &user).await?;
        if !entitlement.can_generate() {
            return Err(blocked(&entitlement));
        }
        Some(slot)
    } else {
        None
    };

    tracing::info!(user_id = %user.id, num_pages, entitlement = ?entitlement.kind(), "Generating document");

    let request = GenerateDocumentRequest {
        topic: topic.to_string(),
        num_pages,
    };
    let document = match state.documents.generate(&request).await {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(user_id = %user.id, "Document generation failed: {}", e);
            if entitlement.consumes_trial() && settings.consume_trial_on_failure {
                if let Err(store_err) = state.store.mark_trial_used(&user.id).await {
                    tracing::error!("Error updating document usage: {}", store_err);
                }
            }
            return Err(e.into());
        }
    };

    if entitlement.consumes_trial() {
        let update = state.store.mark_trial_used(&user.id).await?;
        tracing::info!(user_id = %user.id, "{}", update.message());
    }

    let usage = DocumentUsage::new(&user.id, topic, num_pages, &document.filename, &document.download_url);
    if let Err(e) = state.store.record_document(&usage).await {
        tracing::warn!("Error recording document usage: {}", e);
    }

    let record = state.store.user_subscription(&user.id).await?;
    let entitlement = Entitlement::evaluate(record.as_ref(), Utc::now()).status(record.as_ref());

    Ok(Json(CreateDocumentResponse {
        download_url: document.download_url,
        filename: document.filename,
        entitlement,
    }))
}

/// GET /api/documents - the caller's recent documents
async fn list_documents(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Value>> {
    let documents = state
        .store
        .documents_for_user(&user.id, state.config.documents.history_limit)
        .await?;

    Ok(Json(json!({ "documents": documents })))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/documents", post(create_document).get(list_documents))
        .with_state(state)
}
