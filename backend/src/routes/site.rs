//! Site pages. Guarded pages redirect instead of rendering for the wrong audience.
//!
//! Pages live at the top of `static_dir` and are only reachable through their
//! routes. Only `static_dir/assets` is served as files.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

use crate::AppState;

async fn page(state: &AppState, name: &str) -> Response {
    let path = Path::new(&state.config.server.static_dir).join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to read page {}: {}", path.display(), e);
            (StatusCode::NOT_FOUND, "Page not found").into_response()
        }
    }
}

fn signed_in(state: &AppState, headers: &HeaderMap) -> bool {
    state.verifier.authenticate(headers).is_ok()
}

async fn index(State(state): State<Arc<AppState>>) -> Response {
    page(&state, "index.html").await
}

async fn auth_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if signed_in(&state, &headers) {
        return Redirect::to("/create").into_response();
    }
    page(&state, "auth.html").await
}

async fn create_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !signed_in(&state, &headers) {
        return Redirect::to("/auth").into_response();
    }
    page(&state, "create.html").await
}

async fn dashboard_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !signed_in(&state, &headers) {
        return Redirect::to("/auth").into_response();
    }
    page(&state, "dashboard.html").await
}

pub fn router(state: Arc<AppState>) -> Router {
    let assets = ServeDir::new(Path::new(&state.config.server.static_dir).join("assets"));
    Router::new()
        .route("/", get(index))
        .route("/auth", get(auth_page))
        .route("/create", get(create_page))
        .route("/dashboard", get(dashboard_page))
        .nest_service("/assets", assets)
        .with_state(state)
}
