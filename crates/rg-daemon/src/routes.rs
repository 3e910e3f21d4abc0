//! Axum router and all HTTP handlers for rg-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)` so route tests can compose
//! the bare router directly.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::state::{uptime_secs, AppState};

/// Build the application router wired to the given shared state.
///
/// Middleware layers (tracing) are **not** applied here; `main.rs` attaches
/// them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/decisions", get(decisions))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            uptime_secs: uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    match st.status.read().await.clone() {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        // First cycle has not completed yet.
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "engine warming up" })),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/decisions
// ---------------------------------------------------------------------------

pub(crate) async fn decisions(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let pending = st
        .status
        .read()
        .await
        .as_ref()
        .map(|s| s.pending_decisions.clone())
        .unwrap_or_default();
    (StatusCode::OK, Json(pending))
}
