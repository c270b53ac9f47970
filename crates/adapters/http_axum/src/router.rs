//! Axum router assembly.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// `GET /` serves the status snapshot, `GET /ws` upgrades to the realtime
/// channel. CORS is any-origin (the status endpoint is consumed by browser
/// dashboards on other origins). A [`TraceLayer`] logs each request at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/health", get(health_check))
        .route("/ws", get(crate::ws::upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /` — read-only snapshot of `{devices, harmony}`.
async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    // The engine only disappears during shutdown; serve an empty snapshot
    // rather than an error in that window.
    match state.engine.snapshot().await {
        Some(snapshot) => Json(json!({
            "devices": snapshot.devices,
            "harmony": snapshot.hub,
        })),
        None => Json(json!({ "devices": [], "harmony": null })),
    }
}

async fn health_check() -> &'static str {
    "OK"
}
