// crates/server/src/routes/health.rs
//! Health check endpoint for the API.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use porchlight_core::time::format_timestamp;
use serde::Serialize;

use crate::state::AppState;

/// Response for the health check endpoint.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub live_mode: bool,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /health - Liveness probe used by bridges before claiming the session.
///
/// Reads the live-state file without creating or repairing it.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let coordinator = state.coordinator.clone();
    let live_mode = tokio::task::spawn_blocking(move || coordinator.peek().enabled)
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: format_timestamp(state.entries.now()),
        live_mode,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Create the health routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
