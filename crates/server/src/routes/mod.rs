//! API route handlers for the Porchlight server.

pub mod entries;
pub mod health;
pub mod live;

use std::sync::Arc;

use axum::{body::Bytes, middleware, Router};
use serde::de::DeserializeOwned;
use tower_http::limit::RequestBodyLimitLayer;

use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Largest request body accepted on a mutating endpoint.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Create the combined API router.
///
/// Routes:
/// - GET  /health - Liveness probe
/// - GET  /live_status - Live session status
/// - GET  /current_data - Current-year arrivals while live
/// - GET  /stats - Arrival totals
/// - POST /set_live - Enable or disable the live session (API key)
/// - POST /add_trick_or_treater - Record one arrival (API key)
/// - POST /undo_last_entry - Remove the last arrival (API key)
/// - POST /upload_batch - Append queued arrivals (API key)
pub fn api_routes(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .merge(health::router())
        .merge(live::public_router())
        .merge(entries::public_router());

    // Last route_layer runs first.
    let guarded = Router::new()
        .merge(live::guarded_router())
        .merge(entries::guarded_router())
        .route_layer(middleware::from_fn(auth::capture_client_id))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .route_layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    public.merge(guarded).with_state(state)
}

/// Parse a JSON body, treating an empty body as `T::default()`.
pub(crate) fn parse_json_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::MalformedBody(e.to_string()))
}
