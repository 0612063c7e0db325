// crates/server/src/routes/live.rs
//! Live-session endpoints.
//!
//! - GET  /live_status - `{live, elapsed_seconds, owner?}`
//! - POST /set_live    - `{live, owner?}` in, same shape out plus `error` when
//!   the session belongs to someone else. A refused disable is still a 200.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use porchlight_core::{LiveStatus, Owner};
use serde::{Deserialize, Serialize};

use crate::auth::ClientId;
use crate::error::{blocking, ApiResult};
use crate::routes::parse_json_or_default;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SetLiveRequest {
    #[serde(default)]
    pub live: bool,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct LiveStatusResponse {
    pub live: bool,
    pub elapsed_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<LiveStatus> for LiveStatusResponse {
    fn from(status: LiveStatus) -> Self {
        Self {
            live: status.enabled,
            elapsed_seconds: status.elapsed_seconds,
            owner: status.owner.as_deref().map(str::to_string),
            error: None,
        }
    }
}

/// GET /live_status - Never fails; an unreadable record reads as disabled.
pub async fn live_status(State(state): State<Arc<AppState>>) -> Json<LiveStatusResponse> {
    let coordinator = state.coordinator.clone();
    let status = tokio::task::spawn_blocking(move || coordinator.status())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Live status task failed");
            LiveStatus::disabled()
        });
    Json(status.into())
}

/// POST /set_live - Owner comes from the body, falling back to `X-Client-Id`.
pub async fn set_live(
    State(state): State<Arc<AppState>>,
    Extension(ClientId(client_id)): Extension<ClientId>,
    body: Bytes,
) -> ApiResult<Json<LiveStatusResponse>> {
    let request: SetLiveRequest = parse_json_or_default(&body)?;
    let requester = match Owner::from_optional(request.owner.as_deref()) {
        Owner::Unclaimed => Owner::from_optional(client_id.as_deref()),
        owner => owner,
    };

    let coordinator = state.coordinator.clone();
    let desired = request.live;
    let outcome =
        blocking(move || Ok(coordinator.request_transition(desired, requester)?)).await?;

    let mut response = LiveStatusResponse::from(outcome.status);
    response.error = outcome.rejection.map(|r| r.to_string());
    Ok(Json(response))
}

pub fn public_router() -> Router<Arc<AppState>> {
    Router::new().route("/live_status", get(live_status))
}

pub fn guarded_router() -> Router<Arc<AppState>> {
    Router::new().route("/set_live", post(set_live))
}
