// crates/server/src/routes/entries.rs
//! Arrival log endpoints.
//!
//! - POST /add_trick_or_treater - append one arrival stamped now
//! - POST /undo_last_entry      - remove the most recent arrival
//! - POST /upload_batch         - append entries a bridge queued while offline
//! - GET  /current_data         - this year's arrivals, only while live
//! - GET  /stats                - totals for this year

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, Duration};
use porchlight_core::{Entry, RawEntry};
use serde::{Deserialize, Serialize};

use crate::error::{blocking, ApiError, ApiResult};
use crate::routes::parse_json_or_default;
use crate::state::AppState;

/// Window counted by `recent_count`.
const RECENT_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct AddResponse {
    pub success: bool,
    pub message: String,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct UndoResponse {
    pub success: bool,
    pub message: String,
    pub removed_entry: Entry,
    pub total_count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadBatchRequest {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct UploadBatchResponse {
    pub success: bool,
    pub message: String,
    pub accepted: usize,
    pub rejected: usize,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct StatsResponse {
    pub total_count: usize,
    pub recent_count: usize,
    pub live_mode: bool,
}

/// POST /add_trick_or_treater
pub async fn add_trick_or_treater(State(state): State<Arc<AppState>>) -> ApiResult<Json<AddResponse>> {
    let log = state.entries.clone();
    let (_, total_count) = blocking(move || Ok(log.add_now()?)).await?;
    Ok(Json(AddResponse {
        success: true,
        message: "Trick-or-treater added".to_string(),
        total_count,
    }))
}

/// POST /undo_last_entry - 400 when the log is empty.
pub async fn undo_last_entry(State(state): State<Arc<AppState>>) -> ApiResult<Json<UndoResponse>> {
    let log = state.entries.clone();
    let (removed_entry, total_count) = blocking(move || Ok(log.undo_last()?)).await?;
    Ok(Json(UndoResponse {
        success: true,
        message: "Last entry removed".to_string(),
        removed_entry,
        total_count,
    }))
}

/// Split a raw batch into valid entries and a count of discarded ones.
fn validate_batch(raw: Vec<serde_json::Value>) -> (Vec<Entry>, usize) {
    let mut accepted = Vec::with_capacity(raw.len());
    let mut rejected = 0;
    for (index, value) in raw.into_iter().enumerate() {
        let checked = serde_json::from_value::<RawEntry>(value)
            .map_err(|e| e.to_string())
            .and_then(|r| r.validate());
        match checked {
            Ok(entry) => accepted.push(entry),
            Err(reason) => {
                tracing::warn!(index, reason = %reason, "Discarding malformed batch entry");
                rejected += 1;
            }
        }
    }
    (accepted, rejected)
}

/// POST /upload_batch - `{data: [...]}`. Malformed entries are dropped and
/// counted in `rejected`.
pub async fn upload_batch(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<UploadBatchResponse>> {
    let request: UploadBatchRequest = parse_json_or_default(&body)?;
    if request.data.is_empty() {
        return Err(ApiError::BadRequest("No data provided".to_string()));
    }

    let (batch, rejected) = validate_batch(request.data);
    if batch.is_empty() {
        return Err(ApiError::BadRequest("No valid entries in batch".to_string()));
    }

    let accepted = batch.len();
    let log = state.entries.clone();
    let total_count = blocking(move || Ok(log.extend(batch)?)).await?;
    tracing::info!(accepted, rejected, total_count, "Batch uploaded");

    Ok(Json(UploadBatchResponse {
        success: true,
        message: format!("Uploaded {accepted} entries"),
        accepted,
        rejected,
        total_count,
    }))
}

/// GET /current_data - Empty while the live session is off.
pub async fn current_data(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Entry>>> {
    let coordinator = state.coordinator.clone();
    let log = state.entries.clone();
    let entries = blocking(move || {
        if !coordinator.status().enabled {
            return Ok(Vec::new());
        }
        Ok(log.for_year(log.now().year())?)
    })
    .await?;
    Ok(Json(entries))
}

/// GET /stats
pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatsResponse>> {
    let coordinator = state.coordinator.clone();
    let log = state.entries.clone();
    let response = blocking(move || {
        let now = log.now();
        let entries = log.for_year(now.year())?;
        let cutoff = now - Duration::minutes(RECENT_WINDOW_MINUTES);
        Ok(StatsResponse {
            total_count: entries.len(),
            recent_count: entries.iter().filter(|e| e.timestamp >= cutoff).count(),
            live_mode: coordinator.status().enabled,
        })
    })
    .await?;
    Ok(Json(response))
}

pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/current_data", get(current_data))
        .route("/stats", get(stats))
}

pub fn guarded_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add_trick_or_treater", post(add_trick_or_treater))
        .route("/undo_last_entry", post(undo_last_entry))
        .route("/upload_batch", post(upload_batch))
}
