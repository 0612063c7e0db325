// crates/server/src/auth.rs
//! Request guards for the mutating endpoints.
//!
//! Each guard either hands the request on or answers it. They are composed
//! explicitly in [`crate::routes::api_routes`]:
//!
//! ```text
//! body limit -> require_api_key -> capture_client_id -> handler
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const CLIENT_ID_HEADER: &str = "x-client-id";

const MAX_CLIENT_ID_LEN: usize = 256;

/// The caller's `X-Client-Id`, if it sent a usable one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientId(pub Option<String>);

fn api_key_matches(expected: &str, headers: &HeaderMap) -> bool {
    let Some(given) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// 401 unless `X-API-Key` equals the configured key.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    if !api_key_matches(&state.api_key, req.headers()) {
        return ApiError::Unauthorized.into_response();
    }
    next.run(req).await
}

/// Parse `X-Client-Id` into a [`ClientId`] extension. Non-text or oversized
/// values are refused with 400.
pub async fn capture_client_id(mut req: Request, next: Next) -> Response {
    let client_id = match req.headers().get(CLIENT_ID_HEADER) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(id) if id.len() <= MAX_CLIENT_ID_LEN => {
                Some(id.trim().to_string()).filter(|id| !id.is_empty())
            }
            _ => {
                return ApiError::BadRequest("Invalid X-Client-Id header".to_string())
                    .into_response()
            }
        },
    };
    req.extensions_mut().insert(ClientId(client_id));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_key(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_str(key).unwrap());
        headers
    }

    #[test]
    fn test_api_key_matches() {
        assert!(api_key_matches("s3cret", &headers_with_key("s3cret")));
        assert!(!api_key_matches("s3cret", &headers_with_key("s3cre")));
        assert!(!api_key_matches("s3cret", &headers_with_key("s3creT")));
        assert!(!api_key_matches("s3cret", &HeaderMap::new()));
    }

    #[test]
    fn test_api_key_length_mismatch_rejected() {
        assert!(!api_key_matches("s3cret", &headers_with_key("s3cret-and-more")));
        assert!(!api_key_matches("s3cret", &headers_with_key("")));
    }
}
