// crates/server/src/lib.rs
//! Porchlight server library.
//!
//! Axum HTTP API that owns the live-session toggle and the arrival log. Any
//! number of server processes may point at the same data directory; they
//! share nothing but the files in it.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and request tracing.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api_routes(state))
        .layer(TraceLayer::new_for_http())
}
