//! HTTP surface of the upload service
//!
//! Routes:
//! - GET /ping - liveness probe
//! - GET /status - current save directory and port
//! - POST /upload - receive one video file

pub mod health;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Maximum accepted upload body: 2 GiB. Bounds disk and handle usage from
/// a misbehaving client; a LAN shipment video stays far below this.
pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(health::ping))
        .route("/status", get(health::status))
        .route("/upload", post(upload::upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
