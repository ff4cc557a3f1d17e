//! Liveness and status endpoints

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// GET /ping
///
/// Constant-time liveness probe with no side effects; the mobile client
/// uses it to validate a scanned server address before uploading.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        message: "Server is running",
    })
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub save_path: String,
    pub port: u16,
}

/// GET /status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running",
        save_path: state.save_dir().await.display().to_string(),
        port: state.port(),
    })
}
