//! Error types for the upload service

use std::io;
use std::path::PathBuf;

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced synchronously from service lifecycle operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("server is already running")]
    AlreadyRunning,

    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error("save directory {} is unavailable: {source}", path.display())]
    DirectoryUnavailable { path: PathBuf, source: io::Error },

    #[error("failed to bind listener: {0}")]
    BindFailed(io::Error),
}

/// Per-request upload failures.
///
/// Each variant maps to an HTTP status at the boundary; none of them take
/// down the listener.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file provided")]
    MissingFile,

    #[error("No file selected")]
    EmptyFilename,

    #[error("Invalid multipart request: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to create save directory {}: {source}", path.display())]
    Directory { path: PathBuf, source: io::Error },

    #[error("Failed to save file: {0}")]
    Save(io::Error),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::MissingFile
            | UploadError::EmptyFilename
            | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
            UploadError::Directory { .. } | UploadError::Save(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "upload failed");
        } else {
            tracing::warn!(error = %self, "upload rejected");
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
