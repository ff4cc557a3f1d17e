//! Upload endpoint
//!
//! Receives one video per multipart POST. The body is streamed to a temp
//! file inside the save directory and renamed to its final name only once
//! the full body has been received, so a severed connection or full disk
//! never leaves a partial file at a final-looking name.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::Json;
use chrono::Local;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::UploadError;
use crate::events::{human_size, ServiceEvent};
use crate::state::AppState;

/// Multipart field carrying the video bytes.
const FIELD_FILE: &str = "file";
/// Optional multipart field carrying the tracking number.
const FIELD_TRACKING: &str = "trackingNumber";
/// Tracking number substituted when the client sends none.
const UNKNOWN_TRACKING: &str = "unknown";

#[derive(Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: String,
    pub path: String,
}

struct StagedUpload {
    temp_path: PathBuf,
    bytes_written: u64,
}

/// POST /upload
///
/// A 4xx rejection emits no event; a 5xx failure removes any staged temp
/// file and emits [`ServiceEvent::UploadFailed`]. Either way the listener
/// keeps serving subsequent requests.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    // Snapshot at request start; a concurrent set_save_directory applies
    // to the next upload, not this one.
    let save_dir = absolute_save_dir(state.save_dir().await);

    let mut staged: Option<StagedUpload> = None;
    match receive_upload(&state, &save_dir, multipart, &mut staged).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            if let Some(upload) = staged.take() {
                let _ = fs::remove_file(&upload.temp_path).await;
            }
            if err.status_code().is_server_error() {
                state.emit(ServiceEvent::UploadFailed {
                    message: err.to_string(),
                });
            }
            Err(err)
        }
    }
}

async fn receive_upload(
    state: &AppState,
    save_dir: &Path,
    mut multipart: Multipart,
    staged: &mut Option<StagedUpload>,
) -> Result<UploadResponse, UploadError> {
    // The directory may have been deleted externally since start().
    fs::create_dir_all(save_dir)
        .await
        .map_err(|e| UploadError::Directory {
            path: save_dir.to_path_buf(),
            source: e,
        })?;

    let mut tracking_number: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FIELD_TRACKING) => {
                tracking_number = Some(field.text().await?);
            }
            Some(FIELD_FILE) => {
                if field.file_name().map_or(true, str::is_empty) {
                    return Err(UploadError::EmptyFilename);
                }
                // Last file field wins; discard anything staged earlier.
                if let Some(previous) = staged.take() {
                    let _ = fs::remove_file(&previous.temp_path).await;
                }
                stage_file(save_dir, &mut field, staged).await?;
            }
            // Unknown fields are drained and ignored.
            _ => {}
        }
    }

    let Some(upload) = staged.take() else {
        return Err(UploadError::MissingFile);
    };

    let tracking_number = tracking_number.unwrap_or_else(|| UNKNOWN_TRACKING.to_string());
    let file_name = build_filename(
        &sanitize_tracking_number(&tracking_number),
        state.next_upload_seq(),
    );
    let dest = save_dir.join(&file_name);

    // Same-directory rename: the file appears at its final name atomically.
    if let Err(e) = fs::rename(&upload.temp_path, &dest).await {
        *staged = Some(upload);
        return Err(UploadError::Save(e));
    }

    tracing::info!(
        tracking_number = %tracking_number,
        path = %dest.display(),
        size = upload.bytes_written,
        "file received"
    );

    state.emit(ServiceEvent::FileReceived {
        tracking_number,
        path: dest.clone(),
        size: human_size(upload.bytes_written),
    });

    Ok(UploadResponse {
        status: "success",
        message: format!("File saved: {}", file_name),
        path: dest.display().to_string(),
    })
}

/// Stream the file field to a temp path inside the save directory. The
/// staged record is published through `staged` before the first write so
/// the caller can clean up however far this got.
async fn stage_file(
    save_dir: &Path,
    field: &mut Field<'_>,
    staged: &mut Option<StagedUpload>,
) -> Result<(), UploadError> {
    let temp_path = save_dir.join(format!(".upload-{}.part", Uuid::new_v4()));
    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(UploadError::Save)?;
    *staged = Some(StagedUpload {
        temp_path,
        bytes_written: 0,
    });

    let mut bytes_written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await.map_err(UploadError::Save)?;
        bytes_written += chunk.len() as u64;
    }
    file.flush().await.map_err(UploadError::Save)?;

    if let Some(upload) = staged.as_mut() {
        upload.bytes_written = bytes_written;
    }
    Ok(())
}

/// Resolve the save directory against the working directory. Reported
/// paths must be absolute even when the configured `save_path` is
/// relative.
fn absolute_save_dir(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

/// Reduce a client-supplied tracking number to a safe filename component.
///
/// The tracking number is attacker-controlled input: path separators, null
/// bytes, and anything else unsafe in a filename are replaced so it can
/// never traverse out of the save directory or collide with the temp-file
/// naming scheme.
fn sanitize_tracking_number(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        UNKNOWN_TRACKING.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `{tracking}_{timestamp}_{seq}.mp4`. The second-granularity timestamp
/// keeps names human-readable; the sequence number keeps concurrent
/// uploads within the same second from colliding. The extension is
/// appended last, so a deceptive extension inside the tracking number can
/// never become the real one.
fn build_filename(tracking: &str, seq: u64) -> String {
    format!(
        "{}_{}_{:03}.mp4",
        tracking,
        Local::now().format("%Y%m%d_%H%M%S"),
        seq
    )
}
