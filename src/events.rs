//! Upload notifications delivered to the shell
//!
//! Request handlers run on worker tasks, never on the shell's own thread.
//! Instead of invoking shell callbacks directly from a worker, the service
//! pushes events onto an unbounded channel; the shell polls or awaits the
//! receiver from whatever thread owns its UI.

use std::path::PathBuf;

use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<ServiceEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServiceEvent>;

/// Create the event channel connecting the service to its shell.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// A notification from the upload service.
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// An upload completed and the file is at its final path.
    FileReceived {
        /// Client-supplied tracking number, as sent (unsanitized).
        tracking_number: String,
        /// Absolute path of the saved file.
        path: PathBuf,
        /// Human-readable size, e.g. "12.34 MB".
        size: String,
    },
    /// An upload failed after reaching the server.
    UploadFailed { message: String },
}

/// Format a byte count as megabytes with two decimals.
pub fn human_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
