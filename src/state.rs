//! Shared handler context

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::events::{EventSender, ServiceEvent};

/// State shared between the service control surface and request handlers.
///
/// Cloning is cheap; all clones observe the same save directory. The save
/// directory is behind a lock so a `set_save_dir` from the control thread
/// can never be observed torn by a worker — each upload reads one coherent
/// snapshot at request start.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    save_dir: RwLock<PathBuf>,
    port: u16,
    events: EventSender,
    upload_seq: AtomicU64,
}

impl AppState {
    pub fn new(save_dir: PathBuf, port: u16, events: EventSender) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                save_dir: RwLock::new(save_dir),
                port,
                events,
                upload_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Snapshot of the current save directory.
    pub async fn save_dir(&self) -> PathBuf {
        self.inner.save_dir.read().await.clone()
    }

    /// Replace the save directory; uploads already in flight keep the
    /// snapshot they took at request start.
    pub async fn set_save_dir(&self, path: PathBuf) {
        *self.inner.save_dir.write().await = path;
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// Monotonic per-process sequence number; disambiguates filenames for
    /// uploads that land within the same second.
    pub fn next_upload_seq(&self) -> u64 {
        self.inner.upload_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Send an event to the shell. A shell that dropped its receiver simply
    /// stops listening; the upload itself is unaffected.
    pub fn emit(&self, event: ServiceEvent) {
        let _ = self.inner.events.send(event);
    }
}
