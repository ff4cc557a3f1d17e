//! Upload service lifecycle
//!
//! Owns the listening socket and the background serve task. `start` and
//! `stop` are called from the shell's control context and never park it
//! for long: the network loop runs on its own task, and the only blocking
//! points are the bounded port probe and the bounded shutdown grace.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::ServiceError;
use crate::events::EventSender;
use crate::routes;
use crate::state::AppState;

/// How long the pre-bind port probe may wait for an answer.
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// How long `stop` waits for in-flight uploads before aborting the task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle state of a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Failed,
}

struct ServerRuntime {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// The file-receive service.
///
/// Single-use per start/stop cycle, restartable after a clean stop. The
/// configuration snapshot (save directory, port) is taken at construction;
/// only the save directory is mutable afterwards.
pub struct UploadService {
    state: AppState,
    status: Arc<Mutex<ServiceState>>,
    runtime: AsyncMutex<Option<ServerRuntime>>,
}

impl UploadService {
    pub fn new(save_dir: PathBuf, port: u16, events: EventSender) -> Self {
        Self {
            state: AppState::new(save_dir, port, events),
            status: Arc::new(Mutex::new(ServiceState::Stopped)),
            runtime: AsyncMutex::new(None),
        }
    }

    /// Bind the configured port and begin serving in the background.
    ///
    /// Fails with `AlreadyRunning` unless the service is stopped, with
    /// `PortInUse` if another listener answers the probe (state is left
    /// untouched so the caller can retry on a different port), with
    /// `DirectoryUnavailable` if the save directory cannot be created, and
    /// with `PortInUse`/`BindFailed` if the bind itself loses the race.
    pub async fn start(&self) -> Result<(), ServiceError> {
        let mut runtime = self.runtime.lock().await;

        match self.status() {
            ServiceState::Stopped | ServiceState::Failed => {}
            ServiceState::Starting | ServiceState::Running => {
                return Err(ServiceError::AlreadyRunning);
            }
        }

        let port = self.state.port();
        if port_in_use(port).await {
            return Err(ServiceError::PortInUse(port));
        }

        self.set_status(ServiceState::Starting);

        let save_dir = self.state.save_dir().await;
        if let Err(e) = tokio::fs::create_dir_all(&save_dir).await {
            self.set_status(ServiceState::Failed);
            return Err(ServiceError::DirectoryUnavailable {
                path: save_dir,
                source: e,
            });
        }

        let listener = match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => listener,
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                self.set_status(ServiceState::Failed);
                return Err(ServiceError::PortInUse(port));
            }
            Err(e) => {
                self.set_status(ServiceState::Failed);
                return Err(ServiceError::BindFailed(e));
            }
        };

        let app = routes::router(self.state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let status = Arc::clone(&self.status);
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "server loop terminated unexpectedly");
                *status.lock().unwrap_or_else(|p| p.into_inner()) = ServiceState::Failed;
            }
        });

        *runtime = Some(ServerRuntime {
            shutdown: shutdown_tx,
            handle,
        });
        self.set_status(ServiceState::Running);
        tracing::info!(port, save_dir = %self.state.save_dir().await.display(), "upload service listening");
        Ok(())
    }

    /// Release the listening socket. In-flight uploads get a bounded grace
    /// to finish; the port is free once this returns. Idempotent.
    pub async fn stop(&self) {
        let mut runtime = self.runtime.lock().await;

        if let Some(server) = runtime.take() {
            let _ = server.shutdown.send(());
            let mut handle = server.handle;
            if timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                tracing::warn!("shutdown grace expired, aborting server task");
                handle.abort();
            }
            tracing::info!("upload service stopped");
        }
        self.set_status(ServiceState::Stopped);
    }

    /// Directory used by subsequent uploads; safe while running, does not
    /// move previously saved files.
    pub async fn set_save_directory(&self, path: impl Into<PathBuf>) {
        self.state.set_save_dir(path.into()).await;
    }

    pub fn is_running(&self) -> bool {
        self.status() == ServiceState::Running
    }

    pub fn status(&self) -> ServiceState {
        *self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_status(&self, status: ServiceState) {
        *self.status.lock().unwrap_or_else(|p| p.into_inner()) = status;
    }
}

/// Probe whether something is already listening on `port` by attempting a
/// short-timeout local connection.
async fn port_in_use(port: u16) -> bool {
    matches!(
        timeout(PROBE_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    )
}
