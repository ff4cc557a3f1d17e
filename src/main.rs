//! Video Inbox shell
//!
//! Headless shell around the upload service: loads persisted settings,
//! starts the listener, and turns service events into a timestamped
//! activity feed. A graphical shell would consume the same event channel
//! from its own UI thread.

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_inbox::config::ConfigStore;
use video_inbox::error::ServiceError;
use video_inbox::events::{self, ServiceEvent};
use video_inbox::service::UploadService;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_inbox=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConfigStore::load(None);
    tracing::info!("Starting Video Inbox v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(config = %config.path().display(), "configuration loaded");

    let (events_tx, mut events_rx) = events::channel();
    let service = UploadService::new(config.save_path(), config.port(), events_tx);

    if config.auto_start() {
        match service.start().await {
            Ok(()) => {}
            Err(ServiceError::PortInUse(port)) => {
                tracing::error!(
                    port,
                    "port is already in use; change the `port` key in {} and restart",
                    config.path().display()
                );
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start upload service");
                return;
            }
        }
    } else {
        tracing::info!("auto_start is disabled, service not started");
    }

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(ServiceEvent::FileReceived { tracking_number, path, size }) => {
                    tracing::info!(
                        tracking_number = %tracking_number,
                        path = %path.display(),
                        size = %size,
                        "video received"
                    );
                }
                Some(ServiceEvent::UploadFailed { message }) => {
                    tracing::error!(message = %message, "upload failed");
                }
                None => break,
            },
            _ = shutdown_signal() => break,
        }
    }

    service.stop().await;
    tracing::info!("shutdown complete");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
