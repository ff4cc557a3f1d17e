//! End-to-end tests of the upload service over real sockets.

use std::path::Path;

use tempfile::tempdir;

use video_inbox::error::ServiceError;
use video_inbox::events::{self, EventReceiver, ServiceEvent};
use video_inbox::service::{ServiceState, UploadService};

/// Pick a port that was free a moment ago.
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn service_on_free_port(save_dir: &Path) -> (UploadService, EventReceiver, u16) {
    let port = free_port();
    let (tx, rx) = events::channel();
    let service = UploadService::new(save_dir.to_path_buf(), port, tx);
    (service, rx, port)
}

async fn upload(
    port: u16,
    tracking_number: Option<&str>,
    content: &[u8],
) -> reqwest::Response {
    let mut form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(content.to_vec()).file_name("clip.mp4"),
    );
    if let Some(tn) = tracking_number {
        form = form.text("trackingNumber", tn.to_string());
    }
    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let dir = tempdir().unwrap();
    let (service, _rx, _port) = service_on_free_port(dir.path());

    service.stop().await;
    service.stop().await;
    assert_eq!(service.status(), ServiceState::Stopped);

    service.start().await.unwrap();
    service.stop().await;
    service.stop().await;
    assert_eq!(service.status(), ServiceState::Stopped);
}

#[tokio::test]
async fn test_double_start_rejected() {
    let dir = tempdir().unwrap();
    let (service, _rx, _port) = service_on_free_port(dir.path());

    service.start().await.unwrap();
    assert!(service.is_running());

    let err = service.start().await.unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyRunning));
    assert!(service.is_running());

    service.stop().await;
}

#[tokio::test]
async fn test_port_in_use_detected_before_state_change() {
    let dir = tempdir().unwrap();
    let (service, _rx, port) = service_on_free_port(dir.path());

    // Another process already owns the port.
    let _occupant = std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();

    let err = service.start().await.unwrap_err();
    assert!(matches!(err, ServiceError::PortInUse(p) if p == port));
    assert_eq!(service.status(), ServiceState::Stopped);
    assert!(!service.is_running());
}

#[tokio::test]
async fn test_unavailable_save_directory_fails_start() {
    let dir = tempdir().unwrap();
    // A regular file where a directory is needed: the save directory
    // beneath it cannot be created.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let port = free_port();
    let (tx, _rx) = events::channel();
    let service = UploadService::new(blocker.join("videos"), port, tx);

    let err = service.start().await.unwrap_err();
    assert!(matches!(err, ServiceError::DirectoryUnavailable { .. }));
    assert_eq!(service.status(), ServiceState::Failed);
    assert!(!service.is_running());

    // Once the obstruction is gone a failed instance starts cleanly.
    std::fs::remove_file(&blocker).unwrap();
    service.start().await.unwrap();
    assert!(service.is_running());

    service.stop().await;
    assert_eq!(service.status(), ServiceState::Stopped);
}

#[tokio::test]
async fn test_restart_after_clean_stop() {
    let dir = tempdir().unwrap();
    let (service, _rx, port) = service_on_free_port(dir.path());

    service.start().await.unwrap();
    service.stop().await;
    service.start().await.unwrap();

    let response = reqwest::get(format!("http://127.0.0.1:{port}/ping"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    service.stop().await;
}

#[tokio::test]
async fn test_upload_happy_path() {
    let dir = tempdir().unwrap();
    let (service, mut rx, port) = service_on_free_port(dir.path());
    service.start().await.unwrap();

    let response = upload(port, Some("SF1234567890"), b"0123456789").await;
    assert_eq!(response.status(), 200);

    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["status"], "success");

    let path = std::path::PathBuf::from(json["path"].as_str().unwrap());
    assert!(path.exists());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 10);
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.contains("SF1234567890"));
    assert!(name.ends_with(".mp4"));

    match rx.recv().await.unwrap() {
        ServiceEvent::FileReceived {
            tracking_number,
            path: event_path,
            size,
        } => {
            assert_eq!(tracking_number, "SF1234567890");
            assert_eq!(event_path, path);
            assert_eq!(size, "0.00 MB");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(rx.try_recv().is_err());

    service.stop().await;
}

#[tokio::test]
async fn test_missing_file_rejected_without_event() {
    let dir = tempdir().unwrap();
    let (service, mut rx, port) = service_on_free_port(dir.path());
    service.start().await.unwrap();

    let form = reqwest::multipart::Form::new().text("trackingNumber", "SF1234567890");
    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["error"], "No file provided");
    assert!(rx.try_recv().is_err());

    service.stop().await;
}

#[tokio::test]
async fn test_traversal_tracking_number_contained() {
    let dir = tempdir().unwrap();
    let (service, _rx, port) = service_on_free_port(dir.path());
    service.start().await.unwrap();

    let response = upload(port, Some("../../etc"), b"abc").await;
    assert_eq!(response.status(), 200);

    let json: serde_json::Value = response.json().await.unwrap();
    let path = std::path::PathBuf::from(json["path"].as_str().unwrap());
    assert_eq!(path.parent().unwrap(), dir.path());
    assert!(!path.file_name().unwrap().to_str().unwrap().contains('/'));

    service.stop().await;
}

#[tokio::test]
async fn test_ping_only_answers_while_running() {
    let dir = tempdir().unwrap();
    let (service, _rx, port) = service_on_free_port(dir.path());
    let url = format!("http://127.0.0.1:{port}/ping");

    // Not started yet: nothing listens.
    assert!(reqwest::get(url.as_str()).await.is_err());

    service.start().await.unwrap();
    let response = reqwest::get(url.as_str()).await.unwrap();
    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["status"], "ok");

    service.stop().await;

    // Port is released before stop() returns.
    assert!(reqwest::get(url.as_str()).await.is_err());
}

#[tokio::test]
async fn test_concurrent_uploads_get_distinct_files() {
    let dir = tempdir().unwrap();
    let (service, _rx, port) = service_on_free_port(dir.path());
    service.start().await.unwrap();

    let (a, b) = tokio::join!(
        upload(port, Some("SF0000000001"), b"first upload"),
        upload(port, Some("SF0000000002"), b"second upload"),
    );
    assert_eq!(a.status(), 200);
    assert_eq!(b.status(), 200);

    let path_a = a.json::<serde_json::Value>().await.unwrap()["path"]
        .as_str()
        .unwrap()
        .to_string();
    let path_b = b.json::<serde_json::Value>().await.unwrap()["path"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(path_a, path_b);
    assert!(Path::new(&path_a).exists());
    assert!(Path::new(&path_b).exists());

    service.stop().await;
}

#[tokio::test]
async fn test_set_save_directory_applies_to_next_upload() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let (service, _rx, port) = service_on_free_port(first.path());
    service.start().await.unwrap();

    let response = upload(port, Some("SF1"), b"abc").await;
    let json: serde_json::Value = response.json().await.unwrap();
    let path = std::path::PathBuf::from(json["path"].as_str().unwrap());
    assert_eq!(path.parent().unwrap(), first.path());

    service.set_save_directory(second.path()).await;

    let response = upload(port, Some("SF2"), b"def").await;
    let json: serde_json::Value = response.json().await.unwrap();
    let path = std::path::PathBuf::from(json["path"].as_str().unwrap());
    assert_eq!(path.parent().unwrap(), second.path());

    service.stop().await;
}
