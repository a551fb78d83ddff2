//! Spins up the RPC server on a random port and sends an HTTP GET /health
//! request over a plain TCP stream.

use linkwatchd::{
    command::SystemCommander, config::DaemonConfig, diagnostics::DiagnosticReporter, ipc,
    ipc::event::EventBroadcaster, monitor::MonitorEngine, settings::SettingsStore, AppContext,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Find a free local port by binding to port 0.
fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Build a minimal AppContext on a random port for testing.
fn make_test_ctx(dir: &TempDir, port: u16) -> Arc<AppContext> {
    let config = Arc::new(DaemonConfig::new(
        Some(port),
        Some(dir.path().to_path_buf()),
        Some("error".to_string()),
        None,
        None,
    ));
    let settings = Arc::new(SettingsStore::load(dir.path()));
    let broadcaster = Arc::new(EventBroadcaster::new());
    let commander: Arc<dyn linkwatchd::command::Commander> = Arc::new(SystemCommander);
    let engine = MonitorEngine::new(settings, Arc::clone(&commander), Arc::clone(&broadcaster));
    let reporter = Arc::new(DiagnosticReporter::new(dir.path(), commander));

    Arc::new(AppContext {
        config,
        engine,
        reporter,
        broadcaster,
        started_at: std::time::Instant::now(),
    })
}

async fn connect_with_retry(port: u16) -> TcpStream {
    for _ in 0..50 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
            return stream;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("server did not come up on port {port}");
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    let ctx = make_test_ctx(&dir, port);
    tokio::spawn(ipc::run(ctx));

    let mut stream = connect_with_retry(port).await;
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    let body = response.split("\r\n\r\n").nth(1).unwrap();
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["monitoring"], false);
    assert_eq!(json["port"], port);
}
