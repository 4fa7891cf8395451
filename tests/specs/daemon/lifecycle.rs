//! Daemon lifecycle behavior: singleton socket, shutdown, status surface.

use crate::prelude::*;
use af_core::SpawnPolicy;
use af_daemon::protocol::FullStatus;
use std::time::Duration;

#[tokio::test]
async fn status_then_clean_shutdown_within_two_seconds() {
    let daemon = start(SpawnPolicy::Manual, Some("manual-test")).await;
    let socket = daemon.running.socket_path().to_path_buf();

    let response = call(&socket, "status.full", serde_json::json!({})).await;
    assert!(response.success);
    let status: FullStatus = response.result_as().unwrap();
    assert_eq!(status.pool_size, 1);
    assert_eq!(status.mode, af_core::PoolMode::Active);
    assert_eq!(status.project.as_deref(), Some("manual-test"));
    assert!(status.agents.is_empty());

    let run_handle = tokio::spawn(daemon.running.run());
    let shutdown = call(&socket, "shutdown", serde_json::json!({})).await;
    assert!(shutdown.success);

    tokio::time::timeout(Duration::from_secs(2), run_handle)
        .await
        .expect("shutdown must complete within 2s")
        .unwrap()
        .unwrap();
    assert!(!socket.exists(), "socket must be unlinked on exit");
}

#[tokio::test]
async fn second_daemon_on_live_socket_is_rejected() {
    let daemon = start(SpawnPolicy::Manual, None).await;
    let socket = daemon.running.socket_path().to_path_buf();

    let config2 = {
        let dir = socket.parent().unwrap();
        crate::prelude::config(dir, SpawnPolicy::Manual, None)
    };
    let deps = af_daemon::daemon::DaemonDeps {
        runner: std::sync::Arc::new(af_adapters::FakeRunner::new()),
        starter: std::sync::Arc::new(af_adapters::FakeProcessStarter::new()),
        provider: None,
        store: None,
    };
    let err = af_daemon::daemon::Daemon::new(config2, deps)
        .start()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already running"));

    daemon.running.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_method_and_invalid_json_get_failure_responses() {
    let daemon = start(SpawnPolicy::Manual, None).await;
    let socket = daemon.running.socket_path().to_path_buf();

    let response = call(&socket, "nope.such", serde_json::json!({})).await;
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("unknown method: nope.such"));

    // Raw invalid JSON still gets a line back
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    let stream = tokio::net::UnixStream::connect(&socket).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    write_half.write_all(b"this is not json\n").await.unwrap();
    let mut line = String::new();
    BufReader::new(read_half).read_line(&mut line).await.unwrap();
    let response: af_daemon::protocol::Response = serde_json::from_str(&line).unwrap();
    assert!(!response.success);
    assert!(response.error.unwrap().contains("invalid request"));

    daemon.running.stop().await.unwrap();
}
