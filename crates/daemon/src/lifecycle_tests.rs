// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::Response;
use tokio::io::AsyncWriteExt;

#[tokio::test]
async fn binds_fresh_socket_with_owner_only_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.sock");

    let _listener = bind_socket(&path).await.unwrap();
    let meta = std::fs::symlink_metadata(&path).unwrap();
    assert!(meta.file_type().is_socket());
    assert_eq!(meta.permissions().mode() & 0o777, 0o600);
}

#[tokio::test]
async fn creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/deeper/daemon.sock");
    let _listener = bind_socket(&path).await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn live_socket_rejects_second_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.sock");

    let listener = bind_socket(&path).await.unwrap();
    // Minimal live daemon: answer one request with a JSON line
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let _ = protocol::read_line(&mut reader, Duration::from_secs(1)).await;
        let _ = protocol::write_line(
            &mut write_half,
            &Response::ok_empty(),
            Duration::from_secs(1),
        )
        .await;
        let _ = write_half.shutdown().await;
    });

    let err = bind_socket(&path).await.unwrap_err();
    assert!(err.to_string().contains("already running"));
    server.await.unwrap();
}

#[tokio::test]
async fn stale_socket_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.sock");

    // Bind and drop: path remains but nothing listens
    {
        let _stale = std::os::unix::net::UnixListener::bind(&path).unwrap();
    }
    assert!(path.exists());

    let _listener = bind_socket(&path).await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn regular_file_at_socket_path_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.sock");
    std::fs::write(&path, "not a socket").unwrap();

    let err = bind_socket(&path).await.unwrap_err();
    assert!(err.to_string().contains("is not a unix socket"));
    // The imposter file is left alone
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "not a socket");
}

#[tokio::test]
async fn remove_socket_is_best_effort() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.sock");
    let _listener = bind_socket(&path).await.unwrap();
    remove_socket(&path);
    assert!(!path.exists());
    // Second removal is a no-op
    remove_socket(&path);
}
