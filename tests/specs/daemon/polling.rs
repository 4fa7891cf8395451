//! Spawn-policy behavior: manual silence, auto polling.

use crate::prelude::*;
use af_core::SpawnPolicy;
use std::time::Duration;

#[tokio::test]
async fn manual_mode_never_invokes_the_runner() {
    let daemon = start(SpawnPolicy::Manual, Some("manual-test")).await;
    let socket = daemon.running.socket_path().to_path_buf();

    let response = call(&socket, "status.full", serde_json::json!({})).await;
    assert!(response.success);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(daemon.runner.call_count(), 0);

    let run_handle = tokio::spawn(daemon.running.run());
    let shutdown = call(&socket, "shutdown", serde_json::json!({})).await;
    assert!(shutdown.success);
    tokio::time::timeout(Duration::from_secs(2), run_handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn auto_mode_polls_ready_tasks_for_the_project() {
    let daemon = start(SpawnPolicy::Auto, Some("auto-test")).await;
    let socket = daemon.running.socket_path().to_path_buf();

    let response = call(&socket, "status.full", serde_json::json!({})).await;
    assert!(response.success);

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        if !daemon.runner.calls_for("ready").is_empty() {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "no ready poll within 2s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (name, args) = daemon.runner.calls_for("ready")[0].clone();
    assert_eq!(name, "prog");
    assert_eq!(args, ["ready", "-p", "auto-test"]);

    daemon.running.stop().await.unwrap();
}

#[tokio::test]
async fn auto_mode_schedules_polled_tasks_through_the_hook() {
    let daemon = start(SpawnPolicy::Auto, Some("auto-test")).await;

    daemon
        .runner
        .respond("ready", Ok(b"ID PRI TITLE\nts-1450cd 1 [DoD] Daemon\n".to_vec()));

    wait_until(|| daemon.starter.start_count() == 1).await;

    // Pre-spawn hook ran for the admitted task
    let starts = daemon.runner.calls_for("start");
    assert_eq!(starts[0].1, vec!["start".to_string(), "ts-1450cd".to_string()]);

    // Child argv follows the configured spawn command plus --attach
    let spec = &daemon.starter.specs()[0];
    assert_eq!(spec.argv[0], "echo");
    assert_eq!(spec.argv[1], "test");
    let attach_at = spec.argv.iter().position(|a| a == "--attach").unwrap();
    assert_eq!(spec.argv[attach_at + 1], "http://127.0.0.1:8800");

    daemon.running.stop().await.unwrap();
}
