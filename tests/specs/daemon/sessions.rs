//! Session event ingestion and claim behavior over the wire.

use crate::prelude::*;
use af_core::{SessionOrigin, SpawnPolicy};
use af_daemon::protocol::{FullStatus, SpawnStartResult};

#[tokio::test]
async fn session_claim_binds_single_pool_agent() {
    let daemon = start(SpawnPolicy::Auto, Some("auto-test")).await;
    let socket = daemon.running.socket_path().to_path_buf();

    // Drive one agent into the pool via the poller
    daemon
        .runner
        .respond("ready", Ok(b"ID PRI TITLE\nts-1 1 only task\n".to_vec()));
    wait_until(|| daemon.starter.start_count() == 1).await;

    let response = call(
        &socket,
        "session.event",
        serde_json::json!({
            "event_type": "session.created",
            "session_id": "ses-claimed",
            "timestamp": 1000,
        }),
    )
    .await;
    assert!(response.success);

    let status: FullStatus = call(&socket, "status.full", serde_json::json!({}))
        .await
        .result_as()
        .unwrap();
    assert_eq!(
        status.agents[0].agent.session_id.as_ref().map(|s| s.as_str()),
        Some("ses-claimed")
    );

    wait_until(|| !daemon.store.records().is_empty()).await;
    let records = daemon.store.records();
    assert_eq!(records[0].origin, SessionOrigin::Pool);
    assert_eq!(records[0].session_id, "ses-claimed");

    daemon.running.stop().await.unwrap();
}

#[tokio::test]
async fn ambiguous_claim_binds_neither_spawn() {
    let daemon = start(SpawnPolicy::Manual, None).await;
    let socket = daemon.running.socket_path().to_path_buf();

    for prompt in ["first", "second"] {
        let response = call(
            &socket,
            "spawn.start",
            serde_json::json!({ "prompt": prompt }),
        )
        .await;
        assert!(response.success);
    }

    let response = call(
        &socket,
        "session.event",
        serde_json::json!({
            "event_type": "session.created",
            "session_id": "ses-ambiguous",
            "timestamp": 1000,
        }),
    )
    .await;
    assert!(response.success, "ingestion succeeds despite ambiguity");

    let status: FullStatus = call(&socket, "status.full", serde_json::json!({}))
        .await
        .result_as()
        .unwrap();
    assert_eq!(status.spawns.len(), 2);
    for spawn in &status.spawns {
        assert!(spawn.session_id.is_none(), "ambiguity must bind nothing");
    }
    assert!(daemon.store.records().is_empty());

    daemon.running.stop().await.unwrap();
}

#[tokio::test]
async fn event_buffers_are_isolated_per_session() {
    let daemon = start(SpawnPolicy::Manual, None).await;
    let socket = daemon.running.socket_path().to_path_buf();

    for session in ["ses-1", "ses-2"] {
        let response = call(
            &socket,
            "session.event",
            serde_json::json!({
                "event_type": "session.created",
                "session_id": session,
                "timestamp": 1000,
            }),
        )
        .await;
        assert!(response.success);
    }

    for session in ["ses-1", "ses-2"] {
        let response = call(
            &socket,
            "session.events",
            serde_json::json!({ "session_id": session }),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["events"].as_array().unwrap().len(), 1);
    }

    daemon.running.stop().await.unwrap();
}

#[tokio::test]
async fn session_event_field_validation_over_the_wire() {
    let daemon = start(SpawnPolicy::Manual, None).await;
    let socket = daemon.running.socket_path().to_path_buf();

    let response = call(
        &socket,
        "session.event",
        serde_json::json!({ "event_type": "session.created" }),
    )
    .await;
    assert_eq!(response.error.as_deref(), Some("session_id is required"));

    let response = call(
        &socket,
        "session.event",
        serde_json::json!({ "session_id": "ses-1" }),
    )
    .await;
    assert_eq!(response.error.as_deref(), Some("event_type is required"));

    daemon.running.stop().await.unwrap();
}

#[tokio::test]
async fn manual_spawn_lifecycle_over_the_wire() {
    let daemon = start(SpawnPolicy::Manual, None).await;
    let socket = daemon.running.socket_path().to_path_buf();

    let response = call(
        &socket,
        "spawn.start",
        serde_json::json!({ "prompt": "investigate flaky test" }),
    )
    .await;
    let spawn: SpawnStartResult = response.result_as().unwrap();

    // logs.path resolves the spawn entry
    let response = call(
        &socket,
        "logs.path",
        serde_json::json!({ "agent_name": spawn.spawn_id }),
    )
    .await;
    assert!(response.success);

    // A created session binds to the lone running spawn
    let response = call(
        &socket,
        "session.event",
        serde_json::json!({
            "event_type": "session.created",
            "session_id": "ses-spawn",
            "timestamp": 5,
        }),
    )
    .await;
    assert!(response.success);

    wait_until(|| !daemon.store.records().is_empty()).await;
    assert_eq!(daemon.store.records()[0].origin, SessionOrigin::Spawn);

    daemon.running.stop().await.unwrap();
}
