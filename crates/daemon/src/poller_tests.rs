// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use af_adapters::FakeRunner;

const TABLE: &[u8] = b"ID PRI TITLE\nts-1450cd 1 [DoD] Daemon\nep-82985b 2 [DoD] Supervisor\n";

#[tokio::test]
async fn poll_parses_ready_table() {
    let runner = FakeRunner::new();
    runner.respond("ready", Ok(TABLE.to_vec()));
    let poller = Poller::new("demo", Duration::from_secs(30), Arc::new(runner.clone()));

    let tasks = poller.poll().await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].id, "ts-1450cd");
    assert_eq!(tasks[1].title, "[DoD] Supervisor");

    let calls = runner.calls();
    assert_eq!(calls[0].0, "prog");
    assert_eq!(calls[0].1, ["ready", "-p", "demo"]);
}

#[tokio::test]
async fn poll_surfaces_runner_errors() {
    let runner = FakeRunner::new();
    runner.respond("ready", Err("tracker down".to_string()));
    let poller = Poller::new("demo", Duration::from_secs(30), Arc::new(runner));
    assert!(matches!(poller.poll().await, Err(PollError::Runner(_))));
}

#[tokio::test]
async fn poll_surfaces_parse_errors() {
    let runner = FakeRunner::new();
    runner.respond("ready", Ok(b"ID PRI TITLE\nts-1 high broken\n".to_vec()));
    let poller = Poller::new("demo", Duration::from_secs(30), Arc::new(runner));
    assert!(matches!(poller.poll().await, Err(PollError::Parse(_))));
}

#[tokio::test]
async fn stream_emits_immediately_then_on_interval() {
    let runner = FakeRunner::new();
    runner.respond("ready", Ok(TABLE.to_vec()));
    let poller = Poller::new("demo", Duration::from_millis(10), Arc::new(runner.clone()));

    let cancel = CancellationToken::new();
    let mut rx = poller.start(cancel.clone());

    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.len(), 2);

    let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.len(), 2);
    assert!(runner.call_count() >= 2);
    cancel.cancel();
}

#[tokio::test]
async fn empty_batches_are_not_emitted() {
    let runner = FakeRunner::new();
    runner.respond("ready", Ok(b"ID PRI TITLE\n".to_vec()));
    let poller = Poller::new("demo", Duration::from_millis(5), Arc::new(runner.clone()));

    let cancel = CancellationToken::new();
    let mut rx = poller.start(cancel.clone());

    let result = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(result.is_err(), "expected silence on empty batches");
    assert!(runner.call_count() >= 2, "polling must continue regardless");
    cancel.cancel();
}

#[tokio::test]
async fn errors_are_swallowed_and_polling_continues() {
    let runner = FakeRunner::new();
    runner.respond("ready", Err("boom".to_string()));
    runner.respond("ready", Ok(TABLE.to_vec()));
    let poller = Poller::new("demo", Duration::from_millis(5), Arc::new(runner));

    let cancel = CancellationToken::new();
    let mut rx = poller.start(cancel.clone());

    // First poll fails silently; the second delivers
    let batch = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.len(), 2);
    cancel.cancel();
}

#[tokio::test]
async fn cancellation_closes_the_stream() {
    let runner = FakeRunner::new();
    runner.respond("ready", Ok(b"ID PRI TITLE\n".to_vec()));
    let poller = Poller::new("demo", Duration::from_secs(60), Arc::new(runner));

    let cancel = CancellationToken::new();
    let mut rx = poller.start(cancel.clone());
    cancel.cancel();

    let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap();
    assert!(closed.is_none());
}
