//! Shared helpers for daemon behavior specs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use af_adapters::{FakeProcessStarter, FakeRunner};
use af_core::SpawnPolicy;
use af_daemon::daemon::{Daemon, DaemonDeps, RunningDaemon};
use af_daemon::protocol::{self, Request, Response};
use af_daemon::Config;

pub struct TestDaemon {
    pub running: RunningDaemon,
    pub runner: FakeRunner,
    pub starter: FakeProcessStarter,
    pub store: af_adapters::MemorySessionStore,
    pub _dir: tempfile::TempDir,
}

pub fn config(dir: &Path, policy: SpawnPolicy, project: Option<&str>) -> Config {
    Config {
        socket_path: dir.join("daemon.sock"),
        project: project.map(str::to_string),
        poll_interval: Duration::from_millis(10),
        pool_size: 1,
        spawn_cmd: "echo test".to_string(),
        spawn_policy: policy,
        reconcile_interval: Duration::from_secs(30),
        server_url: "http://127.0.0.1:8800".to_string(),
        log_dir: dir.join("logs"),
        prompt_dir: None,
        daemon_log_path: dir.join("daemon.log"),
        shutdown_grace: Duration::from_secs(1),
    }
}

/// Start an in-process daemon with fake adapters.
pub async fn start(policy: SpawnPolicy, project: Option<&str>) -> TestDaemon {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), policy, project);
    start_with_config(config, dir).await
}

pub async fn start_with_config(config: Config, dir: tempfile::TempDir) -> TestDaemon {
    let runner = FakeRunner::new();
    let starter = FakeProcessStarter::new();
    let store = af_adapters::MemorySessionStore::new();
    let deps = DaemonDeps {
        runner: Arc::new(runner.clone()),
        starter: Arc::new(starter.clone()),
        provider: None,
        store: Some(Arc::new(store.clone())),
    };
    let running = Daemon::new(config, deps).start().await.unwrap();
    TestDaemon {
        running,
        runner,
        starter,
        store,
        _dir: dir,
    }
}

/// One-shot request against a daemon socket.
pub async fn call(socket: &Path, method: &str, params: serde_json::Value) -> Response {
    protocol::call(socket, &Request::new(method, params))
        .await
        .unwrap()
}

pub async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..400 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
