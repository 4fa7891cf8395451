// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn load_from(dir: &Path, toml: &str) -> Result<Config, ConfigError> {
    let path = dir.join("config.toml");
    std::fs::write(&path, toml).unwrap();
    std::env::set_var("AETHERFLOW_CONFIG", &path);
    std::env::set_var("AETHERFLOW_STATE_DIR", dir);
    let result = Config::load();
    std::env::remove_var("AETHERFLOW_CONFIG");
    std::env::remove_var("AETHERFLOW_STATE_DIR");
    result
}

#[test]
#[serial]
fn defaults_root_in_state_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_from(dir.path(), "").unwrap();
    assert_eq!(config.socket_path, dir.path().join("daemon.sock"));
    assert_eq!(config.log_dir, dir.path().join("logs"));
    assert_eq!(config.spawn_policy, SpawnPolicy::Manual);
    assert_eq!(config.pool_size, 4);
    assert!(config.project.is_none());
}

#[test]
#[serial]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_from(
        dir.path(),
        r#"
            socket_path = "/tmp/af-test.sock"
            project = "demo"
            spawn_policy = "auto"
            pool_size = 2
            poll_interval_ms = 10
            spawn_cmd = "echo test"
        "#,
    )
    .unwrap();
    assert_eq!(config.socket_path, PathBuf::from("/tmp/af-test.sock"));
    assert_eq!(config.project.as_deref(), Some("demo"));
    assert_eq!(config.spawn_policy, SpawnPolicy::Auto);
    assert_eq!(config.poll_interval, Duration::from_millis(10));
    assert_eq!(config.spawn_cmd, "echo test");
}

#[test]
#[serial]
fn auto_without_project_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_from(dir.path(), "spawn_policy = \"auto\"").unwrap_err();
    assert!(err.to_string().contains("requires project"));
}

#[test]
#[serial]
fn unknown_spawn_policy_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_from(dir.path(), "spawn_policy = \"bogus\"").unwrap_err();
    assert_eq!(err.to_string(), "unknown spawn-policy: bogus");
}

#[test]
#[serial]
fn zero_pool_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_from(dir.path(), "pool_size = 0").unwrap_err();
    assert!(err.to_string().contains("at least 1"));
}

#[test]
#[serial]
fn unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_from(dir.path(), "socket = \"/tmp/x\"").unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
}

#[test]
#[serial]
fn empty_project_counts_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_from(
        dir.path(),
        "spawn_policy = \"auto\"\nproject = \"\"",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::AutoRequiresProject));
}
