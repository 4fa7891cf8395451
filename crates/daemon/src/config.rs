// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: TOML file plus environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use af_core::mode::UnknownSpawnPolicy;
use af_core::SpawnPolicy;

/// Default tick for `prog ready` polling.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default tick for pool liveness reconciliation.
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Default TERM→KILL grace on shutdown.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Configuration errors. All fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Policy(#[from] UnknownSpawnPolicy),

    #[error("spawn-policy auto requires project")]
    AutoRequiresProject,

    #[error("pool_size must be at least 1")]
    PoolSizeZero,

    #[error("socket_path is required")]
    MissingSocketPath,
}

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the control socket (required).
    pub socket_path: PathBuf,
    /// External project identifier; required when `spawn_policy` is auto.
    pub project: Option<String>,
    pub poll_interval: Duration,
    /// Max concurrent pool agents (≥ 1).
    pub pool_size: usize,
    /// Command string for agent children; whitespace-tokenized, no quoting.
    pub spawn_cmd: String,
    pub spawn_policy: SpawnPolicy,
    pub reconcile_interval: Duration,
    /// Attach target handed to children via `--attach`.
    pub server_url: String,
    /// Root for per-task JSONL agent logs.
    pub log_dir: PathBuf,
    /// Override directory for prompt templates.
    pub prompt_dir: Option<PathBuf>,
    /// Daemon's own log file.
    pub daemon_log_path: PathBuf,
    pub shutdown_grace: Duration,
}

/// Raw TOML shape; everything optional, durations in milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    socket_path: Option<PathBuf>,
    project: Option<String>,
    poll_interval_ms: Option<u64>,
    pool_size: Option<usize>,
    spawn_cmd: Option<String>,
    spawn_policy: Option<String>,
    reconcile_interval_ms: Option<u64>,
    server_url: Option<String>,
    log_dir: Option<PathBuf>,
    prompt_dir: Option<PathBuf>,
    shutdown_grace_ms: Option<u64>,
}

impl Config {
    /// Load configuration from the state directory.
    ///
    /// `AETHERFLOW_CONFIG` points at an explicit TOML file; otherwise
    /// `<state_dir>/config.toml` is read when present. Missing files fall
    /// back to defaults rooted in the state directory.
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = state_dir()?;
        let config_path = match std::env::var("AETHERFLOW_CONFIG") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => {
                let default = state_dir.join("config.toml");
                default.exists().then_some(default)
            }
        };

        let raw = match &config_path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                toml::from_str(&text).map_err(|source| ConfigError::Toml {
                    path: path.clone(),
                    source,
                })?
            }
            None => RawConfig::default(),
        };

        Self::from_raw(raw, &state_dir)
    }

    fn from_raw(raw: RawConfig, state_dir: &Path) -> Result<Self, ConfigError> {
        let spawn_policy = match raw.spawn_policy {
            Some(policy) => policy.parse::<SpawnPolicy>()?,
            None => SpawnPolicy::Manual,
        };

        let config = Self {
            socket_path: raw
                .socket_path
                .unwrap_or_else(|| state_dir.join("daemon.sock")),
            project: raw.project.filter(|p| !p.is_empty()),
            poll_interval: raw
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            pool_size: raw.pool_size.unwrap_or(4),
            spawn_cmd: raw.spawn_cmd.unwrap_or_else(|| "claude".to_string()),
            spawn_policy,
            reconcile_interval: raw
                .reconcile_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RECONCILE_INTERVAL),
            server_url: raw
                .server_url
                .unwrap_or_else(|| "http://127.0.0.1:8787".to_string()),
            log_dir: raw.log_dir.unwrap_or_else(|| state_dir.join("logs")),
            prompt_dir: raw.prompt_dir,
            daemon_log_path: state_dir.join("daemon.log"),
            shutdown_grace: raw
                .shutdown_grace_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints. Called by `load`; call again after
    /// constructing a config by hand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingSocketPath);
        }
        if self.pool_size == 0 {
            return Err(ConfigError::PoolSizeZero);
        }
        if self.spawn_policy == SpawnPolicy::Auto && self.project.is_none() {
            return Err(ConfigError::AutoRequiresProject);
        }
        Ok(())
    }
}

/// State directory: `AETHERFLOW_STATE_DIR`, then `$XDG_STATE_HOME/aetherflow`,
/// then `~/.local/state/aetherflow`.
fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("AETHERFLOW_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("aetherflow"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/aetherflow"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
