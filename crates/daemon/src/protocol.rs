// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC wire protocol for daemon communication.
//!
//! Wire format: one `\n`-terminated JSON object per direction. Requests
//! are `{method, params}`; responses are `{success, result?, error?}`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use af_core::{PoolMode, SpawnEntry, SpawnPolicy, Task};

use crate::agent_log::ToolCallEntry;
use crate::pool::{AgentSnapshot, RecentAgent};

/// Maximum accepted line length (1 MB).
pub const MAX_LINE_SIZE: usize = 1024 * 1024;

/// Default IPC timeout.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Request from a client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Response from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(result: impl Serialize) -> Self {
        Self {
            success: true,
            result: serde_json::to_value(result).ok(),
            error: None,
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            success: true,
            result: None,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.into()),
        }
    }

    /// Deserialize the result payload.
    pub fn result_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let value = self.result.clone().unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }
}

/// Params for `session.event`.
///
/// Fields default so that presence checks can produce the field-specific
/// "… is required" errors instead of a serde failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionEventParams {
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Params for `status.agent`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AgentStatusParams {
    pub agent_name: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Params for `logs.path`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LogsPathParams {
    pub agent_name: String,
}

/// Params for `spawn.start`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SpawnStartParams {
    pub prompt: String,
    /// Log file stem under `log_dir`; defaults to the spawn id.
    #[serde(default)]
    pub log_name: Option<String>,
}

/// Params for `spawn.remove`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SpawnRemoveParams {
    pub spawn_id: String,
}

/// Params for `session.events`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SessionEventsParams {
    pub session_id: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Agent entry in `status.full`, enriched with the task title when the
/// tracker answered in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStatusEntry {
    #[serde(flatten)]
    pub agent: AgentSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
}

/// Result of `status.full`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FullStatus {
    pub pool_size: usize,
    pub mode: PoolMode,
    pub spawn_policy: SpawnPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub uptime_secs: u64,
    pub agents: Vec<AgentStatusEntry>,
    /// Ready tasks not currently admitted (auto policy only).
    #[serde(default)]
    pub queue: Vec<Task>,
    #[serde(default)]
    pub recent: Vec<RecentAgent>,
    #[serde(default)]
    pub spawns: Vec<SpawnEntry>,
    /// Non-fatal enrichment failures.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Result of `status.agent`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDetail {
    #[serde(flatten)]
    pub entry: AgentStatusEntry,
    pub log_path: PathBuf,
    #[serde(default)]
    pub recent_calls: Vec<ToolCallEntry>,
}

/// Result of `logs.path`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogsPathResult {
    pub path: PathBuf,
}

/// Result of `spawn.start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpawnStartResult {
    pub spawn_id: String,
    pub pid: u32,
    pub log_path: PathBuf,
}

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line too long: {size} bytes (max {max})")]
    LineTooLong { size: usize, max: usize },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,
}

/// Read one `\n`-terminated JSON line.
pub async fn read_line<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<String, ProtocolError> {
    let mut line = String::new();
    let n = tokio::time::timeout(timeout, reader.read_line(&mut line))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    if line.len() > MAX_LINE_SIZE {
        return Err(ProtocolError::LineTooLong {
            size: line.len(),
            max: MAX_LINE_SIZE,
        });
    }
    Ok(line)
}

/// Write one value as a JSON line.
pub async fn write_line<W: tokio::io::AsyncWrite + Unpin, T: Serialize>(
    writer: &mut W,
    value: &T,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let mut data = serde_json::to_vec(value)?;
    data.push(b'\n');
    tokio::time::timeout(timeout, async {
        writer.write_all(&data).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| ProtocolError::Timeout)??;
    Ok(())
}

/// One-shot client call: connect, send the request, read the response.
pub async fn call(
    socket_path: &std::path::Path,
    request: &Request,
) -> Result<Response, ProtocolError> {
    let stream = UnixStream::connect(socket_path).await?;
    let (read_half, mut write_half) = stream.into_split();
    write_line(&mut write_half, request, DEFAULT_TIMEOUT).await?;
    let mut reader = BufReader::new(read_half);
    let line = read_line(&mut reader, DEFAULT_TIMEOUT).await?;
    Ok(serde_json::from_str(&line)?)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
