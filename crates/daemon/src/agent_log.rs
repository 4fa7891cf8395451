// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reading the children's JSONL logs.
//!
//! Agents stream structured JSONL to a per-task log file. `status.agent`
//! surfaces the most recent tool calls from that file. Parsing is lenient:
//! lines that are not JSON objects or not tool calls are skipped.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use af_core::TaskId;

/// Default number of tool calls surfaced by `status.agent`.
pub const DEFAULT_TOOL_CALL_LIMIT: usize = 10;

/// Per-task JSONL log path under the configured log root.
pub fn log_file_path(log_dir: &Path, task_id: &TaskId) -> PathBuf {
    log_dir.join(format!("{task_id}.jsonl"))
}

/// Log path for a manual spawn.
pub fn spawn_log_path(log_dir: &Path, stem: &str) -> PathBuf {
    log_dir.join(format!("{stem}.jsonl"))
}

/// A tool invocation extracted from an agent's JSONL log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub tool: String,
    #[serde(default)]
    pub detail: String,
}

/// Raw JSONL line shape; anything with a `tool` field counts.
#[derive(Deserialize)]
struct RawLine {
    #[serde(default)]
    ts: Option<String>,
    tool: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}

/// The last `limit` tool calls from a JSONL log, oldest first.
///
/// Missing or unreadable files yield an empty list; the caller treats log
/// inspection as best-effort.
pub fn recent_tool_calls(path: &Path, limit: usize) -> Vec<ToolCallEntry> {
    let Ok(file) = File::open(path) else {
        return Vec::new();
    };
    let limit = limit.max(1);

    let mut recent: VecDeque<ToolCallEntry> = VecDeque::with_capacity(limit);
    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { break };
        let Ok(raw) = serde_json::from_str::<RawLine>(&line) else {
            continue;
        };
        let Some(tool) = raw.tool else { continue };

        let detail = raw.detail.unwrap_or_else(|| {
            raw.input
                .as_ref()
                .map(summarize_input)
                .unwrap_or_default()
        });
        if recent.len() == limit {
            recent.pop_front();
        }
        recent.push_back(ToolCallEntry {
            timestamp: raw.ts,
            tool,
            detail,
        });
    }
    recent.into_iter().collect()
}

/// Compact one-line rendering of a tool input object.
fn summarize_input(input: &serde_json::Value) -> String {
    match input {
        serde_json::Value::String(s) => s.clone(),
        other => {
            let text = other.to_string();
            if text.chars().count() > 120 {
                let head: String = text.chars().take(119).collect();
                format!("{head}…")
            } else {
                text
            }
        }
    }
}

#[cfg(test)]
#[path = "agent_log_tests.rs"]
mod tests;
