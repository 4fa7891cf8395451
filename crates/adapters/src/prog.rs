// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formats and argv builders for the external `prog` work tracker.
//!
//! The daemon never links against prog; it shells out through the Runner
//! and parses the textual/JSON output specified here.

use serde::Deserialize;
use thiserror::Error;

use af_core::{Task, TaskId};

/// Executable name handed to the Runner.
pub const PROG_BIN: &str = "prog";

/// Errors from parsing prog output.
#[derive(Debug, Error)]
pub enum ProgError {
    #[error("output is not utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid priority {value:?} in ready row {row:?}")]
    InvalidPriority { value: String, row: String },

    #[error("malformed ready row {row:?}: expected `id priority title`")]
    MalformedRow { row: String },

    #[error("invalid json from prog: {0}")]
    Json(#[from] serde_json::Error),
}

/// `prog ready -p <project>` — list ready tasks.
pub fn ready_args(project: &str) -> Vec<String> {
    vec!["ready".into(), "-p".into(), project.into()]
}

/// `prog list --status in_progress --type task --json -p <project>`.
pub fn list_in_progress_args(project: &str) -> Vec<String> {
    vec![
        "list".into(),
        "--status".into(),
        "in_progress".into(),
        "--type".into(),
        "task".into(),
        "--json".into(),
        "-p".into(),
        project.into(),
    ]
}

/// `prog show <id> --json [-p <project>]`.
pub fn show_args(task_id: &TaskId, project: Option<&str>) -> Vec<String> {
    let mut args = vec!["show".into(), task_id.to_string(), "--json".into()];
    if let Some(project) = project {
        args.push("-p".into());
        args.push(project.into());
    }
    args
}

/// `prog start <id>` — side-effecting pre-spawn hook.
pub fn start_args(task_id: &TaskId) -> Vec<String> {
    vec!["start".into(), task_id.to_string()]
}

/// Parse the plaintext ready table.
///
/// First non-blank line is the `ID PRI TITLE` header and is skipped, as are
/// blank lines. Remaining rows are three whitespace-delimited columns; the
/// title keeps its words but internal runs of whitespace collapse to a
/// single space. A non-integer priority fails the whole call.
pub fn parse_ready_table(output: &[u8]) -> Result<Vec<Task>, ProgError> {
    let text = std::str::from_utf8(output)?;
    let mut tasks = Vec::new();
    let mut header_seen = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !header_seen {
            header_seen = true;
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(id), Some(priority)) = (fields.next(), fields.next()) else {
            return Err(ProgError::MalformedRow {
                row: line.to_string(),
            });
        };
        let priority: i64 = priority.parse().map_err(|_| ProgError::InvalidPriority {
            value: priority.to_string(),
            row: line.to_string(),
        })?;
        let title = fields.collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            return Err(ProgError::MalformedRow {
                row: line.to_string(),
            });
        }

        tasks.push(Task::new(id, priority, title));
    }

    Ok(tasks)
}

/// Render a task back into the ready-row format.
///
/// `parse_ready_table` of a header plus rendered rows yields the same
/// tasks (titles already have collapsed whitespace after parsing).
pub fn render_ready_row(task: &Task) -> String {
    format!("{} {} {}", task.id, task.priority, task.title)
}

/// One element of `prog list --json` output.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
}

/// Parse `prog list --status in_progress --type task --json` output.
pub fn parse_task_list(output: &[u8]) -> Result<Vec<TaskInfo>, ProgError> {
    Ok(serde_json::from_slice(output)?)
}

/// A log line attached to a task in the tracker.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TaskLog {
    pub message: String,
    pub created_at: String,
}

/// `prog show <id> --json` output.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TaskDetail {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub definition_of_done: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub logs: Vec<TaskLog>,
}

/// Parse `prog show <id> --json` output.
pub fn parse_task_detail(output: &[u8]) -> Result<TaskDetail, ProgError> {
    Ok(serde_json::from_slice(output)?)
}

#[cfg(test)]
#[path = "prog_tests.rs"]
mod tests;
