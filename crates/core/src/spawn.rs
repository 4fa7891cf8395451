// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manual spawn entries.
//!
//! A spawn is an ad-hoc agent created by RPC rather than drawn from the
//! task tracker. Entries live in the spawn registry until explicitly
//! removed or the daemon exits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::id::{SessionId, SpawnId};

/// Lifecycle state of a manual spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnState {
    Pending,
    Running,
    Exited,
    Failed,
}

impl SpawnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SpawnState::Exited | SpawnState::Failed)
    }
}

impl fmt::Display for SpawnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpawnState::Pending => "pending",
            SpawnState::Running => "running",
            SpawnState::Exited => "exited",
            SpawnState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A manual spawn tracked out-of-pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnEntry {
    pub spawn_id: SpawnId,
    pub pid: u32,
    pub state: SpawnState,
    pub prompt: String,
    /// Unix epoch milliseconds at spawn time.
    pub spawn_time_ms: u64,
    pub log_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Attach target the child was given, when one was appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_ref: Option<String>,
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
