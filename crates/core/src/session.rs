// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-claim records.
//!
//! When the claim engine binds an externally-minted session id to a pool
//! agent or a manual spawn, a record of the binding is persisted through
//! the session store so later daemon instances can resolve history.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::{SessionId, TaskId};

/// Which side of the daemon a session was bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOrigin {
    Pool,
    Spawn,
}

impl fmt::Display for SessionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionOrigin::Pool => "pool",
            SessionOrigin::Spawn => "spawn",
        };
        f.write_str(s)
    }
}

/// Persisted record of a session binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub origin: SessionOrigin,
    /// Pool agent id or spawn id, depending on origin.
    pub bound_to: String,
    /// Task the bound agent was computing, when origin is the pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Unix epoch milliseconds at claim time.
    pub claimed_at_ms: u64,
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
