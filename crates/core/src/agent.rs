// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent slot lifecycle states.
//!
//! An agent is a pool slot owning one child process, bound to exactly one
//! task. The slot is owned exclusively by the pool while non-terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a pool agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Child process is being launched
    Starting,
    /// Child process observed alive
    Running,
    /// Shutdown or cancellation in flight
    Stopping,
    /// Child reaped; slot is being respawned or retired to the recent ring
    Terminal,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Terminal)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Starting => "starting",
            AgentState::Running => "running",
            AgentState::Stopping => "stopping",
            AgentState::Terminal => "terminal",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
