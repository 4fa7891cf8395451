// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent roles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role an agent assumes for its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Worker,
    Planner,
}

impl Role {
    /// Infer the role for a task from its tracker metadata (labels from
    /// `prog show`).
    ///
    /// Current policy: every task gets a worker. The hook takes the labels
    /// so a future policy has its inputs; callers must not special-case
    /// around it.
    pub fn infer(_labels: &[String]) -> Role {
        Role::Worker
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Worker => "worker",
            Role::Planner => "planner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
