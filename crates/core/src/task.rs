// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task snapshot type.
//!
//! A task is a unit of work drawn from the external tracker (prog). The
//! daemon never mutates tasks; it only observes them and binds agents to
//! their ids.

use serde::{Deserialize, Serialize};

use crate::id::TaskId;

/// Immutable snapshot of an externally-tracked unit of work.
///
/// Identity is `id`; `priority` and `title` are display/ordering data
/// captured at poll time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub priority: i64,
    pub title: String,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, priority: i64, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority,
            title: title.into(),
        }
    }

    /// Scheduling order: lowest numeric priority first, id lexicographic
    /// as the tie-break.
    pub fn schedule_key(&self) -> (i64, &str) {
        (self.priority, self.id.as_str())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
