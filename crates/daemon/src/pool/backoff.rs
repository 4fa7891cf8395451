// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task respawn backoff.
//!
//! Each task accumulates a failure counter that doubles the respawn delay
//! up to a cap. Running for the reset window clears the counter. A burst
//! of fast failures gives up on the task entirely.

use std::collections::HashMap;
use std::time::Duration;

use af_core::TaskId;

/// First-failure respawn delay.
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Delay cap.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Continuous running for this long clears the failure counter.
const RESET_AFTER: Duration = Duration::from_secs(60);

/// A run shorter than this counts as a fast failure.
const FAST_RUN: Duration = Duration::from_secs(10);

/// Consecutive fast failures before giving up on the task.
const MAX_FAST_FAILURES: u32 = 5;

/// Decision after an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Next {
    Retry { delay: Duration },
    FailedTerminal,
}

#[derive(Debug, Default, Clone, Copy)]
struct BackoffState {
    failures: u32,
    fast_failures: u32,
}

/// Tracks failure counters per task id.
#[derive(Debug, Default)]
pub(crate) struct BackoffTracker {
    states: HashMap<TaskId, BackoffState>,
}

impl BackoffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an exit after `ran_for` of running and decide what happens
    /// next. A zero `ran_for` is also used for start failures.
    pub fn on_exit(&mut self, task_id: &TaskId, ran_for: Duration) -> Next {
        let state = self.states.entry(task_id.clone()).or_default();
        if ran_for >= RESET_AFTER {
            *state = BackoffState::default();
        }

        state.failures += 1;
        if ran_for < FAST_RUN {
            state.fast_failures += 1;
        } else {
            state.fast_failures = 0;
        }

        if state.fast_failures >= MAX_FAST_FAILURES {
            self.states.remove(task_id);
            return Next::FailedTerminal;
        }

        let exponent = state.failures.saturating_sub(1).min(31);
        let delay = BASE_DELAY
            .checked_mul(1u32 << exponent)
            .unwrap_or(MAX_DELAY)
            .min(MAX_DELAY);
        Next::Retry { delay }
    }

    /// Pending delay for the task's next respawn without recording anything.
    /// Zero when the task has no failure history.
    pub fn current_delay(&self, task_id: &TaskId) -> Duration {
        match self.states.get(task_id) {
            None => Duration::ZERO,
            Some(state) if state.failures == 0 => Duration::ZERO,
            Some(state) => {
                let exponent = state.failures.saturating_sub(1).min(31);
                BASE_DELAY
                    .checked_mul(1u32 << exponent)
                    .unwrap_or(MAX_DELAY)
                    .min(MAX_DELAY)
            }
        }
    }

    /// Forget a task's history (slot retired).
    pub fn clear(&mut self, task_id: &TaskId) {
        self.states.remove(task_id);
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
