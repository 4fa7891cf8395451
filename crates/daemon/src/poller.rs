// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic poll of ready tasks from the tracker.
//!
//! Emits non-empty batches on a channel: one immediate poll at start, then
//! one per interval. Poll failures are logged and swallowed so a flaky
//! tracker never stops the stream; only cancellation closes it.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use af_adapters::prog::{self, ProgError};
use af_adapters::{Runner, RunnerError};
use af_core::Task;

/// Errors from a single poll.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Parse(#[from] ProgError),
}

/// Periodic ready-task poller.
pub struct Poller {
    project: String,
    interval: Duration,
    runner: Arc<dyn Runner>,
}

impl Poller {
    pub fn new(project: impl Into<String>, interval: Duration, runner: Arc<dyn Runner>) -> Self {
        Self {
            project: project.into(),
            interval,
            runner,
        }
    }

    /// One-shot poll: list ready tasks for the project.
    pub async fn poll(&self) -> Result<Vec<Task>, PollError> {
        let output = self
            .runner
            .run(prog::PROG_BIN, &prog::ready_args(&self.project))
            .await?;
        Ok(prog::parse_ready_table(&output)?)
    }

    /// Start the polling stream. The receiver yields non-empty batches;
    /// it closes when `cancel` fires.
    pub fn start(self, cancel: CancellationToken) -> mpsc::Receiver<Vec<Task>> {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            loop {
                match self.poll().await {
                    Ok(batch) if batch.is_empty() => {
                        debug!(project = %self.project, "no ready tasks");
                    }
                    Ok(batch) => {
                        debug!(project = %self.project, tasks = batch.len(), "ready batch");
                        if tx.send(batch).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(project = %self.project, error = %e, "poll failed");
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        });
        rx
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
