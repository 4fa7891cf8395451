// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool scheduler: consumes poller batches under the auto spawn policy.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use af_adapters::prog;
use af_adapters::Runner;
use af_core::{PoolMode, Role, Task};

use super::Pool;

impl Pool {
    /// Start the batch consumer. Idempotent: later calls are no-ops.
    ///
    /// For each batch, tasks are admitted in priority order (lowest numeric
    /// first, id as tie-break). The `prog start` pre-spawn hook runs only
    /// for tasks that pass the admission pre-checks; hook failure skips the
    /// task for this batch and the next poll retries it.
    pub fn start_scheduler(
        self: &Arc<Self>,
        mut batches: mpsc::Receiver<Vec<Task>>,
        runner: Arc<dyn Runner>,
    ) {
        if self.scheduler_started.swap(true, Ordering::SeqCst) {
            debug!("scheduler already started");
            return;
        }

        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let cancel = pool.cancel_token();
            loop {
                let batch = tokio::select! {
                    _ = cancel.cancelled() => return,
                    batch = batches.recv() => match batch {
                        Some(batch) => batch,
                        None => return,
                    },
                };
                pool.schedule_batch(batch, runner.as_ref()).await;
            }
        });
    }

    async fn schedule_batch(self: &Arc<Self>, mut batch: Vec<Task>, runner: &dyn Runner) {
        batch.sort_by(|a, b| a.schedule_key().cmp(&b.schedule_key()));
        debug!(tasks = batch.len(), "scheduling batch");

        for task in batch {
            if self.mode() == PoolMode::Paused {
                debug!("pool paused, dropping rest of batch");
                return;
            }
            if !self.has_capacity() {
                debug!("pool full, dropping rest of batch");
                return;
            }
            if self.contains(&task.id) {
                continue;
            }

            // Pre-spawn hook: mark the task in-progress in the tracker
            if let Err(e) = runner
                .run(prog::PROG_BIN, &prog::start_args(&task.id))
                .await
            {
                warn!(task = %task.id, error = %e, "prog start failed, skipping task this batch");
                continue;
            }

            let task_id = task.id.clone();
            match self.spawn(task, Role::Worker).await {
                Ok(name) => info!(task = %task_id, agent = %name, "scheduled"),
                Err(e) => warn!(task = %task_id, error = %e, "spawn failed"),
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
