// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot-time recovery of orphaned in-progress tasks.
//!
//! Tasks the tracker believes are in progress but that have no live agent
//! (the previous daemon died under them) are respawned into the pool.
//! Idempotent: tasks already represented are skipped, and anything beyond
//! pool capacity is deferred to later poll ticks or the next restart.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use af_adapters::prog::{self, ProgError};
use af_adapters::{Runner, RunnerError};
use af_core::{PoolMode, Role, Task, TaskId};

use crate::pool::Pool;

/// Errors enumerating in-progress tasks.
#[derive(Debug, Error)]
pub enum ReclaimError {
    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Parse(#[from] ProgError),
}

/// One-shot orphan reclaimer.
pub struct Reclaimer {
    project: String,
    runner: Arc<dyn Runner>,
}

impl Reclaimer {
    pub fn new(project: impl Into<String>, runner: Arc<dyn Runner>) -> Self {
        Self {
            project: project.into(),
            runner,
        }
    }

    /// Respawn orphaned in-progress tasks into the pool. Returns how many
    /// respawns were initiated.
    pub async fn run(&self, pool: &Arc<Pool>) -> Result<usize, ReclaimError> {
        if pool.mode() == PoolMode::Paused {
            info!("pool paused, skipping reclaim");
            return Ok(0);
        }

        let output = self
            .runner
            .run(prog::PROG_BIN, &prog::list_in_progress_args(&self.project))
            .await?;
        let in_progress = prog::parse_task_list(&output)?;
        if in_progress.is_empty() {
            return Ok(0);
        }

        let mut reclaimed = 0;
        for info in in_progress {
            let task_id = TaskId::new(&info.id);
            if pool.contains(&task_id) {
                continue;
            }
            if !pool.has_capacity() {
                debug!(task = %task_id, "pool full, deferring orphan");
                continue;
            }

            let role = self.infer_role(&task_id).await;
            info!(task = %task_id, %role, "reclaiming orphaned task");
            pool.respawn(Task::new(info.id, 0, info.title), role);
            reclaimed += 1;
        }

        if reclaimed > 0 {
            info!(count = reclaimed, "reclaim initiated");
        }
        Ok(reclaimed)
    }

    /// Role for a reclaimed task, from its tracker labels. Best-effort:
    /// an unreadable task falls back to the default policy.
    async fn infer_role(&self, task_id: &TaskId) -> Role {
        let labels = match self
            .runner
            .run(prog::PROG_BIN, &prog::show_args(task_id, Some(&self.project)))
            .await
        {
            Ok(output) => prog::parse_task_detail(&output)
                .map(|detail| detail.labels)
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        Role::infer(&labels)
    }
}

#[cfg(test)]
#[path = "reclaimer_tests.rs"]
mod tests;
