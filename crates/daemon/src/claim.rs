// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-claim engine.
//!
//! A `session.created` event carries an externally-minted session id. If
//! exactly one unbound running candidate exists across the pool and the
//! spawn registry, the session binds to it and the binding is persisted.
//! Zero candidates is an orphan (dropped, not an error); more than one is
//! ambiguous and binds nothing rather than guessing.

use std::sync::Arc;
use tracing::{info, warn};

use af_adapters::SessionStore;
use af_core::{
    Clock, SessionId, SessionOrigin, SessionRecord, SpawnState, SystemClock, TaskId,
};

use crate::pool::Pool;
use crate::registry::SpawnRegistry;

/// Outcome of one claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Bound {
        origin: SessionOrigin,
        bound_to: String,
    },
    Orphan,
    Ambiguous {
        candidates: usize,
    },
    /// A single candidate existed but was bound or retired in between.
    Lost,
}

/// Attempt to bind `session_id` to the single unbound candidate.
pub async fn claim_session(
    session_id: &SessionId,
    pool: &Pool,
    registry: &SpawnRegistry,
    store: Option<&Arc<dyn SessionStore>>,
) -> ClaimOutcome {
    let pool_candidates = pool.claim_candidates();
    let spawn_candidates: Vec<_> = registry
        .list()
        .into_iter()
        .filter(|e| e.state == SpawnState::Running && e.session_id.is_none())
        .collect();

    let total = pool_candidates.len() + spawn_candidates.len();
    match total {
        0 => {
            info!(session = %session_id, "orphan session, no unbound candidates");
            ClaimOutcome::Orphan
        }
        1 => {
            let (origin, bound_to, task_id) = if let Some(agent) = pool_candidates.first() {
                if !pool.bind_session(&agent.task_id, session_id.clone()) {
                    return ClaimOutcome::Lost;
                }
                (
                    SessionOrigin::Pool,
                    agent.id.clone(),
                    Some(agent.task_id.clone()),
                )
            } else {
                let entry = &spawn_candidates[0];
                let bind = registry.update(&entry.spawn_id, |e| {
                    e.session_id = Some(session_id.clone());
                });
                if bind.is_err() {
                    return ClaimOutcome::Lost;
                }
                (SessionOrigin::Spawn, entry.spawn_id.to_string(), None)
            };

            info!(session = %session_id, %origin, bound_to = %bound_to, "session claimed");
            persist(session_id, origin, &bound_to, task_id, store).await;
            ClaimOutcome::Bound { origin, bound_to }
        }
        candidates => {
            warn!(
                session = %session_id,
                candidates,
                "ambiguous session claim, binding nothing"
            );
            ClaimOutcome::Ambiguous { candidates }
        }
    }
}

async fn persist(
    session_id: &SessionId,
    origin: SessionOrigin,
    bound_to: &str,
    task_id: Option<TaskId>,
    store: Option<&Arc<dyn SessionStore>>,
) {
    let Some(store) = store else { return };
    let record = SessionRecord {
        session_id: session_id.clone(),
        origin,
        bound_to: bound_to.to_string(),
        task_id,
        claimed_at_ms: SystemClock.epoch_ms(),
    };
    if let Err(e) = store.record(&record).await {
        warn!(session = %session_id, error = %e, "failed to persist session record");
    }
}

#[cfg(test)]
#[path = "claim_tests.rs"]
mod tests;
