// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent pool: bounded slots, admission, respawn, reconciliation.
//!
//! The pool owns every live agent exclusively. Each agent's child is held
//! by a dedicated reaper task; the pool keeps only the signalling half and
//! identifies slots by task id, so there is no ownership cycle between
//! agents and the pool.

pub(crate) mod backoff;
pub(crate) mod namegen;
mod scheduler;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use af_adapters::hosts::{allowlist_from_env, validate_attach_url, HostPolicyError};
use af_adapters::prompt::{render_prompt, PromptError};
use af_adapters::starter::{ChildSignal, ProcessStarter, StartError, StartSpec};
use af_adapters::Provider;
use af_core::{AgentState, Clock, PoolMode, Role, SessionId, SystemClock, Task, TaskId};

use crate::agent_log;
use backoff::BackoffTracker;

/// Capacity of the recent ring, newest first.
pub const RECENT_CAPACITY: usize = 16;

/// How long shutdown waits for reapers after SIGKILL before force-draining
/// the slot table.
const KILL_REAP_GRACE: Duration = Duration::from_secs(2);

/// Admission rejections, one variant per violated invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("pool is paused")]
    PoolPaused,

    #[error("pool is full ({size} agents)")]
    PoolFull { size: usize },

    #[error("task {0} already has a live agent")]
    DuplicateTask(TaskId),
}

/// Failures from the spawn path.
#[derive(Debug, Error)]
pub enum SpawnFailure {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("attach url rejected: {0}")]
    Attach(#[from] HostPolicyError),

    #[error("agent failed to start: {0}")]
    Start(#[from] StartError),
}

/// Pool construction parameters, extracted from the daemon config.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub pool_size: usize,
    pub spawn_cmd: String,
    pub server_url: String,
    pub socket_path: PathBuf,
    pub log_dir: PathBuf,
    pub prompt_dir: Option<PathBuf>,
}

/// A live pool slot. The child's waiting half lives in the reaper task.
struct Agent {
    id: String,
    task: Task,
    role: Role,
    pid: u32,
    spawn_time_ms: u64,
    started_at: Instant,
    state: AgentState,
    session_id: Option<SessionId>,
    log_path: PathBuf,
    signal: Option<Arc<dyn ChildSignal>>,
}

/// Copyable view of a live agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSnapshot {
    pub id: String,
    pub task_id: TaskId,
    pub role: Role,
    pub pid: u32,
    pub state: AgentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub spawn_time_ms: u64,
    pub log_path: PathBuf,
}

/// Terminal disposition of a retired slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecentState {
    Terminal,
    FailedTerminal,
}

/// Entry in the recent ring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentAgent {
    pub id: String,
    pub task_id: TaskId,
    pub role: Role,
    pub state: RecentState,
    pub ended_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Bounded pool of supervised agents.
pub struct Pool {
    cfg: PoolConfig,
    starter: Arc<dyn ProcessStarter>,
    provider: Option<Arc<dyn Provider>>,
    agents: RwLock<HashMap<TaskId, Agent>>,
    recent: Mutex<VecDeque<RecentAgent>>,
    mode: RwLock<PoolMode>,
    backoff: Mutex<BackoffTracker>,
    cancel: OnceLock<CancellationToken>,
    scheduler_started: AtomicBool,
}

impl Pool {
    pub fn new(
        cfg: PoolConfig,
        starter: Arc<dyn ProcessStarter>,
        provider: Option<Arc<dyn Provider>>,
    ) -> Self {
        Self {
            cfg,
            starter,
            provider,
            agents: RwLock::new(HashMap::new()),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)),
            mode: RwLock::new(PoolMode::Active),
            backoff: Mutex::new(BackoffTracker::new()),
            cancel: OnceLock::new(),
            scheduler_started: AtomicBool::new(false),
        }
    }

    /// Bind the long-lived run context. Respawn and reconcile tasks treat
    /// its cancellation as shutdown.
    pub fn set_context(&self, token: CancellationToken) {
        let _ = self.cancel.set(token);
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.get_or_init(CancellationToken::new).clone()
    }

    pub fn mode(&self) -> PoolMode {
        *self.mode.read()
    }

    pub fn pause(&self) {
        *self.mode.write() = PoolMode::Paused;
        info!("pool paused");
    }

    pub fn resume(&self) {
        *self.mode.write() = PoolMode::Active;
        info!("pool resumed");
    }

    pub fn pool_size(&self) -> usize {
        self.cfg.pool_size
    }

    pub fn live_count(&self) -> usize {
        self.agents.read().len()
    }

    pub fn has_capacity(&self) -> bool {
        self.live_count() < self.cfg.pool_size
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.agents.read().contains_key(task_id)
    }

    /// Consistent snapshot of all live agents, oldest spawn first.
    pub fn status(&self) -> Vec<AgentSnapshot> {
        let agents = self.agents.read();
        let mut out: Vec<AgentSnapshot> = agents.values().map(snapshot_of).collect();
        out.sort_by(|a, b| {
            a.spawn_time_ms
                .cmp(&b.spawn_time_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    /// Recent ring, newest first.
    pub fn recent(&self) -> Vec<RecentAgent> {
        self.recent.lock().iter().cloned().collect()
    }

    /// Resolve a live agent by pool-local name.
    pub fn snapshot_by_name(&self, name: &str) -> Option<AgentSnapshot> {
        self.agents
            .read()
            .values()
            .find(|a| a.id == name)
            .map(snapshot_of)
    }

    /// Running agents without a bound session, for the claim engine.
    pub fn claim_candidates(&self) -> Vec<AgentSnapshot> {
        self.agents
            .read()
            .values()
            .filter(|a| a.state == AgentState::Running && a.session_id.is_none())
            .map(snapshot_of)
            .collect()
    }

    /// Bind a session id to the agent computing `task_id`. Returns false if
    /// the slot is gone or already bound.
    pub fn bind_session(&self, task_id: &TaskId, session_id: SessionId) -> bool {
        let mut agents = self.agents.write();
        match agents.get_mut(task_id) {
            Some(agent) if agent.session_id.is_none() => {
                agent.session_id = Some(session_id);
                true
            }
            _ => false,
        }
    }

    /// Synchronous admission: reserve a slot and launch one child.
    ///
    /// On start failure the slot is released (no recent entry) and the
    /// error surfaces to the caller.
    pub async fn spawn(self: &Arc<Self>, task: Task, role: Role) -> Result<String, SpawnFailure> {
        let task_id = task.id.clone();
        let name = self.reserve(task, role)?;
        match self.launch(&task_id).await {
            Ok(()) => Ok(name),
            Err(e) => {
                self.release_reservation(&task_id);
                Err(e)
            }
        }
    }

    /// Asynchronous admission used by the reclaimer and the reaper path.
    /// Admission rejections are logged, not surfaced.
    pub fn respawn(self: &Arc<Self>, task: Task, role: Role) {
        let task_id = task.id.clone();
        match self.reserve(task, role) {
            Err(e) => debug!(task = %task_id, error = %e, "respawn skipped"),
            Ok(_name) => {
                let delay = self.backoff.lock().current_delay(&task_id);
                self.schedule_respawn(task_id, delay);
            }
        }
    }

    /// Reserve a slot under the write lock: mode, capacity, and uniqueness
    /// checks are atomic with the insert.
    fn reserve(&self, task: Task, role: Role) -> Result<String, AdmissionError> {
        let mut agents = self.agents.write();
        if *self.mode.read() == PoolMode::Paused {
            return Err(AdmissionError::PoolPaused);
        }
        if agents.len() >= self.cfg.pool_size {
            return Err(AdmissionError::PoolFull {
                size: self.cfg.pool_size,
            });
        }
        if agents.contains_key(&task.id) {
            return Err(AdmissionError::DuplicateTask(task.id));
        }

        let mut taken: HashSet<String> = agents.values().map(|a| a.id.clone()).collect();
        taken.extend(self.recent.lock().iter().map(|r| r.id.clone()));
        let name = namegen::generate(&taken);

        let task_id = task.id.clone();
        let log_path = agent_log::log_file_path(&self.cfg.log_dir, &task_id);
        agents.insert(
            task_id,
            Agent {
                id: name.clone(),
                task,
                role,
                pid: 0,
                spawn_time_ms: SystemClock.epoch_ms(),
                started_at: Instant::now(),
                state: AgentState::Starting,
                session_id: None,
                log_path,
                signal: None,
            },
        );
        Ok(name)
    }

    /// Drop a reservation without touching the recent ring.
    fn release_reservation(&self, task_id: &TaskId) {
        self.agents.write().remove(task_id);
    }

    /// Launch (or relaunch) the child for a reserved slot.
    async fn launch(self: &Arc<Self>, task_id: &TaskId) -> Result<(), SpawnFailure> {
        let (name, role, session_id, log_path) = {
            let agents = self.agents.read();
            let Some(agent) = agents.get(task_id) else {
                // Slot vanished (shutdown force-drain); nothing to do
                return Ok(());
            };
            (
                agent.id.clone(),
                agent.role,
                agent.session_id.clone(),
                agent.log_path.clone(),
            )
        };

        let prompt = render_prompt(self.cfg.prompt_dir.as_deref(), role, task_id)?;
        let argv = self.resolve_argv(session_id.as_ref())?;
        let env = vec![
            (
                "AETHERFLOW_SOCKET".to_string(),
                self.cfg.socket_path.display().to_string(),
            ),
            ("AETHERFLOW_AGENT_ID".to_string(), name.clone()),
            ("AETHERFLOW_TASK_ID".to_string(), task_id.to_string()),
            ("AETHERFLOW_ROLE".to_string(), role.to_string()),
            ("AETHERFLOW_PROMPT".to_string(), prompt),
        ];

        if let Some(provider) = &self.provider {
            if let Err(e) = provider.provision(task_id, role).await {
                warn!(task = %task_id, error = %e, "sandbox provision failed, continuing");
            }
        }

        let spec = StartSpec {
            argv,
            env,
            log_path,
            cwd: None,
        };
        let mut child = self.starter.start(&spec).await?;
        let pid = child.pid();
        let signal = child.signaller();

        {
            let mut agents = self.agents.write();
            let Some(agent) = agents.get_mut(task_id) else {
                // Shutdown raced the start; don't leak the child
                signal.kill();
                return Ok(());
            };
            agent.pid = pid;
            agent.signal = Some(signal);
            agent.state = AgentState::Running;
            agent.started_at = Instant::now();
            agent.spawn_time_ms = SystemClock.epoch_ms();
        }

        let pool = Arc::clone(self);
        let reaper_task = task_id.clone();
        tokio::spawn(async move {
            let exit = child.wait().await;
            pool.handle_exit(reaper_task, exit.code).await;
        });

        info!(agent = %name, task = %task_id, pid, "agent started");
        Ok(())
    }

    /// Tokenize the spawn command and append `--attach` (validated) and,
    /// on respawn, `--session`.
    fn resolve_argv(&self, session: Option<&SessionId>) -> Result<Vec<String>, SpawnFailure> {
        let (argv, _attach) = resolve_spawn_argv(&self.cfg.spawn_cmd, &self.cfg.server_url, session)?;
        Ok(argv)
    }

    /// Reaper tail: decide between retirement and respawn.
    async fn handle_exit(self: Arc<Self>, task_id: TaskId, exit_code: Option<i32>) {
        let ran_for = {
            let agents = self.agents.read();
            match agents.get(&task_id) {
                Some(agent) => agent.started_at.elapsed(),
                // Already force-drained
                None => return,
            }
        };

        let reason = exit_code.map(|c| format!("exited with code {c}"));
        if self.cancel_token().is_cancelled() {
            self.retire(&task_id, RecentState::Terminal, reason);
            return;
        }
        if self.mode() == PoolMode::Paused {
            self.retire(&task_id, RecentState::Terminal, reason);
            return;
        }

        // Keep the slot: state returns to starting while backoff runs
        {
            let mut agents = self.agents.write();
            let Some(agent) = agents.get_mut(&task_id) else {
                return;
            };
            agent.state = AgentState::Starting;
            agent.pid = 0;
            agent.signal = None;
        }

        match self.backoff.lock().on_exit(&task_id, ran_for) {
            backoff::Next::FailedTerminal => {
                let last = exit_code
                    .map(|c| format!("last exit code {c}"))
                    .unwrap_or_else(|| "killed by signal".to_string());
                self.retire(
                    &task_id,
                    RecentState::FailedTerminal,
                    Some(format!("respawn gave up after repeated fast failures ({last})")),
                );
            }
            backoff::Next::Retry { delay } => {
                info!(
                    task = %task_id,
                    exit_code,
                    delay_ms = delay.as_millis() as u64,
                    "agent exited, respawning"
                );
                self.schedule_respawn(task_id, delay);
            }
        }
    }

    /// Relaunch a reserved slot after `delay`, retrying with backoff on
    /// start failure. Cancellation or pausing retires the slot instead.
    fn schedule_respawn(self: &Arc<Self>, task_id: TaskId, delay: Duration) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let cancel = pool.cancel_token();
            let mut delay = delay;
            loop {
                if !delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            pool.retire(&task_id, RecentState::Terminal, None);
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                if cancel.is_cancelled() {
                    pool.retire(&task_id, RecentState::Terminal, None);
                    return;
                }
                if pool.mode() == PoolMode::Paused {
                    pool.retire(&task_id, RecentState::Terminal, None);
                    return;
                }

                match pool.launch(&task_id).await {
                    Ok(()) => return,
                    Err(e) => {
                        warn!(task = %task_id, error = %e, "respawn attempt failed");
                        match pool.backoff.lock().on_exit(&task_id, Duration::ZERO) {
                            backoff::Next::FailedTerminal => {
                                pool.retire(
                                    &task_id,
                                    RecentState::FailedTerminal,
                                    Some(format!("respawn gave up: {e}")),
                                );
                                return;
                            }
                            backoff::Next::Retry { delay: next } => delay = next,
                        }
                    }
                }
            }
        });
    }

    /// Remove a slot and append it to the recent ring.
    fn retire(&self, task_id: &TaskId, state: RecentState, reason: Option<String>) {
        let Some(agent) = self.agents.write().remove(task_id) else {
            return;
        };
        self.backoff.lock().clear(task_id);

        if let Some(provider) = self.provider.clone() {
            let release_task = task_id.clone();
            tokio::spawn(async move {
                if let Err(e) = provider.release(&release_task).await {
                    debug!(task = %release_task, error = %e, "sandbox release failed");
                }
            });
        }

        info!(agent = %agent.id, task = %task_id, ?state, "agent retired");
        let mut recent = self.recent.lock();
        recent.push_front(RecentAgent {
            id: agent.id,
            task_id: task_id.clone(),
            role: agent.role,
            state,
            ended_at_ms: SystemClock.epoch_ms(),
            reason,
        });
        recent.truncate(RECENT_CAPACITY);
    }

    /// Start the liveness reconciler. Defensive: the reaper normally
    /// observes every exit; this catches a child that vanished without one.
    pub fn start_reconciler(self: &Arc<Self>, interval: Duration) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let cancel = pool.cancel_token();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                pool.reconcile_once();
            }
        });
    }

    fn reconcile_once(&self) {
        let vanished: Vec<TaskId> = self
            .agents
            .read()
            .iter()
            .filter(|(_, agent)| {
                agent.state == AgentState::Running
                    && agent.signal.as_ref().is_some_and(|s| !s.alive())
            })
            .map(|(task_id, _)| task_id.clone())
            .collect();

        for task_id in vanished {
            warn!(task = %task_id, "running agent's process vanished without a reap");
            self.retire(
                &task_id,
                RecentState::Terminal,
                Some("process vanished".to_string()),
            );
        }
    }

    /// Signal all children, wait up to `grace`, escalate to SIGKILL, and
    /// return once every slot is drained. Never deadlocks: slots that are
    /// still present after the kill grace are force-drained.
    pub async fn shutdown(&self, grace: Duration) {
        let signals: Vec<Arc<dyn ChildSignal>> = self
            .agents
            .read()
            .values()
            .filter_map(|a| a.signal.clone())
            .collect();
        info!(agents = self.live_count(), "shutting down pool");
        for signal in &signals {
            signal.terminate();
        }

        let deadline = Instant::now() + grace;
        while !self.agents.read().is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        let stragglers: Vec<Arc<dyn ChildSignal>> = self
            .agents
            .read()
            .values()
            .filter_map(|a| a.signal.clone())
            .collect();
        if !stragglers.is_empty() {
            warn!(count = stragglers.len(), "grace expired, escalating to SIGKILL");
            for signal in &stragglers {
                signal.kill();
            }
        }

        let kill_deadline = Instant::now() + KILL_REAP_GRACE;
        while !self.agents.read().is_empty() && Instant::now() < kill_deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        let leftovers: Vec<TaskId> = self.agents.read().keys().cloned().collect();
        for task_id in leftovers {
            warn!(task = %task_id, "slot not reaped at shutdown, force-draining");
            self.retire(
                &task_id,
                RecentState::Terminal,
                Some("not reaped at shutdown".to_string()),
            );
        }
        info!("pool shutdown complete");
    }
}

fn snapshot_of(agent: &Agent) -> AgentSnapshot {
    AgentSnapshot {
        id: agent.id.clone(),
        task_id: agent.task.id.clone(),
        role: agent.role,
        pid: agent.pid,
        state: agent.state,
        session_id: agent.session_id.clone(),
        spawn_time_ms: agent.spawn_time_ms,
        log_path: agent.log_path.clone(),
    }
}

/// Tokenize a spawn command and append `--attach <server_url>` when the
/// command does not already attach, validating the URL against the
/// trusted-host policy. Returns the argv and the attach target appended,
/// if any. `--session` is appended only for flag-safe session ids.
pub(crate) fn resolve_spawn_argv(
    spawn_cmd: &str,
    server_url: &str,
    session: Option<&SessionId>,
) -> Result<(Vec<String>, Option<String>), SpawnFailure> {
    let mut argv: Vec<String> = spawn_cmd.split_whitespace().map(str::to_string).collect();
    if argv.is_empty() {
        return Err(SpawnFailure::Start(StartError::EmptyCommand));
    }

    let mut attach = None;
    if !argv.iter().any(|a| a == "--attach") {
        validate_attach_url(server_url, &allowlist_from_env())?;
        argv.push("--attach".to_string());
        argv.push(server_url.to_string());
        attach = Some(server_url.to_string());
    }

    if let Some(session) = session {
        if valid_session_flag(session.as_str()) {
            argv.push("--session".to_string());
            argv.push(session.to_string());
        } else {
            debug!(session = %session, "session id not flag-safe, respawning without it");
        }
    }

    Ok((argv, attach))
}

/// `--session` values must be flag-safe: `[A-Za-z0-9_-]{1,128}`.
fn valid_session_flag(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
