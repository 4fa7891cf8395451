// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the control socket.
//!
//! Connections are single-shot: one request line in, one response line
//! out, close. Dispatch runs on the connection's task and touches shared
//! state through the same locks as the pool, registry, and event buffer.
//! No handler holds a pool lock across an external runner call.

use std::sync::Arc;
use std::time::Instant;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use af_adapters::prog;
use af_adapters::starter::{ProcessStarter, StartSpec};
use af_adapters::subprocess::ENRICHMENT_TIMEOUT;
use af_adapters::{Runner, SessionStore};
use af_core::{
    Clock, SessionEvent, SessionId, SpawnEntry, SpawnId, SpawnPolicy, SpawnState, SystemClock,
    TaskId,
};

use crate::agent_log;
use crate::claim;
use crate::config::Config;
use crate::events::EventBuffer;
use crate::pool::{self, Pool};
use crate::protocol::{
    self, AgentDetail, AgentStatusEntry, AgentStatusParams, FullStatus, LogsPathParams, Request,
    Response, SessionEventParams, SessionEventsParams, SpawnRemoveParams, SpawnStartParams,
    SpawnStartResult, DEFAULT_TIMEOUT,
};
use crate::registry::SpawnRegistry;

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub pool: Arc<Pool>,
    pub registry: Arc<SpawnRegistry>,
    pub events: Arc<EventBuffer>,
    pub store: Option<Arc<dyn SessionStore>>,
    pub runner: Arc<dyn Runner>,
    pub starter: Arc<dyn ProcessStarter>,
    pub config: Config,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

/// Accept loop for the control socket.
pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Run until `cancel` fires, spawning a task per connection.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => return,
                accepted = self.socket.accept() => accepted,
            };
            match accepted {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                protocol::ProtocolError::ConnectionClosed => {
                                    debug!("client disconnected")
                                }
                                protocol::ProtocolError::Timeout => warn!("connection timeout"),
                                _ => error!("connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

/// Handle one connection: read a request line, dispatch, write the
/// response, close. Invalid JSON still gets a failure response.
async fn handle_connection(
    stream: UnixStream,
    ctx: &ListenCtx,
) -> Result<(), protocol::ProtocolError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let line = protocol::read_line(&mut reader, DEFAULT_TIMEOUT).await?;
    let request: Request = match serde_json::from_str(&line) {
        Ok(request) => request,
        Err(e) => {
            let response = Response::err(format!("invalid request: {e}"));
            return protocol::write_line(&mut write_half, &response, DEFAULT_TIMEOUT).await;
        }
    };

    debug!(method = %request.method, "received request");
    let method = request.method.clone();
    let response = dispatch(request, ctx).await;
    protocol::write_line(&mut write_half, &response, DEFAULT_TIMEOUT).await?;

    // Notify only after the response is on the wire so the client sees
    // success before the accept loop dies.
    if method == "shutdown" && response.success {
        ctx.shutdown.notify_one();
    }
    Ok(())
}

/// Method dispatch. Case-sensitive.
async fn dispatch(request: Request, ctx: &ListenCtx) -> Response {
    match request.method.as_str() {
        "ping" => Response::ok_empty(),
        "status.full" => handle_status_full(ctx).await,
        "status.agent" => handle_status_agent(request.params, ctx),
        "logs.path" => handle_logs_path(request.params, ctx),
        "session.event" => handle_session_event(request.params, ctx).await,
        "session.events" => handle_session_events(request.params, ctx),
        "shutdown" => {
            info!("shutdown requested over rpc");
            Response::ok_empty()
        }
        "spawn.start" => handle_spawn_start(request.params, ctx).await,
        "spawn.list" => Response::ok(serde_json::json!({ "spawns": ctx.registry.list() })),
        "spawn.remove" => handle_spawn_remove(request.params, ctx),
        "pool.pause" => {
            ctx.pool.pause();
            Response::ok_empty()
        }
        "pool.resume" => {
            ctx.pool.resume();
            Response::ok_empty()
        }
        method => Response::err(format!("unknown method: {method}")),
    }
}

/// Build the full status view. Never fails wholesale: enrichment errors
/// land in `errors` and leave partial data in place.
async fn handle_status_full(ctx: &ListenCtx) -> Response {
    let agents = ctx.pool.status();
    let mut errors = Vec::new();

    // Tracker enrichment only applies when tasks drive this daemon
    let enrich = ctx.config.spawn_policy == SpawnPolicy::Auto;
    let project = ctx.config.project.clone().filter(|_| enrich);

    let mut titles: std::collections::HashMap<TaskId, String> = std::collections::HashMap::new();
    if let Some(project) = &project {
        let mut lookups = tokio::task::JoinSet::new();
        for agent in &agents {
            let runner = Arc::clone(&ctx.runner);
            let task_id = agent.task_id.clone();
            let project = project.clone();
            lookups.spawn(async move {
                let result = tokio::time::timeout(
                    ENRICHMENT_TIMEOUT,
                    runner.run(prog::PROG_BIN, &prog::show_args(&task_id, Some(&project))),
                )
                .await;
                let outcome = match result {
                    Ok(Ok(output)) => prog::parse_task_detail(&output)
                        .map(|detail| detail.title)
                        .map_err(|e| e.to_string()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!(
                        "show {task_id} timed out after {}s",
                        ENRICHMENT_TIMEOUT.as_secs()
                    )),
                };
                (task_id, outcome)
            });
        }
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((task_id, Ok(title))) => {
                    titles.insert(task_id, title);
                }
                Ok((task_id, Err(e))) => {
                    errors.push(format!("title for {task_id}: {e}"));
                }
                Err(e) => errors.push(format!("title lookup panicked: {e}")),
            }
        }
    }

    let queue = match &project {
        Some(project) => {
            let result = tokio::time::timeout(
                ENRICHMENT_TIMEOUT,
                ctx.runner.run(prog::PROG_BIN, &prog::ready_args(project)),
            )
            .await;
            match result {
                Ok(Ok(output)) => match prog::parse_ready_table(&output) {
                    Ok(ready) => ready
                        .into_iter()
                        .filter(|task| !ctx.pool.contains(&task.id))
                        .collect(),
                    Err(e) => {
                        errors.push(format!("queue: {e}"));
                        Vec::new()
                    }
                },
                Ok(Err(e)) => {
                    errors.push(format!("queue: {e}"));
                    Vec::new()
                }
                Err(_) => {
                    errors.push(format!(
                        "queue listing timed out after {}s",
                        ENRICHMENT_TIMEOUT.as_secs()
                    ));
                    Vec::new()
                }
            }
        }
        None => Vec::new(),
    };

    let agents = agents
        .into_iter()
        .map(|agent| {
            let task_title = titles.remove(&agent.task_id);
            AgentStatusEntry { agent, task_title }
        })
        .collect();

    Response::ok(FullStatus {
        pool_size: ctx.pool.pool_size(),
        mode: ctx.pool.mode(),
        spawn_policy: ctx.config.spawn_policy,
        project: ctx.config.project.clone(),
        uptime_secs: ctx.start_time.elapsed().as_secs(),
        agents,
        queue,
        recent: ctx.pool.recent(),
        spawns: ctx.registry.list(),
        errors,
    })
}

fn handle_status_agent(params: serde_json::Value, ctx: &ListenCtx) -> Response {
    let params: AgentStatusParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => return Response::err(format!("invalid params: {e}")),
    };

    let Some(agent) = ctx.pool.snapshot_by_name(&params.agent_name) else {
        return Response::err(format!("unknown agent: {}", params.agent_name));
    };

    let limit = params.limit.unwrap_or(agent_log::DEFAULT_TOOL_CALL_LIMIT);
    let log_path = agent.log_path.clone();
    let recent_calls = agent_log::recent_tool_calls(&log_path, limit);
    Response::ok(AgentDetail {
        entry: AgentStatusEntry {
            agent,
            task_title: None,
        },
        log_path,
        recent_calls,
    })
}

/// Resolve a log path: pool agents by name first, then spawn entries.
fn handle_logs_path(params: serde_json::Value, ctx: &ListenCtx) -> Response {
    let params: LogsPathParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => return Response::err(format!("invalid params: {e}")),
    };

    if let Some(agent) = ctx.pool.snapshot_by_name(&params.agent_name) {
        return Response::ok(protocol::LogsPathResult {
            path: agent.log_path,
        });
    }
    if let Some(entry) = ctx.registry.get(&SpawnId::new(&params.agent_name)) {
        return Response::ok(protocol::LogsPathResult {
            path: entry.log_path,
        });
    }
    Response::err(format!("unknown agent: {}", params.agent_name))
}

async fn handle_session_event(params: serde_json::Value, ctx: &ListenCtx) -> Response {
    let params: SessionEventParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => return Response::err(format!("invalid params: {e}")),
    };
    if params.event_type.is_empty() {
        return Response::err("event_type is required");
    }
    if params.session_id.is_empty() {
        return Response::err("session_id is required");
    }

    let event = SessionEvent {
        event_type: params.event_type,
        session_id: SessionId::new(params.session_id),
        timestamp: params.timestamp,
        data: params.data,
    };
    let session_id = event.session_id.clone();
    let is_created = event.is_session_created();
    ctx.events.append(event);

    if is_created {
        // Orphans and ambiguity are logged by the claim engine; ingestion
        // itself still succeeds.
        claim::claim_session(&session_id, &ctx.pool, &ctx.registry, ctx.store.as_ref()).await;
    }
    Response::ok_empty()
}

fn handle_session_events(params: serde_json::Value, ctx: &ListenCtx) -> Response {
    let params: SessionEventsParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => return Response::err(format!("invalid params: {e}")),
    };
    if params.session_id.is_empty() {
        return Response::err("session_id is required");
    }

    let mut events = ctx.events.events(&SessionId::new(&params.session_id));
    if let Some(limit) = params.limit {
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
    }
    Response::ok(serde_json::json!({ "events": events }))
}

async fn handle_spawn_start(params: serde_json::Value, ctx: &ListenCtx) -> Response {
    let params: SpawnStartParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => return Response::err(format!("invalid params: {e}")),
    };
    if params.prompt.is_empty() {
        return Response::err("prompt is required");
    }

    let spawn_id = SpawnId::new(format!(
        "sp-{}",
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    ));
    let (argv, attach_ref) =
        match pool::resolve_spawn_argv(&ctx.config.spawn_cmd, &ctx.config.server_url, None) {
            Ok(resolved) => resolved,
            Err(e) => return Response::err(e.to_string()),
        };

    let stem = params.log_name.unwrap_or_else(|| spawn_id.to_string());
    let log_path = agent_log::spawn_log_path(&ctx.config.log_dir, &stem);
    let spec = StartSpec {
        argv,
        env: vec![
            (
                "AETHERFLOW_SOCKET".to_string(),
                ctx.config.socket_path.display().to_string(),
            ),
            ("AETHERFLOW_SPAWN_ID".to_string(), spawn_id.to_string()),
            ("AETHERFLOW_PROMPT".to_string(), params.prompt.clone()),
        ],
        log_path: log_path.clone(),
        cwd: None,
    };

    let mut child = match ctx.starter.start(&spec).await {
        Ok(child) => child,
        Err(e) => return Response::err(format!("spawn failed: {e}")),
    };
    let pid = child.pid();

    let entry = SpawnEntry {
        spawn_id: spawn_id.clone(),
        pid,
        state: SpawnState::Running,
        prompt: params.prompt,
        spawn_time_ms: SystemClock.epoch_ms(),
        log_path: log_path.clone(),
        session_id: None,
        attach_ref,
    };
    if let Err(e) = ctx.registry.register(entry) {
        // Id collision is effectively impossible; kill the child if it happens
        child.signaller().kill();
        return Response::err(e.to_string());
    }

    // Reap in the background, recording the terminal state
    let registry = Arc::clone(&ctx.registry);
    let reaper_id = spawn_id.clone();
    tokio::spawn(async move {
        let exit = child.wait().await;
        let state = if exit.success() {
            SpawnState::Exited
        } else {
            SpawnState::Failed
        };
        info!(spawn = %reaper_id, code = ?exit.code, "manual spawn finished");
        if let Err(e) = registry.update(&reaper_id, |entry| entry.state = state) {
            debug!(spawn = %reaper_id, error = %e, "spawn entry gone before reap");
        }
    });

    info!(spawn = %spawn_id, pid, "manual spawn started");
    Response::ok(SpawnStartResult {
        spawn_id: spawn_id.to_string(),
        pid,
        log_path,
    })
}

fn handle_spawn_remove(params: serde_json::Value, ctx: &ListenCtx) -> Response {
    let params: SpawnRemoveParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => return Response::err(format!("invalid params: {e}")),
    };

    let spawn_id = SpawnId::new(&params.spawn_id);
    match ctx.registry.get(&spawn_id) {
        None => Response::err(format!("unknown spawn: {}", params.spawn_id)),
        Some(entry) if entry.state == SpawnState::Running => {
            Response::err(format!("spawn {} is still running", params.spawn_id))
        }
        Some(_) => match ctx.registry.remove(&spawn_id) {
            Ok(_) => Response::ok_empty(),
            Err(e) => Response::err(e.to_string()),
        },
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
