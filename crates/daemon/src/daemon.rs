// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon orchestrator: wiring and lifecycle.
//!
//! `Daemon::start` validates config, binds the socket, constructs the
//! shared subsystems, reclaims orphans, and (under the auto policy) starts
//! the poller and scheduler. `RunningDaemon::run` then blocks until a
//! signal or a shutdown RPC and tears everything down in order: stop
//! accepting, cancel the run context, drain the pool, unlink the socket.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use af_adapters::starter::{ExecProcessStarter, ProcessStarter};
use af_adapters::{ExecRunner, FsSessionStore, Provider, Runner, SessionStore};
use af_core::SpawnPolicy;

use crate::config::{Config, ConfigError};
use crate::events::EventBuffer;
use crate::lifecycle::{self, LifecycleError};
use crate::listener::{ListenCtx, Listener};
use crate::poller::Poller;
use crate::pool::{Pool, PoolConfig};
use crate::reclaimer::Reclaimer;
use crate::registry::SpawnRegistry;

/// Fatal daemon errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Injected collaborators. Production wiring shells out and persists;
/// tests swap in fakes.
pub struct DaemonDeps {
    pub runner: Arc<dyn Runner>,
    pub starter: Arc<dyn ProcessStarter>,
    pub provider: Option<Arc<dyn Provider>>,
    pub store: Option<Arc<dyn SessionStore>>,
}

impl DaemonDeps {
    pub fn production(config: &Config) -> Self {
        Self {
            runner: Arc::new(ExecRunner::new()),
            starter: Arc::new(ExecProcessStarter::new()),
            provider: None,
            store: Some(Arc::new(FsSessionStore::new(
                config.log_dir.join("sessions"),
            ))),
        }
    }
}

/// Unstarted daemon.
pub struct Daemon {
    config: Config,
    deps: DaemonDeps,
}

impl Daemon {
    pub fn new(config: Config, deps: DaemonDeps) -> Self {
        Self { config, deps }
    }

    /// Validate, bind, construct, reclaim, and start background tasks.
    /// Returns once the daemon is serving.
    pub async fn start(self) -> Result<RunningDaemon, DaemonError> {
        let Self { config, deps } = self;
        config.validate()?;

        let listener = lifecycle::bind_socket(&config.socket_path).await?;
        std::fs::create_dir_all(&config.log_dir)?;

        let cancel = CancellationToken::new();
        let pool = Arc::new(Pool::new(
            PoolConfig {
                pool_size: config.pool_size,
                spawn_cmd: config.spawn_cmd.clone(),
                server_url: config.server_url.clone(),
                socket_path: config.socket_path.clone(),
                log_dir: config.log_dir.clone(),
                prompt_dir: config.prompt_dir.clone(),
            },
            Arc::clone(&deps.starter),
            deps.provider.clone(),
        ));
        pool.set_context(cancel.clone());
        pool.start_reconciler(config.reconcile_interval);

        let registry = Arc::new(SpawnRegistry::new());
        let events = Arc::new(EventBuffer::new());
        let shutdown = Arc::new(Notify::new());

        let ctx = Arc::new(ListenCtx {
            pool: Arc::clone(&pool),
            registry,
            events,
            store: deps.store.clone(),
            runner: Arc::clone(&deps.runner),
            starter: Arc::clone(&deps.starter),
            config: config.clone(),
            start_time: Instant::now(),
            shutdown: Arc::clone(&shutdown),
        });
        let accept = tokio::spawn(Listener::new(listener, ctx).run(cancel.child_token()));

        // Task-driven machinery only exists under the auto policy; manual
        // daemons never touch the tracker on their own.
        if config.spawn_policy == SpawnPolicy::Auto {
            let project = config.project.clone().unwrap_or_default();

            let reclaimer = Reclaimer::new(&project, Arc::clone(&deps.runner));
            match reclaimer.run(&pool).await {
                Ok(count) if count > 0 => info!(count, "reclaimed orphaned tasks"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "reclaim failed, continuing"),
            }

            let poller = Poller::new(&project, config.poll_interval, Arc::clone(&deps.runner));
            let batches = poller.start(cancel.child_token());
            pool.start_scheduler(batches, Arc::clone(&deps.runner));
        }

        info!(
            socket = %config.socket_path.display(),
            policy = %config.spawn_policy,
            pool_size = config.pool_size,
            "daemon serving"
        );
        Ok(RunningDaemon {
            config,
            cancel,
            shutdown,
            pool,
            accept,
        })
    }
}

/// A serving daemon.
pub struct RunningDaemon {
    config: Config,
    cancel: CancellationToken,
    shutdown: Arc<Notify>,
    pool: Arc<Pool>,
    accept: JoinHandle<()>,
}

impl std::fmt::Debug for RunningDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningDaemon")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RunningDaemon {
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Block until SIGINT/SIGTERM or a shutdown RPC, then tear down.
    pub async fn run(self) -> Result<(), DaemonError> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = self.shutdown.notified() => info!("shutdown requested via rpc"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }

        self.stop().await
    }

    /// Tear down: stop accepting, cancel the run context, drain the pool,
    /// remove the socket.
    pub async fn stop(self) -> Result<(), DaemonError> {
        self.cancel.cancel();
        let _ = self.accept.await;
        self.pool.shutdown(self.config.shutdown_grace).await;
        lifecycle::remove_socket(&self.config.socket_path);
        info!("daemon stopped");
        Ok(())
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
