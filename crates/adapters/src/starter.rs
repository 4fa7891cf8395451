// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process starting and supervision handles.
//!
//! The pool launches agents through [`ProcessStarter`] so tests can swap
//! in [`FakeProcessStarter`] and drive exits deterministically. A started
//! child splits into two halves: the [`ChildProc`] owned by the reaper
//! task (the only place that waits), and a cloneable [`ChildSignal`] the
//! pool keeps for TERM/KILL escalation and liveness probes.

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::warn;

/// Everything needed to launch one agent child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSpec {
    /// Full argv; `argv[0]` is the program.
    pub argv: Vec<String>,
    /// Extra environment on top of the inherited one.
    pub env: Vec<(String, String)>,
    /// JSONL log receiving the child's stdout and stderr.
    pub log_path: PathBuf,
    pub cwd: Option<PathBuf>,
}

/// Outcome of waiting on a child. `code` is `None` when the child was
/// killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    pub code: Option<i32>,
}

impl ChildExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Errors launching a child.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("spawn command is empty")]
    EmptyCommand,

    #[error("failed to open log file {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Injected by fakes.
    #[error("{0}")]
    Other(String),
}

/// Signalling half of a child, kept by the pool.
pub trait ChildSignal: Send + Sync {
    /// Best-effort SIGTERM.
    fn terminate(&self);
    /// Best-effort SIGKILL; the reaper's wait observes the death.
    fn kill(&self);
    /// OS-level liveness probe.
    fn alive(&self) -> bool;
}

/// Waiting half of a child, owned by its reaper task.
#[async_trait]
pub trait ChildProc: Send {
    fn pid(&self) -> u32;
    fn signaller(&self) -> Arc<dyn ChildSignal>;
    async fn wait(&mut self) -> ChildExit;
}

impl std::fmt::Debug for dyn ChildProc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildProc").field("pid", &self.pid()).finish()
    }
}

/// Launches children.
#[async_trait]
pub trait ProcessStarter: Send + Sync {
    async fn start(&self, spec: &StartSpec) -> Result<Box<dyn ChildProc>, StartError>;
}

/// Starter backed by `exec` of the spec's argv.
#[derive(Clone, Default)]
pub struct ExecProcessStarter;

impl ExecProcessStarter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessStarter for ExecProcessStarter {
    async fn start(&self, spec: &StartSpec) -> Result<Box<dyn ChildProc>, StartError> {
        let Some(program) = spec.argv.first() else {
            return Err(StartError::EmptyCommand);
        };

        if let Some(parent) = spec.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StartError::Log {
                path: spec.log_path.clone(),
                source,
            })?;
        }
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log_path)
            .map_err(|source| StartError::Log {
                path: spec.log_path.clone(),
                source,
            })?;
        let log_err = log.try_clone().map_err(|source| StartError::Log {
            path: spec.log_path.clone(),
            source,
        })?;

        let mut cmd = Command::new(program);
        cmd.args(&spec.argv[1..])
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(std::process::Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd.spawn().map_err(|source| StartError::Spawn {
            program: program.clone(),
            source,
        })?;
        let pid = child.id().unwrap_or(0);
        if pid == 0 {
            warn!(program, "child reaped before pid was observed");
        }

        Ok(Box::new(ExecChild {
            pid,
            child,
            signal: Arc::new(PidSignal { pid }),
        }))
    }
}

struct ExecChild {
    pid: u32,
    child: Child,
    signal: Arc<PidSignal>,
}

#[async_trait]
impl ChildProc for ExecChild {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn signaller(&self) -> Arc<dyn ChildSignal> {
        Arc::clone(&self.signal) as Arc<dyn ChildSignal>
    }

    async fn wait(&mut self) -> ChildExit {
        match self.child.wait().await {
            Ok(status) => ChildExit {
                code: status.code(),
            },
            Err(e) => {
                warn!(pid = self.pid, error = %e, "wait on child failed");
                ChildExit { code: None }
            }
        }
    }
}

/// Signal a real OS process by pid.
struct PidSignal {
    pid: u32,
}

impl PidSignal {
    fn send(&self, signal: Option<Signal>) -> bool {
        // pid 0 would signal the whole process group
        if self.pid == 0 {
            return false;
        }
        kill(Pid::from_raw(self.pid as i32), signal).is_ok()
    }
}

impl ChildSignal for PidSignal {
    fn terminate(&self) {
        self.send(Some(Signal::SIGTERM));
    }

    fn kill(&self) {
        self.send(Some(Signal::SIGKILL));
    }

    fn alive(&self) -> bool {
        self.send(None)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeChildHandle, FakeProcessStarter};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Control half of one fake child, shared with the test.
    pub struct FakeChildHandle {
        pid: u32,
        tx: mpsc::UnboundedSender<ChildExit>,
        alive: AtomicBool,
        exit_on_terminate: AtomicBool,
        terminations: AtomicUsize,
        spec: StartSpec,
    }

    impl FakeChildHandle {
        pub fn pid(&self) -> u32 {
            self.pid
        }

        pub fn spec(&self) -> &StartSpec {
            &self.spec
        }

        pub fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        pub fn termination_count(&self) -> usize {
            self.terminations.load(Ordering::SeqCst)
        }

        /// Make the child exit with the given code.
        pub fn exit(&self, code: i32) {
            if self.alive.swap(false, Ordering::SeqCst) {
                let _ = self.tx.send(ChildExit { code: Some(code) });
            }
        }

        /// Simulate a child that ignores SIGTERM (forces the KILL path).
        pub fn ignore_terminate(&self) {
            self.exit_on_terminate.store(false, Ordering::SeqCst);
        }

        /// Make the liveness probe report the child dead without the
        /// waiter ever observing an exit (a vanished process).
        pub fn vanish(&self) {
            self.alive.store(false, Ordering::SeqCst);
        }
    }

    impl ChildSignal for FakeChildHandle {
        fn terminate(&self) {
            self.terminations.fetch_add(1, Ordering::SeqCst);
            if self.exit_on_terminate.load(Ordering::SeqCst)
                && self.alive.swap(false, Ordering::SeqCst)
            {
                let _ = self.tx.send(ChildExit { code: Some(0) });
            }
        }

        fn kill(&self) {
            if self.alive.swap(false, Ordering::SeqCst) {
                let _ = self.tx.send(ChildExit { code: None });
            }
        }

        fn alive(&self) -> bool {
            self.is_alive()
        }
    }

    struct FakeChild {
        handle: Arc<FakeChildHandle>,
        rx: mpsc::UnboundedReceiver<ChildExit>,
    }

    #[async_trait]
    impl ChildProc for FakeChild {
        fn pid(&self) -> u32 {
            self.handle.pid
        }

        fn signaller(&self) -> Arc<dyn ChildSignal> {
            Arc::clone(&self.handle) as Arc<dyn ChildSignal>
        }

        async fn wait(&mut self) -> ChildExit {
            self.rx.recv().await.unwrap_or(ChildExit { code: None })
        }
    }

    #[derive(Default)]
    struct FakeStarterState {
        children: Vec<Arc<FakeChildHandle>>,
        fail_next: Option<String>,
    }

    /// Starter producing controllable in-memory children.
    #[derive(Clone)]
    pub struct FakeProcessStarter {
        inner: Arc<Mutex<FakeStarterState>>,
        next_pid: Arc<AtomicU32>,
    }

    impl Default for FakeProcessStarter {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FakeProcessStarter {
        pub fn new() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeStarterState::default())),
                next_pid: Arc::new(AtomicU32::new(10_000)),
            }
        }

        /// Fail the next `start` call with the given message.
        pub fn fail_next(&self, message: impl Into<String>) {
            self.inner.lock().fail_next = Some(message.into());
        }

        /// Handles for every child started so far, in start order.
        pub fn children(&self) -> Vec<Arc<FakeChildHandle>> {
            self.inner.lock().children.clone()
        }

        pub fn start_count(&self) -> usize {
            self.inner.lock().children.len()
        }

        /// Specs of every start, in order.
        pub fn specs(&self) -> Vec<StartSpec> {
            self.inner
                .lock()
                .children
                .iter()
                .map(|c| c.spec.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ProcessStarter for FakeProcessStarter {
        async fn start(&self, spec: &StartSpec) -> Result<Box<dyn ChildProc>, StartError> {
            let mut state = self.inner.lock();
            if let Some(message) = state.fail_next.take() {
                return Err(StartError::Other(message));
            }
            if spec.argv.is_empty() {
                return Err(StartError::EmptyCommand);
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let handle = Arc::new(FakeChildHandle {
                pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
                tx,
                alive: AtomicBool::new(true),
                exit_on_terminate: AtomicBool::new(true),
                terminations: AtomicUsize::new(0),
                spec: spec.clone(),
            });
            state.children.push(Arc::clone(&handle));

            Ok(Box::new(FakeChild { handle, rx }))
        }
    }
}

#[cfg(test)]
#[path = "starter_tests.rs"]
mod tests;
