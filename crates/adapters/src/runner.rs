// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Runner capability: invoke an external CLI and capture stdout.
//!
//! A capability, not an entity. The poller, reclaimer, status enrichment,
//! and the pre-spawn hook all go through this trait; tests substitute
//! [`FakeRunner`].

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::subprocess::{run_with_timeout, PROG_TIMEOUT};

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{description} failed: {source}")]
    Io {
        description: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{description} timed out after {secs}s")]
    Timeout { description: String, secs: u64 },

    /// Non-zero exit. Stdout is carried so callers can inspect diagnostic
    /// text the tool printed before failing.
    #[error("{description} exited with {code:?}: {stderr}")]
    Exit {
        description: String,
        code: Option<i32>,
        stdout: Vec<u8>,
        stderr: String,
    },

    /// Injected by fakes to simulate arbitrary failures.
    #[error("{0}")]
    Other(String),
}

/// Run an external command, returning its stdout on zero exit.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, name: &str, args: &[String]) -> Result<Vec<u8>, RunnerError>;
}

/// Runner backed by real subprocess execution.
pub struct ExecRunner {
    timeout: Duration,
}

impl ExecRunner {
    pub fn new() -> Self {
        Self {
            timeout: PROG_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ExecRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for ExecRunner {
    async fn run(&self, name: &str, args: &[String]) -> Result<Vec<u8>, RunnerError> {
        let description = format!("{} {}", name, args.join(" "));
        let mut cmd = Command::new(name);
        cmd.args(args);
        cmd.stdin(std::process::Stdio::null());

        let output = run_with_timeout(cmd, self.timeout, &description).await?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(RunnerError::Exit {
                description,
                code: output.status.code(),
                stdout: output.stdout,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRunner;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Recorded invocation: command name plus argv.
    pub type RunnerCall = (String, Vec<String>);

    #[derive(Default)]
    struct FakeRunnerState {
        calls: Vec<RunnerCall>,
        /// Scripted responses keyed by the first argument (subcommand).
        responses: HashMap<String, Vec<Result<Vec<u8>, String>>>,
    }

    /// In-memory runner for deterministic testing.
    ///
    /// Records every call and serves scripted responses keyed by
    /// subcommand. Unscripted calls succeed with empty stdout.
    #[derive(Clone, Default)]
    pub struct FakeRunner {
        inner: Arc<Mutex<FakeRunnerState>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for the given subcommand (first argument).
        /// Responses are served in FIFO order; the last one sticks.
        pub fn respond(&self, subcommand: &str, response: Result<Vec<u8>, String>) {
            self.inner
                .lock()
                .responses
                .entry(subcommand.to_string())
                .or_default()
                .push(response);
        }

        pub fn calls(&self) -> Vec<RunnerCall> {
            self.inner.lock().calls.clone()
        }

        pub fn call_count(&self) -> usize {
            self.inner.lock().calls.len()
        }

        /// Calls whose subcommand (first argument) matches.
        pub fn calls_for(&self, subcommand: &str) -> Vec<RunnerCall> {
            self.inner
                .lock()
                .calls
                .iter()
                .filter(|(_, args)| args.first().map(String::as_str) == Some(subcommand))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl Runner for FakeRunner {
        async fn run(&self, name: &str, args: &[String]) -> Result<Vec<u8>, RunnerError> {
            let mut state = self.inner.lock();
            state.calls.push((name.to_string(), args.to_vec()));

            let subcommand = args.first().cloned().unwrap_or_default();
            let response = match state.responses.get_mut(&subcommand) {
                Some(queue) if queue.len() > 1 => queue.remove(0),
                Some(queue) => queue.first().cloned().unwrap_or(Ok(Vec::new())),
                None => Ok(Vec::new()),
            };
            response.map_err(RunnerError::Other)
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
