// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::runner::RunnerError;

/// Default timeout for prog invocations driven by the poller and reclaimer.
pub const PROG_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for per-call status enrichment (task titles, queue listing).
pub const ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation). Cancellation of the surrounding future has the
/// same effect.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, RunnerError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(RunnerError::Io {
            description: description.to_string(),
            source: io_err,
        }),
        Err(_elapsed) => Err(RunnerError::Timeout {
            description: description.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
