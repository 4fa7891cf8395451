// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aetherflow Daemon (afd)
//!
//! Long-running supervisor for a bounded pool of agent subprocesses,
//! controlled over a Unix socket. Typically started by tooling; it prints
//! READY on stdout once the socket is bound.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use af_daemon::{Config, Daemon, DaemonDeps};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("afd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("afd {}", env!("CARGO_PKG_VERSION"));
                println!("Aetherflow Daemon - supervises a bounded pool of agent subprocesses");
                println!();
                println!("USAGE:");
                println!("    afd");
                println!();
                println!("Configuration is read from $AETHERFLOW_CONFIG (TOML) or");
                println!("$AETHERFLOW_STATE_DIR/config.toml. The daemon listens on a");
                println!("Unix socket for control requests.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: afd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("afd: {e}");
            std::process::exit(1);
        }
    };

    rotate_log_if_needed(&config.daemon_log_path);
    let log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("afd: failed to set up logging: {e}");
            std::process::exit(1);
        }
    };

    info!("starting daemon");
    let deps = DaemonDeps::production(&config);
    let running = match Daemon::new(config, deps).start().await {
        Ok(running) => running,
        Err(e) => {
            error!("failed to start daemon: {}", e);
            eprintln!("afd: {e}");
            drop(log_guard);
            std::process::exit(1);
        }
    };

    // Signal readiness for whoever started us
    println!("READY");

    running.run().await?;
    Ok(())
}

/// Maximum daemon log size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` → `daemon.log.1` → `daemon.log.2` → `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently
/// ignored so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = config
        .daemon_log_path
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."));
    std::fs::create_dir_all(parent)?;
    let file_name = config
        .daemon_log_path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("daemon.log"));

    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
