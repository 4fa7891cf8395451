// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket lifecycle: singleton rendezvous, bind, cleanup.
//!
//! Exactly one daemon per socket path. A pre-existing path is probed: a
//! socket that answers the handshake means another daemon owns it; a
//! non-socket file is someone else's and startup refuses to touch it; a
//! stale socket is unlinked and rebound.

use std::os::unix::fs::FileTypeExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

use crate::protocol::{self, Request};

/// Handshake timeout when probing an existing socket.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("daemon already running on {0}")]
    AlreadyRunning(PathBuf),

    #[error("{0} is not a unix socket")]
    NotASocket(PathBuf),

    #[error("failed to bind socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("socket io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Bind the control socket, enforcing the singleton.
pub async fn bind_socket(path: &Path) -> Result<UnixListener, LifecycleError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            if handshake(path).await {
                return Err(LifecycleError::AlreadyRunning(path.to_path_buf()));
            }
            warn!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path).map_err(|source| LifecycleError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(_) => return Err(LifecycleError::NotASocket(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(LifecycleError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LifecycleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let listener = UnixListener::bind(path).map_err(|source| LifecycleError::Bind {
        path: path.to_path_buf(),
        source,
    })?;

    // Control plane is per-user only
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|source| {
        LifecycleError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;

    info!(path = %path.display(), "control socket bound");
    Ok(listener)
}

/// Probe an existing socket: connect and exchange one ping line. Any JSON
/// response means a live daemon.
async fn handshake(path: &Path) -> bool {
    let connect = tokio::time::timeout(HANDSHAKE_TIMEOUT, UnixStream::connect(path)).await;
    let Ok(Ok(stream)) = connect else {
        return false;
    };

    let (read_half, mut write_half) = stream.into_split();
    let ping = Request::new("ping", serde_json::Value::Null);
    if protocol::write_line(&mut write_half, &ping, HANDSHAKE_TIMEOUT)
        .await
        .is_err()
    {
        return false;
    }
    let mut reader = BufReader::new(read_half);
    match protocol::read_line(&mut reader, HANDSHAKE_TIMEOUT).await {
        Ok(line) => serde_json::from_str::<serde_json::Value>(&line).is_ok(),
        Err(_) => false,
    }
}

/// Remove the socket path on shutdown. Best-effort.
pub fn remove_socket(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove socket");
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
