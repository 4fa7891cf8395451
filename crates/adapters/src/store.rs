// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-record persistence.
//!
//! One JSON document per claimed session. The daemon only ever appends
//! bindings; history cleanup is out of band.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use af_core::{SessionId, SessionRecord};

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session id {0:?} is not storable")]
    InvalidId(String),

    #[error("session store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session record encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persists session-claim records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn record(&self, record: &SessionRecord) -> Result<(), StoreError>;
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError>;
}

/// Store writing one `<session_id>.json` per record under a directory.
pub struct FsSessionStore {
    dir: PathBuf,
}

impl FsSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &SessionId) -> Result<PathBuf, StoreError> {
        // Session ids become file names; reject anything path-like
        let id = session_id.as_str();
        let ok = !id.is_empty()
            && id.len() <= 128
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !ok {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn record(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.path_for(&record.session_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }

    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let path = self.path_for(session_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemorySessionStore;

#[cfg(any(test, feature = "test-support"))]
mod memory {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// In-memory store for tests.
    #[derive(Clone, Default)]
    pub struct MemorySessionStore {
        records: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
    }

    impl MemorySessionStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn records(&self) -> Vec<SessionRecord> {
            self.records.lock().values().cloned().collect()
        }
    }

    #[async_trait]
    impl SessionStore for MemorySessionStore {
        async fn record(&self, record: &SessionRecord) -> Result<(), StoreError> {
            self.records
                .lock()
                .insert(record.session_id.clone(), record.clone());
            Ok(())
        }

        async fn load(
            &self,
            session_id: &SessionId,
        ) -> Result<Option<SessionRecord>, StoreError> {
            Ok(self.records.lock().get(session_id).cloned())
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
