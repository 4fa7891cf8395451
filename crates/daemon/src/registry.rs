// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of manual spawn entries.
//!
//! Process-lifetime map keyed by spawn id. All operations serialize under
//! one mutex; the registry is deliberately not sharded.

use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

use af_core::{SpawnEntry, SpawnId};

/// Registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("spawn {0} already registered")]
    Duplicate(SpawnId),

    #[error("unknown spawn: {0}")]
    NotFound(SpawnId),
}

/// Map of manual spawns.
#[derive(Default)]
pub struct SpawnRegistry {
    entries: Mutex<HashMap<SpawnId, SpawnEntry>>,
}

impl SpawnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry; duplicate spawn ids are rejected.
    pub fn register(&self, entry: SpawnEntry) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&entry.spawn_id) {
            return Err(RegistryError::Duplicate(entry.spawn_id));
        }
        entries.insert(entry.spawn_id.clone(), entry);
        Ok(())
    }

    pub fn get(&self, spawn_id: &SpawnId) -> Option<SpawnEntry> {
        self.entries.lock().get(spawn_id).cloned()
    }

    /// Mutate an entry in place; absent ids are an error.
    pub fn update(
        &self,
        spawn_id: &SpawnId,
        mutate: impl FnOnce(&mut SpawnEntry),
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock();
        match entries.get_mut(spawn_id) {
            Some(entry) => {
                mutate(entry);
                Ok(())
            }
            None => Err(RegistryError::NotFound(spawn_id.clone())),
        }
    }

    /// All entries, oldest spawn first.
    pub fn list(&self) -> Vec<SpawnEntry> {
        let mut entries: Vec<SpawnEntry> = self.entries.lock().values().cloned().collect();
        entries.sort_by(|a, b| {
            a.spawn_time_ms
                .cmp(&b.spawn_time_ms)
                .then_with(|| a.spawn_id.cmp(&b.spawn_id))
        });
        entries
    }

    pub fn remove(&self, spawn_id: &SpawnId) -> Result<SpawnEntry, RegistryError> {
        self.entries
            .lock()
            .remove(spawn_id)
            .ok_or_else(|| RegistryError::NotFound(spawn_id.clone()))
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
