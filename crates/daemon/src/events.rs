// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session bounded event buffers.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use af_core::{SessionEvent, SessionId};

/// Events kept per session before FIFO eviction.
pub const DEFAULT_EVENT_BUF_SIZE: usize = 256;

/// Ring of recent events per session id. Sessions are isolated; a
/// snapshot never observes another session's events.
pub struct EventBuffer {
    capacity: usize,
    buffers: Mutex<HashMap<SessionId, VecDeque<SessionEvent>>>,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_BUF_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Append an event to its session's ring, evicting the oldest on
    /// overflow.
    pub fn append(&self, event: SessionEvent) {
        let mut buffers = self.buffers.lock();
        let ring = buffers.entry(event.session_id.clone()).or_default();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(event);
    }

    /// Snapshot of a session's events, oldest first.
    pub fn events(&self, session_id: &SessionId) -> Vec<SessionEvent> {
        self.buffers
            .lock()
            .get(session_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, session_id: &SessionId) -> usize {
        self.buffers
            .lock()
            .get(session_id)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, session_id: &SessionId) -> bool {
        self.len(session_id) == 0
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
