// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session event payloads.

use serde::{Deserialize, Serialize};

use crate::id::SessionId;

/// Event type string that triggers the session-claim engine.
pub const SESSION_CREATED: &str = "session.created";

/// An event reported for a session over RPC and buffered per-session.
///
/// `data` is opaque to the daemon; it is stored and returned verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub event_type: String,
    pub session_id: SessionId,
    /// Unix epoch milliseconds as reported by the sender.
    pub timestamp: i64,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl SessionEvent {
    pub fn is_session_created(&self) -> bool {
        self.event_type == SESSION_CREATED
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
