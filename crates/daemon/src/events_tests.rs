// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn event(session: &str, seq: i64) -> SessionEvent {
    SessionEvent {
        event_type: "tool.result".to_string(),
        session_id: SessionId::new(session),
        timestamp: seq,
        data: serde_json::json!({ "seq": seq }),
    }
}

#[test]
fn append_and_snapshot_preserve_order() {
    let buffer = EventBuffer::new();
    for seq in 0..5 {
        buffer.append(event("ses-1", seq));
    }
    let events = buffer.events(&SessionId::new("ses-1"));
    let stamps: Vec<i64> = events.iter().map(|e| e.timestamp).collect();
    assert_eq!(stamps, [0, 1, 2, 3, 4]);
}

#[test]
fn overflow_evicts_oldest() {
    let buffer = EventBuffer::with_capacity(3);
    for seq in 0..5 {
        buffer.append(event("ses-1", seq));
    }
    let events = buffer.events(&SessionId::new("ses-1"));
    let stamps: Vec<i64> = events.iter().map(|e| e.timestamp).collect();
    assert_eq!(stamps, [2, 3, 4]);
}

#[test]
fn sessions_are_isolated() {
    let buffer = EventBuffer::new();
    buffer.append(event("ses-1", 1));
    buffer.append(event("ses-2", 2));

    assert_eq!(buffer.len(&SessionId::new("ses-1")), 1);
    assert_eq!(buffer.len(&SessionId::new("ses-2")), 1);
    assert_eq!(
        buffer.events(&SessionId::new("ses-1"))[0].timestamp,
        1
    );
}

#[test]
fn unknown_session_is_empty() {
    let buffer = EventBuffer::new();
    assert!(buffer.is_empty(&SessionId::new("ses-none")));
    assert!(buffer.events(&SessionId::new("ses-none")).is_empty());
}

#[test]
fn snapshot_is_a_copy() {
    let buffer = EventBuffer::new();
    buffer.append(event("ses-1", 1));
    let snapshot = buffer.events(&SessionId::new("ses-1"));
    buffer.append(event("ses-1", 2));
    assert_eq!(snapshot.len(), 1);
}

proptest! {
    // Length never exceeds capacity and order follows submission.
    #[test]
    fn bounded_and_ordered(count in 0usize..600) {
        let buffer = EventBuffer::new();
        for seq in 0..count {
            buffer.append(event("ses-p", seq as i64));
        }
        let events = buffer.events(&SessionId::new("ses-p"));
        prop_assert!(events.len() <= DEFAULT_EVENT_BUF_SIZE);
        prop_assert_eq!(events.len(), count.min(DEFAULT_EVENT_BUF_SIZE));
        for pair in events.windows(2) {
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }
}
