// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn write_log(lines: &[&str]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ts-1.jsonl");
    std::fs::write(&path, lines.join("\n")).unwrap();
    (dir, path)
}

#[test]
fn paths_are_task_scoped() {
    let path = log_file_path(Path::new("/var/logs"), &TaskId::new("ts-1"));
    assert_eq!(path, PathBuf::from("/var/logs/ts-1.jsonl"));
    assert_eq!(
        spawn_log_path(Path::new("/var/logs"), "sp-9"),
        PathBuf::from("/var/logs/sp-9.jsonl")
    );
}

#[test]
fn extracts_tool_calls_in_order() {
    let (_dir, path) = write_log(&[
        r#"{"ts":"t1","tool":"Read","detail":"src/main.rs"}"#,
        r#"{"type":"text","content":"thinking"}"#,
        r#"{"ts":"t2","tool":"Bash","detail":"cargo check"}"#,
    ]);

    let calls = recent_tool_calls(&path, 10);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].tool, "Read");
    assert_eq!(calls[1].tool, "Bash");
    assert_eq!(calls[1].detail, "cargo check");
    assert_eq!(calls[1].timestamp.as_deref(), Some("t2"));
}

#[test]
fn keeps_only_the_most_recent() {
    let lines: Vec<String> = (0..20)
        .map(|i| format!(r#"{{"tool":"Bash","detail":"cmd {i}"}}"#))
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let (_dir, path) = write_log(&refs);

    let calls = recent_tool_calls(&path, 5);
    assert_eq!(calls.len(), 5);
    assert_eq!(calls[0].detail, "cmd 15");
    assert_eq!(calls[4].detail, "cmd 19");
}

#[test]
fn summarizes_structured_input_when_detail_is_absent() {
    let (_dir, path) = write_log(&[r#"{"tool":"Write","input":{"path":"a.rs"}}"#]);
    let calls = recent_tool_calls(&path, 10);
    assert_eq!(calls[0].detail, r#"{"path":"a.rs"}"#);
}

#[test]
fn garbage_lines_are_skipped() {
    let (_dir, path) = write_log(&[
        "not json at all",
        r#"{"tool":"Read","detail":"ok"}"#,
        "{broken",
    ]);
    let calls = recent_tool_calls(&path, 10);
    assert_eq!(calls.len(), 1);
}

#[test]
fn missing_file_is_empty() {
    assert!(recent_tool_calls(Path::new("/nonexistent/x.jsonl"), 10).is_empty());
}
