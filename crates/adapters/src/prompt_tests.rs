// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn renders_builtin_worker_prompt() {
    let prompt = render_prompt(None, Role::Worker, &TaskId::new("ts-1450cd")).unwrap();
    assert!(prompt.contains("ts-1450cd"));
    assert!(!prompt.contains("{{"));
}

#[test]
fn renders_builtin_planner_prompt() {
    let prompt = render_prompt(None, Role::Planner, &TaskId::new("ep-1")).unwrap();
    assert!(prompt.contains("planner agent"));
    assert!(prompt.contains("ep-1"));
}

#[test]
fn prompt_dir_overrides_builtin() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("worker.md"), "do {{task_id}} now").unwrap();

    let prompt = render_prompt(Some(dir.path()), Role::Worker, &TaskId::new("ts-9")).unwrap();
    assert_eq!(prompt, "do ts-9 now");
}

#[test]
fn missing_template_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let err = render_prompt(Some(dir.path()), Role::Planner, &TaskId::new("ts-1")).unwrap_err();
    assert!(matches!(err, PromptError::Template { .. }));
}

#[test]
fn unresolved_placeholder_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("worker.md"),
        "task {{task_id}} in {{workspace}}",
    )
    .unwrap();

    let err = render_prompt(Some(dir.path()), Role::Worker, &TaskId::new("ts-1")).unwrap_err();
    match err {
        PromptError::Unresolved { placeholder, .. } => {
            assert_eq!(placeholder, "{{workspace}}");
        }
        other => panic!("expected Unresolved, got {other:?}"),
    }
}

#[test]
fn unterminated_placeholder_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("worker.md"), "oops {{task").unwrap();
    assert!(render_prompt(Some(dir.path()), Role::Worker, &TaskId::new("t")).is_err());
}
