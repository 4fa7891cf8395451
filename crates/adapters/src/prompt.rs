// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role prompt rendering.
//!
//! Prompts are plain text with `{{task_id}}` placeholders. Built-in
//! templates ship with the daemon; a `prompt_dir` override supplies
//! `<role>.md` files instead. Rendering fails if any `{{...}}` placeholder
//! survives substitution.

use std::path::{Path, PathBuf};
use thiserror::Error;

use af_core::{Role, TaskId};

const DEFAULT_WORKER_PROMPT: &str = "\
You are a worker agent. Your task is {{task_id}}.
Run `prog show {{task_id}} --json` to read the definition of done, do the
work, and log progress to the tracker as you go.
";

const DEFAULT_PLANNER_PROMPT: &str = "\
You are a planner agent. Your task is {{task_id}}.
Break the task into child tasks in the tracker; do not implement anything
yourself.
";

/// Errors rendering a role prompt.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read prompt template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unresolved placeholder {placeholder:?} in {role} prompt")]
    Unresolved { placeholder: String, role: Role },
}

/// Render the prompt for a role and task.
pub fn render_prompt(
    prompt_dir: Option<&Path>,
    role: Role,
    task_id: &TaskId,
) -> Result<String, PromptError> {
    let template = match prompt_dir {
        Some(dir) => {
            let path = dir.join(format!("{role}.md"));
            std::fs::read_to_string(&path)
                .map_err(|source| PromptError::Template { path, source })?
        }
        None => match role {
            Role::Worker => DEFAULT_WORKER_PROMPT.to_string(),
            Role::Planner => DEFAULT_PLANNER_PROMPT.to_string(),
        },
    };

    let rendered = template.replace("{{task_id}}", task_id.as_str());

    if let Some(placeholder) = first_placeholder(&rendered) {
        return Err(PromptError::Unresolved {
            placeholder: placeholder.to_string(),
            role,
        });
    }

    Ok(rendered)
}

/// First `{{...}}` placeholder remaining in the text, if any.
fn first_placeholder(text: &str) -> Option<&str> {
    let start = text.find("{{")?;
    let rest = &text[start..];
    match rest.find("}}") {
        Some(end) => Some(&rest[..end + 2]),
        // Unterminated braces still count as unresolved
        None => Some(rest),
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
