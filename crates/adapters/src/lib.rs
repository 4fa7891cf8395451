// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! af-adapters: Seams between the aetherflow daemon and the outside world.
//!
//! Everything here wraps an external dependency — the `prog` CLI, child
//! processes, prompt templates, the session-record store, the sandbox
//! provider — behind a narrow trait so the daemon core stays testable.

pub mod hosts;
pub mod prog;
pub mod prompt;
pub mod provider;
pub mod runner;
pub mod starter;
pub mod store;
pub mod subprocess;

pub use hosts::{validate_attach_url, HostPolicyError, TRUSTED_HOSTS_ENV};
pub use prog::ProgError;
pub use prompt::{render_prompt, PromptError};
pub use provider::{Provider, ProviderError};
pub use runner::{ExecRunner, Runner, RunnerError};
pub use starter::{
    ChildExit, ChildProc, ChildSignal, ExecProcessStarter, ProcessStarter, StartError, StartSpec,
};
pub use store::{FsSessionStore, SessionStore, StoreError};

#[cfg(any(test, feature = "test-support"))]
pub use provider::FakeProvider;
#[cfg(any(test, feature = "test-support"))]
pub use runner::FakeRunner;
#[cfg(any(test, feature = "test-support"))]
pub use starter::FakeProcessStarter;
#[cfg(any(test, feature = "test-support"))]
pub use store::MemorySessionStore;
