// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote sandbox provider seam.
//!
//! The spawn path can provision a remote sandbox for an agent before its
//! child starts and release it when the slot retires. The HTTP client
//! implementing this against the real provider lives outside the daemon
//! core; the pool only sees this trait and treats failures as
//! best-effort.

use async_trait::async_trait;
use thiserror::Error;

use af_core::{Role, TaskId};

/// Errors from the sandbox provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider api error: {0}")]
    Api(String),
}

/// Abstracted remote-sandbox API used by the spawn path.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Ensure a sandbox exists for the task before its child starts.
    async fn provision(&self, task_id: &TaskId, role: Role) -> Result<(), ProviderError>;

    /// Release any sandbox held for the task once the slot retires.
    async fn release(&self, task_id: &TaskId) -> Result<(), ProviderError>;
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProvider;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded provider interaction.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ProviderCall {
        Provision { task_id: TaskId, role: Role },
        Release { task_id: TaskId },
    }

    #[derive(Default)]
    struct FakeProviderState {
        calls: Vec<ProviderCall>,
        fail_provision: Option<String>,
    }

    /// Recording provider for tests.
    #[derive(Clone, Default)]
    pub struct FakeProvider {
        inner: Arc<Mutex<FakeProviderState>>,
    }

    impl FakeProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<ProviderCall> {
            self.inner.lock().calls.clone()
        }

        pub fn fail_provision(&self, message: impl Into<String>) {
            self.inner.lock().fail_provision = Some(message.into());
        }
    }

    #[async_trait]
    impl Provider for FakeProvider {
        async fn provision(&self, task_id: &TaskId, role: Role) -> Result<(), ProviderError> {
            let mut state = self.inner.lock();
            state.calls.push(ProviderCall::Provision {
                task_id: task_id.clone(),
                role,
            });
            match state.fail_provision.take() {
                Some(message) => Err(ProviderError::Unavailable(message)),
                None => Ok(()),
            }
        }

        async fn release(&self, task_id: &TaskId) -> Result<(), ProviderError> {
            self.inner.lock().calls.push(ProviderCall::Release {
                task_id: task_id.clone(),
            });
            Ok(())
        }
    }
}
