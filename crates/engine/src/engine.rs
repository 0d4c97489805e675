// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine trait
//!
//! Three operations over the remote workspace. Callers always invoke
//! `destroy`, even when `setup` or `run` failed, so every operation
//! dials its own connection and releases it on every exit path.

use crate::error::EngineError;
use crate::report::Output;
use crate::spec::{Spec, State, Step};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Remote pipeline engine.
#[async_trait]
pub trait Engine: Clone + Send + Sync + 'static {
    /// Create the remote workspace and upload global files.
    async fn setup(&self, ctx: &CancellationToken, spec: &Spec) -> Result<(), EngineError>;

    /// Run a single step, streaming merged stdout/stderr to `output`.
    async fn run(
        &self,
        ctx: &CancellationToken,
        spec: &Spec,
        step: &Step,
        output: Arc<dyn Output>,
    ) -> Result<State, EngineError>;

    /// Reclaim the remote workspace.
    async fn destroy(&self, spec: &Spec) -> Result<(), EngineError>;
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeEngine, FakeResult};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted outcome for one fake step execution.
    #[derive(Debug, Clone)]
    pub enum FakeResult {
        /// Return the given exit code.
        Exit(i32),
        /// Return a transport error.
        Error(String),
        /// Block until the step is cancelled.
        Block,
    }

    #[derive(Default)]
    struct Inner {
        setups: usize,
        destroys: usize,
        runs: Vec<String>,
        results: HashMap<String, FakeResult>,
        fail_setup: bool,
        concurrent: usize,
        max_concurrent: usize,
    }

    /// Recording engine for executor and runner tests.
    #[derive(Clone, Default)]
    pub struct FakeEngine {
        inner: Arc<Mutex<Inner>>,
    }

    impl FakeEngine {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the outcome of the named step. Unscripted steps exit 0.
        pub fn set_result(&self, step: &str, result: FakeResult) {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.results.insert(step.to_string(), result);
        }

        /// Make `setup` fail with a transport error.
        pub fn fail_setup(&self) {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.fail_setup = true;
        }

        /// Step names in the order they were dispatched.
        pub fn runs(&self) -> Vec<String> {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.runs.clone()
        }

        pub fn setup_count(&self) -> usize {
            self.inner.lock().unwrap_or_else(|e| e.into_inner()).setups
        }

        /// Highest number of steps observed running at the same time.
        pub fn max_concurrent(&self) -> usize {
            self.inner
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .max_concurrent
        }

        pub fn destroy_count(&self) -> usize {
            self.inner
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .destroys
        }
    }

    #[async_trait]
    impl Engine for FakeEngine {
        async fn setup(&self, _ctx: &CancellationToken, _spec: &Spec) -> Result<(), EngineError> {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.setups += 1;
            if inner.fail_setup {
                return Err(EngineError::Transport("setup refused".to_string()));
            }
            Ok(())
        }

        async fn run(
            &self,
            ctx: &CancellationToken,
            _spec: &Spec,
            step: &Step,
            output: Arc<dyn Output>,
        ) -> Result<State, EngineError> {
            let result = {
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                inner.runs.push(step.name.clone());
                inner.concurrent += 1;
                inner.max_concurrent = inner.max_concurrent.max(inner.concurrent);
                inner.results.get(&step.name).cloned()
            };

            // Hold the slot briefly so overlap is observable.
            let outcome = match result {
                None | Some(FakeResult::Exit(0)) => {
                    output.write(format!("+ {}\n", step.name).as_bytes());
                    tokio::time::sleep(std::time::Duration::from_millis(25)).await;
                    Ok(State {
                        exit_code: 0,
                        exited: true,
                        oom_killed: false,
                    })
                }
                Some(FakeResult::Exit(code)) => {
                    tokio::time::sleep(std::time::Duration::from_millis(25)).await;
                    Ok(State {
                        exit_code: code,
                        exited: true,
                        oom_killed: false,
                    })
                }
                Some(FakeResult::Error(message)) => Err(EngineError::Transport(message)),
                Some(FakeResult::Block) => {
                    ctx.cancelled().await;
                    Err(EngineError::Cancelled)
                }
            };

            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.concurrent -= 1;
            outcome
        }

        async fn destroy(&self, _spec: &Spec) -> Result<(), EngineError> {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.destroys += 1;
            Ok(())
        }
    }
}
