// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Execution core for the capstan runner.
//!
//! A validated pipeline document is lowered by the [`Compiler`] into a
//! flat [`Spec`]; the [`Engine`] materializes the spec's workspace on the
//! remote host over SSH/SFTP and runs individual steps; the [`Execer`]
//! walks the step graph honoring dependencies, run policies, the
//! concurrency limit and cancellation.

pub mod clone;
mod compiler;
mod engine;
mod error;
mod executor;
pub mod report;
pub mod script;
mod spec;
mod ssh;

pub use compiler::{CompileArgs, Compiler};
pub use engine::Engine;
pub use error::{EngineError, ExecError};
pub use executor::Execer;
pub use report::{NullReporter, Output, ReportError, Reporter, StepState};
pub use spec::{File, Platform, RunPolicy, Server, Spec, State, Step, StepSecret};
pub use ssh::SshEngine;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use engine::{FakeEngine, FakeResult};
