// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reporter seam
//!
//! The executor publishes per-step state transitions and log output
//! through this trait. The daemon wires in a reporter that forwards both
//! to the dispatcher; tests use [`NullReporter`] or a recording fake.

use async_trait::async_trait;
use capstan_core::Status;
use std::sync::Arc;
use thiserror::Error;

/// Reporter failure. Reporting is best effort: the executor logs these
/// and keeps going.
#[derive(Debug, Error)]
#[error("report: {0}")]
pub struct ReportError(pub String);

/// Sink for a step's merged stdout/stderr byte stream.
pub trait Output: Send + Sync {
    fn write(&self, data: &[u8]);
}

/// Snapshot of a step's run state, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepState {
    pub name: String,
    /// 1-based position within the spec.
    pub number: i64,
    pub status: Status,
    pub exit_code: i32,
    pub error: Option<String>,
}

/// Receives per-step state updates and log streams.
#[async_trait]
pub trait Reporter: Send + Sync + 'static {
    /// Publish a step state transition (running, then a terminal state).
    async fn report_step(&self, step: &StepState) -> Result<(), ReportError>;

    /// Open the log sink for the named step.
    fn stream(&self, step: &str) -> Arc<dyn Output>;
}

#[async_trait]
impl<T: Reporter + ?Sized> Reporter for Arc<T> {
    async fn report_step(&self, step: &StepState) -> Result<(), ReportError> {
        (**self).report_step(step).await
    }

    fn stream(&self, step: &str) -> Arc<dyn Output> {
        (**self).stream(step)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

struct NullOutput;

impl Output for NullOutput {
    fn write(&self, _data: &[u8]) {}
}

#[async_trait]
impl Reporter for NullReporter {
    async fn report_step(&self, _step: &StepState) -> Result<(), ReportError> {
        Ok(())
    }

    fn stream(&self, _step: &str) -> Arc<dyn Output> {
        Arc::new(NullOutput)
    }
}
