// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote reporter
//!
//! Adapts the executor's reporter seam onto the dispatcher client: step
//! state transitions become step updates, and each step's buffered log
//! lines are uploaded when the step reaches a terminal state. All log
//! output passes through the secret [`Replacer`] before it is stored.

use crate::replacer::Replacer;
use crate::{Client, ClientError, Line};
use async_trait::async_trait;
use capstan_core::{Stage, Status};
use capstan_engine::report::{Output, ReportError, Reporter, StepState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::warn;

/// Reporter that forwards step state and logs to the dispatcher.
pub struct RemoteReporter {
    client: Arc<dyn Client>,
    stage: Mutex<Stage>,
    replacer: Replacer,
    streams: Mutex<HashMap<String, Arc<LineBuffer>>>,
}

impl RemoteReporter {
    /// Create a reporter for the given stage. The stage must already
    /// carry its server-assigned step ids.
    pub fn new(client: Arc<dyn Client>, stage: Stage, replacer: Replacer) -> Self {
        Self {
            client,
            stage: Mutex::new(stage),
            replacer,
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Current stage model, including step states stamped so far.
    pub fn stage(&self) -> Stage {
        self.stage.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn buffer(&self, step: &str) -> Arc<LineBuffer> {
        let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            streams
                .entry(step.to_string())
                .or_insert_with(|| Arc::new(LineBuffer::new(self.replacer.clone()))),
        )
    }
}

#[async_trait]
impl Reporter for RemoteReporter {
    async fn report_step(&self, state: &StepState) -> Result<(), ReportError> {
        let step = {
            let mut stage = self.stage.lock().unwrap_or_else(|e| e.into_inner());
            let Some(step) = stage.step_mut(&state.name) else {
                return Ok(());
            };
            let now = chrono::Utc::now().timestamp();
            step.status = state.status;
            step.exit_code = state.exit_code;
            step.error = state.error.clone().unwrap_or_default();
            if state.status == Status::Running {
                step.started = now;
            } else if state.status.is_done() {
                if step.started == 0 {
                    step.started = now;
                }
                step.stopped = now;
            }
            step.clone()
        };

        let updated = self
            .client
            .update_step(&step)
            .await
            .map_err(report_error)?;
        let step_id = if updated.id != 0 { updated.id } else { step.id };
        if updated.id != 0 || updated.version != 0 {
            let mut stage = self.stage.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(step) = stage.step_mut(&state.name) {
                if updated.id != 0 {
                    step.id = updated.id;
                }
                step.version = updated.version;
            }
        }

        // Terminal transition: ship the collected log stream.
        if state.status.is_done() {
            let lines = self.buffer(&state.name).drain();
            if step_id != 0 && !lines.is_empty() {
                if let Err(err) = self.client.upload(step_id, &lines).await {
                    warn!(step = %state.name, error = %err, "cannot upload step logs");
                }
            }
        }
        Ok(())
    }

    fn stream(&self, step: &str) -> Arc<dyn Output> {
        self.buffer(step)
    }
}

fn report_error(err: ClientError) -> ReportError {
    ReportError(err.to_string())
}

/// Splits a byte stream into numbered, timestamped, masked lines.
struct LineBuffer {
    replacer: Replacer,
    started: Instant,
    state: Mutex<BufferState>,
}

#[derive(Default)]
struct BufferState {
    partial: Vec<u8>,
    lines: Vec<Line>,
}

impl LineBuffer {
    fn new(replacer: Replacer) -> Self {
        Self {
            replacer,
            started: Instant::now(),
            state: Mutex::new(BufferState::default()),
        }
    }

    /// Flush any partial trailing line and take the collected lines.
    fn drain(&self) -> Vec<Line> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.partial.is_empty() {
            let partial = std::mem::take(&mut state.partial);
            self.push_line(&mut state, &partial);
        }
        std::mem::take(&mut state.lines)
    }

    fn push_line(&self, state: &mut BufferState, raw: &[u8]) {
        let raw = match raw.last() {
            Some(b'\r') => &raw[..raw.len() - 1],
            _ => raw,
        };
        let message = self.replacer.replace(&String::from_utf8_lossy(raw));
        let line = Line {
            number: state.lines.len() as i64,
            message: format!("{}\n", message),
            timestamp: self.started.elapsed().as_secs() as i64,
        };
        state.lines.push(line);
    }
}

impl Output for LineBuffer {
    fn write(&self, data: &[u8]) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.partial.extend_from_slice(data);
        while let Some(pos) = state.partial.iter().position(|&b| b == b'\n') {
            let rest = state.partial.split_off(pos + 1);
            let mut line = std::mem::replace(&mut state.partial, rest);
            line.pop(); // trailing newline
            self.push_line(&mut state, &line);
        }
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
