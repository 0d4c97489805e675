// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording client for runner and poller tests

use crate::{Client, ClientError, Filter, Line, StageDetails};
use async_trait::async_trait;
use capstan_core::{Stage, StageStep};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct Inner {
    queue: VecDeque<Stage>,
    details: HashMap<i64, StageDetails>,
    conflicts: HashSet<i64>,
    pings: usize,
    accepts: Vec<i64>,
    stage_updates: Vec<Stage>,
    step_updates: Vec<StageStep>,
    uploads: Vec<(i64, Vec<Line>)>,
}

/// In-memory dispatcher double. `request` pops queued stages and blocks
/// when the queue is empty, mirroring the long poll.
#[derive(Default)]
pub struct FakeClient {
    inner: Mutex<Inner>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stage for the next `request`, with its details.
    pub fn queue_stage(&self, stage: Stage, details: StageDetails) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.details.insert(stage.id, details);
        inner.queue.push_back(stage);
    }

    /// Make `accept` answer with a conflict for the given stage.
    pub fn conflict_on(&self, stage_id: i64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.conflicts.insert(stage_id);
    }

    pub fn pings(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).pings
    }

    pub fn accepts(&self) -> Vec<i64> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .accepts
            .clone()
    }

    pub fn stage_updates(&self) -> Vec<Stage> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .stage_updates
            .clone()
    }

    pub fn step_updates(&self) -> Vec<StageStep> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .step_updates
            .clone()
    }

    pub fn uploads(&self) -> Vec<(i64, Vec<Line>)> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .uploads
            .clone()
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn ping(&self, _machine: &str) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pings += 1;
        Ok(())
    }

    async fn request(&self, _filter: &Filter) -> Result<Stage, ClientError> {
        loop {
            {
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(stage) = inner.queue.pop_front() {
                    return Ok(stage);
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn accept(&self, stage: &Stage) -> Result<Stage, ClientError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.conflicts.contains(&stage.id) {
            return Err(ClientError::Conflict);
        }
        inner.accepts.push(stage.id);
        Ok(stage.clone())
    }

    async fn detail(&self, stage: &Stage) -> Result<StageDetails, ClientError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.details.get(&stage.id).cloned().unwrap_or_default())
    }

    async fn update_stage(&self, stage: &Stage) -> Result<Stage, ClientError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.stage_updates.push(stage.clone());
        Ok(stage.clone())
    }

    async fn update_step(&self, step: &StageStep) -> Result<StageStep, ClientError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.step_updates.push(step.clone());
        Ok(step.clone())
    }

    async fn upload(&self, step_id: i64, lines: &[Line]) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.uploads.push((step_id, lines.to_vec()));
        Ok(())
    }
}
