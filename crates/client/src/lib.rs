// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Dispatcher RPC client and remote reporting.
//!
//! The [`Client`] trait covers the dispatcher methods the runner
//! consumes; [`HttpClient`] is the production implementation. The crate
//! also hosts the HTTP-backed secret/environment providers and the
//! [`RemoteReporter`] that streams masked step logs and state updates
//! back to the dispatcher.

mod http;
mod providers;
mod remote;
mod replacer;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeClient;

use async_trait::async_trait;
use capstan_core::{Build, Netrc, Repo, Stage, StageStep, System};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use http::HttpClient;
pub use providers::{ExternalEnviron, ExternalSecrets};
pub use remote::RemoteReporter;
pub use replacer::Replacer;

/// Client errors. Transient transport failures are retried by the
/// poller with backoff.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("dispatcher returned status {0}")]
    Status(u16),
    /// Another runner claimed the stage first.
    #[error("stage already claimed")]
    Conflict,
}

/// Filter describing the stages this runner can execute.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Filter {
    pub kind: String,
    #[serde(rename = "type")]
    pub stage_type: String,
    pub os: String,
    pub arch: String,
    pub labels: HashMap<String, String>,
}

/// Everything needed to run an accepted stage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StageDetails {
    pub build: Build,
    pub repo: Repo,
    pub stage: Stage,
    pub system: System,
    pub netrc: Option<Netrc>,
    pub secrets: Vec<StageSecret>,
    pub config: ConfigData,
}

/// A secret shipped with the stage details.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StageSecret {
    pub name: String,
    pub data: String,
}

/// The raw pipeline configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigData {
    pub data: String,
}

/// A single log line uploaded to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    #[serde(rename = "pos")]
    pub number: i64,
    #[serde(rename = "out")]
    pub message: String,
    #[serde(rename = "time")]
    pub timestamp: i64,
}

/// Dispatcher RPC methods consumed by the runner.
#[async_trait]
pub trait Client: Send + Sync + 'static {
    /// Health check; blocks until the dispatcher is reachable or errors.
    async fn ping(&self, machine: &str) -> Result<(), ClientError>;

    /// Long-poll for the next matching stage.
    async fn request(&self, filter: &Filter) -> Result<Stage, ClientError>;

    /// Claim the stage for this runner.
    async fn accept(&self, stage: &Stage) -> Result<Stage, ClientError>;

    /// Fetch the full details of an accepted stage.
    async fn detail(&self, stage: &Stage) -> Result<StageDetails, ClientError>;

    /// Publish a stage state change; returns the server copy.
    async fn update_stage(&self, stage: &Stage) -> Result<Stage, ClientError>;

    /// Publish a step state change; returns the server copy.
    async fn update_step(&self, step: &StageStep) -> Result<StageStep, ClientError>;

    /// Upload the full log stream for a step.
    async fn upload(&self, step_id: i64, lines: &[Line]) -> Result<(), ClientError>;
}
