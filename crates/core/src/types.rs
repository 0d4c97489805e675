// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher payload types
//!
//! These structs mirror the JSON bodies exchanged with the central
//! dispatcher. Every field carries a serde default because the server
//! omits empty values.

use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A build as reported by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Build {
    pub id: i64,
    pub number: i64,
    pub parent: i64,
    pub status: Status,
    pub event: String,
    pub action: String,
    pub cron: String,
    /// Deployment target, when the event is a promotion.
    pub deploy_to: String,
    pub link: String,
    pub message: String,
    pub before: String,
    pub after: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub source: String,
    pub target: String,
    pub author_login: String,
    pub author_name: String,
    pub author_email: String,
    pub params: HashMap<String, String>,
    pub created: i64,
    pub started: i64,
    pub finished: i64,
}

/// A source repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repo {
    pub id: i64,
    pub namespace: String,
    pub name: String,
    pub slug: String,
    pub link: String,
    pub branch: String,
    pub private: bool,
    pub trusted: bool,
    pub clone_url: String,
}

/// A claimed unit of work: one runnable stage of a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage {
    pub id: i64,
    pub build_id: i64,
    pub number: i64,
    pub name: String,
    pub kind: String,
    #[serde(rename = "type")]
    pub stage_type: String,
    pub status: Status,
    pub error: String,
    pub exit_code: i32,
    /// Name of the runner that claimed the stage.
    pub machine: String,
    pub os: String,
    pub arch: String,
    pub variant: String,
    pub kernel: String,
    pub labels: HashMap<String, String>,
    pub depends_on: Vec<String>,
    pub started: i64,
    pub stopped: i64,
    pub created: i64,
    pub updated: i64,
    pub version: i64,
    pub steps: Vec<StageStep>,
}

impl Stage {
    /// Find a step on the stage by name.
    pub fn step(&self, name: &str) -> Option<&StageStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Find a step on the stage by name, mutably.
    pub fn step_mut(&mut self, name: &str) -> Option<&mut StageStep> {
        self.steps.iter_mut().find(|s| s.name == name)
    }
}

/// A single step within a stage, as tracked by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageStep {
    pub id: i64,
    pub step_id: i64,
    pub stage_id: i64,
    pub number: i64,
    pub name: String,
    pub status: Status,
    pub error: String,
    pub errignore: bool,
    pub exit_code: i32,
    pub started: i64,
    pub stopped: i64,
    pub version: i64,
}

/// Dispatcher system metadata, used to derive link variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct System {
    pub proto: String,
    pub host: String,
    pub link: String,
    pub version: String,
}

/// Credentials the clone step uses to authenticate to the remote
/// repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Netrc {
    pub machine: String,
    pub login: String,
    pub password: String,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
