// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Intermediate execution specification
//!
//! The compiler lowers a pipeline document into this flat form. A spec is
//! immutable once compiled: the executor tracks run state in its own
//! nodes and never mutates the spec.

use std::collections::HashMap;

/// A compiled pipeline, ready for the engine and executor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spec {
    pub platform: Platform,
    pub server: Server,
    /// Absolute remote workspace directory, unique per invocation.
    pub root: String,
    pub files: Vec<File>,
    pub steps: Vec<Step>,
}

/// Target platform of the remote host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
    pub variant: String,
    pub version: String,
}

/// Resolved server connection details. `hostname` always carries a port.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Server {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub ssh_key: String,
}

/// A file or directory materialized in the remote workspace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct File {
    pub path: String,
    pub mode: u32,
    pub is_dir: bool,
    pub data: Vec<u8>,
}

/// A compiled step: one script invocation on the remote host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: String,
    pub envs: HashMap<String, String>,
    pub secrets: Vec<StepSecret>,
    pub depends_on: Vec<String>,
    pub detach: bool,
    pub ignore_err: bool,
    pub run_policy: RunPolicy,
    /// Script files uploaded immediately before the step runs.
    pub files: Vec<File>,
}

/// A secret exported into a step's environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepSecret {
    pub name: String,
    pub env: String,
    pub data: String,
    pub mask: bool,
}

/// Whether a step runs given the aggregate outcome of prior steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunPolicy {
    #[default]
    OnSuccess,
    Always,
    OnFailure,
    Never,
}

/// Terminal state of one remote step execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct State {
    /// 0 on success, 255 on transport or launch failure, otherwise the
    /// remote command's exit status.
    pub exit_code: i32,
    pub exited: bool,
    /// Always false over SSH; kept for parity with container engines.
    pub oom_killed: bool,
}

impl Spec {
    /// True when any step declares explicit dependencies, making the
    /// pipeline a graph rather than a serial chain.
    pub fn is_graph(&self) -> bool {
        self.steps.iter().any(|s| !s.depends_on.is_empty())
    }

    /// Find a step by name.
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}
