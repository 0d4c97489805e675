// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine and executor errors

use thiserror::Error;

/// Errors from remote engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ssh: {0}")]
    Ssh(#[from] russh::Error),
    #[error("ssh key: {0}")]
    Key(#[from] russh_keys::Error),
    #[error("sftp: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("authentication failed for user {0}")]
    AuthFailed(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    /// True when the error is the result of cancellation rather than a
    /// genuine failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

/// Errors from executing a compiled spec's step graph.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("step {step} depends on unknown step {dependency}")]
    UnknownDependency { step: String, dependency: String },
    #[error("step dependencies form a cycle")]
    DependencyCycle,
}
