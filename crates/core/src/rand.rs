// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace suffix generation
//!
//! Every pipeline invocation gets a unique remote workspace directory.
//! The suffix source is a trait so tests can pin the value and compare
//! compiled specs byte for byte.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates the random suffix appended to workspace paths.
pub trait SuffixGen: Send + Sync {
    fn generate(&self) -> String;
}

/// Random alphanumeric suffix for production use.
#[derive(Clone, Default)]
pub struct RandomSuffix;

impl SuffixGen for RandomSuffix {
    fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect::<String>()
            .to_lowercase()
    }
}

/// Sequential suffix for deterministic tests.
#[derive(Clone)]
pub struct SequentialSuffix {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialSuffix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialSuffix {
    fn default() -> Self {
        Self::new("suffix")
    }
}

impl SuffixGen for SequentialSuffix {
    fn generate(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
#[path = "rand_tests.rs"]
mod tests;
