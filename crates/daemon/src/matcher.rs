// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage gating
//!
//! Operators can limit a runner to specific repositories, events or
//! trusted repositories. Stages that fail the gate are declined rather
//! than executed.

use capstan_core::{Build, Repo};
use glob::Pattern;

/// Decides whether this runner may execute a stage.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    pub repos: Vec<String>,
    pub events: Vec<String>,
    pub trusted: bool,
}

impl Matcher {
    pub fn new(repos: Vec<String>, events: Vec<String>, trusted: bool) -> Self {
        Self {
            repos,
            events,
            trusted,
        }
    }

    pub fn matches(&self, repo: &Repo, build: &Build) -> bool {
        if self.trusted && !repo.trusted {
            return false;
        }
        if !self.repos.is_empty() && !any_match(&self.repos, &repo.slug) {
            return false;
        }
        if !self.events.is_empty() && !self.events.iter().any(|e| e == &build.event) {
            return false;
        }
        true
    }
}

fn any_match(patterns: &[String], value: &str) -> bool {
    patterns.iter().any(|p| match Pattern::new(p) {
        Ok(pattern) => pattern.matches(value),
        Err(_) => p == value,
    })
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod tests;
