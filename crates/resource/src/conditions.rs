// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step conditions
//!
//! A step's `when` block limits where it runs. Each dimension is an
//! include/exclude pair of glob patterns; a step matches when every
//! populated dimension accepts the build under execution. The `status`
//! dimension is special: it never gates matching here, it only drives
//! the compiled run policy.

use glob::Pattern;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_yaml::Value;

/// Include/exclude glob patterns over a single dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Condition {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// True when the value passes the excludes and, if any includes are
    /// set, matches at least one of them.
    pub fn matches(&self, value: &str) -> bool {
        if self.exclude.iter().any(|p| pattern_match(p, value)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|p| pattern_match(p, value))
    }
}

fn pattern_match(pattern: &str, value: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches(value),
        Err(_) => pattern == value,
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Condition::default()),
            Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Sequence(_) => {
                Ok(Condition {
                    include: patterns(value).map_err(de::Error::custom)?,
                    exclude: Vec::new(),
                })
            }
            Value::Mapping(map) => {
                let mut condition = Condition::default();
                if let Some(v) = map.get("include") {
                    condition.include = patterns(v.clone()).map_err(de::Error::custom)?;
                }
                if let Some(v) = map.get("exclude") {
                    condition.exclude = patterns(v.clone()).map_err(de::Error::custom)?;
                }
                Ok(condition)
            }
            _ => Err(de::Error::custom("invalid condition")),
        }
    }
}

fn patterns(value: Value) -> Result<Vec<String>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s]),
        Value::Number(n) => Ok(vec![n.to_string()]),
        Value::Bool(b) => Ok(vec![b.to_string()]),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                _ => Err("condition entries must be scalars".to_string()),
            })
            .collect(),
        _ => Err("condition must be a scalar or a list".to_string()),
    }
}

/// The build attributes a `when` block is evaluated against.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchParams<'a> {
    pub action: &'a str,
    pub branch: &'a str,
    pub cron: &'a str,
    pub event: &'a str,
    pub git_ref: &'a str,
    pub repo: &'a str,
    pub instance: &'a str,
    pub target: &'a str,
}

/// A step's `when` block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct When {
    pub action: Condition,
    pub branch: Condition,
    pub cron: Condition,
    pub event: Condition,
    #[serde(rename = "ref")]
    pub git_ref: Condition,
    pub repo: Condition,
    pub instance: Condition,
    pub status: Condition,
    pub target: Condition,
}

impl When {
    /// Evaluate every dimension except `status` against the build.
    pub fn matches(&self, params: MatchParams<'_>) -> bool {
        self.action.matches(params.action)
            && self.branch.matches(params.branch)
            && self.cron.matches(params.cron)
            && self.event.matches(params.event)
            && self.git_ref.matches(params.git_ref)
            && self.repo.matches(params.repo)
            && self.instance.matches(params.instance)
            && self.target.matches(params.target)
    }

    /// True when the step is marked to run regardless of prior outcomes
    /// (`status: [success, failure]`).
    pub fn is_run_always(&self) -> bool {
        !self.status.is_empty() && self.status.matches("success") && self.status.matches("failure")
    }

    /// True when the step is marked to run after a failure.
    pub fn is_run_on_failure(&self) -> bool {
        !self.status.is_empty() && self.status.matches("failure")
    }
}

#[cfg(test)]
#[path = "conditions_tests.rs"]
mod tests;
