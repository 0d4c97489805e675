// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline document parsing and linting

use crate::types::{Pipeline, KIND, TYPE};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Errors from parsing or linting a configuration file.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("no pipeline resource of type ssh found")]
    NoMatch,
    #[error("linter: {0}")]
    Lint(String),
}

/// Parse a (possibly multi-document) configuration file and return the
/// first document with `kind: pipeline` and `type: ssh`. Documents of
/// other kinds are skipped. The returned pipeline has been linted.
pub fn parse(text: &str) -> Result<Pipeline, ResourceError> {
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)?;
        if !is_match(&value) {
            continue;
        }
        let pipeline: Pipeline = serde_yaml::from_value(value)?;
        lint(&pipeline)?;
        return Ok(pipeline);
    }
    Err(ResourceError::NoMatch)
}

fn is_match(value: &Value) -> bool {
    let kind = value.get("kind").and_then(Value::as_str).unwrap_or("");
    let typ = value.get("type").and_then(Value::as_str).unwrap_or("");
    kind == KIND && typ == TYPE
}

/// Lint a parsed pipeline. The compiler assumes these hold.
pub fn lint(pipeline: &Pipeline) -> Result<(), ResourceError> {
    if pipeline.server.host.is_empty() {
        return Err(ResourceError::Lint(
            "invalid or missing server host".to_string(),
        ));
    }
    if pipeline.server.user.is_empty() {
        return Err(ResourceError::Lint(
            "invalid or missing server user".to_string(),
        ));
    }
    if pipeline.server.password.is_empty() && pipeline.server.ssh_key.is_empty() {
        return Err(ResourceError::Lint(
            "invalid or missing server password or ssh_key".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for step in &pipeline.steps {
        if step.name.is_empty() {
            return Err(ResourceError::Lint(
                "invalid or missing step name".to_string(),
            ));
        }
        if !names.insert(step.name.as_str()) {
            return Err(ResourceError::Lint(format!(
                "duplicate step name {}",
                step.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
