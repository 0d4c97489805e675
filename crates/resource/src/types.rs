// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline document types

use crate::conditions::When;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Resource kind this runner executes.
pub const KIND: &str = "pipeline";

/// Resource type this runner executes.
pub const TYPE: &str = "ssh";

/// A parsed ssh pipeline document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Pipeline {
    pub kind: String,
    #[serde(rename = "type")]
    pub pipeline_type: String,
    pub name: String,
    pub platform: Platform,
    pub server: Server,
    #[serde(rename = "clone")]
    pub clone_settings: CloneSettings,
    pub steps: Vec<Step>,
}

/// Target platform of the remote host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Platform {
    pub os: String,
    pub arch: String,
    pub variant: String,
    pub version: String,
}

/// Remote server connection details. Each field is either a literal
/// value or a named secret reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: Secretable,
    pub user: Secretable,
    pub password: Secretable,
    pub ssh_key: Secretable,
}

/// Clone step configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CloneSettings {
    pub disable: bool,
    pub depth: i64,
    pub skip_verify: bool,
    pub trace: bool,
}

/// A pipeline step as declared in the document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Step {
    pub name: String,
    pub commands: Vec<String>,
    pub working_dir: String,
    pub environment: BTreeMap<String, Secretable>,
    pub depends_on: Vec<String>,
    pub detach: bool,
    /// Failure policy: `fail` (default) or `ignore`.
    pub failure: String,
    pub when: When,
}

/// A value that is either a literal or a reference to a named secret.
///
/// YAML accepts a bare scalar (`password: hunter2`), a literal mapping
/// (`password: { value: hunter2 }`) or a secret reference
/// (`password: { from_secret: prod_password }`); exactly one side is
/// ever populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secretable {
    Literal(String),
    FromSecret(String),
}

impl Secretable {
    /// The literal value, if this is not a secret reference.
    pub fn value(&self) -> Option<&str> {
        match self {
            Secretable::Literal(v) => Some(v),
            Secretable::FromSecret(_) => None,
        }
    }

    /// The referenced secret name, if any.
    pub fn secret(&self) -> Option<&str> {
        match self {
            Secretable::Literal(_) => None,
            Secretable::FromSecret(name) => Some(name),
        }
    }

    /// True when neither a literal nor a secret name is present.
    pub fn is_empty(&self) -> bool {
        match self {
            Secretable::Literal(v) => v.is_empty(),
            Secretable::FromSecret(name) => name.is_empty(),
        }
    }
}

impl Default for Secretable {
    fn default() -> Self {
        Secretable::Literal(String::new())
    }
}

impl From<&str> for Secretable {
    fn from(v: &str) -> Self {
        Secretable::Literal(v.to_string())
    }
}

impl<'de> Deserialize<'de> for Secretable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Secretable::Literal(String::new())),
            Value::Bool(b) => Ok(Secretable::Literal(b.to_string())),
            Value::Number(n) => Ok(Secretable::Literal(n.to_string())),
            Value::String(s) => Ok(Secretable::Literal(s)),
            Value::Mapping(map) => {
                if let Some(Value::String(name)) = map.get("from_secret") {
                    return Ok(Secretable::FromSecret(name.clone()));
                }
                match map.get("value") {
                    Some(Value::String(s)) => Ok(Secretable::Literal(s.clone())),
                    Some(Value::Number(n)) => Ok(Secretable::Literal(n.to_string())),
                    Some(Value::Bool(b)) => Ok(Secretable::Literal(b.to_string())),
                    Some(Value::Null) => Ok(Secretable::Literal(String::new())),
                    _ => Err(de::Error::custom("expected a value or from_secret key")),
                }
            }
            _ => Err(de::Error::custom("expected a scalar or secret reference")),
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
