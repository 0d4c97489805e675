// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration
//!
//! Loaded entirely from `CAPSTAN_*` environment variables, the way the
//! daemon is deployed under systemd or in a container.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Daemon configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub debug: bool,
    pub trace: bool,
    pub client: ClientConfig,
    pub runner: RunnerConfig,
    pub limit: LimitConfig,
    pub secret_plugin: PluginConfig,
    pub environ_plugin: PluginConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Full dispatcher address, composed from proto and host.
    pub address: String,
    pub secret: String,
    pub skip_verify: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    pub name: String,
    pub capacity: usize,
    pub max_procs: usize,
    pub labels: HashMap<String, String>,
    pub environ: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct LimitConfig {
    pub repos: Vec<String>,
    pub events: Vec<String>,
    pub trusted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    pub endpoint: String,
    pub token: String,
    pub skip_verify: bool,
}

impl Config {
    /// Load the configuration from the process environment.
    pub fn from_environ() -> Result<Self, ConfigError> {
        let proto = var("CAPSTAN_RPC_PROTO").unwrap_or_else(|| "http".to_string());
        let host = var("CAPSTAN_RPC_HOST").ok_or(ConfigError::Missing("CAPSTAN_RPC_HOST"))?;
        let secret = var("CAPSTAN_RPC_SECRET").ok_or(ConfigError::Missing("CAPSTAN_RPC_SECRET"))?;

        let name = var("CAPSTAN_RUNNER_NAME")
            .or_else(|| var("HOSTNAME"))
            .unwrap_or_else(|| "capstan".to_string());

        Ok(Config {
            debug: bool_var("CAPSTAN_DEBUG"),
            trace: bool_var("CAPSTAN_TRACE"),
            client: ClientConfig {
                address: format!("{}://{}", proto, host),
                secret,
                skip_verify: bool_var("CAPSTAN_RPC_SKIP_VERIFY"),
            },
            runner: RunnerConfig {
                name,
                capacity: usize_var("CAPSTAN_RUNNER_CAPACITY", 2)?,
                max_procs: usize_var("CAPSTAN_RUNNER_MAX_PROCS", 0)?,
                labels: map_var("CAPSTAN_RUNNER_LABELS")?,
                environ: map_var("CAPSTAN_RUNNER_ENVIRON")?,
            },
            limit: LimitConfig {
                repos: list_var("CAPSTAN_LIMIT_REPOS"),
                events: list_var("CAPSTAN_LIMIT_EVENTS"),
                trusted: bool_var("CAPSTAN_LIMIT_TRUSTED"),
            },
            secret_plugin: PluginConfig {
                endpoint: var("CAPSTAN_SECRET_PLUGIN_ENDPOINT").unwrap_or_default(),
                token: var("CAPSTAN_SECRET_PLUGIN_TOKEN").unwrap_or_default(),
                skip_verify: bool_var("CAPSTAN_SECRET_PLUGIN_SKIP_VERIFY"),
            },
            environ_plugin: PluginConfig {
                endpoint: var("CAPSTAN_ENV_PLUGIN_ENDPOINT").unwrap_or_default(),
                token: var("CAPSTAN_ENV_PLUGIN_TOKEN").unwrap_or_default(),
                skip_verify: bool_var("CAPSTAN_ENV_PLUGIN_SKIP_VERIFY"),
            },
        })
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn bool_var(name: &str) -> bool {
    matches!(
        var(name).as_deref(),
        Some("true") | Some("1") | Some("yes")
    )
}

fn usize_var(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid(name, value)),
    }
}

/// Parse a `key:value,key:value` map.
fn map_var(name: &'static str) -> Result<HashMap<String, String>, ConfigError> {
    let Some(value) = var(name) else {
        return Ok(HashMap::new());
    };
    let mut map = HashMap::new();
    for pair in value.split(',').filter(|p| !p.trim().is_empty()) {
        let Some((k, v)) = pair.split_once(':') else {
            return Err(ConfigError::Invalid(name, pair.to_string()));
        };
        map.insert(k.trim().to_string(), v.trim().to_string());
    }
    Ok(map)
}

fn list_var(name: &str) -> Vec<String> {
    var(name)
        .map(|value| {
            value
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
