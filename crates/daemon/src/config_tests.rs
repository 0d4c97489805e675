// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Mutex;

// Environment variables are process-global; serialize the tests that
// touch them.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_environ() {
    for (key, _) in std::env::vars() {
        if key.starts_with("CAPSTAN_") {
            std::env::remove_var(&key);
        }
    }
}

#[test]
fn minimal_configuration() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_environ();
    std::env::set_var("CAPSTAN_RPC_HOST", "drone.example.com");
    std::env::set_var("CAPSTAN_RPC_SECRET", "topsecret");

    let config = Config::from_environ().unwrap();
    assert_eq!(config.client.address, "http://drone.example.com");
    assert_eq!(config.client.secret, "topsecret");
    assert_eq!(config.runner.capacity, 2);
    assert_eq!(config.runner.max_procs, 0);
    assert!(!config.debug);
    assert!(config.limit.repos.is_empty());
}

#[test]
fn full_configuration() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_environ();
    std::env::set_var("CAPSTAN_RPC_PROTO", "https");
    std::env::set_var("CAPSTAN_RPC_HOST", "drone.example.com");
    std::env::set_var("CAPSTAN_RPC_SECRET", "topsecret");
    std::env::set_var("CAPSTAN_RUNNER_NAME", "runner-1");
    std::env::set_var("CAPSTAN_RUNNER_CAPACITY", "4");
    std::env::set_var("CAPSTAN_RUNNER_MAX_PROCS", "2");
    std::env::set_var("CAPSTAN_RUNNER_LABELS", "region:us, tier:gold");
    std::env::set_var("CAPSTAN_RUNNER_ENVIRON", "GOPATH:/go");
    std::env::set_var("CAPSTAN_LIMIT_REPOS", "octocat/*,acme/api");
    std::env::set_var("CAPSTAN_LIMIT_EVENTS", "push,tag");
    std::env::set_var("CAPSTAN_LIMIT_TRUSTED", "true");
    std::env::set_var("CAPSTAN_DEBUG", "true");

    let config = Config::from_environ().unwrap();
    assert_eq!(config.client.address, "https://drone.example.com");
    assert_eq!(config.runner.name, "runner-1");
    assert_eq!(config.runner.capacity, 4);
    assert_eq!(config.runner.max_procs, 2);
    assert_eq!(config.runner.labels["region"], "us");
    assert_eq!(config.runner.labels["tier"], "gold");
    assert_eq!(config.runner.environ["GOPATH"], "/go");
    assert_eq!(config.limit.repos, vec!["octocat/*", "acme/api"]);
    assert_eq!(config.limit.events, vec!["push", "tag"]);
    assert!(config.limit.trusted);
    assert!(config.debug);

    clear_environ();
}

#[test]
fn missing_host_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_environ();
    std::env::set_var("CAPSTAN_RPC_SECRET", "topsecret");

    let err = Config::from_environ().unwrap_err();
    assert!(matches!(err, ConfigError::Missing("CAPSTAN_RPC_HOST")));
}

#[test]
fn invalid_capacity_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_environ();
    std::env::set_var("CAPSTAN_RPC_HOST", "drone.example.com");
    std::env::set_var("CAPSTAN_RPC_SECRET", "topsecret");
    std::env::set_var("CAPSTAN_RUNNER_CAPACITY", "lots");

    let err = Config::from_environ().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid("CAPSTAN_RUNNER_CAPACITY", _)));

    clear_environ();
}
