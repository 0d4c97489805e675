// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! capstand: the capstan runner daemon
//!
//! Polls the dispatcher for ssh pipeline stages and executes them on
//! remote hosts.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod matcher;
mod poller;
mod runner;

use crate::config::Config;
use crate::matcher::Matcher;
use crate::poller::Poller;
use crate::runner::Runner;
use capstan_client::{Client, ExternalEnviron, ExternalSecrets, Filter, HttpClient};
use capstan_core::{Combined, EnvironProvider, RandomSuffix, SecretProvider, StaticEnviron};
use capstan_engine::SshEngine;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "capstand", version, about = "ssh pipeline runner daemon")]
struct Args {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Args {} = Args::parse();

    let config = Config::from_environ()?;
    setup_logging(&config);

    let client: Arc<dyn Client> = Arc::new(HttpClient::new(
        &config.client.address,
        &config.client.secret,
        config.client.skip_verify,
    )?);

    let environ: Arc<dyn EnvironProvider> = Arc::new(Combined::<dyn EnvironProvider>::new(vec![
        Arc::new(StaticEnviron::new(config.runner.environ.clone())),
        Arc::new(ExternalEnviron::new(
            &config.environ_plugin.endpoint,
            &config.environ_plugin.token,
            config.environ_plugin.skip_verify,
        )?),
    ]));
    let secrets: Arc<dyn SecretProvider> = Arc::new(ExternalSecrets::new(
        &config.secret_plugin.endpoint,
        &config.secret_plugin.token,
        config.secret_plugin.skip_verify,
    )?);

    let runner = Arc::new(Runner {
        client: Arc::clone(&client),
        engine: SshEngine::new(),
        environ,
        secrets,
        suffix: Arc::new(RandomSuffix),
        machine: config.runner.name.clone(),
        matcher: Matcher::new(
            config.limit.repos.clone(),
            config.limit.events.clone(),
            config.limit.trusted,
        ),
        max_procs: config.runner.max_procs,
    });

    let poller = Arc::new(Poller {
        client: Arc::clone(&client),
        runner,
        filter: Filter {
            kind: capstan_resource::KIND.to_string(),
            stage_type: capstan_resource::TYPE.to_string(),
            labels: config.runner.labels.clone(),
            ..Filter::default()
        },
    });

    let ctx = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    // Block until the dispatcher is reachable; a runner that cannot
    // ping will not receive work anyway.
    loop {
        tokio::select! {
            _ = sigterm.recv() => return Ok(()),
            _ = sigint.recv() => return Ok(()),
            result = client.ping(&config.runner.name) => match result {
                Ok(()) => {
                    info!("successfully pinged the remote server");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "cannot ping the remote server");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            },
        }
    }

    info!(
        capacity = config.runner.capacity,
        endpoint = %config.client.address,
        kind = capstan_resource::KIND,
        r#type = capstan_resource::TYPE,
        "polling the remote server"
    );

    let poll = {
        let ctx = ctx.clone();
        let capacity = config.runner.capacity;
        tokio::spawn(async move { poller.poll(ctx, capacity).await })
    };

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, terminating"),
        _ = sigint.recv() => info!("received SIGINT, terminating"),
    }
    ctx.cancel();

    // In-flight stages drain through the runner's cancellation path.
    let _ = poll.await;
    info!("daemon stopped");
    Ok(())
}

fn setup_logging(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let default = if config.trace {
        "trace"
    } else if config.debug {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
