// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher poller
//!
//! Maintains a bounded fleet of in-flight pipelines: `capacity` worker
//! loops each long-poll the dispatcher for a stage, claim it and hand it
//! to the runner. Request failures back off briefly; process shutdown
//! cancels the loops, and in-flight stages drain through the runner's
//! cancellation path.

use crate::runner::Runner;
use capstan_client::{Client, ClientError, Filter};
use capstan_engine::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Delay before retrying a failed dispatcher request.
const BACKOFF: Duration = Duration::from_secs(1);

/// Bounded long-poll loop against the dispatcher.
pub struct Poller<E> {
    pub client: Arc<dyn Client>,
    pub runner: Arc<Runner<E>>,
    pub filter: Filter,
}

impl<E: Engine> Poller<E> {
    /// Run `capacity` worker loops until the token fires.
    pub async fn poll(self: Arc<Self>, ctx: CancellationToken, capacity: usize) {
        let mut workers = Vec::new();
        for thread in 0..capacity.max(1) {
            let poller = Arc::clone(&self);
            let ctx = ctx.clone();
            workers.push(tokio::spawn(async move {
                poller.worker(ctx, thread).await;
            }));
        }
        for worker in workers {
            let _ = worker.await;
        }
    }

    async fn worker(&self, ctx: CancellationToken, thread: usize) {
        debug!(thread, "poller worker started");
        loop {
            if ctx.is_cancelled() {
                break;
            }
            let stage = tokio::select! {
                _ = ctx.cancelled() => break,
                result = self.client.request(&self.filter) => match result {
                    Ok(stage) => stage,
                    Err(err) => {
                        warn!(thread, error = %err, "cannot request stage");
                        self.backoff(&ctx).await;
                        continue;
                    }
                },
            };

            // The dispatcher answers long polls with an empty stage when
            // nothing is queued.
            if stage.id == 0 {
                continue;
            }

            let mut stage = stage;
            stage.machine = self.runner.machine.clone();
            match self.client.accept(&stage).await {
                Ok(accepted) => {
                    if accepted.id != 0 {
                        stage = accepted;
                    }
                }
                Err(ClientError::Conflict) => {
                    // Another runner won the claim.
                    debug!(thread, stage = stage.id, "stage already claimed");
                    continue;
                }
                Err(err) => {
                    warn!(thread, stage = stage.id, error = %err, "cannot accept stage");
                    self.backoff(&ctx).await;
                    continue;
                }
            }

            if let Err(err) = self.runner.run(&ctx, stage).await {
                error!(thread, error = %err, "stage execution aborted");
            }
        }
        debug!(thread, "poller worker stopped");
    }

    async fn backoff(&self, ctx: &CancellationToken) {
        tokio::select! {
            _ = ctx.cancelled() => {}
            _ = tokio::time::sleep(BACKOFF) => {}
        }
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
