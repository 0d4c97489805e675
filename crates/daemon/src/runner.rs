// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-stage orchestration
//!
//! One claimed stage flows through here: fetch details, parse and lint
//! the pipeline document, compile, set up the remote workspace, execute
//! the step graph, tear the workspace down and report the final status.
//! Teardown always runs, bounded by its own timeout, even when setup or
//! execution failed or the stage was cancelled.

use crate::matcher::Matcher;
use capstan_client::{Client, ClientError, RemoteReporter, Replacer, StageDetails};
use capstan_core::{
    Combined, EnvironProvider, Secret, SecretProvider, Stage, StageStep, StaticSecrets, Status,
    SuffixGen,
};
use capstan_engine::{CompileArgs, Compiler, Engine, Execer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Upper bound on workspace teardown, so a wedged host cannot block the
/// worker indefinitely.
const DESTROY_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest error string reported to the dispatcher.
const MAX_ERROR_LEN: usize = 500;

/// Runs one claimed stage to completion.
pub struct Runner<E> {
    pub client: Arc<dyn Client>,
    pub engine: E,
    pub environ: Arc<dyn EnvironProvider>,
    pub secrets: Arc<dyn SecretProvider>,
    pub suffix: Arc<dyn SuffixGen>,
    pub machine: String,
    pub matcher: Matcher,
    pub max_procs: usize,
}

impl<E: Engine> Runner<E> {
    /// Execute an accepted stage. Returns an error only when the
    /// dispatcher becomes unreachable; pipeline failures are reported as
    /// stage status.
    pub async fn run(&self, ctx: &CancellationToken, stage: Stage) -> Result<(), ClientError> {
        info!(stage = stage.id, build = stage.build_id, "stage received");
        let details = self.client.detail(&stage).await?;
        self.run_stage(ctx, details).await
    }

    async fn run_stage(
        &self,
        ctx: &CancellationToken,
        details: StageDetails,
    ) -> Result<(), ClientError> {
        let StageDetails {
            build,
            repo,
            mut stage,
            system,
            netrc,
            secrets,
            config,
        } = details;

        if !self.matcher.matches(&repo, &build) {
            info!(stage = stage.id, repo = %repo.slug, "stage declined by runner limits");
            stage.status = Status::Declined;
            stage.stopped = chrono::Utc::now().timestamp();
            self.client.update_stage(&stage).await?;
            return Ok(());
        }

        // Parse and lint. A rejected document fails the stage before
        // anything is compiled or dialed.
        let pipeline = match capstan_resource::parse(&config.data) {
            Ok(pipeline) => pipeline,
            Err(err) => return self.fail_stage(stage, &err.to_string()).await,
        };

        let static_secrets: Vec<Secret> = secrets
            .iter()
            .map(|s| Secret {
                name: s.name.clone(),
                data: s.data.clone(),
            })
            .collect();
        let compiler = Compiler {
            environ: Arc::clone(&self.environ),
            secrets: Arc::new(Combined::<dyn SecretProvider>::new(vec![
                Arc::new(StaticSecrets::new(static_secrets)),
                Arc::clone(&self.secrets),
            ])),
            suffix: Arc::clone(&self.suffix),
        };
        let spec = match compiler
            .compile(CompileArgs {
                pipeline: &pipeline,
                build: &build,
                stage: &stage,
                repo: &repo,
                system: &system,
                netrc: netrc.as_ref(),
            })
            .await
        {
            Ok(spec) => spec,
            Err(err) => return self.fail_stage(stage, &err.to_string()).await,
        };

        // Stamp the compiled steps onto the stage and mark it running;
        // the dispatcher assigns step ids in its reply.
        stage.status = Status::Running;
        stage.started = chrono::Utc::now().timestamp();
        stage.steps = spec
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| StageStep {
                stage_id: stage.id,
                number: i as i64 + 1,
                name: step.name.clone(),
                status: Status::Pending,
                errignore: step.ignore_err,
                ..Default::default()
            })
            .collect();
        let updated = self.client.update_stage(&stage).await?;
        if updated.steps.len() == stage.steps.len() {
            stage.steps = updated.steps;
        }
        stage.version = updated.version;

        let masked: Vec<String> = spec
            .steps
            .iter()
            .flat_map(|s| &s.secrets)
            .filter(|s| s.mask)
            .map(|s| s.data.clone())
            .collect();
        let reporter = Arc::new(RemoteReporter::new(
            Arc::clone(&self.client),
            stage.clone(),
            Replacer::new(masked),
        ));

        let spec = Arc::new(spec);
        let mut stage_error = String::new();
        let status = match self.engine.setup(ctx, &spec).await {
            Err(err) if err.is_cancelled() => Status::Killed,
            Err(err) => {
                error!(stage = stage.id, error = %err, "cannot set up workspace");
                stage_error = err.to_string();
                Status::Error
            }
            Ok(()) => {
                let execer = Execer::new(self.engine.clone(), Arc::clone(&reporter), self.max_procs);
                match execer.exec(ctx, &spec).await {
                    Ok(status) => status,
                    Err(err) => {
                        error!(stage = stage.id, error = %err, "cannot execute pipeline");
                        stage_error = err.to_string();
                        Status::Error
                    }
                }
            }
        };

        // Teardown runs regardless of the outcome, on its own clock so
        // cancellation cannot leave workspaces behind.
        match tokio::time::timeout(DESTROY_TIMEOUT, self.engine.destroy(&spec)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(stage = stage.id, error = %err, "cannot destroy workspace"),
            Err(_) => warn!(stage = stage.id, "workspace destroy timed out"),
        }

        let mut stage = reporter.stage();
        stage.status = status;
        stage.error = truncate(&stage_error);
        stage.stopped = chrono::Utc::now().timestamp();
        for step in &mut stage.steps {
            if step.status == Status::Pending {
                step.status = Status::Skipped;
            }
        }
        self.client.update_stage(&stage).await?;
        info!(stage = stage.id, status = %status, "stage complete");
        Ok(())
    }

    /// Report a stage that failed before execution began.
    async fn fail_stage(&self, mut stage: Stage, error: &str) -> Result<(), ClientError> {
        error!(stage = stage.id, error, "stage failed before execution");
        let now = chrono::Utc::now().timestamp();
        stage.status = Status::Error;
        stage.error = truncate(error);
        if stage.started == 0 {
            stage.started = now;
        }
        stage.stopped = now;
        self.client.update_stage(&stage).await?;
        Ok(())
    }
}

fn truncate(error: &str) -> String {
    if error.len() <= MAX_ERROR_LEN {
        return error.to_string();
    }
    let mut cut = MAX_ERROR_LEN;
    while !error.is_char_boundary(cut) {
        cut -= 1;
    }
    error[..cut].to_string()
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
