// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step executor
//!
//! Walks the compiled step graph: a single coordinator task owns all
//! node state and hands eligible steps to workers, so no locking is
//! needed around scheduling decisions. Workers run the engine and send
//! one completion event each back over a channel.

use crate::engine::Engine;
use crate::error::{EngineError, ExecError};
use crate::report::{Reporter, StepState};
use crate::spec::{RunPolicy, Spec, State};
use capstan_core::Status;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Exit code reported for steps torn down by cancellation.
const EXIT_CODE_KILLED: i32 = 137;

/// Executes a spec's steps with bounded concurrency.
pub struct Execer<E, R> {
    engine: E,
    reporter: R,
    /// Maximum concurrently running steps; zero means unlimited.
    max_procs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Pending,
    Running,
    Done,
}

struct Node {
    state: NodeState,
    result: Status,
    detach_token: Option<CancellationToken>,
}

struct Completion {
    index: usize,
    result: Result<State, EngineError>,
}

impl<E, R> Execer<E, R>
where
    E: Engine,
    R: Reporter,
{
    pub fn new(engine: E, reporter: R, max_procs: usize) -> Self {
        Self {
            engine,
            reporter,
            max_procs,
        }
    }

    /// Run the spec to completion and return the aggregate status.
    ///
    /// Graph defects (unknown dependencies, cycles) fail fast before any
    /// step is dispatched; step failures are folded into the returned
    /// status per each step's run policy.
    pub async fn exec(&self, ctx: &CancellationToken, spec: &Arc<Spec>) -> Result<Status, ExecError> {
        let parents = validate_graph(spec)?;

        let mut nodes: Vec<Node> = spec
            .steps
            .iter()
            .map(|_| Node {
                state: NodeState::Pending,
                result: Status::Pending,
                detach_token: None,
            })
            .collect();

        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
        let mut active = 0usize;
        // Any completed step with a failing result blocks on_success
        // steps and unblocks on_failure steps.
        let mut policy_failed = false;
        // Only failures that count against the pipeline: ignore_err and
        // always-policy steps are excluded.
        let mut outcome_failed = false;

        loop {
            // Dispatch until no further node becomes eligible.
            loop {
                let mut progressed = false;
                for i in 0..nodes.len() {
                    if nodes[i].state != NodeState::Pending {
                        continue;
                    }
                    if !parents[i].iter().all(|&p| nodes[p].state == NodeState::Done) {
                        continue;
                    }

                    let step = &spec.steps[i];
                    let eligible = match step.run_policy {
                        RunPolicy::Always => true,
                        RunPolicy::OnSuccess => !policy_failed,
                        RunPolicy::OnFailure => policy_failed,
                        RunPolicy::Never => false,
                    };

                    if ctx.is_cancelled() || !eligible {
                        nodes[i].state = NodeState::Done;
                        nodes[i].result = Status::Skipped;
                        self.report(spec, i, Status::Skipped, 0, None).await;
                        progressed = true;
                        continue;
                    }

                    if !step.detach && self.max_procs > 0 && active >= self.max_procs {
                        continue;
                    }

                    debug!(step = %step.name, "dispatching step");
                    nodes[i].state = NodeState::Running;
                    nodes[i].result = Status::Running;
                    self.report(spec, i, Status::Running, 0, None).await;

                    let token = ctx.child_token();
                    if step.detach {
                        // Detached steps unblock their children right
                        // away, hold no proc slot and never gate
                        // pipeline completion.
                        nodes[i].state = NodeState::Done;
                        nodes[i].result = Status::Success;
                        nodes[i].detach_token = Some(token.clone());
                    } else {
                        active += 1;
                    }

                    let engine = self.engine.clone();
                    let spec_task = Arc::clone(spec);
                    let output = self.reporter.stream(&step.name);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let step = &spec_task.steps[i];
                        let result = engine.run(&token, &spec_task, step, output).await;
                        let _ = tx.send(Completion { index: i, result });
                    });
                    progressed = true;
                }
                if !progressed {
                    break;
                }
            }

            let remaining = nodes
                .iter()
                .zip(&spec.steps)
                .any(|(node, step)| !step.detach && node.state != NodeState::Done);
            if !remaining {
                break;
            }

            let Some(completion) = rx.recv().await else {
                break;
            };

            let i = completion.index;
            let step = &spec.steps[i];
            if !step.detach {
                active = active.saturating_sub(1);
            }
            let (result, exit_code, error) = match completion.result {
                Ok(state) if state.exit_code == 0 => (Status::Success, 0, None),
                Ok(state) if step.ignore_err => (Status::Success, state.exit_code, None),
                Ok(state) => (Status::Failure, state.exit_code, None),
                Err(EngineError::Cancelled) => (Status::Killed, EXIT_CODE_KILLED, None),
                Err(err) => (Status::Error, 255, Some(err.to_string())),
            };

            if step.detach {
                // Completion of a detached step is informational only.
                self.report(spec, i, result, exit_code, error).await;
                continue;
            }

            nodes[i].state = NodeState::Done;
            nodes[i].result = result;
            if result.is_failing() {
                policy_failed = true;
                if step.run_policy != RunPolicy::Always && !step.ignore_err {
                    outcome_failed = true;
                }
            }
            self.report(spec, i, result, exit_code, error).await;
        }

        // Non-detach steps are done; signal detached steps for teardown.
        for node in &mut nodes {
            if let Some(token) = node.detach_token.take() {
                token.cancel();
            }
        }

        if ctx.is_cancelled() {
            Ok(Status::Killed)
        } else if outcome_failed {
            Ok(Status::Failure)
        } else {
            Ok(Status::Success)
        }
    }

    async fn report(
        &self,
        spec: &Spec,
        index: usize,
        status: Status,
        exit_code: i32,
        error: Option<String>,
    ) {
        let state = StepState {
            name: spec.steps[index].name.clone(),
            number: index as i64 + 1,
            status,
            exit_code,
            error,
        };
        if let Err(err) = self.reporter.report_step(&state).await {
            warn!(step = %state.name, error = %err, "cannot report step state");
        }
    }
}

/// Resolve dependency names to indices and reject unknown references and
/// cycles before anything runs.
fn validate_graph(spec: &Spec) -> Result<Vec<Vec<usize>>, ExecError> {
    let index: HashMap<&str, usize> = spec
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| (step.name.as_str(), i))
        .collect();

    let mut parents: Vec<Vec<usize>> = Vec::with_capacity(spec.steps.len());
    for step in &spec.steps {
        let mut list = Vec::with_capacity(step.depends_on.len());
        for dep in &step.depends_on {
            let Some(&p) = index.get(dep.as_str()) else {
                return Err(ExecError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: dep.clone(),
                });
            };
            list.push(p);
        }
        parents.push(list);
    }

    // Kahn's algorithm; any unvisited node sits on a cycle.
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); spec.steps.len()];
    let mut indegree: Vec<usize> = parents.iter().map(Vec::len).collect();
    for (i, list) in parents.iter().enumerate() {
        for &p in list {
            children[p].push(i);
        }
    }
    let mut queue: Vec<usize> = indegree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| i)
        .collect();
    let mut visited = 0;
    while let Some(n) = queue.pop() {
        visited += 1;
        for &c in &children[n] {
            indegree[c] -= 1;
            if indegree[c] == 0 {
                queue.push(c);
            }
        }
    }
    if visited != spec.steps.len() {
        return Err(ExecError::DependencyCycle);
    }

    Ok(parents)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
