// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::engine::{FakeEngine, FakeResult};
use crate::report::{Output, ReportError, Reporter, StepState};
use crate::spec::Step;
use std::sync::Mutex;
use std::time::Duration;

/// Reporter recording every step state transition.
#[derive(Clone, Default)]
struct RecordingReporter {
    states: Arc<Mutex<Vec<StepState>>>,
}

impl RecordingReporter {
    fn states(&self) -> Vec<StepState> {
        self.states.lock().unwrap().clone()
    }

    fn last_status(&self, name: &str) -> Option<Status> {
        self.states()
            .iter()
            .rev()
            .find(|s| s.name == name)
            .map(|s| s.status)
    }
}

struct Sink;

impl Output for Sink {
    fn write(&self, _data: &[u8]) {}
}

#[async_trait::async_trait]
impl Reporter for RecordingReporter {
    async fn report_step(&self, step: &StepState) -> Result<(), ReportError> {
        self.states.lock().unwrap().push(step.clone());
        Ok(())
    }

    fn stream(&self, _step: &str) -> Arc<dyn Output> {
        Arc::new(Sink)
    }
}

fn step(name: &str, deps: &[&str]) -> Step {
    Step {
        name: name.to_string(),
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
        ..Step::default()
    }
}

fn spec(steps: Vec<Step>) -> Arc<Spec> {
    Arc::new(Spec {
        steps,
        ..Spec::default()
    })
}

fn execer(engine: FakeEngine, reporter: RecordingReporter) -> Execer<FakeEngine, RecordingReporter> {
    Execer::new(engine, reporter, 0)
}

#[tokio::test]
async fn linear_pipeline_runs_in_order() {
    let engine = FakeEngine::new();
    let reporter = RecordingReporter::default();
    let spec = spec(vec![
        step("a", &[]),
        step("b", &["a"]),
        step("c", &["b"]),
    ]);

    let status = execer(engine.clone(), reporter.clone())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Success);
    assert_eq!(engine.runs(), vec!["a", "b", "c"]);
    assert_eq!(reporter.last_status("a"), Some(Status::Success));
    assert_eq!(reporter.last_status("c"), Some(Status::Success));
}

#[tokio::test]
async fn failure_skips_downstream_on_success_steps() {
    let engine = FakeEngine::new();
    engine.set_result("a", FakeResult::Exit(1));
    let reporter = RecordingReporter::default();
    let spec = spec(vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])]);

    let status = execer(engine.clone(), reporter.clone())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Failure);
    assert_eq!(engine.runs(), vec!["a"]);
    assert_eq!(reporter.last_status("a"), Some(Status::Failure));
    assert_eq!(reporter.last_status("b"), Some(Status::Skipped));
    assert_eq!(reporter.last_status("c"), Some(Status::Skipped));
}

#[tokio::test]
async fn ignore_err_failure_counts_as_success() {
    let engine = FakeEngine::new();
    engine.set_result("flaky", FakeResult::Exit(1));
    let reporter = RecordingReporter::default();

    let mut flaky = step("flaky", &[]);
    flaky.ignore_err = true;
    let spec = spec(vec![flaky, step("after", &["flaky"])]);

    let status = execer(engine.clone(), reporter.clone())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Success);
    assert_eq!(engine.runs(), vec!["flaky", "after"]);
    assert_eq!(reporter.last_status("flaky"), Some(Status::Success));

    // The real exit code still reaches the reports.
    let flaky_final = reporter
        .states()
        .into_iter()
        .filter(|s| s.name == "flaky")
        .next_back()
        .unwrap();
    assert_eq!(flaky_final.exit_code, 1);
}

#[tokio::test]
async fn on_failure_step_runs_after_failure() {
    let engine = FakeEngine::new();
    engine.set_result("build", FakeResult::Exit(1));
    let reporter = RecordingReporter::default();

    let mut notify = step("notify", &["build"]);
    notify.run_policy = RunPolicy::OnFailure;
    let spec = spec(vec![step("build", &[]), notify]);

    let status = execer(engine.clone(), reporter.clone())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Failure);
    assert_eq!(engine.runs(), vec!["build", "notify"]);
    assert_eq!(reporter.last_status("notify"), Some(Status::Success));
}

#[tokio::test]
async fn on_failure_step_skipped_on_success() {
    let engine = FakeEngine::new();
    let reporter = RecordingReporter::default();

    let mut notify = step("notify", &["build"]);
    notify.run_policy = RunPolicy::OnFailure;
    let spec = spec(vec![step("build", &[]), notify]);

    let status = execer(engine.clone(), reporter.clone())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Success);
    assert_eq!(engine.runs(), vec!["build"]);
    assert_eq!(reporter.last_status("notify"), Some(Status::Skipped));
}

#[tokio::test]
async fn always_step_runs_despite_failure() {
    let engine = FakeEngine::new();
    engine.set_result("build", FakeResult::Exit(1));
    let reporter = RecordingReporter::default();

    let mut cleanup = step("cleanup", &["build"]);
    cleanup.run_policy = RunPolicy::Always;
    let spec = spec(vec![step("build", &[]), cleanup]);

    let status = execer(engine.clone(), reporter.clone())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Failure);
    assert_eq!(engine.runs(), vec!["build", "cleanup"]);
}

#[tokio::test]
async fn always_step_failure_does_not_fail_pipeline() {
    let engine = FakeEngine::new();
    engine.set_result("cleanup", FakeResult::Exit(1));
    let reporter = RecordingReporter::default();

    let mut cleanup = step("cleanup", &["build"]);
    cleanup.run_policy = RunPolicy::Always;
    let spec = spec(vec![step("build", &[]), cleanup]);

    let status = execer(engine.clone(), reporter.clone())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Success);
}

#[tokio::test]
async fn never_policy_skips_without_running() {
    let engine = FakeEngine::new();
    let reporter = RecordingReporter::default();

    let mut gated = step("gated", &[]);
    gated.run_policy = RunPolicy::Never;
    let spec = spec(vec![gated, step("after", &["gated"])]);

    let status = execer(engine.clone(), reporter.clone())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Success);
    // The gated step never reaches the engine but still appears in the
    // reports as skipped.
    assert_eq!(engine.runs(), vec!["after"]);
    assert_eq!(reporter.last_status("gated"), Some(Status::Skipped));
}

#[tokio::test]
async fn transport_error_marks_step_errored() {
    let engine = FakeEngine::new();
    engine.set_result("a", FakeResult::Error("connection refused".to_string()));
    let reporter = RecordingReporter::default();
    let spec = spec(vec![step("a", &[]), step("b", &["a"])]);

    let status = execer(engine.clone(), reporter.clone())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Failure);
    assert_eq!(reporter.last_status("a"), Some(Status::Error));
    assert_eq!(reporter.last_status("b"), Some(Status::Skipped));

    let errored = reporter
        .states()
        .into_iter()
        .filter(|s| s.name == "a")
        .next_back()
        .unwrap();
    assert_eq!(errored.exit_code, 255);
    assert!(errored.error.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn unknown_dependency_rejected() {
    let engine = FakeEngine::new();
    let spec = spec(vec![step("a", &["ghost"])]);

    let err = execer(engine.clone(), RecordingReporter::default())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::UnknownDependency { .. }));
    assert!(engine.runs().is_empty());
}

#[tokio::test]
async fn dependency_cycle_rejected() {
    let engine = FakeEngine::new();
    let spec = spec(vec![step("a", &["b"]), step("b", &["a"])]);

    let err = execer(engine.clone(), RecordingReporter::default())
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::DependencyCycle));
    assert!(engine.runs().is_empty());
}

#[tokio::test]
async fn diamond_graph_runs_join_after_branches() {
    let engine = FakeEngine::new();
    let reporter = RecordingReporter::default();
    let spec = spec(vec![
        step("root", &[]),
        step("left", &["root"]),
        step("right", &["root"]),
        step("join", &["left", "right"]),
    ]);

    let status = execer(engine.clone(), reporter)
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Success);
    let runs = engine.runs();
    assert_eq!(runs[0], "root");
    assert_eq!(runs[3], "join");
    assert_eq!(runs.len(), 4);
}

#[tokio::test]
async fn detached_step_does_not_block_completion() {
    let engine = FakeEngine::new();
    engine.set_result("daemon", FakeResult::Block);
    let reporter = RecordingReporter::default();

    let mut daemon = step("daemon", &[]);
    daemon.detach = true;
    let spec = spec(vec![daemon, step("work", &["daemon"])]);

    let status = tokio::time::timeout(
        Duration::from_secs(5),
        execer(engine.clone(), reporter).exec(&CancellationToken::new(), &spec),
    )
    .await
    .expect("pipeline must terminate while the detached step still runs")
    .unwrap();

    assert_eq!(status, Status::Success);
    assert!(engine.runs().contains(&"work".to_string()));
}

#[tokio::test]
async fn detached_step_does_not_hold_a_proc_slot() {
    let engine = FakeEngine::new();
    engine.set_result("daemon", FakeResult::Block);
    let reporter = RecordingReporter::default();

    let mut daemon = step("daemon", &[]);
    daemon.detach = true;
    let spec = spec(vec![daemon, step("work", &["daemon"])]);

    let status = tokio::time::timeout(
        Duration::from_secs(5),
        Execer::new(engine.clone(), reporter, 1).exec(&CancellationToken::new(), &spec),
    )
    .await
    .expect("dependent step must dispatch while the detached step runs")
    .unwrap();

    assert_eq!(status, Status::Success);
    assert_eq!(engine.runs(), vec!["daemon", "work"]);
}

#[tokio::test]
async fn cancellation_kills_running_step_and_skips_rest() {
    let engine = FakeEngine::new();
    engine.set_result("sleep", FakeResult::Block);
    let reporter = RecordingReporter::default();
    let spec = spec(vec![step("sleep", &[]), step("after", &["sleep"])]);

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        })
    };

    let status = execer(engine.clone(), reporter.clone())
        .exec(&token, &spec)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(status, Status::Killed);
    assert_eq!(engine.runs(), vec!["sleep"]);
    assert_eq!(reporter.last_status("sleep"), Some(Status::Killed));
    assert_eq!(reporter.last_status("after"), Some(Status::Skipped));
}

#[tokio::test]
async fn max_procs_bounds_concurrency() {
    let engine = FakeEngine::new();
    let reporter = RecordingReporter::default();
    let spec = spec(vec![step("a", &[]), step("b", &[]), step("c", &[])]);

    let status = Execer::new(engine.clone(), reporter, 1)
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Success);
    assert_eq!(engine.runs().len(), 3);
    assert_eq!(engine.max_concurrent(), 1);
}

#[tokio::test]
async fn zero_max_procs_is_unbounded() {
    let engine = FakeEngine::new();
    let reporter = RecordingReporter::default();
    let spec = spec(vec![step("a", &[]), step("b", &[]), step("c", &[])]);

    let status = execer(engine.clone(), reporter)
        .exec(&CancellationToken::new(), &spec)
        .await
        .unwrap();

    assert_eq!(status, Status::Success);
    assert_eq!(engine.max_concurrent(), 3);
}

#[tokio::test]
async fn empty_spec_succeeds() {
    let engine = FakeEngine::new();
    let status = execer(engine, RecordingReporter::default())
        .exec(&CancellationToken::new(), &spec(vec![]))
        .await
        .unwrap();
    assert_eq!(status, Status::Success);
}
