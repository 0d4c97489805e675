// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::FakeClient;
use capstan_core::StageStep;

fn stage() -> Stage {
    Stage {
        id: 7,
        steps: vec![StageStep {
            id: 70,
            stage_id: 7,
            number: 1,
            name: "build".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn state(status: Status, exit_code: i32) -> StepState {
    StepState {
        name: "build".to_string(),
        number: 1,
        status,
        exit_code,
        error: None,
    }
}

fn reporter(client: Arc<FakeClient>, secrets: Vec<String>) -> RemoteReporter {
    RemoteReporter::new(client, stage(), Replacer::new(secrets))
}

#[tokio::test]
async fn running_transition_stamps_start() {
    let client = Arc::new(FakeClient::new());
    let reporter = reporter(Arc::clone(&client), vec![]);

    reporter.report_step(&state(Status::Running, 0)).await.unwrap();

    let updates = client.step_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, Status::Running);
    assert!(updates[0].started > 0);
    assert_eq!(updates[0].stopped, 0);
}

#[tokio::test]
async fn terminal_transition_uploads_masked_logs() {
    let client = Arc::new(FakeClient::new());
    let reporter = reporter(Arc::clone(&client), vec!["s3cret".to_string()]);

    let stream = reporter.stream("build");
    stream.write(b"exporting TOKEN=s3cret\npartial");

    reporter.report_step(&state(Status::Running, 0)).await.unwrap();
    reporter.report_step(&state(Status::Success, 0)).await.unwrap();

    let uploads = client.uploads();
    assert_eq!(uploads.len(), 1);
    let (step_id, lines) = &uploads[0];
    assert_eq!(*step_id, 70);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].number, 0);
    assert_eq!(lines[0].message, "exporting TOKEN=********\n");
    // The trailing partial line is flushed on drain.
    assert_eq!(lines[1].message, "partial\n");

    let stage = reporter.stage();
    assert_eq!(stage.steps[0].status, Status::Success);
    assert!(stage.steps[0].stopped >= stage.steps[0].started);
}

#[tokio::test]
async fn failure_records_exit_code() {
    let client = Arc::new(FakeClient::new());
    let reporter = reporter(Arc::clone(&client), vec![]);

    reporter.report_step(&state(Status::Failure, 2)).await.unwrap();

    let updates = client.step_updates();
    assert_eq!(updates[0].status, Status::Failure);
    assert_eq!(updates[0].exit_code, 2);
    assert!(updates[0].stopped > 0);
}

#[tokio::test]
async fn unknown_step_ignored() {
    let client = Arc::new(FakeClient::new());
    let reporter = reporter(Arc::clone(&client), vec![]);

    let mut unknown = state(Status::Running, 0);
    unknown.name = "ghost".to_string();
    reporter.report_step(&unknown).await.unwrap();

    assert!(client.step_updates().is_empty());
}

#[tokio::test]
async fn crlf_output_split_into_clean_lines() {
    let client = Arc::new(FakeClient::new());
    let reporter = reporter(Arc::clone(&client), vec![]);

    let stream = reporter.stream("build");
    stream.write(b"one\r\ntwo\n");
    reporter.report_step(&state(Status::Success, 0)).await.unwrap();

    let uploads = client.uploads();
    let (_, lines) = &uploads[0];
    assert_eq!(lines[0].message, "one\n");
    assert_eq!(lines[1].message, "two\n");
    assert_eq!(lines[1].number, 1);
}
