// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::matcher::Matcher;
use crate::runner::Runner;
use capstan_client::{ConfigData, FakeClient, StageDetails};
use capstan_core::{SequentialSuffix, Stage, StaticEnviron, StaticSecrets, Status};
use capstan_engine::FakeEngine;
use std::time::Instant;

const CONFIG: &str = r#"
kind: pipeline
type: ssh
server:
  host: example.com
  user: root
  password: hunter2
steps:
  - name: build
    commands: [make]
"#;

fn stage(id: i64) -> Stage {
    Stage {
        id,
        ..Default::default()
    }
}

fn details() -> StageDetails {
    StageDetails {
        stage: stage(7),
        config: ConfigData {
            data: CONFIG.to_string(),
        },
        ..Default::default()
    }
}

fn poller(client: Arc<FakeClient>, engine: FakeEngine) -> Arc<Poller<FakeEngine>> {
    Arc::new(Poller {
        client: Arc::clone(&client) as Arc<dyn Client>,
        runner: Arc::new(Runner {
            client,
            engine,
            environ: Arc::new(StaticEnviron::default()),
            secrets: Arc::new(StaticSecrets::default()),
            suffix: Arc::new(SequentialSuffix::new("rand")),
            machine: "runner-1".to_string(),
            matcher: Matcher::default(),
            max_procs: 0,
        }),
        filter: Filter::default(),
    })
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn claims_and_runs_queued_stage() {
    let client = Arc::new(FakeClient::new());
    let engine = FakeEngine::new();
    client.queue_stage(stage(7), details());

    let ctx = CancellationToken::new();
    let handle = tokio::spawn(poller(Arc::clone(&client), engine.clone()).poll(ctx.clone(), 2));

    wait_for(|| {
        client
            .stage_updates()
            .iter()
            .any(|s| s.status == Status::Success)
    })
    .await;
    ctx.cancel();
    handle.await.unwrap();

    assert_eq!(client.accepts(), vec![7]);
    assert_eq!(engine.runs(), vec!["clone", "build"]);
}

#[tokio::test]
async fn conflicted_stage_skipped() {
    let client = Arc::new(FakeClient::new());
    let engine = FakeEngine::new();
    client.queue_stage(stage(7), details());
    client.conflict_on(7);

    let ctx = CancellationToken::new();
    let handle = tokio::spawn(poller(Arc::clone(&client), engine.clone()).poll(ctx.clone(), 1));

    // Give the worker time to pop the queue and hit the conflict.
    tokio::time::sleep(Duration::from_millis(100)).await;
    ctx.cancel();
    handle.await.unwrap();

    assert!(client.accepts().is_empty());
    assert!(client.stage_updates().is_empty());
    assert!(engine.runs().is_empty());
}

#[tokio::test]
async fn empty_stages_ignored() {
    let client = Arc::new(FakeClient::new());
    let engine = FakeEngine::new();
    client.queue_stage(stage(0), details());
    client.queue_stage(stage(7), details());

    let ctx = CancellationToken::new();
    let handle = tokio::spawn(poller(Arc::clone(&client), engine.clone()).poll(ctx.clone(), 1));

    wait_for(|| client.accepts() == vec![7]).await;
    ctx.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn cancellation_stops_idle_workers() {
    let client = Arc::new(FakeClient::new());
    let engine = FakeEngine::new();

    let ctx = CancellationToken::new();
    let handle = tokio::spawn(poller(Arc::clone(&client), engine).poll(ctx.clone(), 3));

    tokio::time::sleep(Duration::from_millis(50)).await;
    ctx.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("workers must exit on cancellation")
        .unwrap();
}
