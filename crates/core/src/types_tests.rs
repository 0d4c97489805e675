// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn build_deserializes_with_missing_fields() {
    let build: Build = serde_json::from_str(r#"{"id": 42, "event": "push"}"#).unwrap();
    assert_eq!(build.id, 42);
    assert_eq!(build.event, "push");
    assert_eq!(build.status, Status::Pending);
    assert!(build.params.is_empty());
}

#[test]
fn build_ref_field_uses_wire_name() {
    let build: Build = serde_json::from_str(r#"{"ref": "refs/heads/main"}"#).unwrap();
    assert_eq!(build.git_ref, "refs/heads/main");

    let json = serde_json::to_string(&build).unwrap();
    assert!(json.contains(r#""ref":"refs/heads/main""#));
}

#[test]
fn stage_step_lookup() {
    let mut stage = Stage {
        steps: vec![
            StageStep {
                name: "clone".to_string(),
                number: 1,
                ..Default::default()
            },
            StageStep {
                name: "build".to_string(),
                number: 2,
                ..Default::default()
            },
        ],
        ..Default::default()
    };

    assert_eq!(stage.step("build").map(|s| s.number), Some(2));
    assert!(stage.step("missing").is_none());

    stage.step_mut("clone").unwrap().status = Status::Running;
    assert_eq!(stage.step("clone").unwrap().status, Status::Running);
}
