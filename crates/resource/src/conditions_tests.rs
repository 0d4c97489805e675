// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn condition_from_scalar_and_list() {
    let scalar: Condition = serde_yaml::from_str("push").unwrap();
    assert_eq!(scalar.include, vec!["push"]);

    let list: Condition = serde_yaml::from_str("[push, tag]").unwrap();
    assert_eq!(list.include, vec!["push", "tag"]);
}

#[test]
fn condition_from_include_exclude_map() {
    let condition: Condition = serde_yaml::from_str(
        r#"
include: [main, release/*]
exclude: [release/nightly]
"#,
    )
    .unwrap();
    assert!(condition.matches("main"));
    assert!(condition.matches("release/1.0"));
    assert!(!condition.matches("release/nightly"));
    assert!(!condition.matches("feature/x"));
}

#[test]
fn empty_condition_matches_everything() {
    let condition = Condition::default();
    assert!(condition.matches("anything"));
    assert!(condition.matches(""));
}

#[test]
fn when_matches_all_dimensions() {
    let when: When = serde_yaml::from_str(
        r#"
event: push
branch: main
"#,
    )
    .unwrap();

    let matched = MatchParams {
        event: "push",
        branch: "main",
        ..Default::default()
    };
    assert!(when.matches(matched));

    let wrong_event = MatchParams {
        event: "pull_request",
        branch: "main",
        ..Default::default()
    };
    assert!(!when.matches(wrong_event));
}

#[test]
fn status_condition_drives_run_policy_helpers() {
    let on_failure: When = serde_yaml::from_str("status: [failure]").unwrap();
    assert!(on_failure.is_run_on_failure());
    assert!(!on_failure.is_run_always());

    let always: When = serde_yaml::from_str("status: [success, failure]").unwrap();
    assert!(always.is_run_always());
    assert!(always.is_run_on_failure());

    let unset = When::default();
    assert!(!unset.is_run_always());
    assert!(!unset.is_run_on_failure());
}

#[test]
fn status_does_not_gate_matching() {
    let when: When = serde_yaml::from_str("status: [failure]").unwrap();
    assert!(when.matches(MatchParams::default()));
}
