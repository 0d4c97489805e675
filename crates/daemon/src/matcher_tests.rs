// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn repo(slug: &str, trusted: bool) -> Repo {
    Repo {
        slug: slug.to_string(),
        trusted,
        ..Default::default()
    }
}

fn build(event: &str) -> Build {
    Build {
        event: event.to_string(),
        ..Default::default()
    }
}

#[test]
fn empty_matcher_accepts_everything() {
    let matcher = Matcher::default();
    assert!(matcher.matches(&repo("octocat/hello", false), &build("push")));
}

#[test]
fn repo_patterns_gate_by_slug() {
    let matcher = Matcher::new(vec!["octocat/*".to_string()], vec![], false);
    assert!(matcher.matches(&repo("octocat/hello", false), &build("push")));
    assert!(!matcher.matches(&repo("acme/api", false), &build("push")));
}

#[test]
fn events_gate_by_build_event() {
    let matcher = Matcher::new(vec![], vec!["push".to_string(), "tag".to_string()], false);
    assert!(matcher.matches(&repo("octocat/hello", false), &build("tag")));
    assert!(!matcher.matches(&repo("octocat/hello", false), &build("pull_request")));
}

#[test]
fn trusted_only_rejects_untrusted_repos() {
    let matcher = Matcher::new(vec![], vec![], true);
    assert!(matcher.matches(&repo("octocat/hello", true), &build("push")));
    assert!(!matcher.matches(&repo("octocat/hello", false), &build("push")));
}
