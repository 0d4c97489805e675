// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn branch_clone_commands() {
    let cmds = commands(&Args {
        branch: "main",
        commit: "abc123",
        git_ref: "refs/heads/main",
        remote: "https://github.com/octocat/hello.git",
        depth: 0,
    });
    assert_eq!(
        cmds,
        vec![
            "git init",
            "git remote add origin https://github.com/octocat/hello.git",
            "git fetch origin +refs/heads/main:",
            "git checkout abc123 -b main",
        ]
    );
}

#[test]
fn depth_limits_fetch() {
    let cmds = commands(&Args {
        branch: "main",
        commit: "abc123",
        git_ref: "refs/heads/main",
        remote: "https://example.com/r.git",
        depth: 50,
    });
    assert_eq!(cmds[2], "git fetch --depth=50 origin +refs/heads/main:");
}

#[test]
fn tag_clone_checks_out_detached() {
    let cmds = commands(&Args {
        branch: "",
        commit: "abc123",
        git_ref: "refs/tags/v1.0.0",
        remote: "https://example.com/r.git",
        depth: 0,
    });
    assert_eq!(cmds[3], "git checkout -qf abc123");
}

#[test]
fn pull_request_clone_checks_out_detached() {
    let cmds = commands(&Args {
        branch: "main",
        commit: "",
        git_ref: "refs/pull/42/head",
        remote: "https://example.com/r.git",
        depth: 0,
    });
    assert_eq!(cmds[3], "git checkout -qf FETCH_HEAD");
}

#[test]
fn environ_includes_author_identity() {
    let envs = environ(false, false, "octocat", "octocat@example.com");
    assert_eq!(envs["GIT_AUTHOR_NAME"], "octocat");
    assert_eq!(envs["GIT_COMMITTER_EMAIL"], "octocat@example.com");
    assert!(!envs.contains_key("GIT_SSL_NO_VERIFY"));
    assert!(!envs.contains_key("GIT_TRACE"));
}

#[test]
fn environ_skip_verify_and_trace() {
    let envs = environ(true, true, "", "");
    assert_eq!(envs["GIT_SSL_NO_VERIFY"], "true");
    assert_eq!(envs["GIT_TRACE"], "true");
    assert!(!envs.contains_key("GIT_AUTHOR_NAME"));
}
