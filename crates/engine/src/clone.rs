// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git clone command generation
//!
//! When cloning is enabled the compiler synthesizes a `clone` step whose
//! body is produced here. Credentials come from the netrc file written
//! into the workspace home directory, never from the command line.

use std::collections::HashMap;

/// Arguments for the generated clone commands.
#[derive(Debug, Clone, Default)]
pub struct Args<'a> {
    pub branch: &'a str,
    pub commit: &'a str,
    pub git_ref: &'a str,
    pub remote: &'a str,
    pub depth: i64,
}

/// The command list for the clone step.
pub fn commands(args: &Args<'_>) -> Vec<String> {
    let mut cmds = vec![
        "git init".to_string(),
        format!("git remote add origin {}", args.remote),
        fetch(args.git_ref, args.depth),
    ];
    if is_tag(args.git_ref) || is_pull_request(args.git_ref) {
        cmds.push(checkout_detached(args.commit));
    } else {
        cmds.push(checkout_branch(args.commit, args.branch));
    }
    cmds
}

fn fetch(git_ref: &str, depth: i64) -> String {
    let mut cmd = String::from("git fetch");
    if depth > 0 {
        cmd.push_str(&format!(" --depth={}", depth));
    }
    cmd.push_str(&format!(" origin +{}:", git_ref));
    cmd
}

fn checkout_branch(commit: &str, branch: &str) -> String {
    if commit.is_empty() {
        format!("git checkout -b {} FETCH_HEAD", branch)
    } else {
        format!("git checkout {} -b {}", commit, branch)
    }
}

fn checkout_detached(commit: &str) -> String {
    if commit.is_empty() {
        "git checkout -qf FETCH_HEAD".to_string()
    } else {
        format!("git checkout -qf {}", commit)
    }
}

/// Git environment variables derived from the clone configuration and
/// the build author.
pub fn environ(
    skip_verify: bool,
    trace: bool,
    author_name: &str,
    author_email: &str,
) -> HashMap<String, String> {
    let mut envs = HashMap::new();
    if !author_name.is_empty() {
        envs.insert("GIT_AUTHOR_NAME".to_string(), author_name.to_string());
        envs.insert("GIT_COMMITTER_NAME".to_string(), author_name.to_string());
    }
    if !author_email.is_empty() {
        envs.insert("GIT_AUTHOR_EMAIL".to_string(), author_email.to_string());
        envs.insert("GIT_COMMITTER_EMAIL".to_string(), author_email.to_string());
    }
    if skip_verify {
        envs.insert("GIT_SSL_NO_VERIFY".to_string(), "true".to_string());
    }
    if trace {
        envs.insert("GIT_TRACE".to_string(), "true".to_string());
    }
    envs
}

fn is_tag(git_ref: &str) -> bool {
    git_ref.starts_with("refs/tags/")
}

fn is_pull_request(git_ref: &str) -> bool {
    git_ref.starts_with("refs/pull/") || git_ref.starts_with("refs/merge-requests/")
}

#[cfg(test)]
#[path = "clone_tests.rs"]
mod tests;
