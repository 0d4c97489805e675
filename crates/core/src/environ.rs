// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable derivation
//!
//! Every pipeline step receives a baseline environment assembled from the
//! build, repository, stage and system metadata. The helpers here each
//! derive one slice of that environment; [`combine`] merges them with
//! later maps taking precedence.

use crate::types::{Build, Repo, Stage, System};
use std::collections::HashMap;

/// Merge maps left to right; later entries override earlier ones.
pub fn combine<I>(maps: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = HashMap<String, String>>,
{
    let mut out = HashMap::new();
    for map in maps {
        out.extend(map);
    }
    out
}

/// Expand `$VAR` and `${VAR}` references in each value against the map
/// itself. Unknown references expand to the empty string.
pub fn expand(envs: &HashMap<String, String>) -> HashMap<String, String> {
    envs.iter()
        .map(|(k, v)| (k.clone(), expand_value(v, envs)))
        .collect()
}

fn expand_value(value: &str, envs: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some((_, '{')) => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if closed {
                    out.push_str(envs.get(&name).map(String::as_str).unwrap_or(""));
                } else {
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some((_, c)) if c.is_ascii_alphanumeric() || *c == '_' => {
                let mut name = String::new();
                while let Some((_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(envs.get(&name).map(String::as_str).unwrap_or(""));
            }
            _ => out.push('$'),
        }
    }
    out
}

/// Variables describing the dispatcher itself.
pub fn system(system: &System) -> HashMap<String, String> {
    from_pairs(&[
        ("CI", "true"),
        ("DRONE", "true"),
        ("DRONE_SYSTEM_PROTO", &system.proto),
        ("DRONE_SYSTEM_HOST", &system.host),
        ("DRONE_SYSTEM_HOSTNAME", &system.host),
        ("DRONE_SYSTEM_VERSION", &system.version),
    ])
}

/// Variables describing the repository under build.
pub fn repo(repo: &Repo) -> HashMap<String, String> {
    from_pairs(&[
        ("DRONE_REPO", &repo.slug),
        ("DRONE_REPO_OWNER", &repo.namespace),
        ("DRONE_REPO_NAMESPACE", &repo.namespace),
        ("DRONE_REPO_NAME", &repo.name),
        ("DRONE_REPO_LINK", &repo.link),
        ("DRONE_REPO_BRANCH", &repo.branch),
        ("DRONE_REPO_PRIVATE", bool_str(repo.private)),
        ("DRONE_REMOTE_URL", &repo.clone_url),
        ("DRONE_GIT_HTTP_URL", &repo.clone_url),
    ])
}

/// Variables describing the build and its commit.
pub fn build(build: &Build) -> HashMap<String, String> {
    let mut envs = from_pairs(&[
        ("DRONE_BRANCH", &build.target),
        ("DRONE_SOURCE_BRANCH", &build.source),
        ("DRONE_TARGET_BRANCH", &build.target),
        ("DRONE_COMMIT", &build.after),
        ("DRONE_COMMIT_SHA", &build.after),
        ("DRONE_COMMIT_BEFORE", &build.before),
        ("DRONE_COMMIT_AFTER", &build.after),
        ("DRONE_COMMIT_REF", &build.git_ref),
        ("DRONE_COMMIT_BRANCH", &build.target),
        ("DRONE_COMMIT_LINK", &build.link),
        ("DRONE_COMMIT_MESSAGE", &build.message),
        ("DRONE_COMMIT_AUTHOR", &build.author_login),
        ("DRONE_COMMIT_AUTHOR_NAME", &build.author_name),
        ("DRONE_COMMIT_AUTHOR_EMAIL", &build.author_email),
        ("DRONE_BUILD_NUMBER", &build.number.to_string()),
        ("DRONE_BUILD_PARENT", &build.parent.to_string()),
        ("DRONE_BUILD_EVENT", &build.event),
        ("DRONE_BUILD_ACTION", &build.action),
        ("DRONE_BUILD_STATUS", build.status.as_str()),
        ("DRONE_BUILD_CREATED", &build.created.to_string()),
        ("DRONE_BUILD_STARTED", &build.started.to_string()),
        ("DRONE_BUILD_FINISHED", &build.finished.to_string()),
        ("DRONE_DEPLOY_TO", &build.deploy_to),
    ]);
    if build.event == "cron" {
        envs.insert("DRONE_CRON".to_string(), build.cron.clone());
    }
    if let Some(tag) = build.git_ref.strip_prefix("refs/tags/") {
        envs.insert("DRONE_TAG".to_string(), tag.to_string());
    }
    if build.event == "pull_request" {
        let number = build
            .git_ref
            .strip_prefix("refs/pull/")
            .and_then(|r| r.split('/').next())
            .unwrap_or("");
        envs.insert("DRONE_PULL_REQUEST".to_string(), number.to_string());
    }
    envs
}

/// Variables describing the stage claimed by this runner.
pub fn stage(stage: &Stage) -> HashMap<String, String> {
    from_pairs(&[
        ("DRONE_STAGE_KIND", &stage.kind),
        ("DRONE_STAGE_TYPE", &stage.stage_type),
        ("DRONE_STAGE_NAME", &stage.name),
        ("DRONE_STAGE_NUMBER", &stage.number.to_string()),
        ("DRONE_STAGE_MACHINE", &stage.machine),
        ("DRONE_STAGE_OS", &stage.os),
        ("DRONE_STAGE_ARCH", &stage.arch),
        ("DRONE_STAGE_VARIANT", &stage.variant),
        ("DRONE_STAGE_STARTED", &stage.started.to_string()),
        ("DRONE_STAGE_DEPENDS_ON", &stage.depends_on.join(",")),
    ])
}

/// The deep link to the build in the dashboard.
pub fn link(repo: &Repo, build: &Build, system: &System) -> HashMap<String, String> {
    if system.host.is_empty() {
        return HashMap::new();
    }
    let link = format!(
        "{}://{}/{}/{}",
        system.proto, system.host, repo.slug, build.number
    );
    from_pairs(&[("DRONE_BUILD_LINK", &link)])
}

/// Proxy variables copied from the runner's own environment, in both
/// lowercase and uppercase forms.
pub fn proxy() -> HashMap<String, String> {
    let mut envs = HashMap::new();
    for name in ["no_proxy", "http_proxy", "https_proxy"] {
        let value = std::env::var(name)
            .or_else(|_| std::env::var(name.to_uppercase()))
            .unwrap_or_default();
        if value.is_empty() {
            continue;
        }
        envs.insert(name.to_string(), value.clone());
        envs.insert(name.to_uppercase(), value);
    }
    envs
}

fn from_pairs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn bool_str(v: bool) -> &'static str {
    if v {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
#[path = "environ_tests.rs"]
mod tests;
