// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::types::{Build, Repo};

fn request<'a>(name: &'a str, build: &'a Build, repo: &'a Repo) -> SecretRequest<'a> {
    SecretRequest { name, build, repo }
}

#[tokio::test]
async fn static_secrets_find_is_case_insensitive() {
    let provider = StaticSecrets::new(vec![Secret {
        name: "docker_password".to_string(),
        data: "correct-horse".to_string(),
    }]);
    let build = Build::default();
    let repo = Repo::default();

    let found = provider
        .find(request("DOCKER_PASSWORD", &build, &repo))
        .await
        .unwrap();
    assert_eq!(found.unwrap().data, "correct-horse");

    let missing = provider
        .find(request("other", &build, &repo))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn combined_secrets_first_match_wins() {
    let first = StaticSecrets::new(vec![Secret {
        name: "token".to_string(),
        data: "from-first".to_string(),
    }]);
    let second = StaticSecrets::new(vec![
        Secret {
            name: "token".to_string(),
            data: "from-second".to_string(),
        },
        Secret {
            name: "other".to_string(),
            data: "only-second".to_string(),
        },
    ]);
    let combined = Combined::<dyn SecretProvider>::new(vec![Arc::new(first), Arc::new(second)]);
    let build = Build::default();
    let repo = Repo::default();

    let token = combined
        .find(request("token", &build, &repo))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(token.data, "from-first");

    let other = combined
        .find(request("other", &build, &repo))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(other.data, "only-second");
}

#[tokio::test]
async fn static_environ_lists_unmasked_vars() {
    let provider = StaticEnviron::new(
        [("GOPATH".to_string(), "/go".to_string())]
            .into_iter()
            .collect(),
    );
    let build = Build::default();
    let repo = Repo::default();

    let vars = provider
        .list(EnvironRequest {
            build: &build,
            repo: &repo,
        })
        .await
        .unwrap();
    assert_eq!(vars.len(), 1);
    assert_eq!(vars[0].name, "GOPATH");
    assert!(!vars[0].mask);
}
