// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP-backed secret and environment providers
//!
//! Both providers talk to operator-configured plugin endpoints. An empty
//! endpoint turns the provider into a no-op, so the daemon can always
//! wire one in.

use async_trait::async_trait;
use capstan_core::{
    EnvironProvider, EnvironRequest, ProviderError, Secret, SecretProvider, SecretRequest, Var,
};
use serde::Deserialize;
use std::time::Duration;

const PLUGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Secret provider backed by a remote plugin endpoint.
pub struct ExternalSecrets {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SecretResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    data: String,
}

impl ExternalSecrets {
    pub fn new(endpoint: &str, token: &str, skip_verify: bool) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: endpoint.to_string(),
            token: token.to_string(),
            client: build_client(skip_verify)?,
        })
    }
}

#[async_trait]
impl SecretProvider for ExternalSecrets {
    async fn find(&self, req: SecretRequest<'_>) -> Result<Option<Secret>, ProviderError> {
        if self.endpoint.is_empty() {
            return Ok(None);
        }
        let body = serde_json::json!({
            "name": req.name,
            "build": req.build,
            "repo": req.repo,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(PLUGIN_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        match response.status().as_u16() {
            200 => {}
            // Not found is not an error: the step proceeds with an
            // empty value.
            204 | 404 => return Ok(None),
            status => return Err(ProviderError::Endpoint(status)),
        }

        let found: SecretResponse = response.json().await.map_err(transport)?;
        if found.data.is_empty() {
            return Ok(None);
        }
        Ok(Some(Secret {
            name: if found.name.is_empty() {
                req.name.to_string()
            } else {
                found.name
            },
            data: found.data,
        }))
    }
}

/// Environment provider backed by a remote plugin endpoint.
pub struct ExternalEnviron {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct VarResponse {
    name: String,
    #[serde(default)]
    data: String,
    #[serde(default)]
    mask: bool,
}

impl ExternalEnviron {
    pub fn new(endpoint: &str, token: &str, skip_verify: bool) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: endpoint.to_string(),
            token: token.to_string(),
            client: build_client(skip_verify)?,
        })
    }
}

#[async_trait]
impl EnvironProvider for ExternalEnviron {
    async fn list(&self, req: EnvironRequest<'_>) -> Result<Vec<Var>, ProviderError> {
        if self.endpoint.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "build": req.build,
            "repo": req.repo,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(PLUGIN_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        match response.status().as_u16() {
            200 => {}
            204 | 404 => return Ok(Vec::new()),
            status => return Err(ProviderError::Endpoint(status)),
        }

        let vars: Vec<VarResponse> = response.json().await.map_err(transport)?;
        Ok(vars
            .into_iter()
            .map(|v| Var {
                name: v.name,
                data: v.data,
                mask: v.mask,
            })
            .collect())
    }
}

fn build_client(skip_verify: bool) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(skip_verify)
        .build()
        .map_err(transport)
}

fn transport(err: reqwest::Error) -> ProviderError {
    ProviderError::Transport(err.to_string())
}
