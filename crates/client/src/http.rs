// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the dispatcher RPC

use crate::{Client, ClientError, Filter, Line, StageDetails};
use async_trait::async_trait;
use capstan_core::{Stage, StageStep};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Timeout for ordinary RPC calls. The long-poll request deliberately
/// has none; the dispatcher ends it server-side.
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Production dispatcher client over HTTP.
pub struct HttpClient {
    endpoint: String,
    secret: String,
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client for the dispatcher at `endpoint`, authenticating
    /// with the shared runner secret.
    pub fn new(endpoint: &str, secret: &str, skip_verify: bool) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(skip_verify)
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
            client,
        })
    }

    fn request_builder(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.endpoint, path))
            .header("X-Drone-Token", &self.secret)
    }

    async fn send<T, B>(&self, builder: RequestBuilder, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Default,
        B: Serialize + ?Sized,
    {
        self.exec(builder.json(body)).await
    }

    async fn exec<T>(&self, builder: RequestBuilder) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Default,
    {
        let response = builder.send().await?;
        match response.status() {
            StatusCode::CONFLICT => Err(ClientError::Conflict),
            status if !status.is_success() => Err(ClientError::Status(status.as_u16())),
            StatusCode::NO_CONTENT => Ok(T::default()),
            _ => {
                let bytes = response.bytes().await?;
                if bytes.is_empty() {
                    return Ok(T::default());
                }
                Ok(serde_json::from_slice(&bytes)?)
            }
        }
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn ping(&self, machine: &str) -> Result<(), ClientError> {
        let builder = self
            .request_builder(Method::POST, "/rpc/v2/ping")
            .timeout(RPC_TIMEOUT);
        let _: serde_json::Value = self.send(builder, &serde_json::json!({ "machine": machine })).await?;
        Ok(())
    }

    async fn request(&self, filter: &Filter) -> Result<Stage, ClientError> {
        // Long poll: no client-side timeout.
        let builder = self.request_builder(Method::POST, "/rpc/v2/stage");
        self.send(builder, filter).await
    }

    async fn accept(&self, stage: &Stage) -> Result<Stage, ClientError> {
        let path = format!("/rpc/v2/stage/{}/accept?machine={}", stage.id, stage.machine);
        let builder = self.request_builder(Method::POST, &path).timeout(RPC_TIMEOUT);
        self.exec(builder).await
    }

    async fn detail(&self, stage: &Stage) -> Result<StageDetails, ClientError> {
        let path = format!("/rpc/v2/stage/{}", stage.id);
        let builder = self.request_builder(Method::GET, &path).timeout(RPC_TIMEOUT);
        self.exec(builder).await
    }

    async fn update_stage(&self, stage: &Stage) -> Result<Stage, ClientError> {
        let path = format!("/rpc/v2/stage/{}", stage.id);
        let builder = self.request_builder(Method::PUT, &path).timeout(RPC_TIMEOUT);
        self.send(builder, stage).await
    }

    async fn update_step(&self, step: &StageStep) -> Result<StageStep, ClientError> {
        let path = format!("/rpc/v2/step/{}", step.id);
        let builder = self.request_builder(Method::PUT, &path).timeout(RPC_TIMEOUT);
        self.send(builder, step).await
    }

    async fn upload(&self, step_id: i64, lines: &[Line]) -> Result<(), ClientError> {
        let path = format!("/rpc/v2/step/{}/logs", step_id);
        let builder = self.request_builder(Method::POST, &path).timeout(RPC_TIMEOUT);
        let _: serde_json::Value = self.send(builder, lines).await?;
        Ok(())
    }
}
