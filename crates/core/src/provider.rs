// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret and environment providers
//!
//! Providers resolve named secrets and baseline environment variables for
//! the compiler. A missing secret is not an error: the lookup returns
//! `Ok(None)` and the step proceeds with an empty value. Only transport
//! failures against an external provider surface as errors.

use crate::types::{Build, Repo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from secret or environment providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider endpoint returned status {0}")]
    Endpoint(u16),
    #[error("provider transport error: {0}")]
    Transport(String),
}

/// A named secret value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    pub data: String,
}

/// A baseline environment variable, optionally masked in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    pub name: String,
    pub data: String,
    pub mask: bool,
}

/// Context handed to providers alongside the lookup.
#[derive(Debug, Clone, Copy)]
pub struct SecretRequest<'a> {
    pub name: &'a str,
    pub build: &'a Build,
    pub repo: &'a Repo,
}

/// Context handed to environment providers.
#[derive(Debug, Clone, Copy)]
pub struct EnvironRequest<'a> {
    pub build: &'a Build,
    pub repo: &'a Repo,
}

/// Resolves named secret references.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn find(&self, req: SecretRequest<'_>) -> Result<Option<Secret>, ProviderError>;
}

/// Supplies baseline environment variables for every step.
#[async_trait]
pub trait EnvironProvider: Send + Sync {
    async fn list(&self, req: EnvironRequest<'_>) -> Result<Vec<Var>, ProviderError>;
}

/// In-memory secret set, used for the secrets shipped with a stage.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    secrets: Vec<Secret>,
}

impl StaticSecrets {
    pub fn new(secrets: Vec<Secret>) -> Self {
        Self { secrets }
    }
}

#[async_trait]
impl SecretProvider for StaticSecrets {
    async fn find(&self, req: SecretRequest<'_>) -> Result<Option<Secret>, ProviderError> {
        Ok(self
            .secrets
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(req.name))
            .cloned())
    }
}

/// In-memory environment map, used for operator-configured variables.
#[derive(Debug, Clone, Default)]
pub struct StaticEnviron {
    envs: HashMap<String, String>,
}

impl StaticEnviron {
    pub fn new(envs: HashMap<String, String>) -> Self {
        Self { envs }
    }
}

#[async_trait]
impl EnvironProvider for StaticEnviron {
    async fn list(&self, _req: EnvironRequest<'_>) -> Result<Vec<Var>, ProviderError> {
        Ok(self
            .envs
            .iter()
            .map(|(name, data)| Var {
                name: name.clone(),
                data: data.clone(),
                mask: false,
            })
            .collect())
    }
}

/// Chains providers; secrets resolve first match wins, environment lists
/// concatenate in order.
pub struct Combined<T: ?Sized> {
    providers: Vec<Arc<T>>,
}

impl<T: ?Sized> Combined<T> {
    pub fn new(providers: Vec<Arc<T>>) -> Self {
        Self { providers }
    }
}

impl<T: ?Sized> Clone for Combined<T> {
    fn clone(&self) -> Self {
        Self {
            providers: self.providers.clone(),
        }
    }
}

#[async_trait]
impl SecretProvider for Combined<dyn SecretProvider> {
    async fn find(&self, req: SecretRequest<'_>) -> Result<Option<Secret>, ProviderError> {
        for provider in &self.providers {
            if let Some(secret) = provider.find(req).await? {
                return Ok(Some(secret));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl EnvironProvider for Combined<dyn EnvironProvider> {
    async fn list(&self, req: EnvironRequest<'_>) -> Result<Vec<Var>, ProviderError> {
        let mut vars = Vec::new();
        for provider in &self.providers {
            vars.extend(provider.list(req).await?);
        }
        Ok(vars)
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
