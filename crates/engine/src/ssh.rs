// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH/SFTP engine
//!
//! Each operation dials its own connection, so nothing is shared across
//! concurrently running steps. Host keys are not verified: the operator
//! controls both the runner and the build hosts, and the trade-off is
//! documented in DESIGN.md.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::report::Output;
use crate::script;
use crate::spec::{Spec, State, Step};
use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect, Sig};
use russh_keys::key;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::FileAttributes;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Engine that executes specs on a remote host over SSH.
#[derive(Clone, Default)]
pub struct SshEngine;

impl SshEngine {
    pub fn new() -> Self {
        Self
    }

    async fn setup_inner(&self, spec: &Spec) -> Result<(), EngineError> {
        let handle = dial(spec).await?;
        let result = async {
            let sftp = open_sftp(&handle).await?;

            // The workspace is created before pipeline execution begins.
            // Everything the pipeline writes is isolated to this root.
            if let Err(err) = mkdir_all(&sftp, &spec.platform.os, &spec.root, 0o777).await {
                error!(path = %spec.root, error = %err, "cannot create workspace directory");
                return Err(err);
            }

            // Global folders, such as the home and source directories,
            // must exist before any file is uploaded.
            for file in spec.files.iter().filter(|f| f.is_dir) {
                if let Err(err) = mkdir_all(&sftp, &spec.platform.os, &file.path, file.mode).await {
                    error!(path = %file.path, error = %err, "cannot create directory");
                    return Err(err);
                }
            }

            for file in spec.files.iter().filter(|f| !f.is_dir) {
                if let Err(err) = upload(&sftp, &file.path, &file.data, file.mode).await {
                    error!(path = %file.path, error = %err, "cannot write file");
                    return Err(err);
                }
            }

            sftp.close().await?;
            Ok(())
        }
        .await;

        disconnect(&handle).await;
        result
    }

    async fn run_inner(
        &self,
        ctx: &CancellationToken,
        spec: &Spec,
        step: &Step,
        output: Arc<dyn Output>,
    ) -> Result<State, EngineError> {
        let handle = dial(spec).await?;
        let result = self.run_session(ctx, &handle, spec, step, output).await;
        disconnect(&handle).await;
        result
    }

    async fn run_session(
        &self,
        ctx: &CancellationToken,
        handle: &Handle<Callbacks>,
        spec: &Spec,
        step: &Step,
        output: Arc<dyn Output>,
    ) -> Result<State, EngineError> {
        // There is no good way to set the working directory or the
        // environment of a remote command, so both are prepended to the
        // uploaded script.
        let sftp = open_sftp(handle).await?;
        for file in &step.files {
            let mut buf = String::new();
            script::write_workdir(&mut buf, &step.working_dir);
            script::write_secrets(&mut buf, &spec.platform.os, &step.secrets);
            script::write_environ(&mut buf, &spec.platform.os, &step.envs);
            let mut data = buf.into_bytes();
            data.extend_from_slice(&file.data);
            if let Err(err) = upload(&sftp, &file.path, &data, file.mode).await {
                error!(path = %file.path, error = %err, "cannot write file");
                return Err(err);
            }
        }
        sftp.close().await?;

        let mut channel = handle.channel_open_session().await?;
        let command = match step.args.len() {
            0 => step.command.clone(),
            _ => format!("{} {}", step.command, step.args.join(" ")),
        };
        channel.exec(true, command.as_str()).await?;
        debug!(step = %step.name, "ssh session started");

        let mut exit_code: Option<u32> = None;
        loop {
            let event = tokio::select! {
                _ = ctx.cancelled() => None,
                msg = channel.wait() => Some(msg),
            };
            match event {
                None => {
                    // openssh may ignore the signal request and leave the
                    // remote process running; see DESIGN.md.
                    if let Err(err) = channel.signal(Sig::KILL).await {
                        debug!(error = %err, "kill remote process");
                    }
                    debug!(step = %step.name, "ssh session killed");
                    return Err(EngineError::Cancelled);
                }
                Some(Some(ChannelMsg::Data { data })) => output.write(&data),
                Some(Some(ChannelMsg::ExtendedData { data, .. })) => output.write(&data),
                Some(Some(ChannelMsg::ExitStatus { exit_status })) => exit_code = Some(exit_status),
                Some(Some(_)) => {}
                Some(None) => break,
            }
        }

        // A session that closes without reporting an exit status failed
        // to launch; surface it as the conventional transport code.
        let state = State {
            exit_code: exit_code.map(|c| c as i32).unwrap_or(255),
            exited: true,
            oom_killed: false,
        };
        debug!(step = %step.name, exit_code = state.exit_code, "ssh session finished");
        Ok(state)
    }

    async fn destroy_inner(&self, spec: &Spec) -> Result<(), EngineError> {
        let handle = dial(spec).await?;
        let result = async {
            let sftp = open_sftp(&handle).await?;
            let removed = sftp.remove_dir(&spec.root).await;
            let _ = sftp.close().await;
            let err = match removed {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            // Removing a populated workspace over sftp consistently fails
            // on both linux and windows servers, so fall back to running a
            // remove command over a session.
            trace!(path = %spec.root, error = %err, "cannot remove workspace using sftp");

            let mut channel = handle.channel_open_session().await?;
            let command = script::remove_command(&spec.platform.os, &spec.root);
            channel.exec(true, command.as_str()).await?;

            let mut exit_code = 0u32;
            while let Some(msg) = channel.wait().await {
                if let ChannelMsg::ExitStatus { exit_status } = msg {
                    exit_code = exit_status;
                }
            }
            if exit_code != 0 {
                warn!(path = %spec.root, exit_code, "cannot remove workspace");
            }
            Ok(())
        }
        .await;

        disconnect(&handle).await;
        result
    }
}

#[async_trait]
impl Engine for SshEngine {
    async fn setup(&self, ctx: &CancellationToken, spec: &Spec) -> Result<(), EngineError> {
        tokio::select! {
            _ = ctx.cancelled() => Err(EngineError::Cancelled),
            result = self.setup_inner(spec) => result,
        }
    }

    async fn run(
        &self,
        ctx: &CancellationToken,
        spec: &Spec,
        step: &Step,
        output: Arc<dyn Output>,
    ) -> Result<State, EngineError> {
        self.run_inner(ctx, spec, step, output).await
    }

    async fn destroy(&self, spec: &Spec) -> Result<(), EngineError> {
        self.destroy_inner(spec).await
    }
}

struct Callbacks;

#[async_trait]
impl client::Handler for Callbacks {
    type Error = russh::Error;

    // Host-key verification is intentionally disabled: the operator
    // controls both sides of the connection.
    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Dial the server, attempting key and password auth. Either may satisfy
/// the server when both are configured.
async fn dial(spec: &Spec) -> Result<Handle<Callbacks>, EngineError> {
    let server = &spec.server;
    let config = Arc::new(client::Config::default());
    let mut handle = client::connect(config, server.hostname.as_str(), Callbacks).await?;

    let mut authenticated = false;
    if !server.ssh_key.is_empty() {
        let keypair = russh_keys::decode_secret_key(&server.ssh_key, None)?;
        authenticated = handle
            .authenticate_publickey(server.username.as_str(), Arc::new(keypair))
            .await?;
    }
    if !authenticated && !server.password.is_empty() {
        authenticated = handle
            .authenticate_password(server.username.as_str(), server.password.as_str())
            .await?;
    }
    if !authenticated {
        return Err(EngineError::AuthFailed(server.username.clone()));
    }
    Ok(handle)
}

async fn disconnect(handle: &Handle<Callbacks>) {
    let _ = handle
        .disconnect(Disconnect::ByApplication, "", "English")
        .await;
}

async fn open_sftp(handle: &Handle<Callbacks>) -> Result<SftpSession, EngineError> {
    let mut channel = handle.channel_open_session().await?;
    channel.request_subsystem(true, "sftp").await?;
    Ok(SftpSession::new(channel.into_stream()).await?)
}

/// Write the file and then set its permissions.
async fn upload(
    sftp: &SftpSession,
    path: &str,
    data: &[u8],
    mode: u32,
) -> Result<(), EngineError> {
    let mut file = sftp.create(path).await?;
    file.write_all(data).await?;
    file.shutdown().await?;
    chmod(sftp, path, mode).await
}

/// Create every directory level in the path. Windows sftp servers do not
/// honor recursive creation, so each level is created explicitly.
async fn mkdir_all(
    sftp: &SftpSession,
    os: &str,
    path: &str,
    mode: u32,
) -> Result<(), EngineError> {
    let sep = if os == "windows" { '\\' } else { '/' };
    let mut prefix = String::new();
    for part in path.split(sep).filter(|p| !p.is_empty()) {
        if prefix.is_empty() && os == "windows" {
            // Drive letters exist already.
            prefix = part.to_string();
            continue;
        }
        prefix = format!("{}{}{}", prefix, sep, part);
        if sftp.metadata(&prefix).await.is_ok() {
            continue;
        }
        sftp.create_dir(&prefix).await?;
    }
    chmod(sftp, path, mode).await
}

async fn chmod(sftp: &SftpSession, path: &str, mode: u32) -> Result<(), EngineError> {
    let attrs = FileAttributes {
        permissions: Some(mode),
        ..Default::default()
    };
    Ok(sftp.set_metadata(path, attrs).await?)
}
