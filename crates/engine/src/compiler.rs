// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline compiler
//!
//! Lowers a linted pipeline document into a [`Spec`]. This is the single
//! place where secrets, environment variables and remote paths are
//! resolved, so the engine stays pure transport and the executor pure
//! scheduling.

use crate::clone;
use crate::script;
use crate::spec::{File, Platform, RunPolicy, Server, Spec, Step, StepSecret};
use capstan_core::environ;
use capstan_core::{
    slugify, Build, EnvironProvider, EnvironRequest, Netrc, ProviderError, Repo, SecretProvider,
    SecretRequest, Stage, SuffixGen, System,
};
use capstan_resource::{MatchParams, Pipeline, Secretable};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-stage inputs to a compilation.
#[derive(Clone, Copy)]
pub struct CompileArgs<'a> {
    pub pipeline: &'a Pipeline,
    pub build: &'a Build,
    pub stage: &'a Stage,
    pub repo: &'a Repo,
    pub system: &'a System,
    pub netrc: Option<&'a Netrc>,
}

/// Compiles pipeline documents into specs.
pub struct Compiler {
    pub environ: Arc<dyn EnvironProvider>,
    pub secrets: Arc<dyn SecretProvider>,
    pub suffix: Arc<dyn SuffixGen>,
}

impl Compiler {
    pub async fn compile(&self, args: CompileArgs<'_>) -> Result<Spec, ProviderError> {
        let pipeline = args.pipeline;
        let os = pipeline.platform.os.as_str();

        let mut spec = Spec {
            platform: Platform {
                os: pipeline.platform.os.clone(),
                arch: pipeline.platform.arch.clone(),
                variant: pipeline.platform.variant.clone(),
                version: pipeline.platform.version.clone(),
            },
            server: Server {
                hostname: self.resolve(&pipeline.server.host, &args).await?,
                username: self.resolve(&pipeline.server.user, &args).await?,
                password: self.resolve(&pipeline.server.password, &args).await?,
                ssh_key: self.resolve(&pipeline.server.ssh_key, &args).await?,
            },
            ..Spec::default()
        };

        // Append the default ssh port when the host has none.
        if !spec.server.hostname.contains(':') {
            spec.server.hostname.push_str(":22");
        }

        spec.root = script::temp_dir(os, self.suffix.as_ref());
        let homedir = script::join(os, &[&spec.root, "home", "drone"]);
        let sourcedir = script::join(os, &[&spec.root, "drone", "src"]);

        // The full directory tree is spelled out because recursive
        // creation is unreliable on windows sftp servers.
        for dir in [
            script::join(os, &[&spec.root, "home"]),
            homedir.clone(),
            script::join(os, &[&spec.root, "drone"]),
            sourcedir.clone(),
            script::join(os, &[&spec.root, "opt"]),
        ] {
            spec.files.push(File {
                path: dir,
                mode: 0o700,
                is_dir: true,
                data: Vec::new(),
            });
        }

        if let Some(netrc) = args.netrc {
            if !netrc.password.is_empty() {
                spec.files.push(File {
                    path: script::join(os, &[&homedir, script::netrc_name(os)]),
                    mode: 0o600,
                    is_dir: false,
                    data: format!(
                        "machine {} login {} password {}",
                        netrc.machine, netrc.login, netrc.password
                    )
                    .into_bytes(),
                });
            }
        }

        // Baseline environment. Masked globals are withheld from the env
        // map and attached to every step as secrets instead, so they are
        // exported into the script yet masked in the logs.
        let mut global_envs = HashMap::new();
        let mut global_secrets = Vec::new();
        let vars = self
            .environ
            .list(EnvironRequest {
                build: args.build,
                repo: args.repo,
            })
            .await?;
        for var in vars {
            if var.mask {
                global_secrets.push(StepSecret {
                    env: var.name.clone(),
                    name: var.name,
                    data: var.data,
                    mask: true,
                });
            } else {
                global_envs.insert(var.name, var.data);
            }
        }

        let envs = environ::combine([
            global_envs,
            args.build.params.clone(),
            environ::proxy(),
            environ::system(args.system),
            environ::repo(args.repo),
            environ::build(args.build),
            environ::stage(args.stage),
            environ::link(args.repo, args.build, args.system),
            clone::environ(
                pipeline.clone_settings.skip_verify,
                pipeline.clone_settings.trace,
                &args.build.author_name,
                &args.build.author_email,
            ),
            HashMap::from([
                ("HOME".to_string(), homedir.clone()),
                ("HOMEPATH".to_string(), homedir.clone()), // for windows
                ("USERPROFILE".to_string(), homedir.clone()), // for windows
                ("DRONE_HOME".to_string(), sourcedir.clone()),
                ("DRONE_WORKSPACE".to_string(), sourcedir.clone()),
                ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
            ]),
        ]);

        // Synthesize the clone step, unless disabled.
        if !pipeline.clone_settings.disable {
            let clonepath = script::join(os, &[&spec.root, "opt", &script::script_ext(os, "clone")]);
            let clonefile = script::gen_script(
                os,
                &clone::commands(&clone::Args {
                    branch: &args.build.target,
                    commit: &args.build.after,
                    git_ref: &args.build.git_ref,
                    remote: &args.repo.clone_url,
                    depth: pipeline.clone_settings.depth,
                }),
            );
            let (command, command_args) = script::shell_command(os, &clonepath);
            spec.steps.push(Step {
                name: "clone".to_string(),
                command,
                args: command_args,
                working_dir: sourcedir.clone(),
                envs: envs.clone(),
                run_policy: RunPolicy::Always,
                files: vec![File {
                    path: clonepath,
                    mode: 0o700,
                    is_dir: false,
                    data: clonefile.into_bytes(),
                }],
                ..Step::default()
            });
        }

        for src in &pipeline.steps {
            let slug = slugify(&src.name);
            let path = script::join(os, &[&spec.root, "opt", &script::script_ext(os, &slug)]);
            let body = script::gen_script(os, &src.commands);
            let (command, command_args) = script::shell_command(os, &path);

            let static_env: HashMap<String, String> = src
                .environment
                .iter()
                .filter_map(|(k, v)| v.value().map(|value| (k.clone(), value.to_string())))
                .collect();
            let secrets: Vec<StepSecret> = src
                .environment
                .iter()
                .filter_map(|(k, v)| {
                    v.secret().map(|name| StepSecret {
                        name: name.to_string(),
                        env: k.clone(),
                        data: String::new(),
                        mask: true,
                    })
                })
                .collect();

            let mut dst = Step {
                name: src.name.clone(),
                command,
                args: command_args,
                working_dir: working_dir(os, &sourcedir, &src.working_dir),
                envs: environ::combine([envs.clone(), environ::expand(&static_env)]),
                secrets,
                depends_on: src.depends_on.clone(),
                detach: src.detach,
                ignore_err: src.failure.eq_ignore_ascii_case("ignore"),
                run_policy: RunPolicy::OnSuccess,
                files: vec![File {
                    path,
                    mode: 0o700,
                    is_dir: false,
                    data: body.into_bytes(),
                }],
            };

            // Steps run on success by default, but may be configured to
            // run on failure or unconditionally.
            if src.when.is_run_always() {
                dst.run_policy = RunPolicy::Always;
            } else if src.when.is_run_on_failure() {
                dst.run_policy = RunPolicy::OnFailure;
            }

            // Steps with unmet conditions are automatically skipped.
            if !src.when.matches(MatchParams {
                action: &args.build.action,
                branch: &args.build.target,
                cron: &args.build.cron,
                event: &args.build.event,
                git_ref: &args.build.git_ref,
                repo: &args.repo.slug,
                instance: &args.system.host,
                target: &args.build.deploy_to,
            }) {
                dst.run_policy = RunPolicy::Never;
            }

            spec.steps.push(dst);
        }

        if !spec.is_graph() {
            configure_serial(&mut spec);
        } else if !pipeline.clone_settings.disable {
            configure_clone_deps(&mut spec);
        } else {
            remove_clone_deps(&mut spec);
        }

        // Materialize secret data, including the masked globals.
        for step in &mut spec.steps {
            for secret in &mut step.secrets {
                let name = secret.name.clone();
                if let Some(found) = self.find_secret(&name, &args).await? {
                    secret.data = found;
                }
            }
            step.secrets.extend(global_secrets.iter().cloned());
        }

        Ok(spec)
    }

    /// Resolve a server field: a literal passes through, a secret
    /// reference is looked up. A missing secret resolves to empty.
    async fn resolve(
        &self,
        value: &Secretable,
        args: &CompileArgs<'_>,
    ) -> Result<String, ProviderError> {
        match value {
            Secretable::Literal(v) => Ok(v.clone()),
            Secretable::FromSecret(name) => {
                Ok(self.find_secret(name, args).await?.unwrap_or_default())
            }
        }
    }

    async fn find_secret(
        &self,
        name: &str,
        args: &CompileArgs<'_>,
    ) -> Result<Option<String>, ProviderError> {
        if name.is_empty() {
            return Ok(None);
        }
        let found = self
            .secrets
            .find(SecretRequest {
                name,
                build: args.build,
                repo: args.repo,
            })
            .await?;
        Ok(found.map(|s| s.data))
    }
}

/// Rewrite dependencies so step *i* depends on step *i-1*, preserving
/// source order as a serial chain.
fn configure_serial(spec: &mut Spec) {
    let names: Vec<String> = spec.steps.iter().map(|s| s.name.clone()).collect();
    for (i, step) in spec.steps.iter_mut().enumerate().skip(1) {
        step.depends_on = vec![names[i - 1].clone()];
    }
}

/// Ensure every root of the graph depends on the clone step.
fn configure_clone_deps(spec: &mut Spec) {
    for step in &mut spec.steps {
        if step.name != "clone" && step.depends_on.is_empty() {
            step.depends_on = vec!["clone".to_string()];
        }
    }
}

/// Drop references to the clone step when cloning is disabled.
fn remove_clone_deps(spec: &mut Spec) {
    for step in &mut spec.steps {
        step.depends_on.retain(|dep| dep != "clone");
    }
}

fn working_dir(os: &str, sourcedir: &str, declared: &str) -> String {
    if declared.is_empty() {
        sourcedir.to_string()
    } else if declared.starts_with('/') || declared.contains(':') {
        declared.to_string()
    } else {
        script::join(os, &[sourcedir, declared])
    }
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
