// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell script generation
//!
//! Steps execute as uploaded scripts. The engine prepends a prologue
//! (working directory, secret exports, environment exports) to the
//! compiled script body immediately before upload. Output is fully
//! deterministic: environment variables are emitted in sorted key order
//! and values are base64-encoded so arbitrary bytes survive the shell.

use crate::spec::StepSecret;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use capstan_core::SuffixGen;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Write the `cd` line that enters the step working directory.
pub fn write_workdir(buf: &mut String, path: &str) {
    let _ = writeln!(buf, "cd {}", path);
}

/// Export each secret under its environment variable name.
pub fn write_secrets(buf: &mut String, os: &str, secrets: &[StepSecret]) {
    for secret in secrets {
        write_env(buf, os, &secret.env, &secret.data);
    }
}

/// Export the map as environment variables, in sorted key order.
pub fn write_environ(buf: &mut String, os: &str, envs: &HashMap<String, String>) {
    let mut keys: Vec<&String> = envs.keys().collect();
    keys.sort();
    for key in keys {
        write_env(buf, os, key, &envs[key]);
    }
}

/// Export a single key/value pair. The value is base64-encoded and
/// decoded inline at execution time to avoid shell escaping hazards.
pub fn write_env(buf: &mut String, os: &str, key: &str, value: &str) {
    let encoded = BASE64.encode(value);
    match os {
        "windows" => {
            let _ = writeln!(
                buf,
                "$Env:{} = \"$([Text.Encoding]::Utf8.GetString([Convert]::FromBase64String('{}')))\"",
                key, encoded
            );
        }
        _ => {
            let _ = writeln!(buf, "export {}=\"$(echo {} | base64 -d)\"", key, encoded);
        }
    }
}

/// Generate the script body for a command list, echoing each command
/// before it runs.
pub fn gen_script(os: &str, commands: &[String]) -> String {
    let mut buf = String::new();
    match os {
        "windows" => {
            buf.push_str("$erroractionpreference = \"stop\"\n");
            for command in commands {
                let escaped = command.replace('"', "`\"");
                let _ = writeln!(buf, "echo \"+ {}\"", escaped);
                let _ = writeln!(buf, "{}", command);
            }
        }
        _ => {
            buf.push_str("#!/bin/sh\nset -e\n");
            for command in commands {
                let escaped = command.replace('\'', "'\\''");
                let _ = writeln!(buf, "\necho + '{}'", escaped);
                let _ = writeln!(buf, "{}", command);
            }
        }
    }
    buf
}

/// The shell invocation for an uploaded script.
pub fn shell_command(os: &str, path: &str) -> (String, Vec<String>) {
    match os {
        "windows" => (
            "powershell".to_string(),
            vec![
                "-noprofile".to_string(),
                "-noninteractive".to_string(),
                "-command".to_string(),
                path.to_string(),
            ],
        ),
        _ => ("/bin/sh".to_string(), vec![path.to_string()]),
    }
}

/// A shell command that removes a directory tree.
pub fn remove_command(os: &str, path: &str) -> String {
    match os {
        "windows" => format!(
            "powershell -noprofile -noninteractive -command \"Remove-Item {} -Recurse -Force\"",
            path
        ),
        _ => format!("rm -rf {}", path),
    }
}

/// An OS-appropriate workspace directory with a unique suffix.
pub fn temp_dir(os: &str, suffix: &dyn SuffixGen) -> String {
    match os {
        "windows" => format!("C:\\Windows\\Temp\\capstan-{}", suffix.generate()),
        _ => format!("/tmp/capstan-{}", suffix.generate()),
    }
}

/// Join path segments with the OS-appropriate separator.
pub fn join(os: &str, parts: &[&str]) -> String {
    let sep = if os == "windows" { "\\" } else { "/" };
    parts.join(sep)
}

/// The script file name for a slug, with the OS-appropriate extension.
pub fn script_ext(os: &str, name: &str) -> String {
    match os {
        "windows" => format!("{}.ps1", name),
        _ => format!("{}.sh", name),
    }
}

/// The netrc file name for the OS.
pub fn netrc_name(os: &str) -> &'static str {
    match os {
        "windows" => "_netrc",
        _ => ".netrc",
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
