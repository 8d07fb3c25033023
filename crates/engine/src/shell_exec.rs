// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Shell-Exec Adapter (§4.C): turns the child tool into a command runner by
//! instructing it, through the Command Multiplexer (§4.B), to execute a
//! shell command inside a workspace and report back structured JSON.
//!
//! The adapter never runs anything itself — it has no `std::process::Command`
//! of its own. It is a prompt contract on top of [`CommandMultiplexer`]: the
//! child process is the one actually invoking the shell.

use crate::error::ShellExecError;
use crate::multiplexer::CommandMultiplexer;
use foreman_adapters::SupervisorAdapter;
use foreman_core::{Clock, CommandOptions, IdGen};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-call options (§4.C): which tools the child may use and how long to
/// wait before the command is treated as hung.
#[derive(Debug, Clone)]
pub struct ShellExecOptions {
    pub timeout_ms: u64,
    pub allowed_tools: Vec<String>,
}

impl Default for ShellExecOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            allowed_tools: Vec::new(),
        }
    }
}

/// The JSON shape the child is instructed to reply with:
/// `{success, exitCode?, output?, error?}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShellExecResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
}

/// Wraps a [`CommandMultiplexer`] with the execute-and-parse prompt contract.
pub struct ShellExecAdapter<S, C, I> {
    mux: CommandMultiplexer<S, C, I>,
}

impl<S, C, I> ShellExecAdapter<S, C, I>
where
    S: SupervisorAdapter,
    C: Clock,
    I: IdGen + 'static,
{
    pub fn new(mux: CommandMultiplexer<S, C, I>) -> Self {
        Self { mux }
    }

    /// Sends a liveness ping and expects the sentinel string back verbatim.
    /// Used by the Boss Controller's startup check (§4.F `initialize`).
    pub async fn ping(&self, sentinel: &str) -> Result<(), ShellExecError> {
        let response = self
            .mux
            .send(
                format!("Reply with exactly this text and nothing else: {sentinel}"),
                CommandOptions {
                    timeout_ms: 10_000,
                    priority: 10,
                    retry_on_error: false,
                },
            )
            .await
            .map_err(|e| match e {
                crate::error::MuxError::ProcessUnavailable | crate::error::MuxError::Timeout => {
                    ShellExecError::CliUnavailable
                }
                other => ShellExecError::Mux(other),
            })?;

        let contains_sentinel = match &response.data {
            Some(foreman_core::Payload::Text { value, .. }) => value.contains(sentinel),
            Some(foreman_core::Payload::Json { value }) => value.to_string().contains(sentinel),
            None => false,
        };
        if contains_sentinel {
            Ok(())
        } else {
            Err(ShellExecError::CliUnavailable)
        }
    }

    /// Instructs the child to run `cmd` inside `workspace_path` and report
    /// back `{success, exitCode?, output?, error?}` as JSON.
    pub async fn exec(
        &self,
        workspace_path: &Path,
        cmd: &str,
        opts: ShellExecOptions,
    ) -> Result<ShellExecResult, ShellExecError> {
        let prompt = format!(
            "Execute the following shell command inside the workspace directory \
             `{workspace}` and reply with exactly one JSON object of the shape \
             {{\"success\": bool, \"exitCode\": number|null, \"output\": string|null, \"error\": string|null}}. \
             Allowed tools: {tools}. Command: {cmd}",
            workspace = workspace_path.display(),
            tools = if opts.allowed_tools.is_empty() {
                "any".to_string()
            } else {
                opts.allowed_tools.join(", ")
            },
        );

        let options = CommandOptions {
            timeout_ms: opts.timeout_ms,
            priority: 0,
            retry_on_error: false,
        };

        let result: ShellExecResult = self
            .mux
            .send_expecting_json(prompt, options)
            .await
            .map_err(|e| match e {
                crate::error::MuxError::ProcessUnavailable => ShellExecError::CliUnavailable,
                crate::error::MuxError::ProtocolError(msg) => ShellExecError::ProtocolError(msg),
                other => ShellExecError::Mux(other),
            })?;

        if !result.success {
            return Err(ShellExecError::NonZeroExit {
                exit_code: result.exit_code,
                stderr: result.error.clone(),
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
#[path = "shell_exec_tests.rs"]
mod tests;
