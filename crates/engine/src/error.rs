// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Errors raised by the Command Multiplexer, the Shell-Exec Adapter, and
//! the Boss/Subordinate controllers.

use foreman_core::{ErrorKind, HasErrorKind, ValidationError};
use foreman_queue::QueueError;

/// Errors raised by the [`crate::multiplexer::CommandMultiplexer`] (§4.B).
#[derive(Debug, Clone, thiserror::Error)]
pub enum MuxError {
    #[error("command timed out")]
    Timeout,
    #[error("command was cancelled")]
    Cancelled,
    #[error("child process unavailable")]
    ProcessUnavailable,
    #[error("child stdin is not writable")]
    StreamError,
    #[error("response was not valid JSON: {0}")]
    ProtocolError(String),
}

impl HasErrorKind for MuxError {
    fn kind(&self) -> ErrorKind {
        match self {
            MuxError::Timeout => ErrorKind::Timeout,
            MuxError::Cancelled => ErrorKind::Cancelled,
            MuxError::ProcessUnavailable => ErrorKind::ProcessUnavailable,
            MuxError::StreamError => ErrorKind::StreamError,
            MuxError::ProtocolError(_) => ErrorKind::ProtocolError,
        }
    }
}

impl From<foreman_adapters::SupervisorError> for MuxError {
    fn from(e: foreman_adapters::SupervisorError) -> Self {
        match e.kind() {
            ErrorKind::StreamError => MuxError::StreamError,
            _ => MuxError::ProcessUnavailable,
        }
    }
}

/// Errors raised by [`crate::shell_exec::ShellExecAdapter`] (§4.C).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ShellExecError {
    #[error("child tool is not available")]
    CliUnavailable,
    #[error("child returned a non-JSON response when JSON was required: {0}")]
    ProtocolError(String),
    #[error("command exited non-zero (code {exit_code:?}): {stderr:?}")]
    NonZeroExit {
        exit_code: Option<i32>,
        stderr: Option<String>,
    },
    #[error(transparent)]
    Mux(#[from] MuxError),
}

impl HasErrorKind for ShellExecError {
    fn kind(&self) -> ErrorKind {
        match self {
            ShellExecError::CliUnavailable => ErrorKind::ProcessUnavailable,
            ShellExecError::ProtocolError(_) => ErrorKind::ProtocolError,
            ShellExecError::NonZeroExit { .. } => ErrorKind::ProtocolError,
            ShellExecError::Mux(e) => e.kind(),
        }
    }
}

/// Errors raised by [`crate::boss::BossController`] and
/// [`crate::subordinate::SubordinateController`].
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Mux(#[from] MuxError),
    #[error(transparent)]
    ShellExec(#[from] ShellExecError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    CircularDependency(#[from] foreman_core::CircularDependency),
    #[error("workspace io error: {0}")]
    Io(String),
}

impl HasErrorKind for ControllerError {
    fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::Validation(e) => e.kind(),
            ControllerError::Mux(e) => e.kind(),
            ControllerError::ShellExec(e) => e.kind(),
            ControllerError::Queue(e) => e.kind(),
            ControllerError::CircularDependency(e) => e.kind(),
            ControllerError::Io(_) => ErrorKind::ProcessUnavailable,
        }
    }
}
