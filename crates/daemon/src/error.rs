// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Top-level daemon errors and the exit-code mapping from §6 ("Exit
//! codes: 0 = clean shutdown, 1 = unrecoverable init failure, 2 = external
//! tool unavailable").

use foreman_core::ValidationError;
use foreman_engine::ControllerError;
use foreman_queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),
    #[error("queue unavailable: {0}")]
    Queue(#[from] QueueError),
    #[error("child tool unavailable: {0}")]
    ChildUnavailable(ControllerError),
    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),
    #[error("io error: {0}")]
    Io(String),
}

impl DaemonError {
    /// Wraps an initialization-time [`ControllerError`], distinguishing
    /// "the child never answered the startup ping" (exit code 2) from every
    /// other init failure (exit code 1).
    pub fn from_init(err: ControllerError) -> Self {
        match &err {
            ControllerError::ShellExec(foreman_engine::ShellExecError::CliUnavailable) => {
                DaemonError::ChildUnavailable(err)
            }
            ControllerError::Mux(foreman_engine::MuxError::ProcessUnavailable) => {
                DaemonError::ChildUnavailable(err)
            }
            _ => DaemonError::Controller(err),
        }
    }

    /// Process exit code per §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::ChildUnavailable(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
