// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-engine: the orchestration kernel built on top of
//! `foreman-adapters`' Process Supervisor and `foreman-queue`'s Durable
//! Task Queue.
//!
//! - [`multiplexer`] — Command Multiplexer (§4.B)
//! - [`shell_exec`] — Shell-Exec Adapter (§4.C)
//! - [`boss`] — Boss Controller (§4.F)
//! - [`subordinate`] — Subordinate Controller (§4.G)
//! - [`config`] — layered configuration (§10.3)

pub mod boss;
pub mod config;
pub mod error;
pub mod multiplexer;
pub mod shell_exec;
pub mod subordinate;

pub use boss::{BossController, ReviewResult, TaskDecomposition};
pub use config::EngineConfig;
pub use error::{ControllerError, MuxError, ShellExecError};
pub use multiplexer::{BatchOptions, BatchProgress, CommandMultiplexer, MuxConfig, MuxStatus};
pub use shell_exec::{ShellExecAdapter, ShellExecOptions, ShellExecResult};
pub use subordinate::SubordinateController;
