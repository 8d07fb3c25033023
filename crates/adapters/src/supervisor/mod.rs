// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Process Supervisor adapters (§4.A).
//!
//! [`SupervisorAdapter`] is the trait the Command Multiplexer is built
//! against; [`process::ProcessSupervisor`] is the real child-process
//! implementation, [`fake::FakeSupervisor`] a deterministic test double.

mod process;

pub use process::{ProcessSupervisor, SupervisorConfig, SupervisorError};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSupervisor, SupervisorCall};

use async_trait::async_trait;
use foreman_core::{ProcessInfo, SupervisorEvent};
use tokio::sync::broadcast;

/// A supervised child process: start/stop/restart plus its event stream.
#[async_trait]
pub trait SupervisorAdapter: Send + Sync + 'static {
    async fn start(&self) -> Result<(), SupervisorError>;
    /// Idempotent.
    async fn stop(&self) -> Result<(), SupervisorError>;
    async fn restart(&self) -> Result<(), SupervisorError>;
    fn is_running(&self) -> bool;
    fn process_info(&self) -> ProcessInfo;
    /// Write one line (the caller supplies any correlation prefix) to the
    /// child's stdin.
    async fn send_line(&self, line: &str) -> Result<(), SupervisorError>;
    fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent>;
}
