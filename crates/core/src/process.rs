// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! `ProcessInfo` (§3): supervisor-owned state of the child process.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a supervised child process.
///
/// `stopped -> starting -> running -> (error | stopped | restarting) -> starting -> ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Stopped,
    Starting,
    Running,
    Error,
    Restarting,
}

impl ProcessStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }
}

/// Supervisor-maintained snapshot of the child process. Updated on every
/// status change and every stdout/stderr emission (`last_activity_ms`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub status: ProcessStatus,
    pub restart_count: u32,
    pub error_count: u32,
    pub pid: Option<u32>,
    pub start_time_ms: Option<u64>,
    pub last_activity_ms: Option<u64>,
}

impl Default for ProcessInfo {
    fn default() -> Self {
        Self {
            status: ProcessStatus::Stopped,
            restart_count: 0,
            error_count: 0,
            pid: None,
            start_time_ms: None,
            last_activity_ms: None,
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
