// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! The `WorkResult` entity (§3): output of one task execution.

use crate::task::TaskId;
use crate::test_result::TestResult;
use serde::{Deserialize, Serialize};

/// What happened to a file as part of a code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

/// One file touched by a [`WorkResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChange {
    pub file_path: String,
    pub action: ChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// The output of one task execution, submitted by a Subordinate and
/// consumed by the Boss's review step.
///
/// Invariant: `task_id` must match a task currently `in_progress` and
/// assigned to `agent_id` — enforced by the queue at `completeTask` time,
/// not by this type itself.
///
/// Field names on the wire (§4.D/§6) are camelCase, matching the
/// `validate_work_result` boundary this type round-trips through; the
/// `_ms` suffix is a Rust-side convention only, so `completion_time_ms`
/// gets an explicit rename to the wire's `completionTime`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkResult {
    pub task_id: TaskId,
    pub agent_id: String,
    #[serde(rename = "completionTime")]
    pub completion_time_ms: u64,
    pub code_changes: Vec<CodeChange>,
    pub test_results: TestResult,
}

#[cfg(test)]
#[path = "work_result_tests.rs"]
mod tests;
