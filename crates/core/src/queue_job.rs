// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! `QueueJob` (§3): the durable wrapper the queue persists around a [`Task`].

use crate::task::{QueuePriority, Task, TaskId};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a persisted queue job (distinct from the task
    /// it wraps — a task could in principle be re-enqueued under a new job).
    pub struct JobId;
}

/// Which durable list a [`QueueJob`] currently lives in. At any instant a
/// job is a member of exactly one state (§8 universal invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    Delayed,
}

/// Durable queue entry wrapping a [`Task`] with retry/assignment bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    pub id: JobId,
    pub task: Task,
    pub queue_priority: QueuePriority,
    pub state: JobState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub assigned_to: Option<String>,
    pub enqueued_at_ms: u64,
    /// Not ready until this epoch-ms (delay hint / exponential back-off).
    pub ready_at_ms: u64,
    /// Set when the job transitions to `Active`; used to detect worker
    /// stalls (`now - active_since_ms > stall_interval`).
    pub active_since_ms: Option<u64>,
}

impl QueueJob {
    pub fn new(id: impl Into<JobId>, task: Task, max_attempts: u32, enqueued_at_ms: u64) -> Self {
        let queue_priority = task.queue_priority();
        Self {
            id: id.into(),
            task,
            queue_priority,
            state: JobState::Waiting,
            attempts: 0,
            max_attempts,
            assigned_to: None,
            enqueued_at_ms,
            ready_at_ms: enqueued_at_ms,
            active_since_ms: None,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task.id
    }

    pub fn is_ready(&self, now_ms: u64) -> bool {
        matches!(self.state, JobState::Waiting) && now_ms >= self.ready_at_ms
    }
}

#[cfg(test)]
#[path = "queue_job_tests.rs"]
mod tests;
