// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! The [`TaskQueue`] trait (§4.E): a persistent priority FIFO with DAG
//! dependency gating, implemented by [`crate::redis_queue::RedisTaskQueue`]
//! and, behind `test-support`, by [`crate::fake::FakeTaskQueue`].

use crate::error::QueueError;
use async_trait::async_trait;
use foreman_core::{JobId, QueueJob, Task, TaskId, WorkResult};
use serde::{Deserialize, Serialize};

/// Caller-supplied options for [`TaskQueue::add_task`].
#[derive(Debug, Clone, Default)]
pub struct AddTaskOptions {
    /// Milliseconds to delay before the task becomes eligible to dequeue.
    pub delay_ms: u64,
    /// Maximum delivery attempts before the job is terminally failed.
    pub attempts: Option<u32>,
}

/// Point-in-time counts of jobs in each durable state (`getStats()`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub delayed: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

#[async_trait]
pub trait TaskQueue: Send + Sync + 'static {
    async fn add_task(&self, task: Task, opts: AddTaskOptions) -> Result<JobId, QueueError>;

    /// Returns the highest-priority ready task assignable to `agent_id`, or
    /// `None` if nothing is eligible right now.
    async fn get_next_task(&self, agent_id: &str) -> Result<Option<Task>, QueueError>;

    async fn complete_task(&self, task_id: &TaskId, result: WorkResult) -> Result<(), QueueError>;

    async fn fail_task(&self, task_id: &TaskId, error: &str) -> Result<(), QueueError>;

    /// Pushes a result to the side-queue without touching the main queue
    /// state (used by subordinate-side submission paths).
    async fn submit_result(&self, result: WorkResult) -> Result<(), QueueError>;

    async fn remove_task(&self, job_id: &JobId) -> Result<bool, QueueError>;

    async fn get_stats(&self) -> Result<QueueStats, QueueError>;

    async fn get_all_tasks(&self) -> Result<Vec<QueueJob>, QueueError>;

    /// Removes terminal (completed/failed) jobs older than `max_age_ms`.
    /// Returns the number removed.
    async fn cleanup(&self, max_age_ms: u64) -> Result<u64, QueueError>;

    /// Returns the result recorded by `submit_result` or `complete_task` for
    /// `task_id`, if any (§4.E "result side-queue").
    async fn get_result(&self, task_id: &TaskId) -> Result<Option<WorkResult>, QueueError>;

    /// Reclaims jobs that have been active longer than `stall_interval_ms`
    /// back to waiting (or to terminally failed if attempts are exhausted),
    /// bumping their attempt count. Returns the number reclaimed.
    async fn reclaim_stalled(&self, stall_interval_ms: u64) -> Result<u64, QueueError>;

    async fn close(&self) -> Result<(), QueueError>;
}
