// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! In-memory [`TaskQueue`] double for engine/controller tests — same
//! priority-plus-dependency-gating semantics as [`crate::redis_queue::RedisTaskQueue`]
//! without a Redis instance.

use crate::error::QueueError;
use crate::queue::{AddTaskOptions, QueueStats, TaskQueue};
use async_trait::async_trait;
use foreman_core::{
    Clock, IdGen, JobId, JobState, QueueJob, Task, TaskId, TaskStatus, WorkResult,
};
use parking_lot::Mutex;
use std::collections::HashMap;

struct Inner {
    jobs: HashMap<String, QueueJob>,
    task_to_job: HashMap<String, String>,
    task_status: HashMap<String, TaskStatus>,
    results: HashMap<String, WorkResult>,
}

/// Deterministic, clock-driven in-memory stand-in for the durable queue.
pub struct FakeTaskQueue<I: IdGen, C: Clock> {
    inner: Mutex<Inner>,
    id_gen: I,
    clock: C,
    default_attempts: u32,
    retry_base_delay_ms: u64,
}

impl<I: IdGen, C: Clock> FakeTaskQueue<I, C> {
    pub fn new(id_gen: I, clock: C) -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                task_to_job: HashMap::new(),
                task_status: HashMap::new(),
                results: HashMap::new(),
            }),
            id_gen,
            clock,
            default_attempts: 3,
            retry_base_delay_ms: 1_000,
        }
    }

    pub fn with_retry_policy(mut self, default_attempts: u32, retry_base_delay_ms: u64) -> Self {
        self.default_attempts = default_attempts;
        self.retry_base_delay_ms = retry_base_delay_ms;
        self
    }

    /// Snapshot every persisted job, sorted by insertion for deterministic
    /// assertions in tests.
    pub fn snapshot(&self) -> Vec<QueueJob> {
        let inner = self.inner.lock();
        let mut jobs: Vec<_> = inner.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.enqueued_at_ms);
        jobs
    }

    pub fn result_for(&self, task_id: &TaskId) -> Option<WorkResult> {
        self.inner.lock().results.get(task_id.as_str()).cloned()
    }
}

#[async_trait]
impl<I: IdGen, C: Clock> TaskQueue for FakeTaskQueue<I, C> {
    async fn add_task(&self, task: Task, opts: AddTaskOptions) -> Result<JobId, QueueError> {
        let now = self.clock.epoch_ms();
        let job_id = JobId::new(self.id_gen.next());
        let max_attempts = opts.attempts.unwrap_or(self.default_attempts);
        let mut job = QueueJob::new(job_id.clone(), task.clone(), max_attempts, now);

        if opts.delay_ms > 0 {
            job.state = JobState::Delayed;
            job.ready_at_ms = now + opts.delay_ms;
        } else {
            job.state = JobState::Waiting;
        }

        let mut inner = self.inner.lock();
        inner
            .task_to_job
            .insert(task.id.as_str().to_string(), job_id.as_str().to_string());
        inner
            .task_status
            .insert(task.id.as_str().to_string(), TaskStatus::Pending);
        inner.jobs.insert(job_id.as_str().to_string(), job);
        Ok(job_id)
    }

    async fn get_next_task(&self, agent_id: &str) -> Result<Option<Task>, QueueError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();

        for job in inner.jobs.values_mut() {
            if job.state == JobState::Delayed && now >= job.ready_at_ms {
                job.state = JobState::Waiting;
            }
        }

        let task_status = inner.task_status.clone();
        let mut ready: Vec<&mut QueueJob> = inner
            .jobs
            .values_mut()
            .filter(|job| {
                job.state == JobState::Waiting
                    && job
                        .assigned_to
                        .as_deref()
                        .is_none_or(|owner| owner == agent_id)
                    && job
                        .task
                        .dependencies
                        .iter()
                        .all(|dep| task_status.get(dep.as_str()) == Some(&TaskStatus::Completed))
            })
            .collect();

        ready.sort_by(|a, b| {
            b.queue_priority
                .cmp(&a.queue_priority)
                .then(a.enqueued_at_ms.cmp(&b.enqueued_at_ms))
        });

        let Some(job) = ready.into_iter().next() else {
            return Ok(None);
        };

        job.state = JobState::Active;
        job.assigned_to = Some(agent_id.to_string());
        job.attempts += 1;
        job.active_since_ms = Some(now);
        job.task.assign(agent_id);

        let task = job.task.clone();
        inner
            .task_status
            .insert(task.id.as_str().to_string(), TaskStatus::InProgress);
        Ok(Some(task))
    }

    async fn complete_task(&self, task_id: &TaskId, result: WorkResult) -> Result<(), QueueError> {
        if &result.task_id != task_id {
            return Err(QueueError::ResultMismatch {
                expected: task_id.as_str().to_string(),
                got: result.task_id.as_str().to_string(),
            });
        }

        let mut inner = self.inner.lock();
        let job_id = inner
            .task_to_job
            .get(task_id.as_str())
            .cloned()
            .ok_or_else(|| QueueError::NotFound(task_id.as_str().to_string()))?;
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| QueueError::NotFound(job_id.clone()))?;

        if job.state != JobState::Active {
            return Err(QueueError::NotActive(task_id.as_str().to_string()));
        }

        job.state = JobState::Completed;
        job.task.status = TaskStatus::Completed;
        inner
            .task_status
            .insert(task_id.as_str().to_string(), TaskStatus::Completed);
        inner.results.insert(task_id.as_str().to_string(), result);
        Ok(())
    }

    async fn fail_task(&self, task_id: &TaskId, error: &str) -> Result<(), QueueError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let job_id = inner
            .task_to_job
            .get(task_id.as_str())
            .cloned()
            .ok_or_else(|| QueueError::NotFound(task_id.as_str().to_string()))?;
        let retry_base_delay_ms = self.retry_base_delay_ms;
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| QueueError::NotFound(job_id.clone()))?;

        if job.state != JobState::Active {
            return Err(QueueError::NotActive(task_id.as_str().to_string()));
        }

        let terminal = job.attempts >= job.max_attempts;
        if terminal {
            job.state = JobState::Failed;
            job.task.status = TaskStatus::Failed;
            inner
                .task_status
                .insert(task_id.as_str().to_string(), TaskStatus::Failed);
        } else {
            let backoff = retry_base_delay_ms * 2u64.pow(job.attempts);
            job.ready_at_ms = now + backoff;
            job.state = JobState::Delayed;
            job.assigned_to = None;
            job.task.assigned_to = None;
            job.task.status = TaskStatus::Pending;
            inner
                .task_status
                .insert(task_id.as_str().to_string(), TaskStatus::Pending);
        }
        tracing::warn!(task_id = %task_id, error, terminal, "job:failed");
        Ok(())
    }

    async fn submit_result(&self, result: WorkResult) -> Result<(), QueueError> {
        self.inner
            .lock()
            .results
            .insert(result.task_id.as_str().to_string(), result);
        Ok(())
    }

    async fn remove_task(&self, job_id: &JobId) -> Result<bool, QueueError> {
        let mut inner = self.inner.lock();
        let removed = inner.jobs.remove(job_id.as_str()).is_some();
        inner.task_to_job.retain(|_, v| v != job_id.as_str());
        Ok(removed)
    }

    async fn get_stats(&self) -> Result<QueueStats, QueueError> {
        let inner = self.inner.lock();
        let mut stats = QueueStats::default();
        for job in inner.jobs.values() {
            match job.state {
                JobState::Waiting => stats.waiting += 1,
                JobState::Delayed => stats.delayed += 1,
                JobState::Active => stats.active += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn get_all_tasks(&self) -> Result<Vec<QueueJob>, QueueError> {
        Ok(self.snapshot())
    }

    async fn cleanup(&self, max_age_ms: u64) -> Result<u64, QueueError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let stale: Vec<String> = inner
            .jobs
            .values()
            .filter(|job| {
                matches!(job.state, JobState::Completed | JobState::Failed)
                    && now.saturating_sub(job.enqueued_at_ms) > max_age_ms
            })
            .map(|job| job.id.as_str().to_string())
            .collect();
        for job_id in &stale {
            inner.jobs.remove(job_id);
        }
        Ok(stale.len() as u64)
    }

    async fn get_result(&self, task_id: &TaskId) -> Result<Option<WorkResult>, QueueError> {
        Ok(self.result_for(task_id))
    }

    async fn reclaim_stalled(&self, stall_interval_ms: u64) -> Result<u64, QueueError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let stalled: Vec<String> = inner
            .jobs
            .values()
            .filter(|job| {
                job.state == JobState::Active
                    && job
                        .active_since_ms
                        .is_some_and(|since| now.saturating_sub(since) > stall_interval_ms)
            })
            .map(|job| job.id.as_str().to_string())
            .collect();

        for job_id in &stalled {
            let Some(job) = inner.jobs.get_mut(job_id) else { continue };
            job.attempts += 1;
            let task_id = job.task.id.as_str().to_string();
            if job.attempts >= job.max_attempts {
                job.state = JobState::Failed;
                job.task.status = TaskStatus::Failed;
                inner.task_status.insert(task_id, TaskStatus::Failed);
            } else {
                job.state = JobState::Waiting;
                job.assigned_to = None;
                job.task.assigned_to = None;
                job.task.status = TaskStatus::Pending;
                job.active_since_ms = None;
                inner.task_status.insert(task_id, TaskStatus::Pending);
            }
        }
        if !stalled.is_empty() {
            tracing::warn!(count = stalled.len(), stall_interval_ms, "jobs:reclaimed_stalled");
        }
        Ok(stalled.len() as u64)
    }

    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
