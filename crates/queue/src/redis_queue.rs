// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Redis-backed [`TaskQueue`]. Keys are namespaced under a configurable
//! prefix so multiple daemons can share one Redis instance.
//!
//! Dequeue (`get_next_task`) runs as a single Lua script so the
//! "at-most-one assignment" guarantee holds without a client-side
//! WATCH/MULTI retry loop: Redis executes the script to completion before
//! serving any other client.

use crate::error::QueueError;
use crate::queue::{AddTaskOptions, QueueStats, TaskQueue};
use async_trait::async_trait;
use foreman_core::{
    validate_task, IdGen, JobId, JobState, QueueJob, QueuePriority, Task, TaskId, TaskStatus,
    WorkResult,
};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// One trillion ms of headroom between adjacent priority bands — far larger
/// than any single run's enqueue-time spread, so within-band ordering is
/// always FIFO by `enqueued_at_ms`.
const PRIORITY_BAND_WIDTH: f64 = 1e13;

fn priority_score(priority: QueuePriority, enqueued_at_ms: u64) -> f64 {
    let band = (QueuePriority::Critical.rank() - priority.rank()) as f64;
    band * PRIORITY_BAND_WIDTH + (enqueued_at_ms as f64)
}

#[derive(Debug, Clone)]
pub struct RedisQueueConfig {
    pub url: String,
    /// Key prefix, e.g. `"foreman"` -> `foreman:jobs`, `foreman:waiting`, ...
    pub namespace: String,
    /// Default `max_attempts` when `AddTaskOptions::attempts` is unset.
    pub default_attempts: u32,
    /// Base multiplier for `failTask`'s exponential back-off (`base * 2^attempts`).
    pub retry_base_delay_ms: u64,
}

impl Default for RedisQueueConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            namespace: "foreman".to_string(),
            default_attempts: 3,
            retry_base_delay_ms: 1_000,
        }
    }
}

pub struct RedisTaskQueue<I: IdGen, C: foreman_core::Clock> {
    conn: ConnectionManager,
    config: RedisQueueConfig,
    id_gen: I,
    clock: C,
}

impl<I: IdGen, C: foreman_core::Clock> RedisTaskQueue<I, C> {
    pub async fn connect(config: RedisQueueConfig, id_gen: I, clock: C) -> Result<Self, QueueError> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            config,
            id_gen,
            clock,
        })
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.config.namespace, suffix)
    }

    fn jobs_key(&self) -> String {
        self.key("jobs")
    }
    fn waiting_key(&self) -> String {
        self.key("waiting")
    }
    fn delayed_key(&self) -> String {
        self.key("delayed")
    }
    fn state_key(&self, state: &str) -> String {
        self.key(&format!("state:{state}"))
    }
    fn task_status_key(&self) -> String {
        self.key("task_status")
    }
    fn task_to_job_key(&self) -> String {
        self.key("task_to_job")
    }
    fn active_key(&self) -> String {
        self.key("active")
    }
    fn results_key(&self) -> String {
        self.key("results")
    }

    /// Persists `job`, always alongside its `priority_score` so the dequeue
    /// script can re-insert a promoted-from-delayed job into `waiting`
    /// without recomputing the score from scratch.
    async fn store_job(&self, conn: &mut ConnectionManager, job: &QueueJob) -> Result<(), QueueError> {
        #[derive(serde::Serialize)]
        struct WithScore<'a> {
            #[serde(flatten)]
            job: &'a QueueJob,
            priority_score: f64,
        }
        let score = priority_score(job.queue_priority, job.enqueued_at_ms);
        let json = serde_json::to_string(&WithScore { job, priority_score: score })
            .map_err(|e| QueueError::Corrupt(e.to_string()))?;
        let _: () = conn.hset(self.jobs_key(), job.id.as_str(), json).await?;
        Ok(())
    }

    async fn load_job(
        &self,
        conn: &mut ConnectionManager,
        job_id: &str,
    ) -> Result<Option<QueueJob>, QueueError> {
        let raw: Option<String> = conn.hget(self.jobs_key(), job_id).await?;
        raw.map(|s| serde_json::from_str(&s).map_err(|e| QueueError::Corrupt(e.to_string())))
            .transpose()
    }

    async fn job_id_for_task(
        &self,
        conn: &mut ConnectionManager,
        task_id: &TaskId,
    ) -> Result<JobId, QueueError> {
        let raw: Option<String> = conn.hget(self.task_to_job_key(), task_id.as_str()).await?;
        raw.map(JobId::new)
            .ok_or_else(|| QueueError::NotFound(task_id.as_str().to_string()))
    }
}

const DEQUEUE_SCRIPT: &str = r#"
-- KEYS[1]=jobs KEYS[2]=waiting KEYS[3]=delayed KEYS[4]=state:waiting
-- KEYS[5]=state:delayed KEYS[6]=state:active KEYS[7]=task_status
-- KEYS[8]=active KEYS[9]=task_to_job
-- ARGV[1]=now_ms ARGV[2]=agent_id
local jobs, waiting, delayed = KEYS[1], KEYS[2], KEYS[3]
local state_waiting, state_delayed, state_active = KEYS[4], KEYS[5], KEYS[6]
local task_status, active, task_to_job = KEYS[7], KEYS[8], KEYS[9]
local now = tonumber(ARGV[1])
local agent_id = ARGV[2]

-- Promote delayed jobs whose ready_at_ms has elapsed.
local ready = redis.call('ZRANGEBYSCORE', delayed, '-inf', now)
for _, job_id in ipairs(ready) do
    local raw = redis.call('HGET', jobs, job_id)
    if raw then
        local job = cjson.decode(raw)
        redis.call('ZREM', delayed, job_id)
        redis.call('SREM', state_delayed, job_id)
        redis.call('ZADD', waiting, job.priority_score, job_id)
        redis.call('SADD', state_waiting, job_id)
        job.state = 'waiting'
        redis.call('HSET', jobs, job_id, cjson.encode(job))
    end
end

local candidates = redis.call('ZRANGE', waiting, 0, -1)
for _, job_id in ipairs(candidates) do
    local raw = redis.call('HGET', jobs, job_id)
    if raw then
        local job = cjson.decode(raw)
        local assignable = (job.assigned_to == cjson.null or job.assigned_to == nil
            or job.assigned_to == agent_id)
        local deps_ok = true
        if job.task.dependencies then
            for _, dep in ipairs(job.task.dependencies) do
                local dep_status = redis.call('HGET', task_status, dep)
                if dep_status ~= 'completed' then
                    deps_ok = false
                    break
                end
            end
        end
        if assignable and deps_ok then
            redis.call('ZREM', waiting, job_id)
            redis.call('SREM', state_waiting, job_id)
            redis.call('SADD', state_active, job_id)
            job.state = 'active'
            job.assigned_to = agent_id
            job.attempts = job.attempts + 1
            job.active_since_ms = now
            job.task.assigned_to = agent_id
            job.task.status = 'in_progress'
            redis.call('HSET', jobs, job_id, cjson.encode(job))
            redis.call('HSET', active, job_id, agent_id)
            redis.call('HSET', task_status, job.task.id, 'in_progress')
            return cjson.encode(job)
        end
    end
end

return false
"#;

#[async_trait]
impl<I: IdGen, C: foreman_core::Clock> TaskQueue for RedisTaskQueue<I, C> {
    async fn add_task(&self, task: Task, opts: AddTaskOptions) -> Result<JobId, QueueError> {
        let task_value = serde_json::to_value(&task).map_err(|e| QueueError::Corrupt(e.to_string()))?;
        validate_task(&task_value)?;

        let mut conn = self.conn.clone();
        let now = self.clock.epoch_ms();
        let job_id = JobId::new(self.id_gen.next());
        let max_attempts = opts.attempts.unwrap_or(self.config.default_attempts);

        let mut job = QueueJob::new(job_id.clone(), task.clone(), max_attempts, now);

        let _: () = conn
            .hset(self.task_to_job_key(), task.id.as_str(), job_id.as_str())
            .await?;
        let _: () = conn
            .hset(self.task_status_key(), task.id.as_str(), status_str(TaskStatus::Pending))
            .await?;

        if opts.delay_ms > 0 {
            job.state = JobState::Delayed;
            job.ready_at_ms = now + opts.delay_ms;
            self.store_job(&mut conn, &job).await?;
            let _: () = conn.zadd(self.delayed_key(), job_id.as_str(), job.ready_at_ms as f64).await?;
            let _: () = conn.sadd(self.state_key("delayed"), job_id.as_str()).await?;
        } else {
            job.state = JobState::Waiting;
            let score = priority_score(job.queue_priority, job.enqueued_at_ms);
            self.store_job(&mut conn, &job).await?;
            let _: () = conn.zadd(self.waiting_key(), job_id.as_str(), score).await?;
            let _: () = conn.sadd(self.state_key("waiting"), job_id.as_str()).await?;
        }

        tracing::info!(job_id = %job_id, task_id = %task.id, "job:added");
        Ok(job_id)
    }

    async fn get_next_task(&self, agent_id: &str) -> Result<Option<Task>, QueueError> {
        let mut conn = self.conn.clone();
        let now = self.clock.epoch_ms();
        let script = redis::Script::new(DEQUEUE_SCRIPT);
        let result: Option<String> = script
            .key(self.jobs_key())
            .key(self.waiting_key())
            .key(self.delayed_key())
            .key(self.state_key("waiting"))
            .key(self.state_key("delayed"))
            .key(self.state_key("active"))
            .key(self.task_status_key())
            .key(self.active_key())
            .key(self.task_to_job_key())
            .arg(now)
            .arg(agent_id)
            .invoke_async(&mut conn)
            .await?;

        match result {
            None => Ok(None),
            Some(raw) => {
                let job: QueueJob =
                    serde_json::from_str(&raw).map_err(|e| QueueError::Corrupt(e.to_string()))?;
                tracing::info!(job_id = %job.id, agent_id, "job:assigned");
                Ok(Some(job.task))
            }
        }
    }

    async fn complete_task(&self, task_id: &TaskId, result: WorkResult) -> Result<(), QueueError> {
        if &result.task_id != task_id {
            return Err(QueueError::ResultMismatch {
                expected: task_id.as_str().to_string(),
                got: result.task_id.as_str().to_string(),
            });
        }

        let mut conn = self.conn.clone();
        let job_id = self.job_id_for_task(&mut conn, task_id).await?;
        let mut job = self
            .load_job(&mut conn, job_id.as_str())
            .await?
            .ok_or_else(|| QueueError::NotFound(job_id.as_str().to_string()))?;

        if job.state != JobState::Active {
            return Err(QueueError::NotActive(task_id.as_str().to_string()));
        }

        job.state = JobState::Completed;
        job.task.status = TaskStatus::Completed;
        self.store_job(&mut conn, &job).await?;

        let _: () = conn.srem(self.state_key("active"), job_id.as_str()).await?;
        let _: () = conn.sadd(self.state_key("completed"), job_id.as_str()).await?;
        let _: () = conn.hdel(self.active_key(), job_id.as_str()).await?;
        let _: () = conn
            .hset(self.task_status_key(), task_id.as_str(), status_str(TaskStatus::Completed))
            .await?;

        let result_json = serde_json::to_string(&result).map_err(|e| QueueError::Corrupt(e.to_string()))?;
        let _: () = conn.hset(self.results_key(), task_id.as_str(), result_json).await?;

        tracing::info!(task_id = %task_id, "job:completed");
        Ok(())
    }

    async fn fail_task(&self, task_id: &TaskId, error: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let job_id = self.job_id_for_task(&mut conn, task_id).await?;
        let mut job = self
            .load_job(&mut conn, job_id.as_str())
            .await?
            .ok_or_else(|| QueueError::NotFound(job_id.as_str().to_string()))?;

        if job.state != JobState::Active {
            return Err(QueueError::NotActive(task_id.as_str().to_string()));
        }

        let now = self.clock.epoch_ms();
        let terminal = job.attempts >= job.max_attempts;

        let _: () = conn.srem(self.state_key("active"), job_id.as_str()).await?;
        let _: () = conn.hdel(self.active_key(), job_id.as_str()).await?;

        if terminal {
            job.state = JobState::Failed;
            job.task.status = TaskStatus::Failed;
            self.store_job(&mut conn, &job).await?;
            let _: () = conn.sadd(self.state_key("failed"), job_id.as_str()).await?;
            let _: () = conn
                .hset(self.task_status_key(), task_id.as_str(), status_str(TaskStatus::Failed))
                .await?;
            tracing::warn!(task_id = %task_id, error, "job:failed terminal=true");
        } else {
            let backoff = self.config.retry_base_delay_ms * 2u64.pow(job.attempts);
            job.ready_at_ms = now + backoff;
            job.state = JobState::Delayed;
            job.assigned_to = None;
            job.task.assigned_to = None;
            job.task.status = TaskStatus::Pending;
            self.store_job(&mut conn, &job).await?;
            let _: () = conn.zadd(self.delayed_key(), job_id.as_str(), job.ready_at_ms as f64).await?;
            let _: () = conn.sadd(self.state_key("delayed"), job_id.as_str()).await?;
            let _: () = conn
                .hset(self.task_status_key(), task_id.as_str(), status_str(TaskStatus::Pending))
                .await?;
            tracing::warn!(task_id = %task_id, error, backoff_ms = backoff, "job:failed terminal=false");
        }
        Ok(())
    }

    async fn submit_result(&self, result: WorkResult) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(&result).map_err(|e| QueueError::Corrupt(e.to_string()))?;
        let _: () = conn.hset(self.results_key(), result.task_id.as_str(), json).await?;
        Ok(())
    }

    async fn remove_task(&self, job_id: &JobId) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let existed: bool = conn.hdel(self.jobs_key(), job_id.as_str()).await?;
        let _: () = conn.zrem(self.waiting_key(), job_id.as_str()).await?;
        let _: () = conn.zrem(self.delayed_key(), job_id.as_str()).await?;
        for state in ["waiting", "delayed", "active", "completed", "failed"] {
            let _: () = conn.srem(self.state_key(state), job_id.as_str()).await?;
        }
        let _: () = conn.hdel(self.active_key(), job_id.as_str()).await?;
        Ok(existed)
    }

    async fn get_stats(&self) -> Result<QueueStats, QueueError> {
        let mut conn = self.conn.clone();
        Ok(QueueStats {
            waiting: conn.scard(self.state_key("waiting")).await?,
            delayed: conn.scard(self.state_key("delayed")).await?,
            active: conn.scard(self.state_key("active")).await?,
            completed: conn.scard(self.state_key("completed")).await?,
            failed: conn.scard(self.state_key("failed")).await?,
        })
    }

    async fn get_all_tasks(&self) -> Result<Vec<QueueJob>, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.hvals(self.jobs_key()).await?;
        raw.into_iter()
            .map(|s| serde_json::from_str(&s).map_err(|e| QueueError::Corrupt(e.to_string())))
            .collect()
    }

    async fn cleanup(&self, max_age_ms: u64) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let now = self.clock.epoch_ms();
        let mut removed = 0u64;

        for state in ["completed", "failed"] {
            let job_ids: Vec<String> = conn.smembers(self.state_key(state)).await?;
            for job_id in job_ids {
                if let Some(job) = self.load_job(&mut conn, &job_id).await? {
                    if now.saturating_sub(job.enqueued_at_ms) > max_age_ms {
                        let _: () = conn.hdel(self.jobs_key(), &job_id).await?;
                        let _: () = conn.srem(self.state_key(state), &job_id).await?;
                        removed += 1;
                    }
                }
            }
        }
        Ok(removed)
    }

    async fn get_result(&self, task_id: &TaskId) -> Result<Option<WorkResult>, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(self.results_key(), task_id.as_str()).await?;
        raw.map(|s| serde_json::from_str(&s).map_err(|e| QueueError::Corrupt(e.to_string())))
            .transpose()
    }

    async fn reclaim_stalled(&self, stall_interval_ms: u64) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let now = self.clock.epoch_ms();
        let job_ids: Vec<String> = conn.smembers(self.state_key("active")).await?;
        let mut reclaimed = 0u64;

        for job_id in job_ids {
            let Some(mut job) = self.load_job(&mut conn, &job_id).await? else {
                continue;
            };
            if job.state != JobState::Active {
                continue;
            }
            let Some(since) = job.active_since_ms else {
                continue;
            };
            if now.saturating_sub(since) <= stall_interval_ms {
                continue;
            }

            job.attempts += 1;
            let _: () = conn.srem(self.state_key("active"), &job_id).await?;
            let _: () = conn.hdel(self.active_key(), &job_id).await?;

            if job.attempts >= job.max_attempts {
                job.state = JobState::Failed;
                job.task.status = TaskStatus::Failed;
                self.store_job(&mut conn, &job).await?;
                let _: () = conn.sadd(self.state_key("failed"), &job_id).await?;
                let _: () = conn
                    .hset(self.task_status_key(), job.task.id.as_str(), status_str(TaskStatus::Failed))
                    .await?;
            } else {
                job.state = JobState::Waiting;
                job.assigned_to = None;
                job.task.assigned_to = None;
                job.task.status = TaskStatus::Pending;
                job.active_since_ms = None;
                let score = priority_score(job.queue_priority, job.enqueued_at_ms);
                self.store_job(&mut conn, &job).await?;
                let _: () = conn.zadd(self.waiting_key(), &job_id, score).await?;
                let _: () = conn.sadd(self.state_key("waiting"), &job_id).await?;
                let _: () = conn
                    .hset(self.task_status_key(), job.task.id.as_str(), status_str(TaskStatus::Pending))
                    .await?;
            }
            reclaimed += 1;
        }

        if reclaimed > 0 {
            tracing::warn!(count = reclaimed, stall_interval_ms, "jobs:reclaimed_stalled");
        }
        Ok(reclaimed)
    }

    async fn close(&self) -> Result<(), QueueError> {
        // `ConnectionManager` reconnects transparently and has no explicit
        // close; nothing to flush since every mutation above is immediate.
        Ok(())
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Cancelled => "cancelled",
    }
}
