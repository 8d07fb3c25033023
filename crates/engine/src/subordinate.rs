// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Subordinate Controller (§4.G): the single-worker loop that pulls one
//! task at a time from the Durable Task Queue, drives the child through
//! execution and a unit-test pass, and submits the assembled [`WorkResult`]
//! to the queue's result side-channel.

use crate::error::ControllerError;
use crate::multiplexer::CommandMultiplexer;
use foreman_adapters::SupervisorAdapter;
use foreman_core::{
    validate_code_changes, validate_test_result, validate_work_result, Clock, CommandOptions, IdGen,
    SubordinateEvent, TaskId, WorkResult,
};
use foreman_queue::TaskQueue;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct SubordinateController<S, C, I, Q> {
    mux: CommandMultiplexer<S, C, I>,
    queue: Arc<Q>,
    clock: C,
    agent_id: String,
    current: Mutex<Option<TaskId>>,
    events: broadcast::Sender<SubordinateEvent>,
    command_timeout_ms: u64,
}

impl<S, C, I, Q> SubordinateController<S, C, I, Q>
where
    S: SupervisorAdapter,
    C: Clock,
    I: IdGen + 'static,
    Q: TaskQueue,
{
    pub fn new(mux: CommandMultiplexer<S, C, I>, queue: Arc<Q>, clock: C, agent_id: impl Into<String>) -> Self {
        Self::with_command_timeout(mux, queue, clock, agent_id, CommandOptions::default().timeout_ms)
    }

    /// Like [`Self::new`], but overrides the timeout used for the
    /// execute/unit-test prompts — wired from
    /// `EngineConfig::command_timeout_ms` by the daemon.
    pub fn with_command_timeout(
        mux: CommandMultiplexer<S, C, I>,
        queue: Arc<Q>,
        clock: C,
        agent_id: impl Into<String>,
        command_timeout_ms: u64,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            mux,
            queue,
            clock,
            agent_id: agent_id.into(),
            current: Mutex::new(None),
            events,
            command_timeout_ms,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubordinateEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SubordinateEvent) {
        let _ = self.events.send(event);
    }

    fn command_options(&self) -> CommandOptions {
        CommandOptions {
            timeout_ms: self.command_timeout_ms,
            ..CommandOptions::default()
        }
    }

    /// Pulls at most one task and drives it to completion or failure.
    /// Returns `Ok(None)` when the queue currently has nothing eligible.
    pub async fn fetch_and_execute_task(&self) -> Result<Option<WorkResult>, ControllerError> {
        let Some(task) = self.queue.get_next_task(&self.agent_id).await? else {
            return Ok(None);
        };
        let task_id = task.id.clone();
        tracing::info!(agent_id = %self.agent_id, task_id = %task_id, "subordinate: picked up task");
        *self.current.lock() = Some(task_id.clone());
        self.emit(SubordinateEvent::TaskStarted {
            task_id: task_id.clone(),
        });

        match self.execute(&task_id, &task).await {
            Ok(result) => {
                *self.current.lock() = None;
                tracing::info!(task_id = %task_id, "subordinate: task completed");
                self.emit(SubordinateEvent::TaskCompleted {
                    task_id: task_id.clone(),
                });
                Ok(Some(result))
            }
            Err(e) => {
                // If `cleanup()` already cleared `current` concurrently, the
                // task was interrupted, not failed — don't burn an attempt.
                let was_current = self.current.lock().take().as_ref() == Some(&task_id);
                if was_current {
                    tracing::warn!(task_id = %task_id, error = %e, "subordinate: task failed");
                    let _ = self.queue.fail_task(&task_id, &e.to_string()).await;
                    self.emit(SubordinateEvent::TaskFailed {
                        task_id: task_id.clone(),
                        reason: e.to_string(),
                    });
                } else {
                    tracing::info!(task_id = %task_id, "subordinate: task interrupted before failure recorded");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, task_id: &TaskId, task: &foreman_core::Task) -> Result<WorkResult, ControllerError> {
        let exec_prompt = format!(
            "Implement the following task, then reply with exactly one JSON array of code \
             changes, each shaped {{\"filePath\": string, \"action\": \"create\"|\"update\"|\"delete\", \
             \"content\": string|null, \"diff\": string|null}}. Title: {}. Description: {}",
            task.title, task.description,
        );
        let changes_value: serde_json::Value = self
            .mux
            .send_expecting_json(exec_prompt, self.command_options())
            .await
            .inspect_err(|e| tracing::error!(%task_id, error = %e, "subordinate: execute request failed"))?;
        let code_changes = validate_code_changes(&changes_value)?;

        let test_prompt = format!(
            "Run the unit tests covering the {} file(s) just changed and reply with exactly \
             one JSON object matching the test result schema (testType=\"unit\", passed, total, \
             passedCount, failedCount, executionTime, details).",
            code_changes.len(),
        );
        let test_value: serde_json::Value = self
            .mux
            .send_expecting_json(test_prompt, self.command_options())
            .await
            .inspect_err(|e| tracing::error!(%task_id, error = %e, "subordinate: unit test request failed"))?;
        let test_results = validate_test_result(&test_value)?;

        let work_result = WorkResult {
            task_id: task_id.clone(),
            agent_id: self.agent_id.clone(),
            completion_time_ms: self.clock.epoch_ms(),
            code_changes,
            test_results,
        };
        let round_tripped =
            serde_json::to_value(&work_result).map_err(|e| ControllerError::Io(e.to_string()))?;
        validate_work_result(&round_tripped)?;

        self.queue.submit_result(work_result.clone()).await?;
        Ok(work_result)
    }

    /// Marks any currently-assigned task as interrupted (not failed — a
    /// crash or shutdown mid-task should not burn a retry attempt) and
    /// releases the multiplexer's in-flight commands.
    pub async fn cleanup(&self) {
        if let Some(task_id) = self.current.lock().take() {
            tracing::warn!(%task_id, "subordinate: interrupting in-flight task");
            self.emit(SubordinateEvent::TaskInterrupted { task_id });
        }
        self.mux.cleanup();
    }
}

#[cfg(test)]
#[path = "subordinate_tests.rs"]
mod tests;
