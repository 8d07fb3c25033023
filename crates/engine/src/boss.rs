// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Boss Controller (§4.F): turns a free-text instruction into a validated,
//! dependency-ordered task graph, enqueues it, and reviews work that comes
//! back from Subordinates.

use crate::error::ControllerError;
use crate::multiplexer::CommandMultiplexer;
use crate::shell_exec::ShellExecAdapter;
use foreman_adapters::SupervisorAdapter;
use foreman_core::{
    topo_sort, validate_integration_test_result, validate_tasks, Clock, CommandOptions, IdGen,
    IntegrationTestKind, IntegrationTestResult, JobId, Task, TaskId, WorkResult,
};
use foreman_queue::{AddTaskOptions, TaskQueue};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Milliseconds a dependent task's job is delayed before becoming eligible,
/// as a scheduling hint layered on top of the queue's own dependency gate
/// (§9 open question: the hint is redundant with `getNextTask`'s gating but
/// kept anyway — it shrinks the window in which a dependent job sits
/// `Waiting` and gets re-examined by every `getNextTask` poll for no reason).
const DEPENDENT_TASK_DELAY_MS: u64 = 5_000;

/// One decomposed task graph, as returned by `processUserInstruction`.
#[derive(Debug, Clone)]
pub struct TaskDecomposition {
    pub tasks: Vec<Task>,
    pub dependencies: HashMap<TaskId, Vec<TaskId>>,
    pub estimated_duration_ms: u64,
    pub complexity: String,
}

/// The child's verdict on one [`WorkResult`] (`reviewSubordinateWork`,
/// §4.F): `{approved, feedback, suggestions, issues[], score ∈ [0,100],
/// codeQuality, recommendations}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub approved: bool,
    pub feedback: String,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Clamped into `[0, 100]` by [`BossController::review_subordinate_work`]
    /// after deserialization — the child is free to return anything numeric.
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub code_quality: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

pub struct BossController<S, C, I, Q> {
    mux: CommandMultiplexer<S, C, I>,
    shell: ShellExecAdapter<S, C, I>,
    queue: Arc<Q>,
    workspace_path: PathBuf,
    external_tool_api_key: Option<String>,
    command_timeout_ms: u64,
}

impl<S, C, I, Q> BossController<S, C, I, Q>
where
    S: SupervisorAdapter,
    C: Clock + Clone,
    I: IdGen + Clone + 'static,
    Q: TaskQueue,
{
    pub fn new(
        mux: CommandMultiplexer<S, C, I>,
        queue: Arc<Q>,
        workspace_path: PathBuf,
        external_tool_api_key: Option<String>,
    ) -> Self {
        let timeout_ms = CommandOptions::default().timeout_ms;
        Self::with_command_timeout(mux, queue, workspace_path, external_tool_api_key, timeout_ms)
    }

    /// Like [`Self::new`], but overrides the timeout used for prompts that
    /// don't carry their own (decomposition, review, integration tests) —
    /// wired from `EngineConfig::command_timeout_ms` by the daemon.
    pub fn with_command_timeout(
        mux: CommandMultiplexer<S, C, I>,
        queue: Arc<Q>,
        workspace_path: PathBuf,
        external_tool_api_key: Option<String>,
        command_timeout_ms: u64,
    ) -> Self {
        let shell = ShellExecAdapter::new(mux.clone());
        Self {
            mux,
            shell,
            queue,
            workspace_path,
            external_tool_api_key,
            command_timeout_ms,
        }
    }

    fn command_options(&self) -> CommandOptions {
        CommandOptions {
            timeout_ms: self.command_timeout_ms,
            ..CommandOptions::default()
        }
    }

    /// Startup sequence (§4.F): confirm the child tool answers, make sure
    /// the workspace directory exists, and hand it any external-tool
    /// credentials via a config file the child reads for itself (the core
    /// never parses that file's contents).
    pub async fn initialize(&self) -> Result<(), ControllerError> {
        let span = tracing::info_span!("boss.initialize", workspace = %self.workspace_path.display());
        let _enter = span.enter();
        self.shell.ping("FOREMAN_BOSS_READY").await.inspect_err(|e| {
            tracing::error!(error = %e, "boss: child did not answer readiness ping");
        })?;
        tokio::fs::create_dir_all(&self.workspace_path)
            .await
            .map_err(|e| ControllerError::Io(e.to_string()))?;
        if let Some(key) = &self.external_tool_api_key {
            self.write_external_tool_config(key).await?;
        }
        tracing::info!("boss: initialized");
        Ok(())
    }

    async fn write_external_tool_config(&self, api_key: &str) -> Result<(), ControllerError> {
        let path = self.workspace_path.join(".foreman-tool-config.json");
        let body = serde_json::json!({ "apiKey": api_key });
        let rendered = serde_json::to_string_pretty(&body).map_err(|e| ControllerError::Io(e.to_string()))?;
        tokio::fs::write(&path, rendered)
            .await
            .map_err(|e| ControllerError::Io(e.to_string()))
    }

    /// Sends the instruction to the child and validates the task graph it
    /// proposes back.
    pub async fn process_user_instruction(
        &self,
        instruction: &str,
    ) -> Result<TaskDecomposition, ControllerError> {
        let prompt = format!(
            "Decompose the following instruction into a task graph. Reply with exactly \
             one JSON object: {{\"tasks\": [task...], \"estimatedDuration\": number, \
             \"complexity\": string}}, where each task has id, title, description, \
             priority, dependencies (array of task ids). Instruction: {instruction}"
        );
        tracing::info!(instruction_len = instruction.len(), "boss: decomposing instruction");
        let value: serde_json::Value = self
            .mux
            .send_expecting_json(prompt, self.command_options())
            .await
            .inspect_err(|e| tracing::error!(error = %e, "boss: decomposition request failed"))?;

        let tasks_value = value
            .get("tasks")
            .cloned()
            .unwrap_or(serde_json::Value::Array(vec![]));
        let tasks = validate_tasks(&tasks_value).inspect_err(|e| {
            tracing::warn!(error = %e, "boss: child returned an invalid task graph");
        })?;

        let dependencies = tasks
            .iter()
            .map(|t| (t.id.clone(), t.dependencies.iter().cloned().collect()))
            .collect();

        let estimated_duration_ms = value.get("estimatedDuration").and_then(|v| v.as_u64()).unwrap_or(0);
        let complexity = value
            .get("complexity")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        tracing::info!(task_count = tasks.len(), %complexity, "boss: decomposed instruction");
        Ok(TaskDecomposition {
            tasks,
            dependencies,
            estimated_duration_ms,
            complexity,
        })
    }

    /// Topologically orders `tasks` so dependencies are enqueued (and thus
    /// can complete) before their dependents (§4.A dependency invariant).
    pub fn enforce_task_dependencies(&self, tasks: Vec<Task>) -> Result<Vec<Task>, ControllerError> {
        Ok(topo_sort(&tasks)?)
    }

    /// Enqueues `tasks` in dependency order, applying a delay hint to any
    /// task with at least one dependency.
    pub async fn add_tasks_to_queue(&self, tasks: Vec<Task>) -> Result<Vec<JobId>, ControllerError> {
        let ordered = self.enforce_task_dependencies(tasks)?;
        let mut job_ids = Vec::with_capacity(ordered.len());
        for task in ordered {
            let delay_ms = if task.dependencies.is_empty() {
                0
            } else {
                DEPENDENT_TASK_DELAY_MS
            };
            let job_id = self
                .queue
                .add_task(task, AddTaskOptions { delay_ms, attempts: None })
                .await?;
            job_ids.push(job_id);
        }
        tracing::info!(enqueued = job_ids.len(), "boss: enqueued task graph");
        Ok(job_ids)
    }

    /// Sends a [`WorkResult`] to the child for review and finalizes the
    /// underlying job: `completeTask` on approval, `failTask` otherwise.
    pub async fn review_subordinate_work(
        &self,
        work_result: &WorkResult,
    ) -> Result<ReviewResult, ControllerError> {
        let payload = serde_json::to_value(work_result).map_err(|e| ControllerError::Io(e.to_string()))?;
        let prompt = format!(
            "Review the following completed work and reply with exactly one JSON object: \
             {{\"approved\": bool, \"feedback\": string, \"issues\": [string], \
             \"suggestions\": [string], \"score\": number (0-100), \"codeQuality\": string, \
             \"recommendations\": [string]}}. Work result: {payload}"
        );
        let mut review: ReviewResult = self
            .mux
            .send_expecting_json(prompt, self.command_options())
            .await
            .inspect_err(|e| {
                tracing::error!(task_id = %work_result.task_id, error = %e, "boss: review request failed");
            })?;
        review.score = review.score.min(100);

        if review.approved {
            self.queue
                .complete_task(&work_result.task_id, work_result.clone())
                .await?;
            tracing::info!(task_id = %work_result.task_id, score = review.score, "boss: work approved");
        } else {
            self.queue.fail_task(&work_result.task_id, &review.feedback).await?;
            tracing::warn!(task_id = %work_result.task_id, feedback = %review.feedback, "boss: work rejected");
        }
        Ok(review)
    }

    /// Sweeps submitted-but-unreviewed results and reviews each. Returns the
    /// task ids reviewed this pass (used by the daemon's periodic loop,
    /// §10.5, since the queue has no push notification for new results).
    pub async fn review_pending(&self, task_ids: &[TaskId]) -> Result<Vec<TaskId>, ControllerError> {
        let mut reviewed = Vec::new();
        for task_id in task_ids {
            if let Some(result) = self.queue.get_result(task_id).await? {
                self.review_subordinate_work(&result).await?;
                reviewed.push(task_id.clone());
            }
        }
        if !reviewed.is_empty() {
            tracing::info!(reviewed = reviewed.len(), candidates = task_ids.len(), "boss: reviewed pending results");
        }
        Ok(reviewed)
    }

    async fn run_structured_tests(&self, prompt: String) -> Result<IntegrationTestResult, ControllerError> {
        let value: serde_json::Value = self
            .mux
            .send_expecting_json(prompt, self.command_options())
            .await
            .inspect_err(|e| tracing::error!(error = %e, "boss: test run request failed"))?;
        let result = validate_integration_test_result(&value)?;
        tracing::info!(passed = result.base.passed, "boss: test run completed");
        Ok(result)
    }

    /// Runs the integration test suite of `kind` against `project_path`.
    pub async fn run_integration_tests(
        &self,
        project_path: &Path,
        kind: IntegrationTestKind,
    ) -> Result<IntegrationTestResult, ControllerError> {
        let kind_str = match kind {
            IntegrationTestKind::Backend => "backend",
            IntegrationTestKind::Frontend => "frontend",
            IntegrationTestKind::Full => "full",
        };
        let prompt = format!(
            "Run the {kind_str} integration test suite in `{}` and reply with exactly one \
             JSON object matching the integration test result schema (base test result, \
             kind, optional coverage, optional performanceMetrics).",
            project_path.display()
        );
        tracing::info!(kind = kind_str, path = %project_path.display(), "boss: running integration tests");
        self.run_structured_tests(prompt).await
    }

    /// Runs the named browser scenarios against `project_path`.
    pub async fn run_browser_tests(
        &self,
        project_path: &Path,
        scenarios: Vec<String>,
    ) -> Result<IntegrationTestResult, ControllerError> {
        tracing::info!(scenario_count = scenarios.len(), path = %project_path.display(), "boss: running browser tests");
        let prompt = format!(
            "Run these browser scenarios against `{}` and reply with exactly one JSON object \
             matching the integration test result schema with kind=\"full\" and \
             browserTestResults populated: {}",
            project_path.display(),
            scenarios.join(", ")
        );
        self.run_structured_tests(prompt).await
    }
}

#[cfg(test)]
#[path = "boss_tests.rs"]
mod tests;
