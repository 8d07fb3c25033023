// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Task Model & Validation (§4.D).
//!
//! A single function per entity that, given an arbitrary JSON value, either
//! returns a structurally-typed entity or raises [`ValidationError`]. This is
//! the one boundary-trust gate: the queue and controllers call it on every
//! value that crosses a process boundary (child-process replies, durable
//! store round-trips).

use crate::command::{Payload, TextClassification};
use crate::error::ValidationError;
use crate::task::{Task, TaskId, TaskStatus};
use crate::test_result::{TestDetail, TestResult, TestType};
use crate::work_result::{ChangeAction, CodeChange, WorkResult};
use serde_json::Value;
use std::collections::BTreeSet;

fn field_err(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::new(field, message)
}

/// A non-empty string after trimming whitespace.
fn non_empty_string(v: &Value, field: &str) -> Result<String, ValidationError> {
    let s = v
        .as_str()
        .ok_or_else(|| field_err(field, "expected a string"))?;
    if s.trim().is_empty() {
        return Err(field_err(field, "must not be empty"));
    }
    Ok(s.to_string())
}

/// A finite, non-negative integer counter.
fn non_negative_u32(v: &Value, field: &str) -> Result<u32, ValidationError> {
    let n = v
        .as_u64()
        .ok_or_else(|| field_err(field, "expected a non-negative finite integer"))?;
    u32::try_from(n).map_err(|_| field_err(field, "value out of range"))
}

fn non_negative_u64(v: &Value, field: &str) -> Result<u64, ValidationError> {
    v.as_u64()
        .ok_or_else(|| field_err(field, "expected a non-negative finite integer"))
}

/// A wall-clock instant: a finite, non-negative epoch-millisecond value.
fn epoch_ms(v: &Value, field: &str) -> Result<u64, ValidationError> {
    non_negative_u64(v, field)
}

fn object<'a>(v: &'a Value, field: &str) -> Result<&'a serde_json::Map<String, Value>, ValidationError> {
    v.as_object()
        .ok_or_else(|| field_err(field, "expected an object"))
}

fn get<'a>(obj: &'a serde_json::Map<String, Value>, key: &str, field_path: &str) -> Result<&'a Value, ValidationError> {
    obj.get(key)
        .ok_or_else(|| field_err(field_path, format!("missing field `{key}`")))
}

/// Validate a single [`Task`] from a JSON object.
pub fn validate_task(v: &Value) -> Result<Task, ValidationError> {
    validate_task_at(v, "task")
}

fn validate_task_at(v: &Value, path: &str) -> Result<Task, ValidationError> {
    let obj = object(v, path)?;

    let id = non_empty_string(get(obj, "id", &format!("{path}.id"))?, &format!("{path}.id"))?;
    let title = non_empty_string(
        get(obj, "title", &format!("{path}.title"))?,
        &format!("{path}.title"),
    )?;
    let description = non_empty_string(
        get(obj, "description", &format!("{path}.description"))?,
        &format!("{path}.description"),
    )?;
    let priority = non_negative_u32(
        get(obj, "priority", &format!("{path}.priority"))?,
        &format!("{path}.priority"),
    )?;

    let dependencies = match obj.get("dependencies") {
        None => BTreeSet::new(),
        Some(Value::Array(items)) => {
            let mut set = BTreeSet::new();
            for (i, item) in items.iter().enumerate() {
                let dep_path = format!("{path}.dependencies[{i}]");
                let dep = non_empty_string(item, &dep_path)?;
                set.insert(TaskId::new(dep));
            }
            set
        }
        Some(_) => return Err(field_err(format!("{path}.dependencies"), "expected an array")),
    };

    let status = match obj.get("status") {
        None => TaskStatus::Pending,
        Some(s) => validate_task_status(s, &format!("{path}.status"))?,
    };

    let assigned_to = match obj.get("assignedTo").or_else(|| obj.get("assigned_to")) {
        None | Some(Value::Null) => None,
        Some(s) => Some(non_empty_string(s, &format!("{path}.assignedTo"))?),
    };

    let created_at_ms = match obj.get("createdAt").or_else(|| obj.get("created_at_ms")) {
        None => 0,
        Some(v) => epoch_ms(v, &format!("{path}.createdAt"))?,
    };

    let deadline_ms = match obj.get("deadline").or_else(|| obj.get("deadline_ms")) {
        None | Some(Value::Null) => None,
        Some(v) => Some(epoch_ms(v, &format!("{path}.deadline"))?),
    };

    Ok(Task {
        id: TaskId::new(id),
        title,
        description,
        priority,
        dependencies,
        assigned_to,
        status,
        created_at_ms,
        deadline_ms,
    })
}

fn validate_task_status(v: &Value, field: &str) -> Result<TaskStatus, ValidationError> {
    let s = v.as_str().ok_or_else(|| field_err(field, "expected a string"))?;
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "in-progress" | "in_progress" => Ok(TaskStatus::InProgress),
        "completed" => Ok(TaskStatus::Completed),
        "failed" => Ok(TaskStatus::Failed),
        "cancelled" => Ok(TaskStatus::Cancelled),
        other => Err(field_err(field, format!("unknown status `{other}`"))),
    }
}

/// Validate an array of tasks, with positional error paths (`tasks[3].priority`).
pub fn validate_tasks(v: &Value) -> Result<Vec<Task>, ValidationError> {
    let items = v
        .as_array()
        .ok_or_else(|| field_err("tasks", "expected an array"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_task_at(item, &format!("tasks[{i}]")))
        .collect()
}

fn validate_change_action(v: &Value, field: &str) -> Result<ChangeAction, ValidationError> {
    let s = v.as_str().ok_or_else(|| field_err(field, "expected a string"))?;
    match s {
        "create" => Ok(ChangeAction::Create),
        "update" => Ok(ChangeAction::Update),
        "delete" => Ok(ChangeAction::Delete),
        other => Err(field_err(field, format!("unknown action `{other}`"))),
    }
}

fn validate_code_change(v: &Value, path: &str) -> Result<CodeChange, ValidationError> {
    let obj = object(v, path)?;
    let file_path = non_empty_string(
        get(obj, "filePath", &format!("{path}.filePath"))?,
        &format!("{path}.filePath"),
    )?;
    let action = validate_change_action(
        get(obj, "action", &format!("{path}.action"))?,
        &format!("{path}.action"),
    )?;
    let content = match obj.get("content") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_str()
                .ok_or_else(|| field_err(format!("{path}.content"), "expected a string"))?
                .to_string(),
        ),
    };
    let diff = match obj.get("diff") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_str()
                .ok_or_else(|| field_err(format!("{path}.diff"), "expected a string"))?
                .to_string(),
        ),
    };
    Ok(CodeChange {
        file_path,
        action,
        content,
        diff,
    })
}

fn validate_test_type(v: &Value, field: &str) -> Result<TestType, ValidationError> {
    let s = v.as_str().ok_or_else(|| field_err(field, "expected a string"))?;
    match s {
        "unit" => Ok(TestType::Unit),
        "integration" => Ok(TestType::Integration),
        other => Err(field_err(field, format!("unknown test type `{other}`"))),
    }
}

/// Validate a [`TestResult`], including the cross-field boundary rule
/// `passedTests + failedTests <= totalTests` (§4.D).
pub fn validate_test_result(v: &Value) -> Result<TestResult, ValidationError> {
    validate_test_result_at(v, "testResults")
}

fn validate_test_result_at(v: &Value, path: &str) -> Result<TestResult, ValidationError> {
    let obj = object(v, path)?;
    let test_type = validate_test_type(
        get(obj, "testType", &format!("{path}.testType"))?,
        &format!("{path}.testType"),
    )?;
    let passed = get(obj, "passed", &format!("{path}.passed"))?
        .as_bool()
        .ok_or_else(|| field_err(format!("{path}.passed"), "expected a boolean"))?;
    let total = non_negative_u32(
        get(obj, "total", &format!("{path}.total"))?,
        &format!("{path}.total"),
    )?;
    let passed_count = non_negative_u32(
        get(obj, "passedCount", &format!("{path}.passedCount"))?,
        &format!("{path}.passedCount"),
    )?;
    let failed_count = non_negative_u32(
        get(obj, "failedCount", &format!("{path}.failedCount"))?,
        &format!("{path}.failedCount"),
    )?;
    let execution_time_ms = non_negative_u64(
        get(obj, "executionTime", &format!("{path}.executionTime"))?,
        &format!("{path}.executionTime"),
    )?;

    if passed_count + failed_count > total {
        return Err(field_err(
            format!("{path}.total"),
            "passedCount + failedCount must not exceed total",
        ));
    }

    let details = match obj.get("details") {
        None => vec![],
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| validate_test_detail(item, &format!("{path}.details[{i}]")))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(field_err(format!("{path}.details"), "expected an array")),
    };

    Ok(TestResult {
        test_type,
        passed,
        total,
        passed_count,
        failed_count,
        execution_time_ms,
        details,
    })
}

fn validate_test_detail(v: &Value, path: &str) -> Result<TestDetail, ValidationError> {
    let obj = object(v, path)?;
    let name = non_empty_string(
        get(obj, "name", &format!("{path}.name"))?,
        &format!("{path}.name"),
    )?;
    let passed = get(obj, "passed", &format!("{path}.passed"))?
        .as_bool()
        .ok_or_else(|| field_err(format!("{path}.passed"), "expected a boolean"))?;
    let duration_ms = non_negative_u64(
        get(obj, "duration", &format!("{path}.duration"))?,
        &format!("{path}.duration"),
    )?;
    let error = match obj.get("error") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_str()
                .ok_or_else(|| field_err(format!("{path}.error"), "expected a string"))?
                .to_string(),
        ),
    };
    Ok(TestDetail {
        name,
        passed,
        duration_ms,
        error,
    })
}

/// Validate an array of [`CodeChange`]s, with positional error paths
/// (`codeChanges[2].action`).
pub fn validate_code_changes(v: &Value) -> Result<Vec<CodeChange>, ValidationError> {
    let items = v
        .as_array()
        .ok_or_else(|| field_err("codeChanges", "expected an array"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_code_change(item, &format!("codeChanges[{i}]")))
        .collect()
}

/// Validate an [`IntegrationTestResult`] (§4.F `runIntegrationTests`/
/// `runBrowserTests`): the base [`TestResult`] plus its optional coverage,
/// performance, and browser-test extensions.
pub fn validate_integration_test_result(
    v: &Value,
) -> Result<crate::test_result::IntegrationTestResult, ValidationError> {
    use crate::test_result::{
        BrowserTestResult, CoverageReport, IntegrationTestKind, PerformanceMetrics,
    };

    let path = "integrationTestResult";
    let obj = object(v, path)?;
    let base = validate_test_result_at(get(obj, "base", &format!("{path}.base"))?, &format!("{path}.base"))?;

    let kind_str = get(obj, "kind", &format!("{path}.kind"))?
        .as_str()
        .ok_or_else(|| field_err(format!("{path}.kind"), "expected a string"))?;
    let kind = match kind_str {
        "backend" => IntegrationTestKind::Backend,
        "frontend" => IntegrationTestKind::Frontend,
        "full" => IntegrationTestKind::Full,
        other => return Err(field_err(format!("{path}.kind"), format!("unknown kind `{other}`"))),
    };

    let coverage = match obj.get("coverage") {
        None | Some(Value::Null) => None,
        Some(cv) => {
            let cpath = format!("{path}.coverage");
            let cobj = object(cv, &cpath)?;
            let pct = |key: &str| -> Result<f64, ValidationError> {
                get(cobj, key, &format!("{cpath}.{key}"))?
                    .as_f64()
                    .ok_or_else(|| field_err(format!("{cpath}.{key}"), "expected a number"))
            };
            Some(CoverageReport {
                lines_pct: pct("linesPct")?,
                branches_pct: pct("branchesPct")?,
                functions_pct: pct("functionsPct")?,
            })
        }
    };

    let performance_metrics = match obj.get("performanceMetrics") {
        None | Some(Value::Null) => None,
        Some(pv) => {
            let ppath = format!("{path}.performanceMetrics");
            let pobj = object(pv, &ppath)?;
            let pct = |key: &str| -> Result<f64, ValidationError> {
                get(pobj, key, &format!("{ppath}.{key}"))?
                    .as_f64()
                    .ok_or_else(|| field_err(format!("{ppath}.{key}"), "expected a number"))
            };
            Some(PerformanceMetrics {
                p50_ms: pct("p50Ms")?,
                p95_ms: pct("p95Ms")?,
                p99_ms: pct("p99Ms")?,
            })
        }
    };

    let browser_test_results = match obj.get("browserTestResults") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => {
            let bpath = format!("{path}.browserTestResults");
            let mut results = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let ipath = format!("{bpath}[{i}]");
                let iobj = object(item, &ipath)?;
                let scenario = non_empty_string(
                    get(iobj, "scenario", &format!("{ipath}.scenario"))?,
                    &format!("{ipath}.scenario"),
                )?;
                let passed = get(iobj, "passed", &format!("{ipath}.passed"))?
                    .as_bool()
                    .ok_or_else(|| field_err(format!("{ipath}.passed"), "expected a boolean"))?;
                let screenshot_path = match iobj.get("screenshotPath") {
                    None | Some(Value::Null) => None,
                    Some(s) => Some(
                        s.as_str()
                            .ok_or_else(|| field_err(format!("{ipath}.screenshotPath"), "expected a string"))?
                            .to_string(),
                    ),
                };
                let error = match iobj.get("error") {
                    None | Some(Value::Null) => None,
                    Some(s) => Some(
                        s.as_str()
                            .ok_or_else(|| field_err(format!("{ipath}.error"), "expected a string"))?
                            .to_string(),
                    ),
                };
                results.push(BrowserTestResult {
                    scenario,
                    passed,
                    screenshot_path,
                    error,
                });
            }
            Some(results)
        }
        Some(_) => return Err(field_err(format!("{path}.browserTestResults"), "expected an array")),
    };

    Ok(crate::test_result::IntegrationTestResult {
        base,
        kind,
        coverage,
        performance_metrics,
        browser_test_results,
    })
}

/// Validate a [`WorkResult`].
pub fn validate_work_result(v: &Value) -> Result<WorkResult, ValidationError> {
    let path = "workResult";
    let obj = object(v, path)?;
    let task_id = non_empty_string(
        get(obj, "taskId", &format!("{path}.taskId"))?,
        &format!("{path}.taskId"),
    )?;
    let agent_id = non_empty_string(
        get(obj, "agentId", &format!("{path}.agentId"))?,
        &format!("{path}.agentId"),
    )?;
    let completion_time_ms = epoch_ms(
        get(obj, "completionTime", &format!("{path}.completionTime"))?,
        &format!("{path}.completionTime"),
    )?;
    let code_changes = match obj.get("codeChanges") {
        None => vec![],
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| validate_code_change(item, &format!("{path}.codeChanges[{i}]")))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(field_err(format!("{path}.codeChanges"), "expected an array")),
    };
    let test_results = validate_test_result_at(
        get(obj, "testResults", &format!("{path}.testResults"))?,
        &format!("{path}.testResults"),
    )?;

    Ok(WorkResult {
        task_id: TaskId::new(task_id),
        agent_id,
        completion_time_ms,
        code_changes,
        test_results,
    })
}

/// Classify free text as success/error/ambiguous using the regexes named
/// in §4.B's response-correlation rule, wrapped as a [`Payload::Text`].
pub fn classify_text_payload(text: &str) -> Payload {
    Payload::Text {
        value: text.to_string(),
        classification: classify_text(text),
    }
}

fn classify_text(text: &str) -> TextClassification {
    let lower = text.to_lowercase();
    let looks_error = ["error", "failed", "exception", "invalid", "denied", "forbidden"]
        .iter()
        .any(|kw| lower.contains(kw));
    let looks_success = ["success", "completed", "done", "ok", "ready"]
        .iter()
        .any(|kw| lower.contains(kw));
    match (looks_error, looks_success) {
        (true, false) => TextClassification::Error,
        (false, _) => TextClassification::Success,
        (true, true) => TextClassification::Ambiguous,
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
