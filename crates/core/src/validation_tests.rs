// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;
use serde_json::json;

#[test]
fn validates_minimal_task() {
    let v = json!({
        "id": "t1",
        "title": "Create class",
        "description": "Add a Calculator class",
        "priority": 5,
    });
    let task = validate_task(&v).unwrap();
    assert_eq!(task.id, "t1");
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.dependencies.is_empty());
}

#[test]
fn rejects_empty_title() {
    let v = json!({"id": "t1", "title": "   ", "description": "x", "priority": 1});
    let err = validate_task(&v).unwrap_err();
    assert_eq!(err.field, "task.title");
}

#[test]
fn rejects_missing_field() {
    let v = json!({"id": "t1", "title": "x", "priority": 1});
    let err = validate_task(&v).unwrap_err();
    assert_eq!(err.field, "task.description");
}

#[test]
fn validates_dependencies_array_positionally() {
    let v = json!({
        "id": "t2",
        "title": "x",
        "description": "y",
        "priority": 1,
        "dependencies": ["a", ""],
    });
    let err = validate_task(&v).unwrap_err();
    assert_eq!(err.field, "task.dependencies[1]");
}

#[test]
fn validates_task_array_with_positional_error_paths() {
    let v = json!([
        {"id": "t1", "title": "x", "description": "y", "priority": 1},
        {"id": "t2", "title": "x", "description": "y", "priority": -1},
    ]);
    // -1 cannot be represented as u64, as_u64() fails -> validation error
    let err = validate_tasks(&v).unwrap_err();
    assert_eq!(err.field, "tasks[1].priority");
}

#[test]
fn rejects_unknown_status() {
    let v = json!({
        "id": "t1", "title": "x", "description": "y", "priority": 1, "status": "bogus"
    });
    let err = validate_task(&v).unwrap_err();
    assert_eq!(err.field, "task.status");
}

#[test]
fn rejects_test_result_when_counters_exceed_total() {
    let v = json!({
        "testType": "unit",
        "passed": false,
        "total": 1,
        "passedCount": 1,
        "failedCount": 1,
        "executionTime": 10,
    });
    let err = validate_test_result(&v).unwrap_err();
    assert_eq!(err.field, "testResults.total");
}

#[test]
fn accepts_well_formed_test_result() {
    let v = json!({
        "testType": "integration",
        "passed": true,
        "total": 3,
        "passedCount": 3,
        "failedCount": 0,
        "executionTime": 120,
        "details": [
            {"name": "a", "passed": true, "duration": 10},
        ],
    });
    let tr = validate_test_result(&v).unwrap();
    assert_eq!(tr.details.len(), 1);
    assert!(tr.is_internally_consistent());
}

#[test]
fn validates_work_result() {
    let v = json!({
        "taskId": "t1",
        "agentId": "agent-1",
        "completionTime": 999,
        "codeChanges": [
            {"filePath": "a.rs", "action": "create", "content": "fn a(){}"},
        ],
        "testResults": {
            "testType": "unit",
            "passed": true,
            "total": 1,
            "passedCount": 1,
            "failedCount": 0,
            "executionTime": 5,
        },
    });
    let wr = validate_work_result(&v).unwrap();
    assert_eq!(wr.task_id, "t1");
    assert_eq!(wr.code_changes.len(), 1);
}

#[test]
fn rejects_unknown_code_change_action() {
    let v = json!({
        "taskId": "t1",
        "agentId": "agent-1",
        "completionTime": 1,
        "codeChanges": [{"filePath": "a.rs", "action": "rename"}],
        "testResults": {
            "testType": "unit", "passed": true, "total": 0, "passedCount": 0,
            "failedCount": 0, "executionTime": 0,
        },
    });
    let err = validate_work_result(&v).unwrap_err();
    assert_eq!(err.field, "workResult.codeChanges[0].action");
}

#[test]
fn classify_text_defaults_to_success() {
    match classify_text_payload("the task is done") {
        Payload::Text { classification, .. } => assert_eq!(classification, TextClassification::Success),
        _ => unreachable!(),
    }
}

#[test]
fn classify_text_detects_error_without_success_keyword() {
    match classify_text_payload("operation failed: invalid input") {
        Payload::Text { classification, .. } => assert_eq!(classification, TextClassification::Error),
        _ => unreachable!(),
    }
}

#[test]
fn classify_text_is_ambiguous_when_both_match() {
    match classify_text_payload("completed with an error in step 2") {
        Payload::Text { classification, .. } => {
            assert_eq!(classification, TextClassification::Ambiguous)
        }
        _ => unreachable!(),
    }
}

#[test]
fn validates_code_changes_array_positionally() {
    let v = json!([
        {"filePath": "a.rs", "action": "create", "content": "x"},
        {"filePath": "b.rs", "action": "bogus"},
    ]);
    let err = validate_code_changes(&v).unwrap_err();
    assert_eq!(err.field, "codeChanges[1].action");
}

#[test]
fn validates_integration_test_result_with_all_extensions() {
    let v = json!({
        "base": {
            "testType": "integration", "passed": true, "total": 2,
            "passedCount": 2, "failedCount": 0, "executionTime": 500,
        },
        "kind": "full",
        "coverage": {"linesPct": 91.5, "branchesPct": 80.0, "functionsPct": 95.0},
        "performanceMetrics": {"p50Ms": 12.0, "p95Ms": 40.0, "p99Ms": 60.0},
        "browserTestResults": [
            {"scenario": "login", "passed": true},
        ],
    });
    let result = validate_integration_test_result(&v).unwrap();
    assert!(result.coverage.is_some());
    assert!(result.performance_metrics.is_some());
    assert_eq!(result.browser_test_results.unwrap().len(), 1);
}

#[test]
fn rejects_integration_test_result_with_unknown_kind() {
    let v = json!({
        "base": {
            "testType": "unit", "passed": true, "total": 0,
            "passedCount": 0, "failedCount": 0, "executionTime": 0,
        },
        "kind": "database",
    });
    let err = validate_integration_test_result(&v).unwrap_err();
    assert_eq!(err.field, "integrationTestResult.kind");
}