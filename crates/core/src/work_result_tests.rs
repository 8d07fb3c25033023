// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;
use crate::test_result::{TestDetail, TestType};

fn sample_test_result() -> TestResult {
    TestResult {
        test_type: TestType::Unit,
        passed: true,
        total: 1,
        passed_count: 1,
        failed_count: 0,
        execution_time_ms: 10,
        details: vec![TestDetail {
            name: "it_works".into(),
            passed: true,
            duration_ms: 10,
            error: None,
        }],
    }
}

#[test]
fn work_result_round_trips_through_json() {
    let wr = WorkResult {
        task_id: TaskId::new("t1"),
        agent_id: "agent-1".into(),
        completion_time_ms: 123,
        code_changes: vec![CodeChange {
            file_path: "src/lib.rs".into(),
            action: ChangeAction::Create,
            content: Some("fn main() {}".into()),
            diff: None,
        }],
        test_results: sample_test_result(),
    };
    let json = serde_json::to_string(&wr).unwrap();
    let back: WorkResult = serde_json::from_str(&json).unwrap();
    assert_eq!(wr, back);
}

#[test]
fn change_action_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&ChangeAction::Create).unwrap(),
        "\"create\""
    );
    assert_eq!(
        serde_json::to_string(&ChangeAction::Delete).unwrap(),
        "\"delete\""
    );
}