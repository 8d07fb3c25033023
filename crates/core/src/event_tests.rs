// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;

#[test]
fn supervisor_event_debug_formats_contain_variant_name() {
    let ev = SupervisorEvent::StatusChange(ProcessStatus::Running);
    assert!(format!("{ev:?}").contains("StatusChange"));
}

#[test]
fn queue_event_carries_job_id() {
    let ev = QueueEvent::JobAdded {
        job_id: JobId::new("j1"),
    };
    match ev {
        QueueEvent::JobAdded { job_id } => assert_eq!(job_id, "j1"),
        _ => unreachable!(),
    }
}

#[test]
fn subordinate_event_task_failed_carries_reason() {
    let ev = SubordinateEvent::TaskFailed {
        task_id: TaskId::new("t1"),
        reason: "boom".into(),
    };
    match ev {
        SubordinateEvent::TaskFailed { task_id, reason } => {
            assert_eq!(task_id, "t1");
            assert_eq!(reason, "boom");
        }
        _ => unreachable!(),
    }
}