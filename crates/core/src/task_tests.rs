// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;

#[test]
fn priority_bands_match_spec_thresholds() {
    assert_eq!(QueuePriority::from_task_priority(0), QueuePriority::Background);
    assert_eq!(QueuePriority::from_task_priority(2), QueuePriority::Background);
    assert_eq!(QueuePriority::from_task_priority(3), QueuePriority::Low);
    assert_eq!(QueuePriority::from_task_priority(4), QueuePriority::Low);
    assert_eq!(QueuePriority::from_task_priority(5), QueuePriority::Normal);
    assert_eq!(QueuePriority::from_task_priority(6), QueuePriority::Normal);
    assert_eq!(QueuePriority::from_task_priority(7), QueuePriority::High);
    assert_eq!(QueuePriority::from_task_priority(8), QueuePriority::High);
    assert_eq!(QueuePriority::from_task_priority(9), QueuePriority::Critical);
    assert_eq!(QueuePriority::from_task_priority(100), QueuePriority::Critical);
}

#[test]
fn queue_priority_ranks_are_strictly_increasing() {
    let bands = [
        QueuePriority::Background,
        QueuePriority::Low,
        QueuePriority::Normal,
        QueuePriority::High,
        QueuePriority::Critical,
    ];
    for pair in bands.windows(2) {
        assert!(pair[0].rank() < pair[1].rank());
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn new_task_starts_pending_and_unassigned() {
    let t = Task::new("t1", "title", "desc", 5, BTreeSet::new(), 0);
    assert_eq!(t.status, TaskStatus::Pending);
    assert!(t.assigned_to.is_none());
    assert_eq!(t.queue_priority(), QueuePriority::Normal);
}

#[test]
fn assign_transitions_to_in_progress() {
    let mut t = Task::new("t1", "title", "desc", 5, BTreeSet::new(), 0);
    t.assign("worker-1");
    assert_eq!(t.status, TaskStatus::InProgress);
    assert_eq!(t.assigned_to.as_deref(), Some("worker-1"));
}

#[test]
fn legal_transitions_from_pending() {
    assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
    assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Cancelled));
    assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
}

#[test]
fn legal_transitions_from_in_progress() {
    assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Completed));
    assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Failed));
    assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Cancelled));
    assert!(!TaskStatus::InProgress.can_transition_to(TaskStatus::Pending));
}

#[test]
fn terminal_states_accept_no_further_transitions() {
    for terminal in [TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Cancelled] {
        assert!(terminal.is_terminal());
        assert!(!terminal.can_transition_to(TaskStatus::Cancelled));
        assert!(!terminal.can_transition_to(TaskStatus::InProgress));
    }
}