// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! The `Task` entity (§3) and its queue-priority mapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

crate::define_id! {
    /// Unique identifier for a task.
    #[derive(PartialOrd, Ord)]
    pub struct TaskId;
}

/// Lifecycle status of a [`Task`]. Transitions: `Pending -> InProgress`
/// (on assignment), `InProgress -> {Completed, Failed}`, any non-terminal
/// state `-> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses can never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Pending, InProgress) => true,
            (InProgress, Completed) | (InProgress, Failed) => true,
            (s, Cancelled) => !s.is_terminal(),
            _ => false,
        }
    }
}

/// Queue-priority band a task is mapped into (§3). Higher bands are dequeued
/// first; within a band, FIFO order by enqueue time applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePriority {
    Background,
    Low,
    Normal,
    High,
    Critical,
}

impl QueuePriority {
    /// Map a raw task priority (0 = lowest) onto a queue-priority band.
    pub fn from_task_priority(priority: u32) -> Self {
        match priority {
            9.. => QueuePriority::Critical,
            7..=8 => QueuePriority::High,
            5..=6 => QueuePriority::Normal,
            3..=4 => QueuePriority::Low,
            _ => QueuePriority::Background,
        }
    }

    /// Numeric rank used for ordering in the durable store (higher first).
    pub fn rank(&self) -> i64 {
        match self {
            QueuePriority::Background => 0,
            QueuePriority::Low => 1,
            QueuePriority::Normal => 2,
            QueuePriority::High => 3,
            QueuePriority::Critical => 4,
        }
    }
}

/// A unit of work decomposed by the Boss and executed by a Subordinate.
///
/// Immutable after creation except `assignedTo` and `status`, which the
/// queue mutates as the task moves through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub priority: u32,
    pub dependencies: BTreeSet<TaskId>,
    pub assigned_to: Option<String>,
    pub status: TaskStatus,
    pub created_at_ms: u64,
    pub deadline_ms: Option<u64>,
}

impl Task {
    /// Construct a new, unassigned, pending task.
    pub fn new(
        id: impl Into<TaskId>,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: u32,
        dependencies: BTreeSet<TaskId>,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            priority,
            dependencies,
            assigned_to: None,
            status: TaskStatus::Pending,
            created_at_ms,
            deadline_ms: None,
        }
    }

    pub fn queue_priority(&self) -> QueuePriority {
        QueuePriority::from_task_priority(self.priority)
    }

    /// Mark this task assigned and running.
    pub fn assign(&mut self, worker_id: impl Into<String>) {
        self.assigned_to = Some(worker_id.into());
        self.status = TaskStatus::InProgress;
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
