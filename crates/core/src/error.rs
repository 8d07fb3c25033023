// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! The shared error taxonomy (§7 of the design).
//!
//! Every crate defines its own `thiserror` error enum for its own operations
//! (`SupervisorError`, `MuxError`, `QueueError`, `ControllerError`, ...), but
//! each implements [`HasErrorKind`] so that a single, closed vocabulary of
//! kinds reaches the CLI and the logs no matter which crate raised it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The nine error kinds named in the design. Not a type hierarchy — a flat
/// classification so that operators never need to know which crate failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed entity at a boundary. Rejected, never retried.
    Validation,
    /// Exceeded a deadline. Retried if eligible, else surfaced.
    Timeout,
    /// Child process crashed, stopped, or errored.
    ProcessUnavailable,
    /// Response unparseable when JSON was required.
    ProtocolError,
    /// Explicit cancellation. Never retried.
    Cancelled,
    /// Child stdin not writable.
    StreamError,
    /// Topological sort detected a cycle.
    CircularDependency,
    /// Completion submitted for a job that is not active, or IDs disagree.
    ResultMismatch,
    /// Durable store unreachable, or a store-level invariant was broken.
    QueueError,
}

impl ErrorKind {
    /// Whether a failure of this kind may ever be retried by its owning
    /// component. Purely advisory — retry eligibility also depends on
    /// caller-supplied budgets (`retryOnError`, `maxAttempts`, ...).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::ProcessUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ProcessUnavailable => "process_unavailable",
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::StreamError => "stream_error",
            ErrorKind::CircularDependency => "circular_dependency",
            ErrorKind::ResultMismatch => "result_mismatch",
            ErrorKind::QueueError => "queue_error",
        };
        write!(f, "{s}")
    }
}

/// Implemented by every crate-local error enum so that the nine kinds above
/// are the sole classification surface seen by callers, dashboards, and logs.
pub trait HasErrorKind {
    fn kind(&self) -> ErrorKind;
}

/// A boundary validation failure: a field path and a human-readable reason.
///
/// Used by [`crate::validate`] for every entity. The `field` path mirrors the
/// positional notation from the design (`tasks[3].priority`).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("validation failed at `{field}`: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl HasErrorKind for ValidationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
