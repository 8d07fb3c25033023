// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;

#[test]
fn validation_error_reports_field_and_message() {
    let err = ValidationError::new("tasks[3].priority", "must be finite");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("tasks[3].priority"));
    assert!(err.to_string().contains("must be finite"));
}

#[test]
fn retryable_kinds_are_exactly_timeout_and_process_unavailable() {
    assert!(ErrorKind::Timeout.is_retryable());
    assert!(ErrorKind::ProcessUnavailable.is_retryable());
    assert!(!ErrorKind::Validation.is_retryable());
    assert!(!ErrorKind::Cancelled.is_retryable());
    assert!(!ErrorKind::CircularDependency.is_retryable());
    assert!(!ErrorKind::ResultMismatch.is_retryable());
    assert!(!ErrorKind::QueueError.is_retryable());
    assert!(!ErrorKind::StreamError.is_retryable());
    assert!(!ErrorKind::ProtocolError.is_retryable());
}

#[test]
fn display_is_snake_case() {
    assert_eq!(ErrorKind::ProcessUnavailable.to_string(), "process_unavailable");
    assert_eq!(ErrorKind::CircularDependency.to_string(), "circular_dependency");
}