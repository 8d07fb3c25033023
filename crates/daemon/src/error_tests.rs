// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;
use foreman_core::ValidationError;
use foreman_engine::{ControllerError, MuxError, ShellExecError};
use foreman_queue::QueueError;

#[test]
fn cli_unavailable_maps_to_exit_code_two() {
    let err = DaemonError::from_init(ControllerError::ShellExec(ShellExecError::CliUnavailable));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn process_unavailable_at_init_maps_to_exit_code_two() {
    let err = DaemonError::from_init(ControllerError::Mux(MuxError::ProcessUnavailable));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn other_init_failures_map_to_exit_code_one() {
    let err = DaemonError::from_init(ControllerError::Io("disk full".to_string()));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn config_error_maps_to_exit_code_one() {
    let err: DaemonError = ValidationError::new("agent_id", "must not be empty").into();
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn queue_error_maps_to_exit_code_one() {
    let err: DaemonError = QueueError::NotFound("job-1".to_string()).into();
    assert_eq!(err.exit_code(), 1);
}
