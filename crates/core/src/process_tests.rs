// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;

#[test]
fn default_process_info_is_stopped_with_zero_counters() {
    let info = ProcessInfo::default();
    assert_eq!(info.status, ProcessStatus::Stopped);
    assert_eq!(info.restart_count, 0);
    assert_eq!(info.error_count, 0);
    assert!(info.pid.is_none());
}

#[test]
fn only_running_is_available() {
    assert!(ProcessStatus::Running.is_available());
    for s in [
        ProcessStatus::Stopped,
        ProcessStatus::Starting,
        ProcessStatus::Error,
        ProcessStatus::Restarting,
    ] {
        assert!(!s.is_available());
    }
}