// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;
use tempfile::tempdir;

fn config(workspace: &std::path::Path, script: &str) -> SupervisorConfig {
    SupervisorConfig {
        workspace_path: workspace.to_path_buf(),
        command: "sh".into(),
        args: vec!["-c".into(), script.into()],
        env: Vec::new(),
        ready_signal: Some("READY".into()),
        start_timeout: Duration::from_secs(5),
        max_retries: 2,
        restart_delay: Duration::from_millis(20),
        stop_grace: Duration::from_millis(200),
        stop_timeout: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn start_resolves_once_ready_signal_seen() {
    let dir = tempdir().unwrap();
    let sup = ProcessSupervisor::new(config(
        dir.path(),
        "echo READY; while true; do sleep 1; done",
    ));
    sup.start().await.unwrap();
    assert!(sup.is_running());
    assert_eq!(sup.process_info().status, ProcessStatus::Running);
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn start_without_ready_signal_resolves_immediately() {
    let dir = tempdir().unwrap();
    let mut cfg = config(dir.path(), "while true; do sleep 1; done");
    cfg.ready_signal = None;
    let sup = ProcessSupervisor::new(cfg);
    sup.start().await.unwrap();
    assert!(sup.is_running());
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn start_twice_fails_with_already_running() {
    let dir = tempdir().unwrap();
    let sup = ProcessSupervisor::new(config(dir.path(), "echo READY; sleep 5"));
    sup.start().await.unwrap();
    let err = sup.start().await.unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning));
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn stop_is_idempotent() {
    let dir = tempdir().unwrap();
    let sup = ProcessSupervisor::new(config(dir.path(), "echo READY; sleep 5"));
    sup.start().await.unwrap();
    sup.stop().await.unwrap();
    sup.stop().await.unwrap();
    assert!(!sup.is_running());
}

#[tokio::test]
async fn output_lines_are_published_as_events() {
    let dir = tempdir().unwrap();
    let sup = ProcessSupervisor::new(config(
        dir.path(),
        "echo READY; echo hello-from-child; sleep 5",
    ));
    let mut rx = sup.subscribe();
    sup.start().await.unwrap();

    let mut saw_output = false;
    for _ in 0..20 {
        match tokio::time::timeout(Duration::from_millis(500), rx.recv()).await {
            Ok(Ok(SupervisorEvent::Output(line))) if line.contains("hello-from-child") => {
                saw_output = true;
                break;
            }
            Ok(Ok(_)) => continue,
            _ => break,
        }
    }
    assert!(saw_output, "expected to observe the child's stdout line");
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn stderr_increments_error_count_without_status_change() {
    let dir = tempdir().unwrap();
    let sup = ProcessSupervisor::new(config(
        dir.path(),
        "echo READY; echo whoops 1>&2; sleep 5",
    ));
    sup.start().await.unwrap();

    for _ in 0..20 {
        if sup.process_info().error_count > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert!(sup.process_info().error_count > 0);
    assert_eq!(sup.process_info().status, ProcessStatus::Running);
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn crash_below_max_retries_restarts() {
    let dir = tempdir().unwrap();
    // Exits immediately after announcing readiness; should be respawned.
    let sup = ProcessSupervisor::new(config(dir.path(), "echo READY; exit 1"));
    let mut rx = sup.subscribe();
    sup.start().await.unwrap();

    let mut saw_restart = false;
    for _ in 0..40 {
        match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
            Ok(Ok(SupervisorEvent::Restart(_))) => {
                saw_restart = true;
                break;
            }
            Ok(Ok(_)) => continue,
            _ => break,
        }
    }
    assert!(saw_restart, "expected at least one Restart event");
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn spawn_failure_surfaces_as_error() {
    let dir = tempdir().unwrap();
    let cfg = SupervisorConfig {
        workspace_path: dir.path().to_path_buf(),
        command: "/nonexistent/binary-foreman-test".into(),
        args: Vec::new(),
        env: Vec::new(),
        ready_signal: None,
        start_timeout: Duration::from_secs(1),
        max_retries: 0,
        restart_delay: Duration::from_millis(10),
        stop_grace: Duration::from_millis(50),
        stop_timeout: Duration::from_millis(50),
    };
    let sup = ProcessSupervisor::new(cfg);
    let err = sup.start().await.unwrap_err();
    assert!(matches!(err, SupervisorError::SpawnFailed(_)));
    assert_eq!(sup.process_info().error_count, 1);
}

#[tokio::test]
async fn creates_workspace_directory_if_missing() {
    let dir = tempdir().unwrap();
    let workspace = dir.path().join("nested").join("workspace");
    assert!(!workspace.exists());
    let sup = ProcessSupervisor::new(config(&workspace, "echo READY; sleep 5"));
    sup.start().await.unwrap();
    assert!(workspace.exists());
    sup.stop().await.unwrap();
}
