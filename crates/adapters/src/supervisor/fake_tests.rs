// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;

#[tokio::test]
async fn start_transitions_to_running_and_records_call() {
    let sup = FakeSupervisor::new();
    sup.start().await.unwrap();
    assert!(sup.is_running());
    assert_eq!(sup.calls(), vec![SupervisorCall::Start]);
}

#[tokio::test]
async fn start_error_is_consumed_once() {
    let sup = FakeSupervisor::new();
    sup.set_start_error(SupervisorError::AlreadyRunning);
    assert!(sup.start().await.is_err());
    assert!(sup.start().await.is_ok());
}

#[tokio::test]
async fn send_line_records_sent_lines() {
    let sup = FakeSupervisor::new();
    sup.send_line("[CMD:1] hello").await.unwrap();
    assert_eq!(sup.sent_lines(), vec!["[CMD:1] hello".to_string()]);
}

#[tokio::test]
async fn emitted_output_reaches_subscribers() {
    let sup = FakeSupervisor::new();
    let mut rx = sup.subscribe();
    sup.emit_output("hello");
    match rx.recv().await.unwrap() {
        SupervisorEvent::Output(line) => assert_eq!(line, "hello"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn force_status_publishes_status_change() {
    let sup = FakeSupervisor::new();
    let mut rx = sup.subscribe();
    sup.force_status(ProcessStatus::Error);
    match rx.recv().await.unwrap() {
        SupervisorEvent::StatusChange(ProcessStatus::Error) => {}
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(!sup.is_running());
}
