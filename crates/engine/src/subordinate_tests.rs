// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;
use crate::multiplexer::{CommandMultiplexer, MuxConfig};
use foreman_adapters::FakeSupervisor;
use foreman_core::{FakeClock, ProcessStatus, SequentialIdGen, Task};
use foreman_queue::{AddTaskOptions, FakeTaskQueue, TaskQueue};
use std::sync::Arc;
use std::time::Duration;

type TestMux = CommandMultiplexer<FakeSupervisor, FakeClock, SequentialIdGen>;
type TestQueue = FakeTaskQueue<SequentialIdGen, FakeClock>;
type TestSub = SubordinateController<FakeSupervisor, FakeClock, SequentialIdGen, TestQueue>;

fn subordinate() -> (TestSub, Arc<FakeSupervisor>, Arc<TestQueue>) {
    let supervisor = Arc::new(FakeSupervisor::new());
    supervisor.force_status(ProcessStatus::Running);
    let mux: TestMux = CommandMultiplexer::new(
        supervisor.clone(),
        FakeClock::new(1_000),
        SequentialIdGen::new("cmd"),
        MuxConfig::default(),
    );
    let queue = Arc::new(FakeTaskQueue::new(SequentialIdGen::new("job"), FakeClock::new(1_000)));
    let sub = SubordinateController::new(mux, queue.clone(), FakeClock::new(2_000), "agent-a");
    (sub, supervisor, queue)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn fetch_and_execute_task_returns_none_when_queue_is_empty() {
    let (sub, _supervisor, _queue) = subordinate();
    assert!(sub.fetch_and_execute_task().await.unwrap().is_none());
}

#[tokio::test]
async fn fetch_and_execute_task_runs_exec_then_unit_test_prompts_and_submits_result() {
    let (sub, supervisor, queue) = subordinate();
    queue
        .add_task(
            Task::new("t1", "Title", "Description", 5, Default::default(), 1_000),
            AddTaskOptions::default(),
        )
        .await
        .unwrap();

    let mut events = sub.subscribe();
    let call = tokio::spawn(async move { sub.fetch_and_execute_task().await });

    settle().await;
    supervisor.emit_output(
        r#"[RESP:cmd-1] [{"filePath":"src/lib.rs","action":"update","content":"fn x() {}","diff":null}]"#,
    );
    settle().await;
    supervisor.emit_output(
        r#"[RESP:cmd-2] {"testType":"unit","passed":true,"total":1,"passedCount":1,"failedCount":0,"executionTime":42,"details":[]}"#,
    );

    let result = call.await.unwrap().unwrap().unwrap();
    assert_eq!(result.task_id, foreman_core::TaskId::new("t1"));
    assert_eq!(result.code_changes.len(), 1);
    assert!(result.test_results.passed);

    assert!(queue.result_for(&foreman_core::TaskId::new("t1")).is_some());

    let started = events.recv().await.unwrap();
    assert!(matches!(started, foreman_core::SubordinateEvent::TaskStarted { .. }));
    let completed = events.recv().await.unwrap();
    assert!(matches!(completed, foreman_core::SubordinateEvent::TaskCompleted { .. }));
}

#[tokio::test]
async fn fetch_and_execute_task_fails_the_job_when_execution_prompt_is_not_valid_json() {
    let (sub, supervisor, queue) = subordinate();
    queue
        .add_task(
            Task::new("t1", "Title", "Description", 5, Default::default(), 1_000),
            AddTaskOptions::default(),
        )
        .await
        .unwrap();

    let mut events = sub.subscribe();
    let call = tokio::spawn(async move { sub.fetch_and_execute_task().await });
    settle().await;
    supervisor.emit_output("[RESP:cmd-1] not json");

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, ControllerError::Mux(crate::error::MuxError::ProtocolError(_))));

    let job = queue
        .snapshot()
        .into_iter()
        .find(|j| j.task_id().as_str() == "t1")
        .unwrap();
    assert_eq!(job.state, foreman_core::JobState::Delayed);

    let started = events.recv().await.unwrap();
    assert!(matches!(started, foreman_core::SubordinateEvent::TaskStarted { .. }));
    let failed = events.recv().await.unwrap();
    assert!(matches!(failed, foreman_core::SubordinateEvent::TaskFailed { .. }));
}

#[tokio::test]
async fn cleanup_emits_task_interrupted_for_the_in_flight_task_without_failing_it() {
    let (sub, supervisor, queue) = subordinate();
    queue
        .add_task(
            Task::new("t1", "Title", "Description", 5, Default::default(), 1_000),
            AddTaskOptions::default(),
        )
        .await
        .unwrap();

    let mut events = sub.subscribe();
    let sub = Arc::new(sub);
    let call = tokio::spawn({
        let sub = sub.clone();
        async move { sub.fetch_and_execute_task().await }
    });
    settle().await;
    // Never answer the exec prompt: interrupt mid-flight instead.
    sub.cleanup().await;

    let started = events.recv().await.unwrap();
    assert!(matches!(started, foreman_core::SubordinateEvent::TaskStarted { .. }));
    let interrupted = events.recv().await.unwrap();
    assert!(matches!(
        interrupted,
        foreman_core::SubordinateEvent::TaskInterrupted { .. }
    ));

    let job = queue
        .snapshot()
        .into_iter()
        .find(|j| j.task_id().as_str() == "t1")
        .unwrap();
    assert_eq!(job.state, foreman_core::JobState::Active);

    // The in-flight exec prompt was cancelled by `cleanup`'s mux.cleanup().
    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, ControllerError::Mux(crate::error::MuxError::Cancelled)));
    assert_eq!(supervisor.sent_lines().len(), 1);
}
