// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;
use foreman_adapters::FakeSupervisor;
use foreman_core::{FakeClock, ProcessStatus, SequentialIdGen};
use std::sync::Arc;
use std::time::Duration;

type TestMux = CommandMultiplexer<FakeSupervisor, FakeClock, SequentialIdGen>;

fn running_mux() -> (TestMux, Arc<FakeSupervisor>) {
    let supervisor = Arc::new(FakeSupervisor::new());
    supervisor.force_status(ProcessStatus::Running);
    let mux = CommandMultiplexer::new(
        supervisor.clone(),
        FakeClock::new(1_000),
        SequentialIdGen::new("cmd"),
        MuxConfig::default(),
    );
    (mux, supervisor)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn dispatches_a_single_command_as_a_prefixed_line() {
    let (mux, supervisor) = running_mux();
    let send = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("do the thing", CommandOptions::default()).await }
    });
    settle().await;
    let sent = supervisor.sent_lines();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("[CMD:cmd-1] do the thing"));
    supervisor.emit_output("[RESP:cmd-1] {\"ok\":true}");
    let response = send.await.unwrap().unwrap();
    assert!(response.success);
    match response.data {
        Some(Payload::Json { value }) => assert_eq!(value["ok"], true),
        other => panic!("expected json payload, got {other:?}"),
    }
}

#[tokio::test]
async fn respects_max_concurrent_slots() {
    let (mux, supervisor) = running_mux();
    let config = MuxConfig {
        max_concurrent: 1,
        ..MuxConfig::default()
    };
    let supervisor2 = Arc::new(FakeSupervisor::new());
    supervisor2.force_status(ProcessStatus::Running);
    let mux = CommandMultiplexer::new(
        supervisor2.clone(),
        FakeClock::new(1_000),
        SequentialIdGen::new("cmd"),
        config,
    );
    let _ = supervisor;

    let h1 = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("first", CommandOptions::default()).await }
    });
    let h2 = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("second", CommandOptions::default()).await }
    });
    settle().await;
    assert_eq!(supervisor2.sent_lines().len(), 1);
    assert_eq!(mux.status().queued, 1);

    supervisor2.emit_output("[RESP:cmd-1] done");
    settle().await;
    assert_eq!(supervisor2.sent_lines().len(), 2);

    supervisor2.emit_output("[RESP:cmd-2] done");
    assert!(h1.await.unwrap().is_ok());
    assert!(h2.await.unwrap().is_ok());
}

#[tokio::test]
async fn higher_priority_commands_dispatch_before_lower_with_fifo_ties() {
    let supervisor = Arc::new(FakeSupervisor::new());
    supervisor.force_status(ProcessStatus::Running);
    let config = MuxConfig {
        max_concurrent: 1,
        ..MuxConfig::default()
    };
    let mux = CommandMultiplexer::new(
        supervisor.clone(),
        FakeClock::new(1_000),
        SequentialIdGen::new("cmd"),
        config,
    );

    // Occupy the single slot first so the next three all queue up.
    let occupant = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("occupant", CommandOptions::default()).await }
    });
    settle().await;

    let low = CommandOptions {
        priority: 1,
        ..CommandOptions::default()
    };
    let high = CommandOptions {
        priority: 10,
        ..CommandOptions::default()
    };
    let h_low_first = tokio::spawn({
        let mux = mux.clone();
        let low = low.clone();
        async move { mux.send("low-first", low).await }
    });
    settle().await;
    let h_high = tokio::spawn({
        let mux = mux.clone();
        let high = high.clone();
        async move { mux.send("high", high).await }
    });
    settle().await;
    let h_low_second = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("low-second", low).await }
    });
    settle().await;

    supervisor.emit_output("[RESP:cmd-1] done"); // frees the occupant's slot
    settle().await;

    // The high priority item should have been dispatched next, ahead of
    // the two same-priority items despite arriving after the first.
    let sent = supervisor.sent_lines();
    assert_eq!(sent[1], "[CMD:cmd-3] high");

    supervisor.emit_output("[RESP:cmd-3] done");
    settle().await;
    let sent = supervisor.sent_lines();
    assert_eq!(sent[2], "[CMD:cmd-2] low-first");

    supervisor.emit_output("[RESP:cmd-2] done");
    settle().await;
    let sent = supervisor.sent_lines();
    assert_eq!(sent[3], "[CMD:cmd-4] low-second");
    supervisor.emit_output("[RESP:cmd-4] done");

    occupant.await.unwrap().unwrap();
    h_low_first.await.unwrap().unwrap();
    h_high.await.unwrap().unwrap();
    h_low_second.await.unwrap().unwrap();
}

#[tokio::test]
async fn uncorrelated_output_falls_back_to_oldest_in_flight() {
    let (mux, supervisor) = running_mux();
    let h1 = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("first", CommandOptions::default()).await }
    });
    let h2 = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("second", CommandOptions::default()).await }
    });
    settle().await;

    supervisor.emit_output("plain text with no correlation prefix at all");
    let r1 = h1.await.unwrap().unwrap();
    assert!(r1.success);

    assert_eq!(mux.metrics().uncorrelated_responses, 1);

    supervisor.emit_output("[RESP:cmd-2] second done");
    h2.await.unwrap().unwrap();
}

#[tokio::test]
async fn recognizes_all_three_correlation_prefixes() {
    let (mux, supervisor) = running_mux();
    let h1 = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("a", CommandOptions::default()).await }
    });
    settle().await;
    supervisor.emit_output("[CMD:cmd-1] RESPONSE: all good");
    let r = h1.await.unwrap().unwrap();
    assert!(r.success);

    let h2 = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("b", CommandOptions::default()).await }
    });
    settle().await;
    supervisor.emit_output("Response for cmd-2: also good");
    let r = h2.await.unwrap().unwrap();
    assert!(r.success);
}

#[tokio::test]
async fn plain_text_without_json_is_classified_for_success_field() {
    let (mux, supervisor) = running_mux();
    let h = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("run", CommandOptions::default()).await }
    });
    settle().await;
    supervisor.emit_output("[RESP:cmd-1] operation failed: invalid input");
    let response = h.await.unwrap().unwrap();
    assert!(!response.success);
    assert!(response.error.is_some());
}

#[tokio::test]
async fn times_out_without_retry_when_retry_on_error_is_false() {
    let (mux, _supervisor) = running_mux();
    let options = CommandOptions {
        timeout_ms: 20,
        retry_on_error: false,
        ..CommandOptions::default()
    };
    let err = mux.send("slow", options).await.unwrap_err();
    assert!(matches!(err, MuxError::Timeout));
    assert_eq!(mux.metrics().timeouts, 1);
    assert_eq!(mux.metrics().failed, 1);
}

#[tokio::test]
async fn retries_on_timeout_when_eligible_then_succeeds() {
    let (mux, supervisor) = running_mux();
    let options = CommandOptions {
        timeout_ms: 30,
        retry_on_error: true,
        ..CommandOptions::default()
    };
    let handle = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("flaky", options).await }
    });
    // Let the first attempt time out and the retry dispatch.
    tokio::time::sleep(Duration::from_millis(60)).await;
    supervisor.emit_output("[RESP:cmd-1] recovered");
    let response = handle.await.unwrap().unwrap();
    assert!(response.success);
    assert_eq!(mux.metrics().retries, 1);
    // Resent on stdin under the same command id both times.
    let sent = supervisor.sent_lines();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
}

#[tokio::test]
async fn cancel_rejects_a_queued_command() {
    let supervisor = Arc::new(FakeSupervisor::new());
    supervisor.force_status(ProcessStatus::Running);
    let config = MuxConfig {
        max_concurrent: 1,
        ..MuxConfig::default()
    };
    let mux = CommandMultiplexer::new(
        supervisor.clone(),
        FakeClock::new(1_000),
        SequentialIdGen::new("cmd"),
        config,
    );
    let occupant = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("occupant", CommandOptions::default()).await }
    });
    settle().await;
    let queued = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("queued", CommandOptions::default()).await }
    });
    settle().await;
    assert!(mux.cancel("cmd-2"));
    let err = queued.await.unwrap().unwrap_err();
    assert!(matches!(err, MuxError::Cancelled));

    supervisor.emit_output("[RESP:cmd-1] done");
    occupant.await.unwrap().unwrap();
}

#[tokio::test]
async fn status_change_to_error_rejects_every_in_flight_command() {
    let (mux, supervisor) = running_mux();
    let handle = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("doomed", CommandOptions::default()).await }
    });
    settle().await;
    supervisor.force_status(ProcessStatus::Error);
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, MuxError::ProcessUnavailable));
}

#[tokio::test]
async fn send_many_is_all_or_none() {
    let (mux, supervisor) = running_mux();
    let handle = tokio::spawn({
        let mux = mux.clone();
        async move {
            mux.send_many(
                vec!["a".to_string(), "b".to_string()],
                CommandOptions {
                    timeout_ms: 50,
                    ..CommandOptions::default()
                },
            )
            .await
        }
    });
    settle().await;
    supervisor.emit_output("[RESP:cmd-1] ok");
    // cmd-2 never resolves before its timeout -> whole call fails.
    let result = handle.await.unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn send_batch_preserves_result_order() {
    let (mux, supervisor) = running_mux();
    let handle = tokio::spawn({
        let mux = mux.clone();
        async move {
            mux.send_batch(
                vec!["a".to_string(), "b".to_string(), "c".to_string()],
                CommandOptions::default(),
                BatchOptions {
                    max_concurrency: 3,
                    stop_on_error: false,
                    on_progress: None,
                },
            )
            .await
        }
    });
    settle().await;
    for i in 1..=3 {
        supervisor.emit_output(&format!("[RESP:cmd-{i}] done-{i}"));
    }
    let results = handle.await.unwrap();
    assert_eq!(results.len(), 3);
    for r in results {
        assert!(r.unwrap().success);
    }
}

#[tokio::test]
async fn send_stream_forwards_chunks_until_end_marker() {
    let (mux, supervisor) = running_mux();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send_stream("stream it", tx, CommandOptions::default()).await }
    });
    settle().await;
    supervisor.emit_output("[RESP:cmd-1] chunk one");
    supervisor.emit_output("[RESP:cmd-1] chunk two");
    supervisor.emit_output("[RESP:cmd-1] [STREAM_END]");

    let mut chunks = Vec::new();
    while let Ok(chunk) = rx.try_recv() {
        chunks.push(chunk);
    }
    assert_eq!(chunks, vec!["chunk one", "chunk two"]);
    let response = handle.await.unwrap().unwrap();
    assert!(response.success);
    assert!(response.data.is_none());
}

#[tokio::test]
async fn command_status_reports_queued_position_and_pending() {
    let supervisor = Arc::new(FakeSupervisor::new());
    supervisor.force_status(ProcessStatus::Running);
    let config = MuxConfig {
        max_concurrent: 1,
        ..MuxConfig::default()
    };
    let mux = CommandMultiplexer::new(
        supervisor.clone(),
        FakeClock::new(1_000),
        SequentialIdGen::new("cmd"),
        config,
    );
    let occupant = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("occupant", CommandOptions::default()).await }
    });
    settle().await;
    let queued = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("queued", CommandOptions::default()).await }
    });
    settle().await;

    assert!(matches!(
        mux.command_status("cmd-1"),
        CommandStatus::Pending { retry_count: 0 }
    ));
    assert!(matches!(
        mux.command_status("cmd-2"),
        CommandStatus::Queued { position: 1 }
    ));
    assert!(matches!(mux.command_status("cmd-999"), CommandStatus::NotFound));

    supervisor.emit_output("[RESP:cmd-1] done");
    settle().await;
    supervisor.emit_output("[RESP:cmd-2] done");
    occupant.await.unwrap().unwrap();
    queued.await.unwrap().unwrap();
}

#[tokio::test]
async fn detailed_stats_guards_against_division_by_zero() {
    let (mux, _supervisor) = running_mux();
    let stats = mux.detailed_stats();
    assert_eq!(stats.success_rate, 0.0);
    assert_eq!(stats.timeout_rate, 0.0);
}

#[tokio::test]
async fn cleanup_rejects_outstanding_work_and_stops_accepting_new_commands() {
    let (mux, supervisor) = running_mux();
    let handle = tokio::spawn({
        let mux = mux.clone();
        async move { mux.send("pending", CommandOptions::default()).await }
    });
    settle().await;
    mux.cleanup();
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, MuxError::Cancelled));

    let err = mux.send("after cleanup", CommandOptions::default()).await.unwrap_err();
    assert!(matches!(err, MuxError::Cancelled));
    let _ = supervisor;
}
