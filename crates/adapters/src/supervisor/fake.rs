// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Deterministic supervisor double for testing the multiplexer and the
//! controllers without spawning real child processes.

use super::{SupervisorAdapter, SupervisorError};
use async_trait::async_trait;
use foreman_core::{ProcessInfo, ProcessStatus, SupervisorEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorCall {
    Start,
    Stop,
    Restart,
    SendLine(String),
}

struct Inner {
    info: ProcessInfo,
    calls: Vec<SupervisorCall>,
    start_error: Option<SupervisorError>,
    send_line_error: Option<SupervisorError>,
    sent_lines: Vec<String>,
}

/// Test double for [`super::SupervisorAdapter`]. Starts in `Stopped`;
/// `start()` transitions straight to `Running` (no spawn, no readiness
/// wait) unless a `start_error` has been armed.
#[derive(Clone)]
pub struct FakeSupervisor {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<SupervisorEvent>,
}

impl Default for FakeSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSupervisor {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                info: ProcessInfo::default(),
                calls: Vec::new(),
                start_error: None,
                send_line_error: None,
                sent_lines: Vec::new(),
            })),
            events,
        }
    }

    pub fn calls(&self) -> Vec<SupervisorCall> {
        self.inner.lock().calls.clone()
    }

    pub fn sent_lines(&self) -> Vec<String> {
        self.inner.lock().sent_lines.clone()
    }

    pub fn set_start_error(&self, error: SupervisorError) {
        self.inner.lock().start_error = Some(error);
    }

    pub fn set_send_line_error(&self, error: SupervisorError) {
        self.inner.lock().send_line_error = Some(error);
    }

    /// Inject a line as if the child had written it to stdout.
    pub fn emit_output(&self, line: impl Into<String>) {
        let _ = self.events.send(SupervisorEvent::Output(line.into()));
    }

    pub fn emit_error(&self, line: impl Into<String>) {
        let _ = self.events.send(SupervisorEvent::Error(line.into()));
    }

    /// Force a status transition and publish the corresponding event, as
    /// if the supervised process itself had crashed or been stopped.
    pub fn force_status(&self, status: ProcessStatus) {
        self.inner.lock().info.status = status;
        let _ = self.events.send(SupervisorEvent::StatusChange(status));
    }
}

#[async_trait]
impl SupervisorAdapter for FakeSupervisor {
    async fn start(&self) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SupervisorCall::Start);
        if let Some(error) = inner.start_error.take() {
            return Err(error);
        }
        inner.info.status = ProcessStatus::Running;
        drop(inner);
        let _ = self
            .events
            .send(SupervisorEvent::StatusChange(ProcessStatus::Running));
        Ok(())
    }

    async fn stop(&self) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SupervisorCall::Stop);
        inner.info.status = ProcessStatus::Stopped;
        drop(inner);
        let _ = self
            .events
            .send(SupervisorEvent::StatusChange(ProcessStatus::Stopped));
        Ok(())
    }

    async fn restart(&self) -> Result<(), SupervisorError> {
        self.inner.lock().calls.push(SupervisorCall::Restart);
        SupervisorAdapter::stop(self).await?;
        SupervisorAdapter::start(self).await
    }

    fn is_running(&self) -> bool {
        self.inner.lock().info.status.is_available()
    }

    fn process_info(&self) -> ProcessInfo {
        self.inner.lock().info.clone()
    }

    async fn send_line(&self, line: &str) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SupervisorCall::SendLine(line.to_string()));
        if let Some(error) = inner.send_line_error.take() {
            return Err(error);
        }
        inner.sent_lines.push(line.to_string());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
