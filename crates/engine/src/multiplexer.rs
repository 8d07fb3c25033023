// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Command Multiplexer (§4.B): overlays a request/reply protocol on top of
//! the raw line-oriented stream a [`SupervisorAdapter`] exposes.
//!
//! No command owns a background timer task. Each `send` wraps its own wait
//! on a `oneshot::Receiver` in `tokio::time::timeout`, so the timeout lives
//! entirely on the caller's own task and is never leaked if the caller is
//! dropped.

use crate::error::MuxError;
use foreman_adapters::SupervisorAdapter;
use foreman_core::{
    classify_text_payload, Clock, Command, CommandId, CommandOptions, CommandStatus, DetailedStats,
    IdGen, MuxMetrics, Payload, ProcessInfo, Response, SupervisorEvent, TextClassification,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Semaphore};
use tokio_util::sync::CancellationToken;

const STREAM_END_MARKER: &str = "[STREAM_END]";

/// Tunables for the scheduler; distinct from the per-command
/// [`CommandOptions`].
#[derive(Debug, Clone)]
pub struct MuxConfig {
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

/// Snapshot returned by `sendBatch`'s progress channel.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

/// Options for `sendBatch` (§4.B.4). `on_progress` is a channel rather than
/// a callback so progress can be observed from the caller's own task.
#[derive(Clone, Default)]
pub struct BatchOptions {
    pub max_concurrency: usize,
    pub stop_on_error: bool,
    pub on_progress: Option<mpsc::UnboundedSender<BatchProgress>>,
}

/// Combined process + scheduler status (`status()`).
#[derive(Debug, Clone)]
pub struct MuxStatus {
    pub process: ProcessInfo,
    pub queued: usize,
    pub in_flight: usize,
}

struct Pending {
    command: Command,
    responder: Option<oneshot::Sender<Result<Response, MuxError>>>,
    stream_tx: Option<mpsc::UnboundedSender<String>>,
    dispatched_at_ms: Option<u64>,
}

impl Pending {
    fn resolve(mut self, result: Result<Response, MuxError>) {
        if let Some(tx) = self.responder.take() {
            let _ = tx.send(result);
        }
    }
}

struct Inner {
    queue: Vec<Pending>,
    in_flight: HashMap<CommandId, Pending>,
    metrics: MuxMetrics,
    cleaned_up: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            queue: Vec::new(),
            in_flight: HashMap::new(),
            metrics: MuxMetrics::default(),
            cleaned_up: false,
        }
    }

    /// Preserves descending-priority order, stable among equal priorities
    /// (new entries land after every existing entry of equal or higher
    /// priority, i.e. FIFO within a priority band).
    fn insert_queued(&mut self, entry: Pending) {
        let priority = entry.command.options.priority;
        let pos = self
            .queue
            .partition_point(|p| p.command.options.priority >= priority);
        self.queue.insert(pos, entry);
    }

    fn record_completion(&mut self, success: bool, exec_ms: u64, queue_wait_ms: f64, now: u64) {
        self.metrics.total += 1;
        if success {
            self.metrics.successful += 1;
        } else {
            self.metrics.failed += 1;
        }
        self.metrics.total_execution_ms += exec_ms;
        let n = self.metrics.total as f64;
        self.metrics.avg_queue_wait_ms += (queue_wait_ms - self.metrics.avg_queue_wait_ms) / n;
        self.metrics.last_command_at_ms = Some(now);
    }

    fn oldest_in_flight(&self) -> Option<CommandId> {
        self.in_flight
            .values()
            .min_by_key(|p| p.dispatched_at_ms.unwrap_or(u64::MAX))
            .map(|p| p.command.id.clone())
    }
}

/// Precompiled correlation patterns (§4.B "Response correlation"), tried in
/// priority order against each incoming line.
struct CorrelationPatterns {
    resp_bracket: regex::Regex,
    cmd_response: regex::Regex,
    response_for: regex::Regex,
}

impl CorrelationPatterns {
    #[allow(clippy::expect_used)] // compile-time-constant patterns, known valid
    fn new() -> Self {
        Self {
            resp_bracket: regex::Regex::new(r"^\[RESP:([^\]]+)\]\s*(.*)$")
                .expect("static correlation pattern is valid"),
            cmd_response: regex::Regex::new(r"^\[CMD:([^\]]+)\]\s*RESPONSE:\s*(.*)$")
                .expect("static correlation pattern is valid"),
            response_for: regex::Regex::new(r"^Response for ([^:]+):\s*(.*)$")
                .expect("static correlation pattern is valid"),
        }
    }

    /// Returns the correlated command id (if the line carried one) and the
    /// remaining payload body.
    fn parse<'a>(&self, line: &'a str) -> (Option<String>, &'a str) {
        for re in [&self.resp_bracket, &self.cmd_response, &self.response_for] {
            if let Some(caps) = re.captures(line) {
                let id = caps.get(1).map(|m| m.as_str().trim().to_string());
                let body = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim();
                return (id, body);
            }
        }
        (None, line.trim())
    }
}

fn classify_payload(body: &str) -> Payload {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => Payload::Json { value },
        Err(_) => classify_text_payload(body),
    }
}

fn payload_is_success(payload: &Payload) -> bool {
    match payload {
        Payload::Json { .. } => true,
        Payload::Text { classification, .. } => !matches!(classification, TextClassification::Error),
    }
}

/// Overlays request/reply semantics on one supervised child process.
/// Cheap to clone: all state lives behind `Arc`.
pub struct CommandMultiplexer<S, C, I> {
    supervisor: Arc<S>,
    clock: C,
    idgen: I,
    config: MuxConfig,
    patterns: Arc<CorrelationPatterns>,
    inner: Arc<parking_lot::Mutex<Inner>>,
    started_at_ms: u64,
    cancel: CancellationToken,
}

impl<S, C, I> Clone for CommandMultiplexer<S, C, I>
where
    C: Clone,
    I: Clone,
{
    fn clone(&self) -> Self {
        Self {
            supervisor: self.supervisor.clone(),
            clock: self.clock.clone(),
            idgen: self.idgen.clone(),
            config: self.config.clone(),
            patterns: self.patterns.clone(),
            inner: self.inner.clone(),
            started_at_ms: self.started_at_ms,
            cancel: self.cancel.clone(),
        }
    }
}

impl<S, C, I> CommandMultiplexer<S, C, I>
where
    S: SupervisorAdapter,
    C: Clock,
    I: IdGen + 'static,
{
    pub fn new(supervisor: Arc<S>, clock: C, idgen: I, config: MuxConfig) -> Self {
        let started_at_ms = clock.epoch_ms();
        let mux = Self {
            supervisor,
            clock,
            idgen,
            config,
            patterns: Arc::new(CorrelationPatterns::new()),
            inner: Arc::new(parking_lot::Mutex::new(Inner::new())),
            started_at_ms,
            cancel: CancellationToken::new(),
        };
        mux.spawn_correlator();
        mux
    }

    fn spawn_correlator(&self) {
        let mux = self.clone();
        let mut events = self.supervisor.subscribe();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => {
                        match event {
                            Ok(ev) => mux.handle_event(ev).await,
                            Err(broadcast::error::RecvError::Closed) => break,
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        }
                    }
                }
            }
        });
    }

    async fn handle_event(&self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Output(line) => self.handle_output(&line),
            SupervisorEvent::StatusChange(status) if !status.is_available() => {
                self.reject_all(MuxError::ProcessUnavailable);
            }
            SupervisorEvent::StatusChange(_) => self.pump().await,
            SupervisorEvent::Error(_) | SupervisorEvent::Restart(_) => {}
        }
        self.pump().await;
    }

    fn handle_output(&self, line: &str) {
        let (id, body) = self.patterns.parse(line);
        let mut inner = self.inner.lock();

        let target = match id.as_deref() {
            Some(id) if inner.in_flight.contains_key(id) => Some(CommandId::new(id)),
            _ => {
                inner.metrics.uncorrelated_responses += 1;
                inner.oldest_in_flight()
            }
        };
        let Some(target) = target else {
            return;
        };

        if let Some(entry) = inner.in_flight.get(&target) {
            if entry.stream_tx.is_some() && body != STREAM_END_MARKER {
                if let Some(tx) = &entry.stream_tx {
                    let _ = tx.send(body.to_string());
                }
                return;
            }
        }

        let Some(entry) = inner.in_flight.remove(&target) else {
            return;
        };
        let now = self.clock.epoch_ms();
        let exec_ms = entry
            .dispatched_at_ms
            .map(|d| now.saturating_sub(d))
            .unwrap_or(0);
        let queue_wait_ms = entry
            .dispatched_at_ms
            .unwrap_or(entry.command.enqueued_at_ms)
            .saturating_sub(entry.command.enqueued_at_ms) as f64;

        let response = if entry.stream_tx.is_some() {
            Response {
                success: true,
                data: None,
                error: None,
                execution_time_ms: exec_ms,
                timestamp_ms: now,
            }
        } else {
            let payload = classify_payload(body);
            let success = payload_is_success(&payload);
            Response {
                success,
                error: if success { None } else { Some(body.to_string()) },
                data: Some(payload),
                execution_time_ms: exec_ms,
                timestamp_ms: now,
            }
        };
        inner.record_completion(response.success, exec_ms, queue_wait_ms, now);
        drop(inner);
        entry.resolve(Ok(response));
    }

    fn reject_all(&self, error: MuxError) {
        let mut inner = self.inner.lock();
        let queued: Vec<Pending> = inner.queue.drain(..).collect();
        let in_flight: Vec<Pending> = inner.in_flight.drain().map(|(_, p)| p).collect();
        drop(inner);
        for entry in queued.into_iter().chain(in_flight) {
            entry.resolve(Err(error.clone()));
        }
    }

    /// Dispatches as many queued commands as there are free slots, as long
    /// as the supervised process is running.
    async fn pump(&self) {
        loop {
            if !self.supervisor.is_running() {
                return;
            }
            let to_send: Vec<(CommandId, String)> = {
                let mut inner = self.inner.lock();
                if inner.cleaned_up {
                    return;
                }
                let mut batch = Vec::new();
                while inner.in_flight.len() < self.config.max_concurrent && !inner.queue.is_empty() {
                    let entry = inner.queue.remove(0);
                    let id = entry.command.id.clone();
                    let line = format!("[CMD:{}] {}", id, entry.command.prompt);
                    inner.in_flight.insert(id.clone(), entry);
                    batch.push((id, line));
                }
                batch
            };
            if to_send.is_empty() {
                return;
            }
            for (id, line) in to_send {
                match self.supervisor.send_line(&line).await {
                    Ok(()) => {
                        let now = self.clock.epoch_ms();
                        let mut inner = self.inner.lock();
                        if let Some(entry) = inner.in_flight.get_mut(&id) {
                            entry.dispatched_at_ms = Some(now);
                        }
                    }
                    Err(e) => {
                        let mut inner = self.inner.lock();
                        if let Some(entry) = inner.in_flight.remove(&id) {
                            let now = self.clock.epoch_ms();
                            inner.record_completion(false, 0, 0.0, now);
                            drop(inner);
                            entry.resolve(Err(MuxError::from(e)));
                        }
                    }
                }
            }
        }
    }

    /// Queues `prompt`, waits for resolution, and retries on timeout when
    /// `options.retry_on_error` allows it.
    pub async fn send(&self, prompt: impl Into<String>, options: CommandOptions) -> Result<Response, MuxError> {
        let prompt = prompt.into();
        let id = CommandId::new(self.idgen.next());
        let mut retry_count = 0u32;
        loop {
            let (tx, rx) = oneshot::channel();
            let enqueued_at_ms = self.clock.epoch_ms();
            let command = Command {
                id: id.clone(),
                prompt: prompt.clone(),
                enqueued_at_ms,
                options: options.clone(),
                retry_count,
            };
            {
                let mut inner = self.inner.lock();
                if inner.cleaned_up {
                    return Err(MuxError::Cancelled);
                }
                inner.insert_queued(Pending {
                    command,
                    responder: Some(tx),
                    stream_tx: None,
                    dispatched_at_ms: None,
                });
            }
            self.pump().await;

            let timeout_dur = Duration::from_millis(options.timeout_ms.max(1));
            match tokio::time::timeout(timeout_dur, rx).await {
                Ok(Ok(Ok(response))) => return Ok(response),
                Ok(Ok(Err(e))) => return Err(e),
                Ok(Err(_)) => return Err(MuxError::ProcessUnavailable),
                Err(_elapsed) => {
                    let removed = {
                        let mut inner = self.inner.lock();
                        inner.in_flight.remove(&id).or_else(|| {
                            inner
                                .queue
                                .iter()
                                .position(|p| p.command.id == id)
                                .map(|pos| inner.queue.remove(pos))
                        })
                    };
                    if removed.is_none() {
                        // Resolved concurrently right as the timeout fired.
                        continue;
                    }
                    let eligible = options.retry_on_error && retry_count < self.config.max_retries;
                    {
                        let mut inner = self.inner.lock();
                        inner.metrics.timeouts += 1;
                        if eligible {
                            inner.metrics.retries += 1;
                        } else {
                            let now = self.clock.epoch_ms();
                            inner.record_completion(false, 0, 0.0, now);
                        }
                    }
                    if eligible {
                        retry_count += 1;
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                        continue;
                    }
                    return Err(MuxError::Timeout);
                }
            }
        }
    }

    pub async fn send_expecting_json<T: serde::de::DeserializeOwned>(
        &self,
        prompt: impl Into<String>,
        options: CommandOptions,
    ) -> Result<T, MuxError> {
        let response = self.send(prompt, options).await?;
        match response.data {
            Some(Payload::Json { value }) => {
                serde_json::from_value(value).map_err(|e| MuxError::ProtocolError(e.to_string()))
            }
            Some(Payload::Text { value, .. }) => {
                serde_json::from_str(&value).map_err(|e| MuxError::ProtocolError(e.to_string()))
            }
            None => Err(MuxError::ProtocolError("empty response".to_string())),
        }
    }

    /// Fan-out with all-or-none error propagation: the first failure
    /// cancels the whole call.
    pub async fn send_many(
        &self,
        prompts: Vec<String>,
        options: CommandOptions,
    ) -> Result<Vec<Response>, MuxError> {
        let handles: Vec<_> = prompts
            .into_iter()
            .map(|p| {
                let mux = self.clone();
                let opts = options.clone();
                tokio::spawn(async move { mux.send(p, opts).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Ok(response)) => results.push(response),
                Ok(Err(e)) => return Err(e),
                Err(_join_error) => return Err(MuxError::ProcessUnavailable),
            }
        }
        Ok(results)
    }

    /// Ordered fan-out bounded by `batch.max_concurrency`. Errors are kept
    /// in-place at their index unless `stop_on_error` aborts the rest.
    pub async fn send_batch(
        &self,
        prompts: Vec<String>,
        options: CommandOptions,
        batch: BatchOptions,
    ) -> Vec<Result<Response, MuxError>> {
        let total = prompts.len();
        let semaphore = Arc::new(Semaphore::new(batch.max_concurrency.max(1)));
        let cancel = CancellationToken::new();
        let completed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(total);
        for (idx, prompt) in prompts.into_iter().enumerate() {
            let mux = self.clone();
            let sem = semaphore.clone();
            let opts = options.clone();
            let cancel = cancel.clone();
            let completed = completed.clone();
            let progress = batch.on_progress.clone();
            let stop_on_error = batch.stop_on_error;
            handles.push(tokio::spawn(async move {
                let permit = match sem.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, Err(MuxError::Cancelled)),
                };
                if cancel.is_cancelled() {
                    drop(permit);
                    return (idx, Err(MuxError::Cancelled));
                }
                let result = mux.send(prompt, opts).await;
                drop(permit);
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(tx) = &progress {
                    let _ = tx.send(BatchProgress { completed: done, total });
                }
                if stop_on_error && result.is_err() {
                    cancel.cancel();
                }
                (idx, result)
            }));
        }

        let mut out: Vec<Option<Result<Response, MuxError>>> = (0..total).map(|_| None).collect();
        for handle in handles {
            if let Ok((idx, result)) = handle.await {
                out[idx] = Some(result);
            }
        }
        out.into_iter()
            .map(|slot| slot.unwrap_or(Err(MuxError::Cancelled)))
            .collect()
    }

    /// Streams line-partitioned chunks to `chunks` until `[STREAM_END]` or
    /// timeout; the final `Response` carries no payload (it was already
    /// delivered through the channel).
    pub async fn send_stream(
        &self,
        prompt: impl Into<String>,
        chunks: mpsc::UnboundedSender<String>,
        options: CommandOptions,
    ) -> Result<Response, MuxError> {
        let id = CommandId::new(self.idgen.next());
        let (tx, rx) = oneshot::channel();
        let enqueued_at_ms = self.clock.epoch_ms();
        let command = Command {
            id: id.clone(),
            prompt: prompt.into(),
            enqueued_at_ms,
            options: options.clone(),
            retry_count: 0,
        };
        {
            let mut inner = self.inner.lock();
            if inner.cleaned_up {
                return Err(MuxError::Cancelled);
            }
            inner.insert_queued(Pending {
                command,
                responder: Some(tx),
                stream_tx: Some(chunks),
                dispatched_at_ms: None,
            });
        }
        self.pump().await;

        let timeout_dur = Duration::from_millis(options.timeout_ms.max(1));
        match tokio::time::timeout(timeout_dur, rx).await {
            Ok(Ok(Ok(response))) => Ok(response),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(MuxError::ProcessUnavailable),
            Err(_elapsed) => {
                let mut inner = self.inner.lock();
                inner.in_flight.remove(&id);
                inner.metrics.timeouts += 1;
                let now = self.clock.epoch_ms();
                inner.record_completion(false, 0, 0.0, now);
                Err(MuxError::Timeout)
            }
        }
    }

    /// Removes `id` from the queue, or rejects it with `Cancelled` if
    /// in-flight. Returns whether a command was actually found.
    pub fn cancel(&self, id: &str) -> bool {
        let entry = {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.in_flight.remove(id) {
                Some(entry)
            } else if let Some(pos) = inner.queue.iter().position(|p| p.command.id.as_str() == id) {
                Some(inner.queue.remove(pos))
            } else {
                None
            }
        };
        match entry {
            Some(entry) => {
                entry.resolve(Err(MuxError::Cancelled));
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        self.reject_all(MuxError::Cancelled);
    }

    pub fn command_status(&self, id: &str) -> CommandStatus {
        let inner = self.inner.lock();
        if let Some(entry) = inner.in_flight.get(id) {
            return CommandStatus::Pending {
                retry_count: entry.command.retry_count,
            };
        }
        if let Some(pos) = inner.queue.iter().position(|p| p.command.id.as_str() == id) {
            return CommandStatus::Queued { position: pos + 1 };
        }
        CommandStatus::NotFound
    }

    pub fn metrics(&self) -> MuxMetrics {
        self.inner.lock().metrics.clone()
    }

    pub fn detailed_stats(&self) -> DetailedStats {
        let wall_clock_secs = (self.clock.epoch_ms().saturating_sub(self.started_at_ms)) as f64 / 1000.0;
        self.inner.lock().metrics.detailed_stats(wall_clock_secs)
    }

    pub fn status(&self) -> MuxStatus {
        let inner = self.inner.lock();
        MuxStatus {
            process: self.supervisor.process_info(),
            queued: inner.queue.len(),
            in_flight: inner.in_flight.len(),
        }
    }

    /// Cancels every queued and in-flight command and stops the background
    /// correlator task. Idempotent.
    pub fn cleanup(&self) {
        self.cancel_all();
        self.inner.lock().cleaned_up = true;
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "multiplexer_tests.rs"]
mod tests;
