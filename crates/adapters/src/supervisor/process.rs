// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Process Supervisor: starts, stops, and restarts exactly one interactive
//! child process, publishing its stdout/stderr and lifecycle as an event
//! stream.
//!
//! Start resolves once the child writes its readiness sentinel line to
//! stdout (`SupervisorConfig::ready_signal`), or immediately after spawn if
//! no sentinel is configured. Stop writes EOF to stdin, waits a grace
//! window, then escalates to a terminate signal and finally a kill signal.

use foreman_core::{ErrorKind, HasErrorKind, ProcessInfo, ProcessStatus, SupervisorEvent};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{broadcast, oneshot};

use foreman_core::clock::{Clock, SystemClock};

#[derive(Debug, Clone, thiserror::Error)]
pub enum SupervisorError {
    #[error("process is already running or starting")]
    AlreadyRunning,
    #[error("a start() call is already in flight")]
    AlreadyStarting,
    #[error("failed to spawn child process: {0}")]
    SpawnFailed(String),
    #[error("child stdin is not writable")]
    StreamError,
    #[error("io error: {0}")]
    Io(String),
}

impl HasErrorKind for SupervisorError {
    fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::AlreadyRunning
            | SupervisorError::AlreadyStarting
            | SupervisorError::SpawnFailed(_)
            | SupervisorError::Io(_) => ErrorKind::ProcessUnavailable,
            SupervisorError::StreamError => ErrorKind::StreamError,
        }
    }
}

/// Static configuration for one supervised child process.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub workspace_path: PathBuf,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Line the child writes to stdout once it has finished initializing.
    /// `None` means the process is considered ready as soon as it spawns.
    pub ready_signal: Option<String>,
    /// How long `start()` waits for the ready signal before failing.
    pub start_timeout: Duration,
    pub max_retries: u32,
    pub restart_delay: Duration,
    /// Grace window after EOF-on-stdin before a terminate signal is sent.
    pub stop_grace: Duration,
    /// Window after the terminate signal before a kill signal is sent.
    pub stop_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            workspace_path: PathBuf::from("."),
            command: String::new(),
            args: Vec::new(),
            env: Vec::new(),
            ready_signal: None,
            start_timeout: Duration::from_secs(30),
            max_retries: 3,
            restart_delay: Duration::from_secs(1),
            stop_grace: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

struct State {
    status: ProcessStatus,
    starting: bool,
    info: ProcessInfo,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    /// Bumped on every start/stop so a stale crash-watcher task from a prior
    /// incarnation does not act on the current one.
    generation: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            status: ProcessStatus::Stopped,
            starting: false,
            info: ProcessInfo::default(),
            child: None,
            stdin: None,
            generation: 0,
        }
    }
}

/// Supervises exactly one child process.
pub struct ProcessSupervisor<C: Clock = SystemClock> {
    config: SupervisorConfig,
    state: Arc<Mutex<State>>,
    events: broadcast::Sender<SupervisorEvent>,
    clock: C,
}

impl ProcessSupervisor<SystemClock> {
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ProcessSupervisor<C> {
    pub fn with_clock(config: SupervisorConfig, clock: C) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            config,
            state: Arc::new(Mutex::new(State::default())),
            events,
            clock,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().status.is_available()
    }

    pub fn process_info(&self) -> ProcessInfo {
        self.state.lock().info.clone()
    }

    /// Write one line to the child's stdin, prefixed by the caller (the
    /// multiplexer adds `[CMD:<id>] `). Appends the trailing newline.
    pub async fn send_line(&self, line: &str) -> Result<(), SupervisorError> {
        let mut guard = {
            // Cloning the handle out from under the mutex would require
            // `ChildStdin: Clone`, which it isn't; hold the lock across the
            // write instead. Writes are infrequent relative to stdout
            // pumping, which never touches this mutex.
            self.state.lock()
        };
        let stdin = guard.stdin.as_mut().ok_or(SupervisorError::StreamError)?;
        let mut buf = line.as_bytes().to_vec();
        buf.push(b'\n');
        stdin
            .write_all(&buf)
            .await
            .map_err(|e| SupervisorError::Io(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| SupervisorError::Io(e.to_string()))
    }

    pub async fn start(&self) -> Result<(), SupervisorError> {
        {
            let mut guard = self.state.lock();
            if guard.status != ProcessStatus::Stopped && guard.status != ProcessStatus::Error {
                return Err(SupervisorError::AlreadyRunning);
            }
            if guard.starting {
                return Err(SupervisorError::AlreadyStarting);
            }
            guard.starting = true;
        }

        tokio::fs::create_dir_all(&self.config.workspace_path)
            .await
            .map_err(|e| SupervisorError::Io(e.to_string()))?;

        let gen = {
            let mut guard = self.state.lock();
            guard.generation += 1;
            guard.generation
        };

        match self.spawn_and_wait_ready(gen).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut guard = self.state.lock();
                guard.starting = false;
                guard.info.error_count += 1;
                Err(e)
            }
        }
    }

    async fn spawn_and_wait_ready(&self, gen: u64) -> Result<(), SupervisorError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .current_dir(&self.config.workspace_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &self.config.env {
            cmd.env(k, v);
        }

        tracing::info!(command = %self.config.command, args = ?self.config.args, "supervisor: spawning child");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(error = %e, "supervisor: spawn failed");
                return Err(SupervisorError::SpawnFailed(e.to_string()));
            }
        };
        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (ready_tx, ready_rx) = oneshot::channel();
        let ready_signal = self.config.ready_signal.clone();

        if let Some(stdout) = stdout {
            self.spawn_output_pump(stdout, gen, false, ready_signal.clone(), ready_tx);
        } else {
            let _ = ready_tx.send(());
        }
        if let Some(stderr) = stderr {
            // stderr has no readiness role; give it a no-op sender slot.
            let (tx, _rx) = oneshot::channel();
            self.spawn_output_pump(stderr, gen, true, None, tx);
        }

        let ready = tokio::time::timeout(self.config.start_timeout, ready_rx).await;
        match ready {
            Ok(Ok(())) => {}
            _ => {
                tracing::error!(?pid, "supervisor: child did not signal readiness in time");
                let _ = child.start_kill();
                return Err(SupervisorError::SpawnFailed(
                    "child did not signal readiness in time".into(),
                ));
            }
        }

        {
            let mut guard = self.state.lock();
            if guard.generation != gen {
                // A stop()/restart() raced us; abandon this incarnation.
                let _ = child.start_kill();
                return Ok(());
            }
            guard.status = ProcessStatus::Running;
            guard.starting = false;
            guard.info.status = ProcessStatus::Running;
            guard.info.pid = pid;
            guard.info.start_time_ms = Some(self.clock.epoch_ms());
            guard.info.last_activity_ms = Some(self.clock.epoch_ms());
            guard.child = Some(child);
            guard.stdin = stdin;
        }
        tracing::info!(?pid, "supervisor: child running");
        let _ = self.events.send(SupervisorEvent::StatusChange(ProcessStatus::Running));

        self.spawn_exit_watcher(gen);
        Ok(())
    }

    fn spawn_output_pump(
        &self,
        pipe: impl tokio::io::AsyncRead + Unpin + Send + 'static,
        gen: u64,
        is_stderr: bool,
        ready_signal: Option<String>,
        ready_tx: oneshot::Sender<()>,
    ) {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let clock = self.clock.clone();
        let mut ready_tx = Some(ready_tx);

        tokio::spawn(async move {
            let mut lines = BufReader::new(pipe).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        {
                            let mut guard = state.lock();
                            if guard.generation != gen {
                                break;
                            }
                            guard.info.last_activity_ms = Some(clock.epoch_ms());
                            if is_stderr {
                                guard.info.error_count += 1;
                            }
                        }
                        let event = if is_stderr {
                            SupervisorEvent::Error(line.clone())
                        } else {
                            SupervisorEvent::Output(line.clone())
                        };
                        let _ = events.send(event);

                        if let Some(tx) = ready_tx.take() {
                            let is_ready_line = match &ready_signal {
                                Some(sentinel) => line.contains(sentinel.as_str()),
                                None => true,
                            };
                            if is_ready_line {
                                let _ = tx.send(());
                            } else {
                                ready_tx = Some(tx);
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
            // If the child exited before ever emitting the ready signal,
            // unblock start() so it can fail with SpawnFailed instead of
            // hanging until start_timeout.
            if let Some(tx) = ready_tx.take() {
                let _ = tx.send(());
            }
        });
    }

    fn spawn_exit_watcher(&self, gen: u64) {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let config = self.config.clone();
        let clock = self.clock.clone();

        tokio::spawn(async move {
            let wait_result = {
                let mut guard = state.lock();
                if guard.generation != gen {
                    return;
                }
                guard.child.take()
            };
            let Some(mut child) = wait_result else {
                return;
            };
            let _ = child.wait().await;

            let mut guard = state.lock();
            if guard.generation != gen || guard.status != ProcessStatus::Running {
                // A graceful stop() already transitioned us away from
                // Running before the child actually exited.
                return;
            }

            tracing::warn!(restart_count = guard.info.restart_count, max_retries = config.max_retries, "supervisor: child exited");

            if guard.info.restart_count < config.max_retries {
                guard.status = ProcessStatus::Restarting;
                guard.info.status = ProcessStatus::Restarting;
                drop(guard);
                let _ = events.send(SupervisorEvent::StatusChange(ProcessStatus::Restarting));

                tokio::time::sleep(config.restart_delay).await;

                let mut guard = state.lock();
                if guard.generation != gen {
                    return;
                }
                guard.info.restart_count += 1;
                guard.status = ProcessStatus::Starting;
                guard.info.status = ProcessStatus::Starting;
                let new_gen = {
                    guard.generation += 1;
                    guard.generation
                };
                let restart_count = guard.info.restart_count;
                drop(guard);

                let _ = events.send(SupervisorEvent::Restart(restart_count));

                // Respawn out-of-line: `spawn_and_wait_ready` needs `&self`
                // but this task only owns cloned handles, so rebuild a
                // throwaway supervisor view over the shared state.
                let proxy = ProcessSupervisor {
                    config,
                    state,
                    events,
                    clock,
                };
                if let Err(e) = proxy.spawn_and_wait_ready(new_gen).await {
                    tracing::error!(error = %e, restart_count, "supervisor: restart failed");
                    let mut guard = proxy.state.lock();
                    if guard.generation == new_gen {
                        guard.status = ProcessStatus::Error;
                        guard.info.status = ProcessStatus::Error;
                        guard.info.error_count += 1;
                    }
                    let _ = proxy
                        .events
                        .send(SupervisorEvent::StatusChange(ProcessStatus::Error));
                } else {
                    tracing::info!(restart_count, "supervisor: restarted");
                }
            } else {
                tracing::error!(restart_count = guard.info.restart_count, "supervisor: retries exhausted, giving up");
                guard.status = ProcessStatus::Error;
                guard.info.status = ProcessStatus::Error;
                drop(guard);
                let _ = events.send(SupervisorEvent::StatusChange(ProcessStatus::Error));
            }
        });
    }

    /// Idempotent: returns `Ok(())` immediately if already stopped.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let mut child = {
            let mut guard = self.state.lock();
            if guard.status == ProcessStatus::Stopped {
                return Ok(());
            }
            guard.generation += 1;
            guard.status = ProcessStatus::Stopped;
            guard.info.status = ProcessStatus::Stopped;
            guard.stdin.take();
            guard.child.take()
        };

        if let Some(child) = child.as_mut() {
            tracing::info!("supervisor: stopping child (EOF on stdin)");
            // Dropping stdin above already closed it (EOF). Give the child
            // the grace window to exit on its own before escalating.
            match tokio::time::timeout(self.config.stop_grace, child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!("supervisor: grace window elapsed, sending SIGTERM");
                    send_terminate(child);
                    match tokio::time::timeout(self.config.stop_timeout, child.wait()).await {
                        Ok(_) => {}
                        Err(_) => {
                            tracing::warn!("supervisor: terminate window elapsed, killing");
                            let _ = child.start_kill();
                            let _ = child.wait().await;
                        }
                    }
                }
            }
        }

        let _ = self.events.send(SupervisorEvent::StatusChange(ProcessStatus::Stopped));
        Ok(())
    }

    pub async fn restart(&self) -> Result<(), SupervisorError> {
        self.stop().await?;
        self.start().await
    }
}

#[cfg(unix)]
fn send_terminate(child: &Child) {
    let Some(pid) = child.id() else { return };
    // SAFETY: kill(2) with SIGTERM is safe for any pid; ESRCH (already
    // exited) is treated as success by the caller ignoring the return code.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) {
    // No distinct terminate signal outside unix; stop_timeout escalates
    // straight to a kill signal via `Child::start_kill`.
}

#[async_trait::async_trait]
impl<C: Clock> super::SupervisorAdapter for ProcessSupervisor<C> {
    async fn start(&self) -> Result<(), SupervisorError> {
        ProcessSupervisor::start(self).await
    }

    async fn stop(&self) -> Result<(), SupervisorError> {
        ProcessSupervisor::stop(self).await
    }

    async fn restart(&self) -> Result<(), SupervisorError> {
        ProcessSupervisor::restart(self).await
    }

    fn is_running(&self) -> bool {
        ProcessSupervisor::is_running(self)
    }

    fn process_info(&self) -> ProcessInfo {
        ProcessSupervisor::process_info(self)
    }

    async fn send_line(&self, line: &str) -> Result<(), SupervisorError> {
        ProcessSupervisor::send_line(self, line).await
    }

    fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        ProcessSupervisor::subscribe(self)
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
