// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! The daemon's entire lifecycle (module doc on [`crate`]): spawn the
//! supervised child, connect to the durable queue, build the role's
//! controller, then run its work loop alongside periodic queue-maintenance
//! sweeps until `SIGTERM`/`SIGINT`.

use crate::error::DaemonError;
use crate::role::DaemonRole;
use foreman_adapters::{ProcessSupervisor, SupervisorConfig};
use foreman_core::{SystemClock, TaskId, UuidIdGen};
use foreman_engine::{
    BossController, CommandMultiplexer, EngineConfig, MuxConfig, SubordinateController,
};
use foreman_queue::{RedisQueueConfig, RedisTaskQueue, TaskQueue};
use std::sync::Arc;
use std::time::Duration;

type Mux = CommandMultiplexer<ProcessSupervisor<SystemClock>, SystemClock, UuidIdGen>;
type Queue = RedisTaskQueue<UuidIdGen, SystemClock>;
type Boss = BossController<ProcessSupervisor<SystemClock>, SystemClock, UuidIdGen, Queue>;
type Subordinate = SubordinateController<ProcessSupervisor<SystemClock>, SystemClock, UuidIdGen, Queue>;

/// Runs one daemon process to completion. Returns `Ok(())` on a clean
/// shutdown (ctrl-c / SIGTERM); any other return is an init failure whose
/// [`DaemonError::exit_code`] the binary should exit with.
pub async fn run(role: DaemonRole, config: EngineConfig) -> Result<(), DaemonError> {
    tracing::info!(role = %role, agent_id = %config.agent_id, "foremand starting");

    let supervisor_config = SupervisorConfig {
        workspace_path: config.workspace_path.clone(),
        command: config.child_command.clone(),
        args: config.child_args.clone(),
        env: config
            .external_tool_api_key
            .iter()
            .map(|key| ("FOREMAN_EXTERNAL_TOOL_API_KEY".to_string(), key.clone()))
            .collect(),
        ready_signal: None,
        start_timeout: Duration::from_millis(config.command_timeout_ms),
        max_retries: config.max_retries,
        restart_delay: Duration::from_millis(config.restart_delay_ms),
        stop_grace: Duration::from_secs(5),
        stop_timeout: Duration::from_secs(5),
    };
    let supervisor = Arc::new(ProcessSupervisor::new(supervisor_config));
    supervisor
        .start()
        .await
        .map_err(|e| DaemonError::Io(e.to_string()))?;

    let mut redis_config = RedisQueueConfig::default();
    redis_config.url = config.redis.url();
    let queue = Arc::new(
        RedisTaskQueue::connect(redis_config, UuidIdGen, SystemClock)
            .await
            .map_err(DaemonError::from)?,
    );

    let mux: Mux = CommandMultiplexer::new(
        Arc::clone(&supervisor),
        SystemClock,
        UuidIdGen,
        MuxConfig {
            max_concurrent: config.max_concurrent,
            max_retries: config.max_retries,
            retry_delay_ms: config.restart_delay_ms,
        },
    );

    let result = match role {
        DaemonRole::Boss { instruction } => run_boss(mux, queue.clone(), &config, instruction).await,
        DaemonRole::Subordinate => run_subordinate(mux, queue.clone(), &config).await,
    };

    tracing::info!("foremand shutting down");
    let _ = supervisor.stop().await;
    let _ = queue.close().await;
    result
}

/// Builds the [`Boss`] controller, runs the one-shot decomposition if an
/// instruction was supplied, then loops reviewing submitted results and
/// running maintenance sweeps until shutdown.
async fn run_boss(
    mux: Mux,
    queue: Arc<Queue>,
    config: &EngineConfig,
    instruction: String,
) -> Result<(), DaemonError> {
    let boss: Boss = BossController::with_command_timeout(
        mux,
        queue.clone(),
        config.workspace_path.clone(),
        config.external_tool_api_key.clone(),
        config.command_timeout_ms,
    );
    boss.initialize().await.map_err(DaemonError::from_init)?;

    let mut pending: Vec<TaskId> = Vec::new();
    if !instruction.trim().is_empty() {
        let decomposition = boss
            .process_user_instruction(&instruction)
            .await
            .map_err(DaemonError::from)?;
        pending = decomposition.tasks.iter().map(|t| t.id.clone()).collect();
        boss.add_tasks_to_queue(decomposition.tasks)
            .await
            .map_err(DaemonError::from)?;
        tracing::info!(task_count = pending.len(), "decomposed and enqueued task graph");
    }

    let mut shutdown = std::pin::pin!(shutdown_signal());
    let mut maintenance = tokio::time::interval(Duration::from_millis(config.cleanup_interval_ms));
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = maintenance.tick() => {
                run_maintenance(queue.as_ref(), config).await;
                match boss.review_pending(&pending).await {
                    Ok(reviewed) => pending.retain(|id| !reviewed.contains(id)),
                    Err(e) => tracing::warn!(error = %e, "review sweep failed"),
                }
            }
        }
    }
    Ok(())
}

/// Builds the [`Subordinate`] controller and loops `fetchAndExecuteTask`,
/// backing off to `poll_interval_ms` whenever the queue was empty, until
/// shutdown — at which point any task in flight is marked interrupted
/// (§4.G `cleanup()`), not failed.
async fn run_subordinate(mux: Mux, queue: Arc<Queue>, config: &EngineConfig) -> Result<(), DaemonError> {
    let subordinate: Subordinate =
        SubordinateController::with_command_timeout(mux, queue.clone(), SystemClock, config.agent_id.clone(), config.command_timeout_ms);

    let mut shutdown = std::pin::pin!(shutdown_signal());
    let mut maintenance = tokio::time::interval(Duration::from_millis(config.cleanup_interval_ms));
    let mut poll = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = maintenance.tick() => {
                run_maintenance(queue.as_ref(), config).await;
            }
            _ = poll.tick() => {
                match subordinate.fetch_and_execute_task().await {
                    Ok(Some(result)) => {
                        tracing::info!(task_id = %result.task_id, "task completed");
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "task execution failed"),
                }
            }
        }
    }
    subordinate.cleanup().await;
    Ok(())
}

async fn run_maintenance(queue: &Queue, config: &EngineConfig) {
    match queue.cleanup(config.job_max_age_ms).await {
        Ok(n) if n > 0 => tracing::info!(removed = n, "cleanup swept terminal jobs"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "cleanup sweep failed"),
    }
    match queue.reclaim_stalled(config.stall_interval_ms).await {
        Ok(n) if n > 0 => tracing::warn!(reclaimed = n, "reclaimed stalled jobs"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "stall reclaim failed"),
    }
}

/// Resolves on `SIGTERM` (unix) or Ctrl-C, whichever the platform offers.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
