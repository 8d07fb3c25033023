// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! `foreman`: a minimal operator CLI over the Boss controller and the
//! Durable Task Queue (§10.5) — not a replacement for the web dashboard
//! (§1 non-goal), just enough surface to submit work and inspect the
//! queue from a terminal.
//!
//! ```text
//! foreman submit "<instruction>"
//! foreman status
//! foreman queue stats
//! foreman queue list
//! foreman cancel <job-id>
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use foreman_adapters::{ProcessSupervisor, SupervisorConfig};
use foreman_core::{JobId, SystemClock, UuidIdGen};
use foreman_engine::{BossController, CommandMultiplexer, EngineConfig, MuxConfig};
use foreman_queue::{RedisQueueConfig, RedisTaskQueue, TaskQueue};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "foreman", about = "Operator CLI for the orchestration kernel")]
struct Cli {
    /// Path to a TOML config file, layered under defaults and environment
    /// variables (§10.3).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose an instruction via the Boss controller and enqueue the
    /// resulting task graph.
    Submit { instruction: String },
    /// Print queue connectivity and a stats summary.
    Status,
    /// Queue inspection subcommands.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Remove a queued or in-flight job.
    Cancel { job_id: String },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Point-in-time counts per job state (`getStats()`).
    Stats,
    /// List every persisted job.
    List,
}

async fn connect_queue(config: &EngineConfig) -> Result<RedisTaskQueue<UuidIdGen, SystemClock>> {
    let mut redis_config = RedisQueueConfig::default();
    redis_config.url = config.redis.url();
    RedisTaskQueue::connect(redis_config, UuidIdGen, SystemClock)
        .await
        .context("connecting to the durable task queue")
}

async fn submit(config: &EngineConfig, instruction: String) -> Result<()> {
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
    let supervisor = std::sync::Arc::new(ProcessSupervisor::new(supervisor_config));
    supervisor.start().await.context("starting the child tool")?;

    let queue = std::sync::Arc::new(connect_queue(config).await?);
    let mux = CommandMultiplexer::new(
        supervisor.clone(),
        SystemClock,
        UuidIdGen,
        MuxConfig {
            max_concurrent: config.max_concurrent,
            max_retries: config.max_retries,
            retry_delay_ms: config.restart_delay_ms,
        },
    );
    let boss = BossController::with_command_timeout(
        mux,
        queue,
        config.workspace_path.clone(),
        config.external_tool_api_key.clone(),
        config.command_timeout_ms,
    );
    boss.initialize().await.context("initializing the Boss controller")?;

    let decomposition = boss
        .process_user_instruction(&instruction)
        .await
        .context("decomposing instruction")?;
    let job_ids = boss
        .add_tasks_to_queue(decomposition.tasks)
        .await
        .context("enqueuing task graph")?;

    println!("enqueued {} task(s):", job_ids.len());
    for job_id in &job_ids {
        println!("  {job_id}");
    }

    supervisor.stop().await.ok();
    Ok(())
}

async fn status(config: &EngineConfig) -> Result<()> {
    let queue = connect_queue(config).await?;
    let stats = queue.get_stats().await.context("fetching queue stats")?;
    println!("agent_id: {}", config.agent_id);
    println!("redis: {}", config.redis.url());
    println!(
        "queue: waiting={} delayed={} active={} completed={} failed={}",
        stats.waiting, stats.delayed, stats.active, stats.completed, stats.failed
    );
    queue.close().await.ok();
    Ok(())
}

async fn queue_stats(config: &EngineConfig) -> Result<()> {
    let queue = connect_queue(config).await?;
    let stats = queue.get_stats().await.context("fetching queue stats")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    queue.close().await.ok();
    Ok(())
}

async fn queue_list(config: &EngineConfig) -> Result<()> {
    let queue = connect_queue(config).await?;
    let jobs = queue.get_all_tasks().await.context("listing jobs")?;
    for job in &jobs {
        println!(
            "{}\t{:?}\t{}\t{} attempts={}/{}",
            job.id, job.state, job.task.id, job.task.title, job.attempts, job.max_attempts
        );
    }
    queue.close().await.ok();
    Ok(())
}

async fn cancel(config: &EngineConfig, job_id: String) -> Result<()> {
    let queue = connect_queue(config).await?;
    let removed = queue
        .remove_task(&JobId::new(job_id.clone()))
        .await
        .context("removing job")?;
    if removed {
        println!("removed {job_id}");
    } else {
        println!("no such job: {job_id}");
    }
    queue.close().await.ok();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).map_err(|e| anyhow::anyhow!("{e}"))?;

    match cli.command {
        Commands::Submit { instruction } => submit(&config, instruction).await,
        Commands::Status => status(&config).await,
        Commands::Queue { action } => match action {
            QueueAction::Stats => queue_stats(&config).await,
            QueueAction::List => queue_list(&config).await,
        },
        Commands::Cancel { job_id } => cancel(&config, job_id).await,
    }
}
