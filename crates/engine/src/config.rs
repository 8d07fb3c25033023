// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Layered configuration (§10.3): built-in defaults, then an optional TOML
//! file, then environment variables — in that order, each layer
//! overriding the previous one. Validated once at startup through the same
//! boundary-trust primitives used for wire entities (§4.D), so a bad
//! config surfaces as `ErrorKind::Validation` (exit code 1, §6).

use foreman_core::ValidationError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    workspace_path: Option<String>,
    agent_id: Option<String>,
    redis_host: Option<String>,
    redis_port: Option<u16>,
    redis_password: Option<String>,
    redis_db: Option<u32>,
    queue_concurrency: Option<u32>,
    child_command: Option<String>,
    child_args: Option<Vec<String>>,
    max_concurrent: Option<usize>,
    command_timeout_ms: Option<u64>,
    restart_delay_ms: Option<u64>,
    max_retries: Option<u32>,
    poll_interval_ms: Option<u64>,
    cleanup_interval_ms: Option<u64>,
    job_max_age_ms: Option<u64>,
    stall_interval_ms: Option<u64>,
}

/// Redis connection settings (§6 "Environment variables").
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
}

impl RedisSettings {
    pub fn url(&self) -> String {
        match &self.password {
            Some(pw) => format!("redis://:{pw}@{}:{}/{}", self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Fully resolved, validated configuration for one controller process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workspace_path: PathBuf,
    pub agent_id: String,
    pub redis: RedisSettings,
    pub queue_concurrency: u32,
    pub child_command: String,
    pub child_args: Vec<String>,
    pub max_concurrent: usize,
    pub command_timeout_ms: u64,
    pub restart_delay_ms: u64,
    pub max_retries: u32,
    /// Opaque external-tool API key, passed through to the child at spawn
    /// (§6); the core never parses or inspects it.
    pub external_tool_api_key: Option<String>,
    /// How often the Subordinate loop polls `getNextTask` when the queue
    /// was last empty (§10.5).
    pub poll_interval_ms: u64,
    /// How often the daemon runs `Queue::cleanup` and `Queue::reclaim_stalled`
    /// sweeps (§10.5 scheduled sweep, §8 scenario 5 stall reclaim).
    pub cleanup_interval_ms: u64,
    /// `maxAge` passed to `Queue::cleanup` on each sweep.
    pub job_max_age_ms: u64,
    /// `stallInterval` passed to `Queue::reclaim_stalled` on each sweep.
    pub stall_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_path: PathBuf::from("./workspace"),
            agent_id: "agent-1".to_string(),
            redis: RedisSettings {
                host: "127.0.0.1".to_string(),
                port: 6379,
                password: None,
                db: 0,
            },
            queue_concurrency: 1,
            child_command: "claude".to_string(),
            child_args: Vec::new(),
            max_concurrent: 5,
            command_timeout_ms: 30_000,
            restart_delay_ms: 1_000,
            max_retries: 3,
            external_tool_api_key: None,
            poll_interval_ms: 1_000,
            cleanup_interval_ms: 60_000,
            job_max_age_ms: 24 * 60 * 60 * 1_000,
            stall_interval_ms: 5 * 60 * 1_000,
        }
    }
}

/// Reads `env_var`, parses it with `parse`, and records a [`ValidationError`]
/// under `field` if the value is present but malformed. Absent variables are
/// left untouched.
fn apply_env<T, F>(field: &str, env_var: &str, slot: &mut T, parse: F) -> Result<(), ValidationError>
where
    F: FnOnce(&str) -> Option<T>,
{
    if let Ok(raw) = std::env::var(env_var) {
        match parse(&raw) {
            Some(value) => *slot = value,
            None => return Err(ValidationError::new(field, format!("invalid value for {env_var}: `{raw}`"))),
        }
    }
    Ok(())
}

impl EngineConfig {
    /// Load defaults, overlay an optional TOML file, then overlay
    /// environment variables, validating at each layer boundary.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ValidationError> {
        let mut config = EngineConfig::default();

        if let Some(path) = config_file {
            if path.exists() {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| ValidationError::new("config_file", e.to_string()))?;
                let file: FileConfig =
                    toml::from_str(&raw).map_err(|e| ValidationError::new("config_file", e.to_string()))?;
                config.apply_file(file);
            }
        }

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.workspace_path {
            self.workspace_path = PathBuf::from(v);
        }
        if let Some(v) = file.agent_id {
            self.agent_id = v;
        }
        if let Some(v) = file.redis_host {
            self.redis.host = v;
        }
        if let Some(v) = file.redis_port {
            self.redis.port = v;
        }
        if let Some(v) = file.redis_password {
            self.redis.password = Some(v);
        }
        if let Some(v) = file.redis_db {
            self.redis.db = v;
        }
        if let Some(v) = file.queue_concurrency {
            self.queue_concurrency = v;
        }
        if let Some(v) = file.child_command {
            self.child_command = v;
        }
        if let Some(v) = file.child_args {
            self.child_args = v;
        }
        if let Some(v) = file.max_concurrent {
            self.max_concurrent = v;
        }
        if let Some(v) = file.command_timeout_ms {
            self.command_timeout_ms = v;
        }
        if let Some(v) = file.restart_delay_ms {
            self.restart_delay_ms = v;
        }
        if let Some(v) = file.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = file.poll_interval_ms {
            self.poll_interval_ms = v;
        }
        if let Some(v) = file.cleanup_interval_ms {
            self.cleanup_interval_ms = v;
        }
        if let Some(v) = file.job_max_age_ms {
            self.job_max_age_ms = v;
        }
        if let Some(v) = file.stall_interval_ms {
            self.stall_interval_ms = v;
        }
    }

    fn apply_env(&mut self) -> Result<(), ValidationError> {
        if let Ok(v) = std::env::var("WORKSPACE_PATH") {
            self.workspace_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("AGENT_ID") {
            self.agent_id = v;
        }
        if let Ok(v) = std::env::var("REDIS_HOST") {
            self.redis.host = v;
        }
        apply_env("redis.port", "REDIS_PORT", &mut self.redis.port, |s| s.parse().ok())?;
        if let Ok(v) = std::env::var("REDIS_PASSWORD") {
            self.redis.password = Some(v);
        }
        apply_env("redis.db", "REDIS_DB", &mut self.redis.db, |s| s.parse().ok())?;
        apply_env(
            "queue_concurrency",
            "QUEUE_CONCURRENCY",
            &mut self.queue_concurrency,
            |s| s.parse().ok(),
        )?;
        apply_env(
            "max_concurrent",
            "FOREMAN_MAX_CONCURRENT",
            &mut self.max_concurrent,
            |s| s.parse().ok(),
        )?;
        apply_env(
            "command_timeout_ms",
            "FOREMAN_COMMAND_TIMEOUT_MS",
            &mut self.command_timeout_ms,
            |s| s.parse().ok(),
        )?;
        apply_env(
            "restart_delay_ms",
            "FOREMAN_RESTART_DELAY_MS",
            &mut self.restart_delay_ms,
            |s| s.parse().ok(),
        )?;
        apply_env("max_retries", "FOREMAN_MAX_RETRIES", &mut self.max_retries, |s| {
            s.parse().ok()
        })?;
        if let Ok(v) = std::env::var("FOREMAN_EXTERNAL_TOOL_API_KEY") {
            self.external_tool_api_key = Some(v);
        }
        apply_env(
            "poll_interval_ms",
            "FOREMAN_POLL_INTERVAL_MS",
            &mut self.poll_interval_ms,
            |s| s.parse().ok(),
        )?;
        apply_env(
            "cleanup_interval_ms",
            "FOREMAN_CLEANUP_INTERVAL_MS",
            &mut self.cleanup_interval_ms,
            |s| s.parse().ok(),
        )?;
        apply_env("job_max_age_ms", "FOREMAN_JOB_MAX_AGE_MS", &mut self.job_max_age_ms, |s| {
            s.parse().ok()
        })?;
        apply_env(
            "stall_interval_ms",
            "FOREMAN_STALL_INTERVAL_MS",
            &mut self.stall_interval_ms,
            |s| s.parse().ok(),
        )?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.agent_id.trim().is_empty() {
            return Err(ValidationError::new("agent_id", "must not be empty"));
        }
        if self.child_command.trim().is_empty() {
            return Err(ValidationError::new("child_command", "must not be empty"));
        }
        if self.max_concurrent == 0 {
            return Err(ValidationError::new("max_concurrent", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
