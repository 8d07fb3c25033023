// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! The `Command` entity (§3) and its response/metrics DTOs, shared between
//! the multiplexer implementation (`foreman-adapters`) and its callers.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for one multiplexer request/reply transaction.
    pub struct CommandId;
}

/// Caller-supplied options for [`crate::command::Command`].
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// How long to wait for a response before timing out.
    pub timeout_ms: u64,
    /// Higher values are dispatched earlier; ties preserve FIFO order.
    pub priority: i32,
    /// Whether a timeout or `ProcessUnavailable` is eligible for retry.
    pub retry_on_error: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            priority: 0,
            retry_on_error: false,
        }
    }
}

/// A pending multiplexer request. Lifecycle: `queued -> in_flight ->
/// {resolved, rejected, cancelled}`.
#[derive(Debug, Clone)]
pub struct Command {
    pub id: CommandId,
    pub prompt: String,
    pub enqueued_at_ms: u64,
    pub options: CommandOptions,
    pub retry_count: u32,
}

/// The tagged-variant response payload (§9 design note: avoid leaking a
/// union of "maybe JSON, maybe text" to callers that did not ask for JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Json { value: serde_json::Value },
    Text {
        value: String,
        classification: TextClassification,
    },
}

/// Heuristic classification of a plain-text payload, used when the child
/// did not reply with structured JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextClassification {
    Success,
    Error,
    Ambiguous,
}

/// The resolved outcome of a [`Command`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub data: Option<Payload>,
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub timestamp_ms: u64,
}

/// Point-in-time status of a command, as returned by `commandStatus(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum CommandStatus {
    Pending { retry_count: u32 },
    Queued { position: usize },
    NotFound,
}

/// Rolling multiplexer metrics (§4.B "Metrics").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MuxMetrics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub timeouts: u64,
    pub retries: u64,
    pub uncorrelated_responses: u64,
    pub avg_queue_wait_ms: f64,
    pub total_execution_ms: u64,
    pub last_command_at_ms: Option<u64>,
}

/// Derived statistics built from [`MuxMetrics`] (`detailedStats()`, §10.5).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DetailedStats {
    pub success_rate: f64,
    pub timeout_rate: f64,
    pub avg_execution_ms: f64,
    pub throughput_per_sec: f64,
}

impl MuxMetrics {
    /// Compute derived stats, guarding every ratio against division by zero.
    pub fn detailed_stats(&self, wall_clock_secs: f64) -> DetailedStats {
        let total = self.total as f64;
        DetailedStats {
            success_rate: if total > 0.0 {
                self.successful as f64 / total
            } else {
                0.0
            },
            timeout_rate: if total > 0.0 {
                self.timeouts as f64 / total
            } else {
                0.0
            },
            avg_execution_ms: if total > 0.0 {
                self.total_execution_ms as f64 / total
            } else {
                0.0
            },
            throughput_per_sec: if wall_clock_secs > 0.0 {
                total / wall_clock_secs
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
