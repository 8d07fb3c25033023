// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Which controller (§4.F / §4.G) a `foremand` process drives.

use std::fmt;
use std::str::FromStr;

/// Selects whether this daemon process runs a [`foreman_engine::BossController`]
/// or a [`foreman_engine::SubordinateController`] loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonRole {
    /// Decomposes one instruction into a task graph, enqueues it, and then
    /// reviews Subordinate results as they land in the result side-channel.
    Boss { instruction: String },
    /// Pulls tasks from the queue and drives them to completion.
    Subordinate,
}

impl DaemonRole {
    pub fn label(&self) -> &'static str {
        match self {
            DaemonRole::Boss { .. } => "boss",
            DaemonRole::Subordinate => "subordinate",
        }
    }
}

impl fmt::Display for DaemonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown daemon role `{0}`, expected `boss` or `subordinate`")]
pub struct ParseRoleError(pub String);

/// Parses the bare role name (`"boss"` or `"subordinate"`), without an
/// instruction — callers needing a Boss's instruction text supply it
/// separately (§4.F only has one per process).
impl FromStr for DaemonRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boss" => Ok(DaemonRole::Boss { instruction: String::new() }),
            "subordinate" => Ok(DaemonRole::Subordinate),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
