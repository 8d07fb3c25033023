// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-daemon (`foremand`): the long-running process that owns one
//! supervised child and drives either a [`BossController`] or a
//! [`SubordinateController`] against the Durable Task Queue.
//!
//! [`run`] is the entire lifecycle: connect to Redis, spawn the child,
//! initialize the controller, then loop until `SIGTERM`/`SIGINT`/Ctrl-C,
//! running periodic queue-maintenance sweeps alongside the role's own
//! work loop.

pub mod error;
pub mod role;
pub mod runtime;

pub use error::DaemonError;
pub use role::DaemonRole;
pub use runtime::run;
