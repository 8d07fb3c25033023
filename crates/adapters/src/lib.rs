// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the one piece of genuinely external I/O in the system: the
//! supervised child process. Everything layered on top of stdin/stdout
//! framing (the multiplexer, the controllers) lives in `foreman-engine`.

pub mod supervisor;

pub use supervisor::{ProcessSupervisor, SupervisorAdapter, SupervisorConfig, SupervisorError};

#[cfg(any(test, feature = "test-support"))]
pub use supervisor::{FakeSupervisor, SupervisorCall};
