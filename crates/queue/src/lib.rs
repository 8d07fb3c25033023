// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable Task Queue (§4.E): a persistent priority FIFO over a shared
//! ordered store, with DAG dependency gating, at-most-one assignment, and
//! a result side-channel.
//!
//! [`queue::TaskQueue`] is the trait the controllers are built against;
//! [`redis_queue::RedisTaskQueue`] is the production implementation and,
//! behind the `test-support` feature, [`fake::FakeTaskQueue`] is a
//! deterministic in-memory double.

pub mod error;
pub mod queue;
pub mod redis_queue;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use error::QueueError;
pub use queue::{AddTaskOptions, QueueStats, TaskQueue};
pub use redis_queue::{RedisQueueConfig, RedisTaskQueue};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTaskQueue;
