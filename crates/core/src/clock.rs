// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Time abstraction so tests can control elapsed time without sleeping.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock time for components that need timestamps
/// (`createdAt`, `completionTime`, metrics windows, back-off deadlines).
pub trait Clock: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}

/// Controllable clock for deterministic tests.
#[derive(Debug, Clone)]
pub struct FakeClock {
    now_ms: Arc<Mutex<u64>>,
}

impl FakeClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(Mutex::new(start_ms)),
        }
    }

    pub fn advance(&self, delta: Duration) {
        *self.now_ms.lock() += delta.as_millis() as u64;
    }

    pub fn set(&self, ms: u64) {
        *self.now_ms.lock() = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for FakeClock {
    fn epoch_ms(&self) -> u64 {
        *self.now_ms.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
