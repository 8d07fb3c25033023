// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! The `TestResult` entity (§3), plus the integration-test extensions used
//! by the Boss's `runIntegrationTests`/`runBrowserTests` operations (§4.F).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Unit,
    Integration,
}

/// One individual test's outcome, within a [`TestResult`]'s `details`.
///
/// The wire key for `duration_ms` is the abbreviated `duration` (§4.D), not
/// `durationMs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDetail {
    pub name: String,
    pub passed: bool,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate test outcome for one execution.
///
/// Invariant (checked only at the aggregate level, not cross-checked against
/// `details`): `passed == (failed == 0 && total == passed_count)`.
///
/// The wire key for `execution_time_ms` is the abbreviated `executionTime`
/// (§4.D), not `executionTimeMs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_type: TestType,
    pub passed: bool,
    pub total: u32,
    pub passed_count: u32,
    pub failed_count: u32,
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
    pub details: Vec<TestDetail>,
}

impl TestResult {
    /// Whether the aggregate's `passed` flag is internally consistent with
    /// its own counters (not a cross-check against `details`).
    pub fn is_internally_consistent(&self) -> bool {
        self.passed == (self.failed_count == 0 && self.total == self.passed_count)
    }
}

/// Code coverage summary attached to an [`IntegrationTestResult`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub lines_pct: f64,
    pub branches_pct: f64,
    pub functions_pct: f64,
}

/// Optional performance metrics captured during integration testing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// One scenario run via a headless-browser test pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserTestResult {
    pub scenario: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What kind of integration run produced an [`IntegrationTestResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationTestKind {
    Backend,
    Frontend,
    Full,
}

/// Extended [`TestResult`] returned by `Boss::run_integration_tests` (§4.F).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationTestResult {
    pub base: TestResult,
    pub kind: IntegrationTestKind,
    pub coverage: Option<CoverageReport>,
    pub performance_metrics: Option<PerformanceMetrics>,
    pub browser_test_results: Option<Vec<BrowserTestResult>>,
}

#[cfg(test)]
#[path = "test_result_tests.rs"]
mod tests;
