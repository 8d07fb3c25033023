// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-core: shared data model, validation, and error taxonomy for the
//! orchestration kernel (Process Supervisor, Command Multiplexer, Durable
//! Task Queue, and the Boss/Subordinate controllers built on top of them).

pub mod clock;
pub mod command;
pub mod dag;
pub mod error;
pub mod event;
pub mod id;
pub mod process;
pub mod queue_job;
pub mod task;
pub mod test_result;
pub mod validation;
pub mod work_result;

pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{
    Command, CommandId, CommandOptions, CommandStatus, DetailedStats, MuxMetrics, Payload,
    Response, TextClassification,
};
pub use dag::{topo_sort, CircularDependency};
pub use error::{ErrorKind, HasErrorKind, ValidationError};
pub use event::{QueueEvent, SubordinateEvent, SupervisorEvent};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use process::{ProcessInfo, ProcessStatus};
pub use queue_job::{JobId, JobState, QueueJob};
pub use task::{QueuePriority, Task, TaskId, TaskStatus};
pub use test_result::{
    BrowserTestResult, CoverageReport, IntegrationTestKind, IntegrationTestResult,
    PerformanceMetrics, TestDetail, TestResult, TestType,
};
pub use validation::{
    classify_text_payload, validate_code_changes, validate_integration_test_result, validate_task,
    validate_tasks, validate_test_result, validate_work_result,
};
pub use work_result::{ChangeAction, CodeChange, WorkResult};
