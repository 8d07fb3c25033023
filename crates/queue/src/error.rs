// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Errors raised by the Durable Task Queue (§4.E).

use foreman_core::{ErrorKind, HasErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("task `{0}` has no active job to complete")]
    NotActive(String),
    #[error("work result task id `{got}` does not match `{expected}`")]
    ResultMismatch { expected: String, got: String },
    #[error("job `{0}` not found")]
    NotFound(String),
    #[error("task failed validation: {0}")]
    Validation(#[from] foreman_core::ValidationError),
    #[error("durable store unreachable: {0}")]
    Unavailable(String),
    #[error("store returned malformed data: {0}")]
    Corrupt(String),
}

impl HasErrorKind for QueueError {
    fn kind(&self) -> ErrorKind {
        match self {
            QueueError::NotActive(_) | QueueError::NotFound(_) | QueueError::Corrupt(_) => {
                ErrorKind::QueueError
            }
            QueueError::ResultMismatch { .. } => ErrorKind::ResultMismatch,
            QueueError::Validation(_) => ErrorKind::Validation,
            QueueError::Unavailable(_) => ErrorKind::QueueError,
        }
    }
}

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        QueueError::Unavailable(e.to_string())
    }
}
