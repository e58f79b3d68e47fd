//! Error classification for retry decisions
//!
//! Fatal errors bypass retry and propagate on first occurrence. Everything
//! else is retried per policy.

use std::io;

use crate::error::{Abandoned, TaskError, TaskPanicked, TimeoutError};

/// Top-level error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient errors that may succeed on another attempt
    Retryable,

    /// Unrecoverable conditions that must propagate immediately
    Fatal,
}

/// Trait for error classification
pub trait RetryClassifiable {
    fn classify(&self) -> ErrorClass;

    fn is_retryable(&self) -> bool {
        self.classify() == ErrorClass::Retryable
    }
}

impl RetryClassifiable for io::Error {
    fn classify(&self) -> ErrorClass {
        match self.kind() {
            io::ErrorKind::OutOfMemory => ErrorClass::Fatal,
            _ => ErrorClass::Retryable,
        }
    }
}

/// A join error is either a panic or an aborted task; neither is worth retrying.
impl RetryClassifiable for tokio::task::JoinError {
    fn classify(&self) -> ErrorClass {
        ErrorClass::Fatal
    }
}

impl RetryClassifiable for TimeoutError {
    fn classify(&self) -> ErrorClass {
        ErrorClass::Retryable
    }
}

impl RetryClassifiable for Abandoned {
    fn classify(&self) -> ErrorClass {
        ErrorClass::Fatal
    }
}

impl RetryClassifiable for TaskPanicked {
    fn classify(&self) -> ErrorClass {
        ErrorClass::Fatal
    }
}

impl<E: RetryClassifiable> RetryClassifiable for TaskError<E> {
    fn classify(&self) -> ErrorClass {
        match self {
            TaskError::Timeout(err) => err.classify(),
            TaskError::Failed(err) => err.classify(),
            TaskError::Abandoned(err) => err.classify(),
        }
    }
}

/// Looks through the chain for a known fatal cause.
impl RetryClassifiable for anyhow::Error {
    fn classify(&self) -> ErrorClass {
        for cause in self.chain() {
            let fatal = cause.is::<Abandoned>()
                || cause.is::<TaskPanicked>()
                || cause.is::<tokio::task::JoinError>()
                || cause
                    .downcast_ref::<io::Error>()
                    .is_some_and(|err| err.classify() == ErrorClass::Fatal);
            if fatal {
                return ErrorClass::Fatal;
            }
        }
        ErrorClass::Retryable
    }
}
