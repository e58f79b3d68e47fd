//! Error types produced by the combinators.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// A race was lost to its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out after {elapsed:?}")]
pub struct TimeoutError {
    pub elapsed: Duration,
}

/// Every writer of an [`AsyncResult`](crate::AsyncResult) went away without
/// completing it: the producing task panicked, was interrupted, or the
/// runtime shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task was dropped before producing a result")]
pub struct Abandoned;

/// A repeating task iteration panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task panicked: {message}")]
pub struct TaskPanicked {
    pub message: String,
}

impl TaskPanicked {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

/// Canonical error for operations run through the combinators.
///
/// Converts from [`TimeoutError`] and [`Abandoned`], so it can be the error
/// type of `race`, `fold_fast` and friends while `Failed` carries whatever
/// the operation itself raised.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("task failed: {0}")]
    Failed(#[source] E),

    #[error(transparent)]
    Abandoned(#[from] Abandoned),
}

impl<E> TaskError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout(_))
    }

    /// The operation's own error, if that is what this is.
    pub fn into_failure(self) -> Option<E> {
        match self {
            TaskError::Failed(err) => Some(err),
            _ => None,
        }
    }
}
