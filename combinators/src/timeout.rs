//! Racing an operation against a deadline.
//!
//! The operation and a timer are both submitted to the scheduler and
//! complete the same [`Promise`]; whichever finishes first decides the
//! outcome. An operation with its own, earlier timeout therefore fails
//! first: an outer race never replaces an inner one.
//!
//! The losing side is not cancelled. A slow operation keeps running after
//! the race is lost and its result is dropped; callers that need the work
//! stopped must cancel it themselves.

use std::future::Future;
use std::time::Duration;

use cadence_async_utils::Scheduler;

use crate::error::{Abandoned, TimeoutError};
use crate::promise::{AsyncResult, promise};

/// Resolves with `operation`'s result, or with [`TimeoutError`] if
/// `timeout` elapses first.
pub fn race<S, Fut, T, E>(scheduler: &S, operation: Fut, timeout: Duration) -> AsyncResult<T, E>
where
    S: Scheduler + Clone,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<TimeoutError> + From<Abandoned> + Send + 'static,
{
    let started = scheduler.now();
    let (promise, result) = promise();

    let winner = promise.clone();
    scheduler.schedule_once(
        Duration::ZERO,
        Box::pin(async move {
            winner.try_complete(operation.await);
        }),
    );

    let clock = scheduler.clone();
    scheduler.schedule_once(
        timeout,
        Box::pin(async move {
            let elapsed = clock.now().saturating_duration_since(started);
            if promise.try_complete(Err(TimeoutError { elapsed }.into())) {
                tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "race lost to timeout");
            }
        }),
    );

    result
}
