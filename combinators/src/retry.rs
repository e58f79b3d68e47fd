//! Retry with immediate re-invocation or exponential backoff.
//!
//! Both engines stop on the first fatal error (see
//! [`RetryClassifiable`]) and surface the last failure verbatim once they
//! give up. Every failure that is retried is passed to the error reporter
//! first.

use std::fmt;
use std::future::Future;

use backon::ExponentialBackoff;
use cadence_async_utils::{Deadline, Scheduler};

use crate::classifier::RetryClassifiable;
use crate::config::{ConfigError, RetryPolicy};
use crate::error::Abandoned;
use crate::promise::{AsyncResult, Promise, promise};
use crate::reporter::ErrorReporter;

/// Invokes `f` up to `max_attempts + 1` times, retrying immediately from the
/// failed attempt's continuation.
pub async fn retry<F, Fut, T, E>(max_attempts: u32, on_error: &ErrorReporter, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryClassifiable + fmt::Display,
{
    let mut remaining = max_attempts;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if remaining > 0 && err.is_retryable() => {
                on_error.report(&err);
                remaining -= 1;
                tracing::trace!(remaining, "retrying immediately");
            }
            Err(err) => return Err(err),
        }
    }
}

/// Invokes `f`, re-scheduling it through `scheduler` with exponentially
/// growing waits while it fails.
///
/// Waits follow `initial_delay * exponent_factor^i`, capped at `max_delay`
/// and at whatever is left of `max_retry_timeout`. Retrying stops once the
/// attempts are used up or the timeout has passed.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidArgument`] without invoking `f` if the
/// policy's exponent factor is below 1.
pub fn retry_with_backoff<S, F, Fut, T, E>(
    scheduler: &S,
    policy: RetryPolicy,
    f: F,
) -> Result<AsyncResult<T, E>, ConfigError>
where
    S: Scheduler + Clone,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: RetryClassifiable + fmt::Display + From<Abandoned> + Send + 'static,
{
    policy.validate()?;
    let (promise, result) = promise();

    let attempt = BackoffAttempt {
        deadline: Deadline::after(scheduler, policy.max_retry_timeout),
        delays: policy.delays(),
        max_delay: policy.max_delay,
        on_error: policy.on_error,
        scheduler: scheduler.clone(),
        attempt: 0,
        f,
        promise,
    };
    attempt.arm(std::time::Duration::ZERO);

    Ok(result)
}

/// State carried from one scheduled attempt to the next.
struct BackoffAttempt<S, F, T, E> {
    scheduler: S,
    deadline: Deadline,
    delays: ExponentialBackoff,
    max_delay: std::time::Duration,
    on_error: ErrorReporter,
    attempt: u32,
    f: F,
    promise: Promise<T, E>,
}

impl<S, F, Fut, T, E> BackoffAttempt<S, F, T, E>
where
    S: Scheduler + Clone,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: RetryClassifiable + fmt::Display + From<Abandoned> + Send + 'static,
{
    fn arm(self, delay: std::time::Duration) {
        let scheduler = self.scheduler.clone();
        scheduler.schedule_once(delay, Box::pin(self.run()));
    }

    async fn run(mut self) {
        self.attempt += 1;
        let err = match (self.f)().await {
            Ok(value) => {
                self.promise.try_complete(Ok(value));
                return;
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            tracing::debug!(attempt = self.attempt, "fatal error, not retrying");
            self.promise.try_complete(Err(err));
            return;
        }
        let Some(next) = self.delays.next() else {
            tracing::debug!(attempt = self.attempt, "retry attempts exhausted");
            self.promise.try_complete(Err(err));
            return;
        };
        if self.deadline.is_overdue(&self.scheduler) {
            tracing::debug!(attempt = self.attempt, "retry timeout passed");
            self.promise.try_complete(Err(err));
            return;
        }

        let delay = next
            .min(self.max_delay)
            .min(self.deadline.time_left(&self.scheduler));
        self.on_error.report(&err);
        tracing::trace!(
            attempt = self.attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling retry"
        );
        self.arm(delay);
    }
}
