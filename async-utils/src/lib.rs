//! Async utilities for cancellation-aware delayed execution.
//!
//! Provides the `OrCancelExt` trait for making futures cancellable with
//! tokio's `CancellationToken`, plus the scheduling substrate the
//! combinators build on: a [`Clock`], one-shot [`TaskHandle`]s and the
//! [`Scheduler`] trait with its tokio-backed implementation.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod clock;
pub mod handle;
pub mod scheduler;

pub use clock::{Clock, Deadline, TokioClock};
pub use handle::{Cancellable, TaskHandle};
pub use scheduler::{Scheduler, SchedulerError, Task, TokioScheduler};

use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Error returned when a future is cancelled.
#[derive(Debug, PartialEq, Eq)]
pub enum CancelErr {
    Cancelled,
}

/// Extension trait for making futures cancellable.
///
/// Allows any future to race against a `CancellationToken`, returning
/// `Err(CancelErr::Cancelled)` if the token is cancelled before the
/// future completes. The future is dropped at that point, which is how
/// scheduled bodies get interrupted at their next suspension point.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Race this future against the cancellation token.
    ///
    /// Returns `Ok(output)` if the future completes first, or
    /// `Err(CancelErr::Cancelled)` if the token is cancelled.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::task;
    use tokio::time::sleep;

    #[tokio::test]
    async fn returns_ok_when_future_completes_first() {
        let token = CancellationToken::new();

        let result = async { 42 }.or_cancel(&token).await;

        assert_eq!(Ok(42), result);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_token_drops_the_pending_future() {
        let token = CancellationToken::new();
        let token_clone = token.clone();
        let reached_end = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reached_end);

        let cancel_handle = task::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            token_clone.cancel();
        });

        let result = async move {
            sleep(Duration::from_millis(100)).await;
            flag.store(true, Ordering::SeqCst);
            7
        }
        .or_cancel(&token)
        .await;

        cancel_handle.await.expect("cancel task panicked");
        sleep(Duration::from_millis(200)).await;
        assert_eq!(Err(CancelErr::Cancelled), result);
        assert!(!reached_end.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn already_cancelled_token_wins_over_a_ready_future() {
        let token = CancellationToken::new();
        token.cancel();

        let result = async { 5 }.or_cancel(&token).await;

        assert_eq!(Err(CancelErr::Cancelled), result);
    }
}
