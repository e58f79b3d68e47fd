//! One-shot delayed execution on a shared worker pool.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::clock::{Clock, Deadline, TokioClock};
use crate::handle::{Cancellable, TaskHandle};
use crate::{CancelErr, OrCancelExt};

/// A scheduled body. It runs once, on the scheduler's pool.
pub type Task = BoxFuture<'static, ()>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no tokio runtime is running on this thread")]
    NoRuntime,
}

/// Runs a task once after a delay and hands back a cancellable handle.
///
/// Implementations never block the caller: `schedule_once` only arms a
/// timer. The scheduler is also the clock its delays are measured against.
pub trait Scheduler: Clock + Send + Sync + 'static {
    type Handle: Cancellable + Clone + Send + Sync + 'static;

    fn schedule_once(&self, delay: Duration, task: Task) -> Self::Handle;
}

/// [`Scheduler`] that spawns onto a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
    clock: TokioClock,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            clock: TokioClock,
        }
    }

    /// Scheduler for the runtime the caller is running on.
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| SchedulerError::NoRuntime)
    }
}

impl Clock for TokioScheduler {
    fn now(&self) -> tokio::time::Instant {
        self.clock.now()
    }
}

impl Scheduler for TokioScheduler {
    type Handle = TaskHandle;

    fn schedule_once(&self, delay: Duration, task: Task) -> TaskHandle {
        let fire_at = Deadline::after(&self.clock, delay).instant();
        let handle = TaskHandle::new(fire_at);
        let fired = handle.clone();

        self.runtime.spawn(async move {
            let token = fired.interrupt_token().clone();
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep_until(fire_at) => {}
            }
            if !fired.try_start() {
                return;
            }
            match AssertUnwindSafe(task).catch_unwind().or_cancel(&token).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => tracing::warn!("scheduled task panicked"),
                Err(CancelErr::Cancelled) => {
                    tracing::debug!("scheduled task interrupted");
                }
            }
            fired.finish();
        });

        tracing::trace!(delay_ms = delay.as_millis() as u64, "armed one-shot task");
        handle
    }
}
