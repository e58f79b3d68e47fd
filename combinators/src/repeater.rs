//! Fixed-delay and fixed-rate repetition on top of one-shot scheduling.
//!
//! Each iteration is its own one-shot task; when it finishes it arms the
//! next one through the scheduler, so stack depth stays flat no matter how
//! long the repetition runs. The caller gets a single [`RepeatingHandle`]
//! that follows whichever one-shot handle is live.
//!
//! Iteration failures and panics go to the error reporter and the cadence
//! carries on. Only cancelling the handle stops a repetition.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadence_async_utils::{Cancellable, Deadline, Scheduler};
use futures::FutureExt;
use tokio::time::Instant;

use crate::error::TaskPanicked;
use crate::promise::lock;
use crate::reporter::ErrorReporter;

/// Runs `factory()` first after `initial_delay`, then `delay` after each
/// previous run completes.
pub fn schedule_fixed_delay<S, F, Fut, T, E>(
    scheduler: &S,
    initial_delay: Duration,
    delay: Duration,
    on_error: ErrorReporter,
    factory: F,
) -> RepeatingHandle<S::Handle>
where
    S: Scheduler + Clone,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    start(scheduler, initial_delay, Cadence::FixedDelay(delay), on_error, factory)
}

/// Runs `factory()` first after `initial_delay`, then at nominal starts
/// spaced `rate` apart.
///
/// A run that overruns its slot is followed immediately by the next one,
/// and the cadence restarts from there; missed slots are skipped rather
/// than replayed, so at most one run is ever pending.
pub fn schedule_fixed_rate<S, F, Fut, T, E>(
    scheduler: &S,
    initial_delay: Duration,
    rate: Duration,
    on_error: ErrorReporter,
    factory: F,
) -> RepeatingHandle<S::Handle>
where
    S: Scheduler + Clone,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    start(scheduler, initial_delay, Cadence::FixedRate(rate), on_error, factory)
}

fn start<S, F, Fut, T, E>(
    scheduler: &S,
    initial_delay: Duration,
    cadence: Cadence,
    on_error: ErrorReporter,
    factory: F,
) -> RepeatingHandle<S::Handle>
where
    S: Scheduler + Clone,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let shared = Arc::new(Shared {
        cancelled: AtomicBool::new(false),
        live: Mutex::new(None),
        iterations: AtomicU64::new(0),
    });
    let repetition = Repetition {
        generation: 0,
        nominal_start: Deadline::after(scheduler, initial_delay).instant(),
        scheduler: scheduler.clone(),
        cadence,
        on_error,
        factory,
        shared: Arc::clone(&shared),
    };
    repetition.arm(initial_delay);
    RepeatingHandle { shared }
}

#[derive(Debug, Clone, Copy)]
enum Cadence {
    FixedDelay(Duration),
    FixedRate(Duration),
}

/// The cell shared by the caller's handle and the running repetition.
#[derive(Debug)]
struct Shared<H> {
    cancelled: AtomicBool,
    /// Most recently armed handle, tagged with its generation.
    live: Mutex<Option<(u64, H)>>,
    iterations: AtomicU64,
}

impl<H: Clone> Shared<H> {
    fn live(&self) -> Option<H> {
        lock(&self.live).as_ref().map(|(_, handle)| handle.clone())
    }

    /// Records `handle` unless a later generation is already recorded. A
    /// scheduler may run an iteration, and let it arm its successor, before
    /// `schedule_once` returns to the arming call.
    fn publish(&self, generation: u64, handle: &H) {
        let mut live = lock(&self.live);
        if live
            .as_ref()
            .is_none_or(|(published, _)| *published < generation)
        {
            *live = Some((generation, handle.clone()));
        }
    }
}

/// Handle for a whole repetition, stable across iterations.
///
/// Dropping it does not stop the repetition.
#[derive(Debug)]
pub struct RepeatingHandle<H> {
    shared: Arc<Shared<H>>,
}

impl<H> Clone for RepeatingHandle<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H> RepeatingHandle<H> {
    /// Number of iterations that have started so far.
    pub fn iterations(&self) -> u64 {
        self.shared.iterations.load(Ordering::Acquire)
    }
}

impl<H> Cancellable for RepeatingHandle<H>
where
    H: Cancellable + Clone,
{
    /// Stops the repetition. No iteration is armed after this returns; an
    /// iteration that is already running finishes unless `may_interrupt`
    /// is set. Returns `true` only for the call that stopped it.
    fn cancel(&self, may_interrupt: bool) -> bool {
        let first = !self.shared.cancelled.swap(true, Ordering::SeqCst);
        if let Some(live) = self.shared.live() {
            live.cancel(may_interrupt);
        }
        if first {
            tracing::debug!(iterations = self.iterations(), "repeating task cancelled");
        }
        first
    }

    fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    fn is_done(&self) -> bool {
        self.is_cancelled() || self.shared.live().is_some_and(|live| live.is_done())
    }

    fn remaining_delay(&self) -> Duration {
        self.shared
            .live()
            .map_or(Duration::ZERO, |live| live.remaining_delay())
    }
}

/// State moved from one scheduled iteration into the next.
struct Repetition<S: Scheduler, F> {
    scheduler: S,
    factory: F,
    cadence: Cadence,
    /// Number of times this repetition has been armed.
    generation: u64,
    nominal_start: Instant,
    on_error: ErrorReporter,
    shared: Arc<Shared<S::Handle>>,
}

impl<S, F, Fut, T, E> Repetition<S, F>
where
    S: Scheduler + Clone,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    fn arm(mut self, delay: Duration) {
        if self.shared.cancelled.load(Ordering::SeqCst) {
            tracing::trace!("repetition cancelled, not rearming");
            return;
        }
        self.generation += 1;
        let generation = self.generation;
        let shared = Arc::clone(&self.shared);
        let scheduler = self.scheduler.clone();
        let handle = scheduler.schedule_once(delay, Box::pin(self.fire()));
        shared.publish(generation, &handle);

        // A cancel that ran between the check above and publishing the new
        // handle could not see it; cancel it here instead.
        if shared.cancelled.load(Ordering::SeqCst) {
            handle.cancel(false);
        }
    }

    async fn fire(mut self) {
        if self.shared.cancelled.load(Ordering::SeqCst) {
            tracing::trace!("repetition cancelled before iteration started");
            return;
        }
        self.shared.iterations.fetch_add(1, Ordering::AcqRel);

        let outcome = AssertUnwindSafe(async { (self.factory)().await })
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => self.on_error.report(&err),
            Err(payload) => self.on_error.report(&TaskPanicked::from_payload(payload)),
        }

        let delay = self.next_delay();
        self.arm(delay);
    }

    fn next_delay(&mut self) -> Duration {
        match self.cadence {
            Cadence::FixedDelay(delay) => delay,
            Cadence::FixedRate(rate) => {
                let now = self.scheduler.now();
                let next = self
                    .nominal_start
                    .checked_add(rate)
                    .unwrap_or_else(|| Deadline::after(&self.scheduler, rate).instant());
                if next > now {
                    self.nominal_start = next;
                    next - now
                } else {
                    tracing::trace!(
                        overrun_ms = (now - next).as_millis() as u64,
                        "fixed-rate iteration overran, skipping missed slots"
                    );
                    self.nominal_start = now;
                    Duration::ZERO
                }
            }
        }
    }
}
