//! Cancellable references to scheduled work.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

/// Query and cancel operations shared by every kind of scheduled work.
///
/// All queries are snapshots; under concurrent scheduling they may be stale
/// by the time the caller looks at them.
pub trait Cancellable: Send + Sync {
    /// Attempt to cancel the work.
    ///
    /// Returns `true` if this call prevented the work from (further)
    /// running. Pending work never starts once this returns `true`. Running
    /// work is only stopped when `may_interrupt` is set, and then only at
    /// its next suspension point.
    fn cancel(&self, may_interrupt: bool) -> bool;

    fn is_cancelled(&self) -> bool;

    /// `true` once the work finished, failed or was cancelled.
    fn is_done(&self) -> bool;

    /// Delay until the work is due; zero once it is due or has started.
    fn remaining_delay(&self) -> Duration;
}

/// Handle to a single delayed invocation.
///
/// Clones refer to the same invocation. Dropping a handle does not cancel
/// anything.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    inner: Arc<TaskState>,
}

#[derive(Debug)]
struct TaskState {
    state: AtomicU8,
    fire_at: Instant,
    interrupt: CancellationToken,
}

impl TaskHandle {
    pub(crate) fn new(fire_at: Instant) -> Self {
        Self {
            inner: Arc::new(TaskState {
                state: AtomicU8::new(PENDING),
                fire_at,
                interrupt: CancellationToken::new(),
            }),
        }
    }

    /// The instant the invocation is (or was) due.
    pub fn fire_at(&self) -> Instant {
        self.inner.fire_at
    }

    /// Claims the invocation for execution. Fails if it was cancelled first.
    pub(crate) fn try_start(&self) -> bool {
        self.inner
            .state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn finish(&self) {
        // An interrupting cancel may have moved us to CANCELLED already.
        let _ = self.inner.state.compare_exchange(
            RUNNING,
            DONE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn interrupt_token(&self) -> &CancellationToken {
        &self.inner.interrupt
    }
}

impl Cancellable for TaskHandle {
    fn cancel(&self, may_interrupt: bool) -> bool {
        let state = &self.inner.state;
        if state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // Wakes the timer so the pool does not hold the task until it is due.
            self.inner.interrupt.cancel();
            tracing::trace!("cancelled pending task");
            return true;
        }
        if may_interrupt
            && state
                .compare_exchange(RUNNING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.inner.interrupt.cancel();
            tracing::debug!("interrupting running task");
            return true;
        }
        false
    }

    fn is_cancelled(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == CANCELLED
    }

    fn is_done(&self) -> bool {
        matches!(self.inner.state.load(Ordering::Acquire), DONE | CANCELLED)
    }

    fn remaining_delay(&self) -> Duration {
        if self.inner.state.load(Ordering::Acquire) != PENDING {
            return Duration::ZERO;
        }
        self.inner.fire_at.saturating_duration_since(Instant::now())
    }
}
