//! Fail-fast, succeed-slow aggregation over concurrent operations.
//!
//! Every operation is submitted to the scheduler and completes into a shared
//! accumulator. The first failure resolves the aggregate at once, without
//! waiting for the others. A success is only reported once every operation
//! has contributed, unless the step function finishes early (as `exists`
//! and `forall` do).
//!
//! Contributions are applied in completion order, so `combine` should not
//! depend on ordering if a deterministic result is wanted.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cadence_async_utils::Scheduler;

use crate::error::Abandoned;
use crate::promise::{AsyncResult, Promise, lock, promise};

/// Folds every operation's value into `zero` with `combine`.
///
/// Fails with the first error to arrive; succeeds once all operations have
/// succeeded, with `combine` applied exactly once per operation.
pub fn fold_fast<S, I, Fut, T, E, R, C>(
    scheduler: &S,
    operations: I,
    zero: R,
    combine: C,
) -> AsyncResult<R, E>
where
    S: Scheduler,
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<Abandoned> + Send + 'static,
    R: Send + 'static,
    C: Fn(R, T) -> R + Send + Sync + 'static,
{
    aggregate(scheduler, operations, zero, move |acc, value| {
        Step::Continue(combine(acc, value))
    })
}

/// `true` as soon as one value satisfies `predicate`, `false` once all
/// operations completed without a match.
pub fn exists<S, I, Fut, T, E, P>(scheduler: &S, operations: I, predicate: P) -> AsyncResult<bool, E>
where
    S: Scheduler,
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<Abandoned> + Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    aggregate(scheduler, operations, false, move |_, value| {
        if predicate(&value) {
            Step::Finish(true)
        } else {
            Step::Continue(false)
        }
    })
}

/// `false` as soon as one value fails `predicate`, `true` once all
/// operations completed and satisfied it.
pub fn forall<S, I, Fut, T, E, P>(scheduler: &S, operations: I, predicate: P) -> AsyncResult<bool, E>
where
    S: Scheduler,
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<Abandoned> + Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    aggregate(scheduler, operations, true, move |_, value| {
        if predicate(&value) {
            Step::Continue(true)
        } else {
            Step::Finish(false)
        }
    })
}

enum Step<R> {
    Continue(R),
    /// Resolve the aggregate now with this value.
    Finish(R),
}

struct Aggregate<R, E, G> {
    /// `None` once the value has been published.
    acc: Mutex<Option<R>>,
    completed: AtomicUsize,
    total: usize,
    step: G,
    promise: Promise<R, E>,
}

fn aggregate<S, I, Fut, T, E, R, G>(scheduler: &S, operations: I, zero: R, step: G) -> AsyncResult<R, E>
where
    S: Scheduler,
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<Abandoned> + Send + 'static,
    R: Send + 'static,
    G: Fn(R, T) -> Step<R> + Send + Sync + 'static,
{
    let operations: Vec<Fut> = operations.into_iter().collect();
    if operations.is_empty() {
        return AsyncResult::ready(Ok(zero));
    }

    let (promise, result) = promise();
    let shared = Arc::new(Aggregate {
        acc: Mutex::new(Some(zero)),
        completed: AtomicUsize::new(0),
        total: operations.len(),
        step,
        promise,
    });
    for operation in operations {
        let mut participant = Participant {
            shared: Arc::clone(&shared),
            contributed: false,
        };
        scheduler.schedule_once(
            Duration::ZERO,
            Box::pin(async move {
                let outcome = operation.await;
                participant.shared.absorb(outcome);
                participant.contributed = true;
            }),
        );
    }
    result
}

/// One operation's stake in the aggregate. Dropping it before it has
/// contributed (a panic, an interrupt, runtime shutdown) fails the aggregate
/// with [`Abandoned`] at once.
struct Participant<R, E: From<Abandoned>, G> {
    shared: Arc<Aggregate<R, E, G>>,
    contributed: bool,
}

impl<R, E: From<Abandoned>, G> Drop for Participant<R, E, G> {
    fn drop(&mut self) {
        if !self.contributed && self.shared.promise.try_complete(Err(E::from(Abandoned))) {
            tracing::debug!("aggregate participant abandoned");
        }
    }
}

impl<R, E, G> Aggregate<R, E, G> {
    fn absorb<T>(&self, outcome: Result<T, E>)
    where
        G: Fn(R, T) -> Step<R>,
    {
        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                if self.promise.try_complete(Err(err)) {
                    tracing::debug!("aggregate failed fast");
                }
                return;
            }
        };
        if self.promise.is_completed() {
            return;
        }

        let finished = {
            let mut acc = lock(&self.acc);
            let Some(current) = acc.take() else {
                return;
            };
            match (self.step)(current, value) {
                Step::Continue(next) => {
                    *acc = Some(next);
                    None
                }
                Step::Finish(out) => Some(out),
            }
        };
        if let Some(out) = finished {
            self.promise.try_complete(Ok(out));
            return;
        }

        // Counted only after the step above is visible in `acc`, so the last
        // participant to count sees every contribution.
        if self.completed.fetch_add(1, Ordering::AcqRel) + 1 == self.total
            && let Some(out) = lock(&self.acc).take()
        {
            self.promise.try_complete(Ok(out));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::testing::{TestError, assert_close, scheduler};
    use futures::future::BoxFuture;
    use pretty_assertions::assert_eq;
    use tokio::time::{Instant, sleep};

    type Op = BoxFuture<'static, Result<u64, TaskError<TestError>>>;

    fn after(millis: u64, outcome: Result<u64, TestError>) -> Op {
        Box::pin(async move {
            sleep(Duration::from_millis(millis)).await;
            outcome.map_err(TaskError::Failed)
        })
    }

    async fn dies_after(millis: u64) -> Result<u64, TaskError<TestError>> {
        sleep(Duration::from_millis(millis)).await;
        panic!("participant died");
    }

    #[tokio::test(start_paused = true)]
    async fn fold_combines_every_value() {
        let scheduler = scheduler();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let ops: Vec<Op> = (1..=20).map(|i| after((i * 37) % 500, Ok(i))).collect();

        let total = fold_fast(&scheduler, ops, 0_u64, move |acc, v| {
            counter.fetch_add(1, Ordering::SeqCst);
            acc + v
        })
        .await;

        assert_eq!(total.ok(), Some(210));
        assert_eq!(calls.load(Ordering::SeqCst), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn fold_finishes_with_the_slowest_success() {
        let scheduler = scheduler();
        let start = Instant::now();
        let ops = vec![after(100, Ok(1)), after(900, Ok(2)), after(300, Ok(3))];

        let product = fold_fast(&scheduler, ops, 1_u64, |acc, v| acc * v).await;

        assert_eq!(product.ok(), Some(6));
        assert_close(start.elapsed(), Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn fold_fails_fast_on_first_error() {
        let scheduler = scheduler();
        let start = Instant::now();
        let ops = vec![
            after(10_000, Ok(1)),
            after(100, Err(TestError::Transient)),
            after(20_000, Ok(2)),
        ];

        let result = fold_fast(&scheduler, ops, 0_u64, |acc, v| acc + v).await;

        assert!(matches!(result, Err(TaskError::Failed(TestError::Transient))));
        assert_close(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn fold_over_nothing_is_zero() {
        let scheduler = scheduler();

        let result = fold_fast(&scheduler, Vec::<Op>::new(), 5_u64, |acc, v| acc + v).await;

        assert_eq!(result.ok(), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn fold_is_abandoned_as_soon_as_a_participant_panics() {
        let scheduler = scheduler();
        let start = Instant::now();
        let ops: Vec<Op> = vec![
            after(10, Ok(1)),
            Box::pin(dies_after(20)),
            after(10_000, Ok(2)),
        ];

        let result = fold_fast(&scheduler, ops, 0_u64, |acc, v| acc + v).await;

        assert!(matches!(result, Err(TaskError::Abandoned(_))));
        assert_close(start.elapsed(), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_combine_abandons_the_fold() {
        let scheduler = scheduler();
        let ops = vec![after(10, Ok(1)), after(5_000, Ok(2))];

        let result = fold_fast(&scheduler, ops, 0_u64, |_, v| {
            assert_ne!(v, 1, "combine rejected {v}");
            v
        })
        .await;

        assert!(matches!(result, Err(TaskError::Abandoned(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn exists_short_circuits_on_match() {
        let scheduler = scheduler();
        let start = Instant::now();
        let ops = vec![after(3_000, Ok(1)), after(200, Ok(42)), after(5_000, Ok(2))];

        let found = exists(&scheduler, ops, |v| *v == 42).await;

        assert_eq!(found.ok(), Some(true));
        assert_close(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn exists_is_false_after_all_complete() {
        let scheduler = scheduler();
        let start = Instant::now();
        let ops = vec![after(300, Ok(1)), after(100, Ok(2)), after(700, Ok(3))];

        let found = exists(&scheduler, ops, |v| *v > 10).await;

        assert_eq!(found.ok(), Some(false));
        assert_close(start.elapsed(), Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn exists_ignores_failures_after_a_match() {
        let scheduler = scheduler();
        let ops = vec![after(100, Ok(7)), after(500, Err(TestError::Transient))];

        let found = exists(&scheduler, ops, |v| *v == 7).await;

        assert_eq!(found.ok(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn forall_short_circuits_on_counterexample() {
        let scheduler = scheduler();
        let start = Instant::now();
        let ops = vec![after(100, Ok(2)), after(400, Ok(3)), after(9_000, Ok(4))];

        let all_even = forall(&scheduler, ops, |v| v % 2 == 0).await;

        assert_eq!(all_even.ok(), Some(false));
        assert_close(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn forall_is_true_when_every_value_matches() {
        let scheduler = scheduler();
        let ops = vec![after(100, Ok(2)), after(400, Ok(4)), after(50, Ok(6))];

        let all_even = forall(&scheduler, ops, |v| v % 2 == 0).await;

        assert_eq!(all_even.ok(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn forall_fails_fast_on_error() {
        let scheduler = scheduler();
        let ops = vec![after(100, Err(TestError::Fatal)), after(400, Ok(4))];

        let result = forall(&scheduler, ops, |v| v % 2 == 0).await;

        assert!(matches!(result, Err(TaskError::Failed(TestError::Fatal))));
    }
}
