//! Single-assignment result cell.
//!
//! A [`Promise`] is the writing side and can be cloned freely; the first
//! `try_complete` wins and every later one is ignored. The paired
//! [`AsyncResult`] is the future that observes the value.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::Abandoned;

type Slot<T, E> = Mutex<Option<oneshot::Sender<Result<T, E>>>>;

/// Creates an empty cell.
pub fn promise<T, E>() -> (Promise<T, E>, AsyncResult<T, E>) {
    let (tx, rx) = oneshot::channel();
    let promise = Promise {
        slot: Arc::new(Mutex::new(Some(tx))),
    };
    (promise, AsyncResult { rx })
}

pub struct Promise<T, E> {
    slot: Arc<Slot<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T, E> Promise<T, E> {
    /// Completes the cell unless something else already did.
    ///
    /// Returns `true` if this call won.
    pub fn try_complete(&self, result: Result<T, E>) -> bool {
        let Some(tx) = lock(&self.slot).take() else {
            return false;
        };
        // A dropped reader just means nobody is listening any more.
        let _ = tx.send(result);
        true
    }

    pub fn is_completed(&self) -> bool {
        lock(&self.slot).is_none()
    }
}

impl<T, E> std::fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Eventual outcome of a combinator.
///
/// Resolves to `E::from(Abandoned)` if every [`Promise`] for it is dropped
/// without completing.
#[must_use = "an AsyncResult does nothing unless awaited"]
#[derive(Debug)]
pub struct AsyncResult<T, E> {
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> AsyncResult<T, E> {
    /// A result that is already resolved.
    pub fn ready(result: Result<T, E>) -> Self {
        let (promise, result_cell) = promise();
        promise.try_complete(result);
        result_cell
    }
}

impl<T, E> Future for AsyncResult<T, E>
where
    E: From<Abandoned>,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(E::from(Abandoned)),
        })
    }
}

/// Locks a mutex, ignoring poisoning; none of the guarded data in this crate
/// can be left half-updated by a panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use pretty_assertions::assert_eq;

    type Cell = (Promise<u32, TaskError<String>>, AsyncResult<u32, TaskError<String>>);

    #[tokio::test]
    async fn first_completion_wins() {
        let (promise, result): Cell = promise();
        let other = promise.clone();

        assert!(promise.try_complete(Ok(1)));
        assert!(!other.try_complete(Ok(2)));
        assert!(other.is_completed());

        assert_eq!(result.await.ok(), Some(1));
    }

    #[tokio::test]
    async fn dropping_every_promise_abandons_the_result() {
        let (promise, result): Cell = promise();
        let other = promise.clone();
        drop(promise);
        drop(other);

        assert!(matches!(result.await, Err(TaskError::Abandoned(Abandoned))));
    }

    #[tokio::test]
    async fn completing_after_reader_dropped_still_counts() {
        let (promise, result): Cell = promise();
        drop(result);

        assert!(promise.try_complete(Ok(3)));
        assert!(!promise.try_complete(Ok(4)));
    }

    #[tokio::test]
    async fn ready_result_resolves_immediately() {
        let result: AsyncResult<u32, TaskError<String>> = AsyncResult::ready(Ok(9));

        assert_eq!(result.await.ok(), Some(9));
    }
}
