//! Scheduler-driven concurrency combinators.
//!
//! Everything here runs on a [`Scheduler`]'s pool and never blocks the
//! caller:
//! - [`race`] bounds an operation by a timeout
//! - [`retry`] and [`retry_with_backoff`] re-run failing operations
//! - [`schedule_fixed_delay`] and [`schedule_fixed_rate`] repeat a task until
//!   its [`RepeatingHandle`] is cancelled
//! - [`fold_fast`], [`exists`] and [`forall`] aggregate many concurrent
//!   operations, failing fast and succeeding slow
//!
//! Results come back as an [`AsyncResult`], a single-assignment future.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod classifier;
pub mod config;
pub mod error;
pub mod fold;
pub mod promise;
pub mod repeater;
pub mod reporter;
pub mod retry;
pub mod timeout;

pub use cadence_async_utils::{
    Cancellable, Clock, Deadline, Scheduler, TaskHandle, TokioClock, TokioScheduler,
};
pub use classifier::{ErrorClass, RetryClassifiable};
pub use config::{ConfigError, RetryPolicy};
pub use error::{Abandoned, TaskError, TaskPanicked, TimeoutError};
pub use fold::{exists, fold_fast, forall};
pub use promise::{AsyncResult, Promise, promise};
pub use repeater::{RepeatingHandle, schedule_fixed_delay, schedule_fixed_rate};
pub use reporter::ErrorReporter;
pub use retry::{retry, retry_with_backoff};
pub use timeout::race;
