//! Injectable callback for failures that are retried or swallowed.

use std::fmt;
use std::sync::Arc;

type ReportFn = dyn Fn(&dyn fmt::Display) + Send + Sync;

/// Receives every failure that a combinator does not propagate: errors that
/// are about to be retried and errors from repeating task iterations.
///
/// The default emits a `tracing::warn!` event.
#[derive(Clone)]
pub struct ErrorReporter {
    report: Arc<ReportFn>,
}

impl ErrorReporter {
    pub fn new<F>(report: F) -> Self
    where
        F: Fn(&dyn fmt::Display) + Send + Sync + 'static,
    {
        Self {
            report: Arc::new(report),
        }
    }

    pub fn tracing() -> Self {
        Self::new(|err| tracing::warn!(error = %err, "task failed"))
    }

    /// Drops every report.
    pub fn silent() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, err: &dyn fmt::Display) {
        (self.report)(err);
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorReporter")
    }
}
