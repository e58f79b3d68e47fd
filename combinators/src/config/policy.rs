use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

use super::error::{ConfigError, Result};
use crate::reporter::ErrorReporter;

/// Retry configuration for `retry_with_backoff`
///
/// Immutable once a retry begins; every step derives its own delay from the
/// sequence this policy produces.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = 1 + `max_attempts`)
    pub max_attempts: u32,
    /// Overall budget, measured from the moment the retry begins.
    /// No retry is started once it has run out, and no wait outlasts it.
    pub max_retry_timeout: Duration,
    /// Wait before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single wait
    pub max_delay: Duration,
    /// Growth factor between consecutive waits; at least 1.0
    pub exponent_factor: f64,
    /// Receives each failure that is about to be retried
    pub on_error: ErrorReporter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_retry_timeout: Duration::from_secs(30),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            exponent_factor: 2.0,
            on_error: ErrorReporter::default(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_max_retry_timeout(mut self, timeout: Duration) -> Self {
        self.max_retry_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn with_exponent_factor(mut self, factor: f64) -> Self {
        self.exponent_factor = factor;
        self
    }

    #[must_use]
    pub fn with_error_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.on_error = reporter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.exponent_factor.is_finite() || self.exponent_factor < 1.0 {
            return Err(ConfigError::InvalidArgument {
                field: "exponent_factor",
                reason: format!("must be a finite value >= 1.0, got {}", self.exponent_factor),
            });
        }
        Ok(())
    }

    /// Uncapped-by-deadline wait sequence: `initial_delay * factor^i`,
    /// bounded by `max_delay`, with one entry per permitted retry.
    pub(crate) fn delays(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.exponent_factor as f32)
            .with_max_times(self.max_attempts as usize)
            .build()
    }
}
