//! Retry observation and logging
//!
//! This module provides the `RetryObserver` trait for monitoring retry
//! attempts and a `TracingObserver` implementation that logs using the
//! `tracing` crate.

use std::error::Error;
use std::time::Duration;

/// Observer trait for retry attempt events
///
/// Implement this trait to receive callbacks during retry execution.
/// This is useful for logging, metrics collection, or debugging.
///
/// The `error` arguments are `None` when the event was triggered by a
/// retry-worthy *result* rather than a raised error.
pub trait RetryObserver: Send + Sync {
    /// Called when an attempt is about to start
    ///
    /// `attempt` is 1-indexed.
    fn on_attempt_start(&self, attempt: u32);

    /// Called when an attempt is judged retry-worthy and will be retried
    ///
    /// `delay` is the pause that will be applied before the next attempt.
    fn on_attempt_failed(&self, attempt: u32, error: Option<&(dyn Error + 'static)>, delay: Duration);

    /// Called when the operation succeeds
    ///
    /// `total_duration` is the time spent across all attempts.
    fn on_success(&self, attempt: u32, total_duration: Duration);

    /// Called when attempts are exhausted and the give-up policy takes over
    fn on_exhausted(&self, attempts: u32, error: Option<&(dyn Error + 'static)>);

    /// Called when the execution is cancelled
    fn on_cancelled(&self, attempt: u32, error: Option<&(dyn Error + 'static)>) {
        // Default implementation does nothing
        let _ = (attempt, error);
    }

    /// Called when the failure strategy declines to retry an error
    fn on_non_retryable(&self, attempt: u32, error: &(dyn Error + 'static)) {
        // Default implementation does nothing
        let _ = (attempt, error);
    }
}

/// A no-op observer that does nothing
///
/// Use this when you don't need observation but the API requires an observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32) {}

    fn on_attempt_failed(
        &self,
        _attempt: u32,
        _error: Option<&(dyn Error + 'static)>,
        _delay: Duration,
    ) {
    }

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _error: Option<&(dyn Error + 'static)>) {}
}

/// An observer that logs retry events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG
/// - `on_attempt_failed`: WARN
/// - `on_success`: INFO (if > 1 attempt) or DEBUG (first attempt)
/// - `on_exhausted`: ERROR
/// - `on_cancelled`: WARN
/// - `on_non_retryable`: WARN
///
/// # Example
///
/// ```rust
/// use sisyphus::TracingObserver;
///
/// // Create with operation name for better log context
/// let observer = TracingObserver::new("download");
/// ```
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the operation being retried (for log context)
    operation: String,
}

impl TracingObserver {
    /// Create a new tracing observer
    ///
    /// `operation` is a descriptive name for the operation being retried.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// Get the operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32) {
        tracing::debug!(
            operation = %self.operation,
            attempt = attempt,
            "starting attempt"
        );
    }

    fn on_attempt_failed(&self, attempt: u32, error: Option<&(dyn Error + 'static)>, delay: Duration) {
        match error {
            Some(err) => tracing::warn!(
                operation = %self.operation,
                attempt = attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "attempt failed, will retry"
            ),
            None => tracing::warn!(
                operation = %self.operation,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "result judged retry-worthy, will retry"
            ),
        }
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt = attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, attempts: u32, error: Option<&(dyn Error + 'static)>) {
        match error {
            Some(err) => tracing::error!(
                operation = %self.operation,
                attempts = attempts,
                error = %err,
                "all retry attempts exhausted"
            ),
            None => tracing::error!(
                operation = %self.operation,
                attempts = attempts,
                "all retry attempts exhausted without an acceptable result"
            ),
        }
    }

    fn on_cancelled(&self, attempt: u32, error: Option<&(dyn Error + 'static)>) {
        if let Some(err) = error {
            tracing::warn!(
                operation = %self.operation,
                attempt = attempt,
                error = %err,
                "retry cancelled"
            );
        } else {
            tracing::warn!(
                operation = %self.operation,
                attempt = attempt,
                "retry cancelled"
            );
        }
    }

    fn on_non_retryable(&self, attempt: u32, error: &(dyn Error + 'static)) {
        tracing::warn!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            "error is not retryable"
        );
    }
}

/// An observer that collects statistics about retry attempts
///
/// Useful for testing and metrics collection.
#[derive(Debug, Default)]
pub struct StatsObserver {
    /// Attempt start events
    pub attempt_starts: std::sync::atomic::AtomicU32,
    /// Failed attempt events
    pub failures: std::sync::atomic::AtomicU32,
    /// Success events
    pub successes: std::sync::atomic::AtomicU32,
    /// Exhaustion events
    pub exhaustions: std::sync::atomic::AtomicU32,
    /// Cancellation events
    pub cancellations: std::sync::atomic::AtomicU32,
    /// Non-retryable error events
    pub non_retryables: std::sync::atomic::AtomicU32,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of attempt starts
    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Get the number of failures
    pub fn failures(&self) -> u32 {
        self.failures.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Get the number of successes
    pub fn successes(&self) -> u32 {
        self.successes.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Get the number of exhaustions
    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Get the number of cancellations
    pub fn cancellations(&self) -> u32 {
        self.cancellations.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Get the number of non-retryable errors
    pub fn non_retryables(&self) -> u32 {
        self.non_retryables
            .load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _attempt: u32) {
        self.attempt_starts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn on_attempt_failed(
        &self,
        _attempt: u32,
        _error: Option<&(dyn Error + 'static)>,
        _delay: Duration,
    ) {
        self.failures
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {
        self.successes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn on_exhausted(&self, _attempts: u32, _error: Option<&(dyn Error + 'static)>) {
        self.exhaustions
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn on_cancelled(&self, _attempt: u32, _error: Option<&(dyn Error + 'static)>) {
        self.cancellations
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn on_non_retryable(&self, _attempt: u32, _error: &(dyn Error + 'static)) {
        self.non_retryables
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Implement RetryObserver for Arc<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, attempt: u32) {
        (**self).on_attempt_start(attempt)
    }

    fn on_attempt_failed(&self, attempt: u32, error: Option<&(dyn Error + 'static)>, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, error: Option<&(dyn Error + 'static)>) {
        (**self).on_exhausted(attempts, error)
    }

    fn on_cancelled(&self, attempt: u32, error: Option<&(dyn Error + 'static)>) {
        (**self).on_cancelled(attempt, error)
    }

    fn on_non_retryable(&self, attempt: u32, error: &(dyn Error + 'static)) {
        (**self).on_non_retryable(attempt, error)
    }
}

/// Implement RetryObserver for Box<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_attempt_start(&self, attempt: u32) {
        (**self).on_attempt_start(attempt)
    }

    fn on_attempt_failed(&self, attempt: u32, error: Option<&(dyn Error + 'static)>, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, error: Option<&(dyn Error + 'static)>) {
        (**self).on_exhausted(attempts, error)
    }

    fn on_cancelled(&self, attempt: u32, error: Option<&(dyn Error + 'static)>) {
        (**self).on_cancelled(attempt, error)
    }

    fn on_non_retryable(&self, attempt: u32, error: &(dyn Error + 'static)) {
        (**self).on_non_retryable(attempt, error)
    }
}
