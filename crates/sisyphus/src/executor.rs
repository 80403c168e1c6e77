//! Retry execution engine
//!
//! The executor owns the attempt loop: invoke the operation, classify the
//! outcome through the strategy set, then either pause and go again or
//! resolve the call. All per-call state (attempt count, last outcome,
//! cancelled flag) is local to one invocation, so a built [`Retrier`] can
//! serve any number of concurrent executions.

use std::error::Error;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::cancel::{is_interruption, CancelToken};
use crate::config::RetryConfig;
use crate::error::RetryError;
use crate::observer::{NoOpObserver, RetryObserver};
use crate::strategies::{
    AlwaysRetry, GiveUpStrategy, NeverRetry, NeverStop, NoDelay, PropagateLast, RetryPredicate,
    StopAfter, StopStrategy, WaitStrategy,
};

/// The observable result of a single attempt.
///
/// Exactly one side is ever meaningful: an attempt either returned a value
/// (which the result strategy may still judge retry-worthy) or failed with
/// an error. The final attempt's outcome is what the give-up policy
/// receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The operation returned a value
    Success(T),
    /// The operation failed
    Failure(E),
}

impl<T, E> Outcome<T, E> {
    /// The error of a failed attempt
    pub fn error(&self) -> Option<&E> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    /// The error of a failed attempt, consuming the outcome
    pub fn into_error(self) -> Option<E> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    /// Whether this attempt returned a value
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Whether this attempt failed
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }
}

impl<T, E: Error + 'static> Outcome<T, E> {
    fn error_dyn(&self) -> Option<&(dyn Error + 'static)> {
        self.error().map(|error| error as &(dyn Error + 'static))
    }
}

/// Execute an operation with retry behavior described by a declarative
/// configuration
///
/// This is a convenience entry point for configuration-driven retry
/// scenarios. For full control over the strategy set, use
/// [`Retrier::builder`].
///
/// # Example
///
/// ```rust,no_run
/// use sisyphus::{retry_with_config, RetryConfig, RetryError};
///
/// async fn example() -> Result<String, RetryError<std::io::Error>> {
///     let config = RetryConfig::from_yaml("max-attempts: 3").expect("valid config");
///
///     retry_with_config(&config, || async {
///         // Your fallible operation here
///         Ok("success".to_string())
///     })
///     .await
/// }
/// ```
pub async fn retry_with_config<F, Fut, T, E>(
    config: &RetryConfig,
    op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + Send + 'static,
{
    Retrier::builder().with_config(config).build().execute(op).await
}

/// Builder for assembling a [`Retrier`]
///
/// Every policy slot carries a default (retry on any failure, never on a
/// result, unbounded attempts, no wait, propagate the last outcome on
/// give-up, no observation), so a policy can never be absent: setters take
/// replacements by value and [`RetrierBuilder::build`] cannot fail.
///
/// # Example
///
/// ```rust
/// use sisyphus::{Retrier, StopAfter, FixedDelay, TracingObserver};
/// use std::time::Duration;
///
/// let retrier: Retrier<String, std::io::Error> = Retrier::builder()
///     .with_stop_strategy(StopAfter::new(5))
///     .with_wait_strategy(FixedDelay::new(Duration::from_millis(100)))
///     .with_observer(TracingObserver::new("download"))
///     .build();
/// ```
pub struct RetrierBuilder<T, E> {
    stop: Box<dyn StopStrategy>,
    wait: Box<dyn WaitStrategy>,
    retry_on_result: Box<dyn RetryPredicate<T>>,
    retry_on_error: Box<dyn RetryPredicate<E>>,
    give_up: Box<dyn GiveUpStrategy<T, E>>,
    observer: Box<dyn RetryObserver>,
}

impl<T, E> RetrierBuilder<T, E> {
    /// Create a new builder with the default strategy set
    pub fn new() -> Self {
        Self {
            stop: Box::new(NeverStop),
            wait: Box::new(NoDelay),
            retry_on_result: Box::new(NeverRetry),
            retry_on_error: Box::new(AlwaysRetry),
            give_up: Box::new(PropagateLast),
            observer: Box::new(NoOpObserver),
        }
    }

    /// Set the stop strategy
    pub fn with_stop_strategy(mut self, stop: impl StopStrategy + 'static) -> Self {
        self.stop = Box::new(stop);
        self
    }

    /// Set the wait strategy
    pub fn with_wait_strategy(mut self, wait: impl WaitStrategy + 'static) -> Self {
        self.wait = Box::new(wait);
        self
    }

    /// Set the result retry strategy
    ///
    /// The predicate decides whether a successful-looking result should
    /// still trigger a retry.
    pub fn with_result_retry_strategy(
        mut self,
        predicate: impl RetryPredicate<T> + 'static,
    ) -> Self {
        self.retry_on_result = Box::new(predicate);
        self
    }

    /// Set the failure retry strategy
    ///
    /// The predicate decides whether a raised error is retryable.
    pub fn with_failure_retry_strategy(
        mut self,
        predicate: impl RetryPredicate<E> + 'static,
    ) -> Self {
        self.retry_on_error = Box::new(predicate);
        self
    }

    /// Set the give-up policy
    pub fn with_give_up_strategy(mut self, give_up: impl GiveUpStrategy<T, E> + 'static) -> Self {
        self.give_up = Box::new(give_up);
        self
    }

    /// Set the observer
    pub fn with_observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Apply the stop and wait strategies described by a declarative
    /// configuration
    pub fn with_config(mut self, config: &RetryConfig) -> Self {
        self.stop = config.stop_strategy();
        self.wait = config.wait_strategy();
        self
    }

    /// Freeze the strategy set
    pub fn build(self) -> Retrier<T, E> {
        Retrier {
            stop: self.stop,
            wait: self.wait,
            retry_on_result: self.retry_on_result,
            retry_on_error: self.retry_on_error,
            give_up: self.give_up,
            observer: self.observer,
        }
    }
}

impl<T, E> Default for RetrierBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A frozen set of retry policies plus the attempt loop that applies them
///
/// Construct with [`Retrier::builder`]. A built value never changes, so a
/// single `Retrier` (wrapped in an `Arc` if desired) may serve any number
/// of concurrent `execute` calls without locking.
pub struct Retrier<T, E> {
    stop: Box<dyn StopStrategy>,
    wait: Box<dyn WaitStrategy>,
    retry_on_result: Box<dyn RetryPredicate<T>>,
    retry_on_error: Box<dyn RetryPredicate<E>>,
    give_up: Box<dyn GiveUpStrategy<T, E>>,
    observer: Box<dyn RetryObserver>,
}

impl<T, E> Retrier<T, E> {
    /// Create a builder with the default strategy set
    pub fn builder() -> RetrierBuilder<T, E> {
        RetrierBuilder::new()
    }

    /// A retrier that executes every operation exactly once
    ///
    /// The operation is never retried; errors propagate to the caller and
    /// results are returned as-is.
    pub fn single_attempt() -> Self {
        RetrierBuilder::new()
            .with_stop_strategy(StopAfter::new(1))
            .build()
    }

    /// Invoke `op` and retry it as the configured strategies require
    ///
    /// Resolves to the operation's value, or to a [`RetryError`] once the
    /// strategies decide the operation cannot be completed.
    pub async fn execute<F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + Send + 'static,
    {
        self.run(None, op).await
    }

    /// Like [`Retrier::execute`], additionally observing `token` after
    /// every attempt and during inter-attempt pauses
    ///
    /// A cancelled token resolves the call to [`RetryError::Cancelled`]
    /// without another attempt and without consulting the give-up policy.
    /// An operation doing blocking work is responsible for respecting the
    /// same token; the executor only reacts at its checkpoints.
    pub async fn execute_cancellable<F, Fut>(
        &self,
        token: &CancelToken,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + Send + 'static,
    {
        self.run(Some(token), op).await
    }

    async fn run<F, Fut>(&self, token: Option<&CancelToken>, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + Send + 'static,
    {
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            self.observer.on_attempt_start(attempts);

            let outcome = match op().await {
                Ok(value) => Outcome::Success(value),
                Err(error) => Outcome::Failure(error),
            };

            let attempt_failed = match &outcome {
                Outcome::Success(value) => self.retry_on_result.should_retry(value),
                Outcome::Failure(error) => self.retry_on_error.should_retry(error),
            };

            // Checked regardless of how the attempt went; cancellation takes
            // precedence over the retry decision.
            let mut cancelled = token.is_some_and(CancelToken::is_cancelled)
                || outcome.error().is_some_and(|error| is_interruption(error));

            let mut should_retry =
                !cancelled && attempt_failed && !self.stop.should_stop(attempts);

            if should_retry {
                let delay = self.wait.delay(attempts);
                self.observer
                    .on_attempt_failed(attempts, outcome.error_dyn(), delay);
                if !delay.is_zero() && !self.pause(token, delay).await {
                    should_retry = false;
                    cancelled = true;
                }
            }

            if should_retry {
                continue;
            }

            if cancelled {
                self.observer.on_cancelled(attempts, outcome.error_dyn());
                return Err(RetryError::cancelled(attempts, outcome.into_error()));
            }

            if attempt_failed {
                // Attempts exhausted; the give-up policy decides the final
                // observable outcome.
                self.observer.on_exhausted(attempts, outcome.error_dyn());
                return match self.give_up.when_no_more_attempts(outcome) {
                    Ok(value) => Ok(value),
                    Err(error) => Err(RetryError::exhausted(attempts, error, start.elapsed())),
                };
            }

            return match outcome {
                Outcome::Success(value) => {
                    self.observer.on_success(attempts, start.elapsed());
                    Ok(value)
                }
                Outcome::Failure(error) => {
                    self.observer.on_non_retryable(attempts, &error);
                    Err(RetryError::non_retryable(error))
                }
            };
        }
    }

    /// Pause between attempts. Returns false if the pause was cut short by
    /// cancellation.
    async fn pause(&self, token: Option<&CancelToken>, delay: Duration) -> bool {
        match token {
            None => {
                tokio::time::sleep(delay).await;
                true
            }
            Some(token) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => true,
                    _ = token.cancelled() => false,
                }
            }
        }
    }
}
