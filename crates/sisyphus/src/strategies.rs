//! Retry strategies: stop, wait, retry predicates, and the give-up policy
//!
//! Each strategy is an independently configurable policy object. The
//! executor applies them in a fixed order (classify, stop check, wait) but
//! never composes them beyond that; combining predicates is the caller's
//! responsibility, via [`OrPredicate`] / [`AndPredicate`] or a closure.
//!
//! All strategies are `Send + Sync` and must be total functions: no panics,
//! no side effects visible to the attempt loop.

use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use rand::Rng;

use crate::error::chain_contains;
use crate::executor::Outcome;

/// Default ceiling on a single exponential inter-attempt delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(1000);

// ============================================================================
// Stop strategies
// ============================================================================

/// Decides whether to stop requesting more attempts.
///
/// `attempts` counts the attempt that just completed, so the first
/// evaluation sees `1`. Evaluated after every attempt, even the first.
pub trait StopStrategy: Send + Sync {
    /// Whether the loop should stop after `attempts` completed attempts
    fn should_stop(&self, attempts: u32) -> bool;
}

/// Never stops; the loop is bounded only by the retry predicates. Default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopStrategy for NeverStop {
    fn should_stop(&self, _attempts: u32) -> bool {
        false
    }
}

/// Stops once a fixed number of attempts has been performed.
#[derive(Debug, Clone, Copy)]
pub struct StopAfter {
    max_attempts: u32,
}

impl StopAfter {
    /// Limit the number of attempts to `max_attempts`
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl StopStrategy for StopAfter {
    fn should_stop(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

// ============================================================================
// Wait strategies
// ============================================================================

/// Decides how long to pause before the next attempt.
///
/// Only consulted once a retry has been decided: an operation that succeeds
/// or is abandoned never pays a wait cost. `Duration::ZERO` means no wait.
pub trait WaitStrategy: Send + Sync {
    /// The pause to apply after `attempts` completed attempts
    fn delay(&self, attempts: u32) -> Duration;
}

/// No pause between attempts. Default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl WaitStrategy for NoDelay {
    fn delay(&self, _attempts: u32) -> Duration {
        Duration::ZERO
    }
}

/// Constant pause between attempts.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    /// Wait `delay` between every pair of attempts
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl WaitStrategy for FixedDelay {
    fn delay(&self, _attempts: u32) -> Duration {
        self.delay
    }
}

/// Exponentially growing pause: `start * base^n` after attempt `n`, rounded
/// to whole milliseconds and capped.
///
/// The cap bounds the worst-case length of any single inter-attempt pause
/// regardless of how many attempts have elapsed. It defaults to one second
/// and can be moved with [`ExponentialBackoff::with_max_delay`].
///
/// # Example
///
/// ```rust
/// use sisyphus::{ExponentialBackoff, WaitStrategy};
/// use std::time::Duration;
///
/// let wait = ExponentialBackoff::new(Duration::from_millis(50), 2.0);
/// assert_eq!(wait.delay(1), Duration::from_millis(100)); // 50 * 2^1
/// assert_eq!(wait.delay(2), Duration::from_millis(200)); // 50 * 2^2
/// assert_eq!(wait.delay(10), Duration::from_millis(1000)); // capped
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    start_millis: u64,
    base: f64,
    max_delay: Duration,
}

impl ExponentialBackoff {
    /// Grow from `start_wait` by a factor of `backoff_base` per attempt
    pub fn new(start_wait: Duration, backoff_base: f64) -> Self {
        Self {
            start_millis: start_wait.as_millis() as u64,
            base: backoff_base,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Replace the default one-second ceiling
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

impl WaitStrategy for ExponentialBackoff {
    fn delay(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let backoff = self.start_millis as f64 * self.base.powf(f64::from(attempts));
        let capped = (self.max_delay.as_millis() as u64).min(backoff.round() as u64);
        Duration::from_millis(capped)
    }
}

/// Adds up to 25% random variation on top of another wait strategy.
///
/// Opt-in: the executor never applies jitter implicitly, so the delays of
/// an undecorated strategy stay exact. Zero delays stay zero.
#[derive(Debug, Clone, Copy)]
pub struct JitteredDelay<W> {
    inner: W,
}

impl<W> JitteredDelay<W> {
    /// Decorate `inner` with jitter
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: WaitStrategy> WaitStrategy for JitteredDelay<W> {
    fn delay(&self, attempts: u32) -> Duration {
        let base = self.inner.delay(attempts);
        if base.is_zero() {
            return base;
        }
        let jitter_range = base.as_millis() as u64 / 4;
        let jitter = rand::rng().random_range(0..=jitter_range);
        base + Duration::from_millis(jitter)
    }
}

// ============================================================================
// Retry predicates
// ============================================================================

/// Decides whether a single attempt's outcome warrants another attempt.
///
/// One trait serves both retry roles. Over the operation's result type it
/// answers "does this successful-looking value still warrant a retry"
/// (e.g. a response carrying a failure status inside a normal return
/// value); over the error type it answers "is this failure retryable".
pub trait RetryPredicate<V: ?Sized>: Send + Sync {
    /// Whether `value` warrants another attempt
    fn should_retry(&self, value: &V) -> bool;
}

/// A predicate that always retries. Default failure strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<V: ?Sized> RetryPredicate<V> for AlwaysRetry {
    fn should_retry(&self, _value: &V) -> bool {
        true
    }
}

/// A predicate that never retries. Default result strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl<V: ?Sized> RetryPredicate<V> for NeverRetry {
    fn should_retry(&self, _value: &V) -> bool {
        false
    }
}

/// A predicate backed by a closure
pub struct ClosurePredicate<F> {
    predicate: F,
}

impl<F> ClosurePredicate<F> {
    /// Create a new closure-based predicate
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<V, F> RetryPredicate<V> for ClosurePredicate<F>
where
    F: Fn(&V) -> bool + Send + Sync,
{
    fn should_retry(&self, value: &V) -> bool {
        (self.predicate)(value)
    }
}

/// A predicate that retries only on specific error messages
#[derive(Debug, Clone)]
pub struct MessagePredicate {
    /// Patterns that indicate retryable errors
    retryable_patterns: Vec<String>,
}

impl MessagePredicate {
    /// Create a new message predicate with the given patterns
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            retryable_patterns: patterns,
        }
    }

    /// Create a predicate for common network errors
    pub fn network_errors() -> Self {
        Self::new(vec![
            "timeout".to_string(),
            "timed out".to_string(),
            "connection reset".to_string(),
            "connection refused".to_string(),
            "network unreachable".to_string(),
            "temporary failure".to_string(),
        ])
    }
}

impl<E: Error> RetryPredicate<E> for MessagePredicate {
    fn should_retry(&self, error: &E) -> bool {
        let error_msg = error.to_string().to_lowercase();
        self.retryable_patterns
            .iter()
            .any(|pattern| error_msg.contains(&pattern.to_lowercase()))
    }
}

/// A trait for values that carry an embedded HTTP status
pub trait HttpStatusError {
    /// Get the HTTP status code if available
    fn status_code(&self) -> Option<u16>;
}

/// A predicate for HTTP status codes.
///
/// Works as a result strategy (a response value with a failure status
/// embedded in a normal return) as well as a failure strategy. A value
/// without a status code is not considered retry-worthy.
#[derive(Debug, Clone)]
pub struct HttpStatusPredicate {
    /// Status codes that should be retried
    retryable_codes: Vec<u16>,
}

impl HttpStatusPredicate {
    /// Create a predicate with default retryable status codes
    ///
    /// Default retryable codes: 408, 425, 429, 500, 502, 503, 504
    pub fn default_http() -> Self {
        Self {
            retryable_codes: vec![408, 425, 429, 500, 502, 503, 504],
        }
    }

    /// Create a predicate with custom retryable status codes
    pub fn with_codes(codes: Vec<u16>) -> Self {
        Self {
            retryable_codes: codes,
        }
    }

    /// Check if a status code is retryable
    pub fn is_retryable_code(&self, code: u16) -> bool {
        self.retryable_codes.contains(&code)
    }
}

impl<V: HttpStatusError> RetryPredicate<V> for HttpStatusPredicate {
    fn should_retry(&self, value: &V) -> bool {
        value
            .status_code()
            .map(|code| self.is_retryable_code(code))
            .unwrap_or(false)
    }
}

/// Retries when the error, or any error in its `source()` chain, is of
/// kind `K`.
///
/// Combine with [`OrPredicate`] to whitelist several kinds:
///
/// ```rust
/// use sisyphus::{OrPredicate, RetryOn};
/// use std::fmt;
///
/// #[derive(Debug)]
/// struct DnsFailure;
/// # impl fmt::Display for DnsFailure {
/// #     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "dns") }
/// # }
/// # impl std::error::Error for DnsFailure {}
/// #[derive(Debug)]
/// struct ConnectFailure;
/// # impl fmt::Display for ConnectFailure {
/// #     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "connect") }
/// # }
/// # impl std::error::Error for ConnectFailure {}
///
/// let transient = OrPredicate::new(RetryOn::<DnsFailure>::new(), RetryOn::<ConnectFailure>::new());
/// ```
pub struct RetryOn<K> {
    _kind: PhantomData<fn() -> K>,
}

impl<K> RetryOn<K> {
    /// Create a predicate matching errors of kind `K`
    pub fn new() -> Self {
        Self { _kind: PhantomData }
    }
}

impl<K> Default for RetryOn<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for RetryOn<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetryOn")
    }
}

impl<E, K> RetryPredicate<E> for RetryOn<K>
where
    E: Error + 'static,
    K: Error + 'static,
{
    fn should_retry(&self, error: &E) -> bool {
        chain_contains::<K>(error)
    }
}

/// Matches when either inner predicate matches
pub struct OrPredicate<A, B> {
    a: A,
    b: B,
}

impl<A, B> OrPredicate<A, B> {
    /// Combine two predicates with logical OR
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

impl<V, A, B> RetryPredicate<V> for OrPredicate<A, B>
where
    V: ?Sized,
    A: RetryPredicate<V>,
    B: RetryPredicate<V>,
{
    fn should_retry(&self, value: &V) -> bool {
        self.a.should_retry(value) || self.b.should_retry(value)
    }
}

/// Matches when both inner predicates match
pub struct AndPredicate<A, B> {
    a: A,
    b: B,
}

impl<A, B> AndPredicate<A, B> {
    /// Combine two predicates with logical AND
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

impl<V, A, B> RetryPredicate<V> for AndPredicate<A, B>
where
    V: ?Sized,
    A: RetryPredicate<V>,
    B: RetryPredicate<V>,
{
    fn should_retry(&self, value: &V) -> bool {
        self.a.should_retry(value) && self.b.should_retry(value)
    }
}

// ============================================================================
// Give-up policy
// ============================================================================

/// Terminal hook invoked once attempts are exhausted without cancellation.
///
/// Receives the final attempt's outcome and decides what the caller
/// observes: a value, or an error to propagate. Invoked at most once per
/// execution, and never when the execution was cancelled.
pub trait GiveUpStrategy<T, E>: Send + Sync {
    /// Decide the final outcome of the execution
    fn when_no_more_attempts(&self, last: Outcome<T, E>) -> Result<T, E>;
}

/// Default give-up policy: re-raise the last error unchanged, or hand back
/// the last (retry-worthy but exhausted) result as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagateLast;

impl<T, E> GiveUpStrategy<T, E> for PropagateLast {
    fn when_no_more_attempts(&self, last: Outcome<T, E>) -> Result<T, E> {
        match last {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }
}
