//! Integration tests for the retry executor
//!
//! These tests verify the complete execution flow: strategy evaluation
//! order, attempt counts, cancellation, give-up behavior, observers, and
//! configuration-driven assembly.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cancel::{CancelToken, Interrupted};
use crate::config::RetryConfig;
use crate::executor::{retry_with_config, Outcome, Retrier};
use crate::observer::StatsObserver;
use crate::strategies::{
    ClosurePredicate, FixedDelay, GiveUpStrategy, StopAfter, WaitStrategy,
};

/// Wait strategy that counts how often it is consulted
struct CountingWait {
    calls: Arc<AtomicU32>,
    delay: Duration,
}

impl WaitStrategy for CountingWait {
    fn delay(&self, _attempts: u32) -> Duration {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.delay
    }
}

/// Give-up policy that counts invocations and otherwise propagates
struct CountingGiveUp {
    calls: Arc<AtomicU32>,
}

impl<T, E> GiveUpStrategy<T, E> for CountingGiveUp {
    fn when_no_more_attempts(&self, last: Outcome<T, E>) -> Result<T, E> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match last {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }
}

/// Error whose cause chain ends in an [`Interrupted`] marker
#[derive(Debug)]
struct AbortedRequest(Interrupted);

impl fmt::Display for AbortedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request aborted")
    }
}

impl std::error::Error for AbortedRequest {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

// ============================================================================
// Stop strategy driven attempt counts
// ============================================================================

#[tokio::test]
async fn test_stop_at_n_invokes_operation_exactly_n_times() {
    for n in [1u32, 2, 5, 10] {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let retrier: Retrier<&str, io::Error> = Retrier::builder()
            .with_stop_strategy(StopAfter::new(n))
            .build();

        let result = retrier
            .execute(|| {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<&str, _>(io::Error::new(io::ErrorKind::TimedOut, "always fails"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), n, "stop at {}", n);

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), n);
        assert_eq!(err.into_source().unwrap().kind(), io::ErrorKind::TimedOut);
    }
}

#[tokio::test]
async fn test_single_attempt_invokes_once_and_propagates_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let retrier: Retrier<&str, io::Error> = Retrier::single_attempt();

    let result = retrier
        .execute(|| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<&str, _>(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let source = result.unwrap_err().into_source().unwrap();
    assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
    assert_eq!(source.to_string(), "denied");
}

#[tokio::test]
async fn test_single_attempt_returns_success_as_is() {
    let retrier: Retrier<u32, io::Error> = Retrier::single_attempt();

    let result = retrier.execute(|| async { Ok(17) }).await;

    assert_eq!(result.unwrap(), 17);
}

// ============================================================================
// Result-based retry
// ============================================================================

#[tokio::test]
async fn test_result_retry_until_acceptable_value() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    // Values 0 are retry-worthy; the sequence is 0, 0, 1
    let retrier: Retrier<u32, io::Error> = Retrier::builder()
        .with_result_retry_strategy(ClosurePredicate::new(|value: &u32| *value == 0))
        .build();

    let result = retrier
        .execute(|| {
            let calls = calls_clone.clone();
            async move {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(if call < 3 { 0 } else { 1 })
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.unwrap(), 1);
}

#[tokio::test]
async fn test_exhausted_result_retry_hands_back_last_result() {
    // Every result is retry-worthy; the stop strategy ends the loop and the
    // default give-up policy returns the final result as-is.
    let retrier: Retrier<u32, io::Error> = Retrier::builder()
        .with_result_retry_strategy(ClosurePredicate::new(|value: &u32| *value == 0))
        .with_stop_strategy(StopAfter::new(3))
        .build();

    let result = retrier.execute(|| async { Ok(0) }).await;

    assert_eq!(result.unwrap(), 0);
}

// ============================================================================
// Failure-based retry
// ============================================================================

#[tokio::test]
async fn test_non_matching_error_kind_is_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_failure_retry_strategy(ClosurePredicate::new(|err: &io::Error| {
            err.kind() == io::ErrorKind::TimedOut
        }))
        .build();

    let result = retrier
        .execute(|| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<&str, _>(io::Error::new(io::ErrorKind::NotFound, "no such host"))
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let err = result.unwrap_err();
    assert!(err.is_non_retryable());

    // The wrapped error is the operation's error, unmodified
    let source = err.into_source().unwrap();
    assert_eq!(source.kind(), io::ErrorKind::NotFound);
    assert_eq!(source.to_string(), "no such host");
}

#[tokio::test]
async fn test_matching_error_kind_is_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_failure_retry_strategy(ClosurePredicate::new(|err: &io::Error| {
            err.kind() == io::ErrorKind::TimedOut
        }))
        .build();

    let result = retrier
        .execute(|| {
            let calls = calls_clone.clone();
            async move {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call < 3 {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "slow"))
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.unwrap(), "recovered");
}

// ============================================================================
// Wait strategy
// ============================================================================

#[tokio::test]
async fn test_wait_consulted_once_per_retry_decision() {
    let waits = Arc::new(AtomicU32::new(0));

    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_stop_strategy(StopAfter::new(4))
        .with_wait_strategy(CountingWait {
            calls: waits.clone(),
            delay: Duration::ZERO,
        })
        .build();

    let result = retrier
        .execute(|| async { Err::<&str, _>(io::Error::other("always fails")) })
        .await;

    assert!(result.is_err());
    // 4 attempts, no wait after the final non-retried one
    assert_eq!(waits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_wait_never_consulted_on_immediate_success() {
    let waits = Arc::new(AtomicU32::new(0));

    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_wait_strategy(CountingWait {
            calls: waits.clone(),
            delay: Duration::from_secs(60),
        })
        .build();

    let result = retrier.execute(|| async { Ok("instant") }).await;

    assert_eq!(result.unwrap(), "instant");
    assert_eq!(waits.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancellation_observed_after_attempt_stops_the_loop() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let give_ups = Arc::new(AtomicU32::new(0));
    let observer = Arc::new(StatsObserver::new());
    let token = CancelToken::new();
    let token_inside = token.clone();

    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_give_up_strategy(CountingGiveUp {
            calls: give_ups.clone(),
        })
        .with_observer(observer.clone())
        .build();

    let result = retrier
        .execute_cancellable(&token, || {
            let calls = calls_clone.clone();
            let token = token_inside.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                // The operation observes an external shutdown and cancels
                token.cancel();
                Err::<&str, _>(io::Error::new(io::ErrorKind::TimedOut, "mid-flight"))
            }
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(give_ups.load(Ordering::SeqCst), 0);
    assert_eq!(observer.cancellations(), 1);
    assert_eq!(observer.exhaustions(), 0);
}

#[tokio::test]
async fn test_cancellation_during_wait_aborts_promptly() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let give_ups = Arc::new(AtomicU32::new(0));
    let token = CancelToken::new();
    let signaller = token.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        signaller.cancel();
    });

    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_wait_strategy(FixedDelay::new(Duration::from_secs(60)))
        .with_give_up_strategy(CountingGiveUp {
            calls: give_ups.clone(),
        })
        .build();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        retrier.execute_cancellable(&token, || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<&str, _>(io::Error::other("always fails"))
            }
        }),
    )
    .await
    .expect("cancellation must cut the pause short");

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(give_ups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_precancelled_token_stops_after_first_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let token = CancelToken::new();
    token.cancel();

    let retrier: Retrier<u32, io::Error> = Retrier::builder().build();

    // Cancellation is observed at the post-attempt checkpoint, so the
    // operation itself still runs once.
    let result = retrier
        .execute_cancellable(&token, || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(9)
            }
        })
        .await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_interrupted_marker_in_cause_chain_cancels() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let give_ups = Arc::new(AtomicU32::new(0));

    let retrier: Retrier<&str, AbortedRequest> = Retrier::builder()
        .with_give_up_strategy(CountingGiveUp {
            calls: give_ups.clone(),
        })
        .build();

    let result = retrier
        .execute(|| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<&str, _>(AbortedRequest(Interrupted))
            }
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(give_ups.load(Ordering::SeqCst), 0);
    assert!(err.into_source().is_some());
}

// ============================================================================
// Give-up policy
// ============================================================================

#[tokio::test]
async fn test_give_up_invoked_exactly_once_on_exhaustion() {
    let give_ups = Arc::new(AtomicU32::new(0));

    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_stop_strategy(StopAfter::new(3))
        .with_give_up_strategy(CountingGiveUp {
            calls: give_ups.clone(),
        })
        .build();

    let result = retrier
        .execute(|| async { Err::<&str, _>(io::Error::other("always fails")) })
        .await;

    assert!(result.unwrap_err().is_exhausted());
    assert_eq!(give_ups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_give_up_substitution_returns_fallback_value() {
    struct Fallback(u32);

    impl GiveUpStrategy<u32, io::Error> for Fallback {
        fn when_no_more_attempts(&self, _last: Outcome<u32, io::Error>) -> Result<u32, io::Error> {
            Ok(self.0)
        }
    }

    let retrier: Retrier<u32, io::Error> = Retrier::builder()
        .with_stop_strategy(StopAfter::new(2))
        .with_give_up_strategy(Fallback(42))
        .build();

    let result = retrier
        .execute(|| async { Err::<u32, _>(io::Error::other("always fails")) })
        .await;

    assert_eq!(result.unwrap(), 42);
}

#[tokio::test]
async fn test_give_up_error_carries_attempts_and_duration() {
    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_stop_strategy(StopAfter::new(4))
        .build();

    let result = retrier
        .execute(|| async { Err::<&str, _>(io::Error::new(io::ErrorKind::TimedOut, "late")) })
        .await;

    match result.unwrap_err() {
        crate::error::RetryError::Exhausted {
            attempts, source, ..
        } => {
            assert_eq!(attempts, 4);
            assert_eq!(source.kind(), io::ErrorKind::TimedOut);
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
}

// ============================================================================
// Example scenarios
// ============================================================================

#[tokio::test]
async fn test_scenario_stop_after_ten_retry_all() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_stop_strategy(StopAfter::new(10))
        .build();

    let result = retrier
        .execute(|| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<&str, _>(io::Error::other("flaky backend"))
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert!(result.unwrap_err().is_exhausted());
}

#[tokio::test]
async fn test_scenario_zero_zero_one() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let retrier: Retrier<u32, io::Error> = Retrier::builder()
        .with_result_retry_strategy(ClosurePredicate::new(|value: &u32| *value == 0))
        .build();

    let result = retrier
        .execute(|| {
            let calls = calls_clone.clone();
            async move {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(match call {
                    1 | 2 => 0,
                    _ => 1,
                })
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.unwrap(), 1);
}

// ============================================================================
// Observers
// ============================================================================

#[tokio::test]
async fn test_observer_sees_full_cycle() {
    let observer = Arc::new(StatsObserver::new());
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_stop_strategy(StopAfter::new(5))
        .with_observer(observer.clone())
        .build();

    let result = retrier
        .execute(|| {
            let calls = calls_clone.clone();
            async move {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call < 3 {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "not yet"))
                } else {
                    Ok("finally")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "finally");
    assert_eq!(observer.attempt_starts(), 3);
    assert_eq!(observer.failures(), 2);
    assert_eq!(observer.successes(), 1);
    assert_eq!(observer.exhaustions(), 0);
    assert_eq!(observer.cancellations(), 0);
}

#[tokio::test]
async fn test_observer_exhaustion_counts() {
    let observer = Arc::new(StatsObserver::new());

    let retrier: Retrier<&str, io::Error> = Retrier::builder()
        .with_stop_strategy(StopAfter::new(3))
        .with_observer(observer.clone())
        .build();

    let result = retrier
        .execute(|| async { Err::<&str, _>(io::Error::other("always fails")) })
        .await;

    assert!(result.is_err());
    assert_eq!(observer.attempt_starts(), 3);
    // The final attempt resolves to exhaustion, not a will-retry failure
    assert_eq!(observer.failures(), 2);
    assert_eq!(observer.exhaustions(), 1);
}

// ============================================================================
// Configuration-driven assembly
// ============================================================================

#[tokio::test]
async fn test_retry_with_config_convenience() {
    let config = RetryConfig::from_yaml(
        r#"
        max-attempts: 3
        backoff: fixed
        initial-delay-ms: 1
        "#,
    )
    .unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let result = retry_with_config(&config, || {
        let calls = calls_clone.clone();
        async move {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < 3 {
                Err(io::Error::new(io::ErrorKind::TimedOut, "warming up"))
            } else {
                Ok("done")
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_config_bounds_attempts() {
    let config = RetryConfig::from_yaml("max-attempts: 2").unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let result: Result<&str, _> = retry_with_config(&config, || {
        let calls = calls_clone.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<&str, _>(io::Error::other("always fails"))
        }
    })
    .await;

    assert!(result.unwrap_err().is_exhausted());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Sharing a frozen retrier
// ============================================================================

#[tokio::test]
async fn test_retrier_shared_across_concurrent_executions() {
    let retrier: Arc<Retrier<u32, io::Error>> = Arc::new(
        Retrier::builder()
            .with_stop_strategy(StopAfter::new(3))
            .build(),
    );

    let a = {
        let retrier = retrier.clone();
        tokio::spawn(async move { retrier.execute(|| async { Ok(1) }).await })
    };
    let b = {
        let retrier = retrier.clone();
        tokio::spawn(async move { retrier.execute(|| async { Ok(2) }).await })
    };

    assert_eq!(a.await.unwrap().unwrap(), 1);
    assert_eq!(b.await.unwrap().unwrap(), 2);
}
