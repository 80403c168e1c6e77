//! # sisyphus
//!
//! Policy-driven retry execution for fallible async operations:
//! - four independently pluggable decision strategies (stop, wait,
//!   result-based retry, failure-based retry) plus a give-up policy
//! - cancellation via an explicit [`CancelToken`], or an [`Interrupted`]
//!   marker anywhere in an error's source chain
//! - observable attempts via the [`RetryObserver`] trait, with a built-in
//!   `tracing` implementation
//! - declarative configuration ([`RetryConfig`]) parsed from YAML
//!
//! # Example
//!
//! ```rust,no_run
//! use sisyphus::{ExponentialBackoff, Retrier, RetryError, StopAfter};
//! use std::time::Duration;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     let retrier = Retrier::builder()
//!         .with_stop_strategy(StopAfter::new(5))
//!         .with_wait_strategy(ExponentialBackoff::new(Duration::from_millis(50), 2.0))
//!         .build();
//!
//!     retrier
//!         .execute(|| async {
//!             // Your fallible operation here
//!             Ok("success".to_string())
//!         })
//!         .await
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod executor;
pub mod observer;
pub mod strategies;

pub use cancel::{is_interruption, CancelToken, Interrupted};
pub use config::{BackoffKind, ConfigError, RetryConfig};
pub use error::{chain_contains, RetryError};
pub use executor::{retry_with_config, Outcome, Retrier, RetrierBuilder};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use strategies::{
    AlwaysRetry, AndPredicate, ClosurePredicate, ExponentialBackoff, FixedDelay, GiveUpStrategy,
    HttpStatusError, HttpStatusPredicate, JitteredDelay, MessagePredicate, NeverRetry, NeverStop,
    NoDelay, OrPredicate, PropagateLast, RetryOn, RetryPredicate, StopAfter, StopStrategy,
    WaitStrategy,
};

#[cfg(test)]
mod tests;
