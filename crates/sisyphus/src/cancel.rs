//! Cancellation signalling for retry execution
//!
//! Cancellation is an externally triggered abandonment, not a conventional
//! failure: it overrides every retry decision and is never routed through
//! the give-up policy. Two signals exist:
//!
//! - a [`CancelToken`] observed by the executor after every attempt and
//!   while pausing between attempts;
//! - an [`Interrupted`] marker raised by the operation itself, either
//!   directly or anywhere in its `source()` chain.
//!
//! An operation that performs blocking or long-running work is responsible
//! for respecting the same token it hands to the executor; the executor
//! only reacts at its own checkpoints.

use std::error::Error;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::chain_contains;

/// Marker error signalling that an operation was abandoned.
///
/// An operation error is treated as a cancellation signal when it is, or
/// wraps anywhere in its `source()` chain, an `Interrupted` value.
#[derive(Debug, Clone, Copy, Default, thiserror::Error)]
#[error("operation interrupted")]
pub struct Interrupted;

/// Returns true if `error` is, or was caused by, an [`Interrupted`] marker.
///
/// The cause chain walk is capped at a bounded depth, so a malformed cyclic
/// chain cannot loop forever.
pub fn is_interruption(error: &(dyn Error + 'static)) -> bool {
    chain_contains::<Interrupted>(error)
}

/// A cloneable cancellation handle shared between a caller and the retry
/// executor.
///
/// Cancellation is sticky: once cancelled, a token stays cancelled. Clones
/// share the same state.
///
/// # Example
///
/// ```rust
/// use sisyphus::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
///
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a new, un-cancelled token
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(tx),
        }
    }

    /// Signal cancellation, waking any pending [`CancelToken::cancelled`] waits
    pub fn cancel(&self) {
        self.inner.send_replace(true);
    }

    /// Whether cancellation has been signalled
    pub fn is_cancelled(&self) -> bool {
        *self.inner.borrow()
    }

    /// Completes when the token is cancelled; immediately if it already is.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.subscribe();
        // wait_for only errors once the sender is dropped, and `self` holds it
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
