// crates/acvp-core/src/cancel.rs
// ============================================================================
// Module: Cancellation
// Description: A small cooperative cancellation token shared by the retry
//              engine's sleeps and the orchestrator's signal/cancellation
//              stack.
// ============================================================================

//! ## Overview
//! Every blocking suspension point (HTTP send/recv, retry sleeps, datastore
//! I/O, the auth writer lock) is expected to race against
//! [`CancellationToken::cancelled`] rather than run to completion
//! unconditionally. Cancelling is one-shot and idempotent: once set, a token
//! stays cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cloneable, one-shot cooperative cancellation signal.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Creates a token that is not yet cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Marks this token (and every clone of it) cancelled, waking any task
    /// currently awaiting [`Self::cancelled`].
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns true if [`Self::cancel`] has been called on this token or any
    /// clone of it.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once this token is cancelled. Resolves immediately if it
    /// already is.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions.")]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(50), token.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_resolves_once_a_clone_cancels() {
        let token = CancellationToken::new();
        let clone = token.clone();
        let waiter = tokio::spawn(async move {
            clone.cancelled().await;
        });
        assert!(!token.is_cancelled());
        token.cancel();
        tokio::time::timeout(Duration::from_millis(50), waiter).await.unwrap().unwrap();
    }
}
