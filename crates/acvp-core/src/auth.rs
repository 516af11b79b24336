// crates/acvp-core/src/auth.rs
// ============================================================================
// Module: Auth context
// Description: Per-testID JWT lifecycle — load, refresh, expiry check,
//              reader/writer locking shared by every vsID of one testID.
// ============================================================================

//! ## Overview
//! At most one JWT is active per testID at a time. A writer (login) excludes
//! all readers; many readers (HTTP senders) may hold the lock concurrently.
//! This mirrors `tokio::sync::RwLock`'s fairness directly onto invariant 4:
//! "auth writers and readers never overlap; a refresh cannot race with an
//! in-flight request that is still reading the old token."

use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::AuthError;

#[derive(Debug, Clone, Default)]
struct TokenState {
    token: Option<String>,
    generated_at: Option<Instant>,
}

/// Per-testID JWT holder with reader/writer locking.
#[derive(Debug)]
pub struct AuthContext {
    state: RwLock<TokenState>,
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthContext {
    /// Allocates the lock with an empty token, per `init`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TokenState::default()),
        }
    }

    /// Writer operation: installs a freshly obtained token, recording the
    /// current instant as its generation time.
    pub async fn install(&self, token: String) {
        let mut guard = self.state.write().await;
        guard.token = Some(token);
        guard.generated_at = Some(Instant::now());
    }

    /// Writer operation: installs a token reloaded from persisted state,
    /// preserving its original issuance time so TTL expiry is computed from
    /// when the server issued it rather than from this reload. `generated_at`
    /// too far in the past to represent as an `Instant` is treated as already
    /// expired, matching `is_expired`'s treatment of a missing generation time.
    pub async fn install_with_generated_at(&self, token: String, generated_at: std::time::SystemTime) {
        let mut guard = self.state.write().await;
        guard.token = Some(token);
        let elapsed = std::time::SystemTime::now().duration_since(generated_at).unwrap_or_default();
        guard.generated_at = Instant::now().checked_sub(elapsed);
    }

    /// Returns true when no token is installed, or the installed token's age
    /// exceeds `ttl`.
    pub async fn is_expired(&self, ttl: Duration) -> bool {
        let guard = self.state.read().await;
        match guard.generated_at {
            None => true,
            Some(generated_at) => generated_at.elapsed() >= ttl,
        }
    }

    /// Reader operation: clones the current token for use in exactly one
    /// HTTP call, holding the reader lock only long enough to copy it out.
    ///
    /// # Errors
    /// Returns [`AuthError::NotAuthenticated`] when no token has ever been
    /// installed.
    pub async fn current_token(&self) -> Result<String, AuthError> {
        let guard = self.state.read().await;
        guard.token.clone().ok_or(AuthError::NotAuthenticated)
    }

    /// Runs `op` while holding the reader lock, giving it the current token.
    /// `op` is expected to issue exactly one HTTP call injecting the token.
    ///
    /// # Errors
    /// Propagates [`AuthError::NotAuthenticated`] if no token is installed,
    /// or whatever `op` itself returns.
    pub async fn send_under_read<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: From<AuthError>,
    {
        let guard = self.state.read().await;
        let token = guard.token.clone().ok_or(AuthError::NotAuthenticated)?;
        drop(guard);
        op(token).await
    }
}
