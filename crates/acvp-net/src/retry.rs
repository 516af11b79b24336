// crates/acvp-net/src/retry.rs
// ============================================================================
// Module: Retry/poll engine
// Description: Interprets the ACVP server's `{ "retry": N }` envelope,
//              re-issuing the same GET until a non-retry payload arrives or
//              a total-time cap is exceeded.
// ============================================================================

//! ## Overview
//! Every intermediate (retry) response is collected so the caller can write
//! a debug trace to the datastore when tracing is enabled, without this
//! engine needing to know about datastores at all.

use std::time::{Duration, Instant};

use acvp_core::cancel::CancellationToken;
use acvp_core::interfaces::{NetError, NetworkClient};
use thiserror::Error;

use crate::envelope::{parse_retry, strip_version_wrapper};

/// Errors from [`poll_until_final`].
#[derive(Debug, Error)]
pub enum RetryError {
    /// The underlying network call failed.
    #[error(transparent)]
    Net(#[from] NetError),
    /// The total poll-time cap was exceeded before a final payload arrived.
    #[error("retry poll exceeded its total time cap of {0:?}")]
    TimedOut(Duration),
    /// The poll was cancelled before a final payload arrived.
    #[error("retry poll was cancelled")]
    Cancelled,
}

/// Caps governing one [`poll_until_final`] invocation.
#[derive(Debug, Clone, Copy)]
pub struct RetryCaps {
    /// Upper bound on any single sleep the server's retry envelope requests.
    pub poll_interval_cap: Duration,
    /// Upper bound on total time spent polling this URL.
    pub total_poll_cap: Duration,
}

/// The outcome of a completed poll: the final (non-retry) payload, plus
/// every intermediate retry payload observed along the way.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// The final, non-retry payload.
    pub final_value: serde_json::Value,
    /// Every intermediate retry envelope observed, in order.
    pub intermediates: Vec<serde_json::Value>,
}

/// Issues a GET against `url`, following the server's retry envelope until a
/// non-retry payload arrives, the total time cap is exceeded, or `cancel`
/// fires.
///
/// # Errors
/// Returns [`RetryError::TimedOut`] if `caps.total_poll_cap` elapses,
/// [`RetryError::Cancelled`] if `cancel` fires mid-sleep, or
/// [`RetryError::Net`] on transport/HTTP failure.
pub async fn poll_until_final(
    client: &dyn NetworkClient,
    url: &str,
    token: &str,
    caps: RetryCaps,
    cancel: &CancellationToken,
) -> Result<PollOutcome, RetryError> {
    let deadline = Instant::now() + caps.total_poll_cap;
    let mut intermediates = Vec::new();

    loop {
        let bytes = client.get(url, token).await?;
        let value = strip_version_wrapper(&bytes)?;

        let Some(retry_secs) = parse_retry(&value) else {
            return Ok(PollOutcome {
                final_value: value,
                intermediates,
            });
        };
        intermediates.push(value);

        if Instant::now() >= deadline {
            return Err(RetryError::TimedOut(caps.total_poll_cap));
        }

        let sleep_for = Duration::from_secs(retry_secs).min(caps.poll_interval_cap);
        tokio::select! {
            () = tokio::time::sleep(sleep_for) => {}
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
        }

        if Instant::now() >= deadline {
            return Err(RetryError::TimedOut(caps.total_poll_cap));
        }
    }
}
