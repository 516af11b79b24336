// crates/acvp-core/src/error.rs
// ============================================================================
// Module: Cross-cutting error taxonomy
// Description: The shared `AcvpError` classification used to aggregate
//              failures across testID/vsID tasks, plus per-concern error
//              enums for the codec and auth subsystems, plus the `Outcome`
//              positive-sentinel type for non-error control flow.
// ============================================================================

//! ## Overview
//! `AcvpError` is not meant to be the direct return type of every fallible
//! function in this crate; it is the classification each crate's own error
//! type maps onto when the orchestrator aggregates results across concurrent
//! tasks. Conditions that are not failures — a vsID restarted after an
//! interrupted signal, a vsID already fully processed — are represented by
//! [`Outcome`], never forced into the `Err` arm of a `Result`.

use std::fmt;

/// Cross-cutting failure classification shared by every crate in this
/// workspace, used when aggregating per-task results in the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcvpError {
    /// Caller supplied a malformed or out-of-range argument.
    InvalidInput,
    /// An allocation or buffer-growth request could not be satisfied.
    OutOfMemory,
    /// A local filesystem operation failed.
    Io,
    /// Persisted datastore state is stale or missing relative to what was
    /// requested.
    StaleDatastore,
    /// JWT acquisition or refresh failed.
    AuthFailed,
    /// The HTTP transport itself failed (connect, TLS, timeout).
    HttpTransport,
    /// The server returned a 4xx response.
    Http4xx,
    /// The server returned a 5xx response.
    Http5xx,
    /// A retry/poll loop exceeded its total time budget.
    PollTimeout,
    /// The vsID's persisted source server does not match the configured one.
    WrongServer,
    /// A response's identifiers did not match the request that produced it.
    Mismatch,
    /// The operation was cancelled before completion.
    Cancelled,
}

impl fmt::Display for AcvpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidInput => "invalid-input",
            Self::OutOfMemory => "oom",
            Self::Io => "io",
            Self::StaleDatastore => "stale-datastore",
            Self::AuthFailed => "auth-failed",
            Self::HttpTransport => "http-transport",
            Self::Http4xx => "http-4xx",
            Self::Http5xx => "http-5xx",
            Self::PollTimeout => "poll-timeout",
            Self::WrongServer => "wrong-server",
            Self::Mismatch => "mismatch",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

impl std::error::Error for AcvpError {}

/// A non-error terminal state for a unit of work, distinct from failure.
///
/// These arise when a task cannot make progress for reasons that are not
/// defects: a concurrent signal interrupted processing and the caller should
/// retry, or the work was already completed on a prior run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Work completed normally.
    Completed,
    /// Work was interrupted and should be retried by the caller.
    Restarted,
    /// Work was found already complete and was skipped.
    AlreadyDone,
    /// Work was not attempted because an "expected results" artifact
    /// already forbids submission.
    Skipped,
}

/// Errors from [`crate::codec`] encode/decode operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Input length was not a multiple of 4.
    #[error("base64 input length {0} is not a multiple of 4")]
    InvalidLength(usize),
    /// A byte outside the selected alphabet (and not `=`) was encountered.
    #[error("byte 0x{0:02x} is not valid in this base64 alphabet")]
    InvalidCharacter(u8),
}

/// Errors from [`crate::auth`] token lifecycle management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token has been installed yet.
    #[error("no authentication token is available")]
    NotAuthenticated,
    /// The installed token's TTL has elapsed.
    #[error("authentication token expired")]
    Expired,
}

/// Errors from [`crate::verdict`] tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerdictError {
    /// The tracker's fixed-capacity ring is full; the verdict was dropped.
    #[error("verdict tracker capacity ({0}) exceeded, verdict dropped")]
    CapacityExceeded(usize),
}
