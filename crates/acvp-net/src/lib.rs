// crates/acvp-net/src/lib.rs
// ============================================================================
// Crate: acvp-net
// Description: HTTP network layer and retry/poll engine for the ACVP proxy.
// ============================================================================

//! ## Overview
//! `acvp-net` owns the only `reqwest` dependency in this workspace. It
//! implements `acvp_core::interfaces::NetworkClient` and the retry engine
//! that interprets the server's `{ "retry": N }` envelope; it has no
//! knowledge of the datastore or the orchestrator.

mod client;
mod envelope;
mod retry;

pub use client::{urls, HttpNetworkClient};
pub use envelope::{parse_disposition, parse_retry, strip_version_wrapper};
pub use retry::{poll_until_final, PollOutcome, RetryCaps, RetryError};
