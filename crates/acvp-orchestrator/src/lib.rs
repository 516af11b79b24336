// crates/acvp-orchestrator/src/lib.rs
// ============================================================================
// Crate: acvp-orchestrator
// Description: The concurrent test-session orchestration engine that walks
//              module definitions, downloads vectors, uploads responses,
//              and collects verdicts — independent of how vectors/verdicts
//              are persisted or transported.
// ============================================================================

//! ## Overview
//! This crate knows nothing about the filesystem or HTTP; it is wired
//! together from a [`acvp_core::interfaces::DatastoreBackend`] and a
//! [`acvp_core::interfaces::NetworkClient`] supplied by the caller (normally
//! `acvp-store`'s and `acvp-net`'s reference implementations), which is what
//! lets its test suite exercise real scheduling and retry behavior against
//! in-memory stand-ins.

mod orchestrator;
#[cfg(test)]
mod test_support;

pub use orchestrator::{Orchestrator, RunFlags, RunSummary};
