// crates/acvp-store/src/lib.rs
// ============================================================================
// Crate: acvp-store
// Description: Filesystem-backed implementation of `acvp_core`'s
//              `DatastoreBackend` trait.
// ============================================================================

//! ## Overview
//! The only concrete datastore shipped in this workspace. Anything else
//! satisfying `acvp_core::interfaces::DatastoreBackend` — an in-memory
//! stub for tests, a different backing store entirely — is equally usable
//! by `acvp-orchestrator`.

mod filesystem;
mod paths;

pub use filesystem::FilesystemDatastore;
pub use paths::CURRENT_VERSION;
