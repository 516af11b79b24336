// crates/acvp-core/src/lib.rs
// ============================================================================
// Crate: acvp-core
// Description: Cipher registry, codec, data model, auth context, verdict
//              tracker, shared error taxonomy, and the datastore/network
//              trait surfaces consumed by the rest of the workspace.
// ============================================================================

//! ## Overview
//! `acvp-core` has no knowledge of the filesystem or of HTTP; it defines the
//! vocabulary (`Cipher`, `ModuleDefinition`, `TestSessionContext`,
//! `VectorSetContext`, `AuthContext`, `VerdictTracker`) and the two seams
//! (`DatastoreBackend`, `NetworkClient`) that `acvp-store`, `acvp-net`, and
//! `acvp-orchestrator` build on.

pub mod auth;
pub mod cancel;
pub mod cipher;
pub mod codec;
pub mod counters;
pub mod error;
pub mod identifiers;
pub mod interfaces;
pub mod model;
pub mod progress;
pub mod verdict;

pub use cancel::CancellationToken;
pub use cipher::{Cipher, Family};
pub use codec::Alphabet;
pub use error::{AcvpError, Outcome};
pub use identifiers::{ModuleDefinition, TestId, VsId};
pub use interfaces::{DatastoreBackend, NetworkClient};
pub use model::{SessionConfig, TestSessionContext, VectorSetContext};
pub use progress::{ProgressEvent, ProgressSink};
pub use verdict::{Disposition, VerdictTracker};
