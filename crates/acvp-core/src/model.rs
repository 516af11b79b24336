// crates/acvp-core/src/model.rs
// ============================================================================
// Module: Session data model
// Description: testID and vsID contexts, and the minimal runtime-config
//              surface they depend on.
// ============================================================================

//! ## Overview
//! [`TestSessionContext`] and [`VectorSetContext`] are the two per-task
//! records the orchestrator threads through worker groups A and B. Neither
//! owns its parent outright (a vsID never outlives its testID, per the
//! design notes), so `VectorSetContext` borrows its testID only by value
//! (`TestId`) and identifiers, not by reference, keeping the two types free
//! of lifetime parameters.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthContext;
use crate::identifiers::{ModuleDefinition, TestId, VsId};

/// The minimal configuration surface session contexts depend on, decoupled
/// from `acvp-config`'s full `ProxyConfig` to avoid a crate cycle.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// JWT time-to-live, in seconds, before a refresh is forced.
    pub auth_ttl_secs: u64,
    /// When true, both worker groups run serially in the caller's task.
    pub debug: bool,
    /// When true, every intermediate retry-poll response is written to the
    /// datastore under its vsID, as a debug trace of the poll sequence.
    pub trace_intermediates: bool,
    /// Identity string of the currently configured server (`"production"` or
    /// `"demo"`), compared against a vsID's persisted source server.
    pub server_id: String,
}

/// Per-testID context: owns the auth context and the two monotonic
/// `vsids_to_process`/`vsids_processed` counters for this session.
pub struct TestSessionContext {
    /// The module definition this session belongs to.
    pub module: ModuleDefinition,
    /// Server-assigned test session identifier.
    pub test_id: TestId,
    /// Shared runtime configuration.
    pub config: Arc<SessionConfig>,
    /// Per-testID authentication state.
    pub auth: AuthContext,
    counters: crate::counters::TestIdCounters,
    started_at: Instant,
}

impl TestSessionContext {
    /// Creates a new context, recording the current instant as its start
    /// time.
    #[must_use]
    pub fn new(module: ModuleDefinition, test_id: TestId, config: Arc<SessionConfig>) -> Self {
        Self {
            module,
            test_id,
            config,
            auth: AuthContext::new(),
            counters: crate::counters::TestIdCounters::new(),
            started_at: Instant::now(),
        }
    }

    /// Elapsed time since this context was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Local counters for this testID (not the process-wide globals).
    #[must_use]
    pub fn counters(&self) -> &crate::counters::TestIdCounters {
        &self.counters
    }
}

/// Per-vsID context: the vsID number, its start time, and presence flags
/// probed from the datastore before the orchestrator's callback runs.
#[derive(Debug, Clone)]
pub struct VectorSetContext {
    /// Owning test session identifier.
    pub test_id: TestId,
    /// This vector set's identifier.
    pub vs_id: VsId,
    /// Whether a vector artifact has already been downloaded.
    pub vector_file_present: bool,
    /// Whether a verdict artifact already exists.
    pub verdict_file_present: bool,
    /// Whether an "expected results" artifact exists (forbids submission).
    pub sample_file_present: bool,
    /// Set when the datastore shows a prior submission but the user forced
    /// re-upload.
    pub resubmit_result: bool,
    started_at: Instant,
}

impl VectorSetContext {
    /// Creates a new vsID context with all presence flags false.
    #[must_use]
    pub fn new(test_id: TestId, vs_id: VsId) -> Self {
        Self {
            test_id,
            vs_id,
            vector_file_present: false,
            verdict_file_present: false,
            sample_file_present: false,
            resubmit_result: false,
            started_at: Instant::now(),
        }
    }

    /// Elapsed time since this context was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
