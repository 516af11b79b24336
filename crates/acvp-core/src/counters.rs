// crates/acvp-core/src/counters.rs
// ============================================================================
// Module: Counters
// Description: Per-testID and process-wide monotonic vsID counters.
// ============================================================================

//! ## Overview
//! Two pairs of monotonic counters track vsID progress: one pair scoped to a
//! single testID (used by `handle_testid` to decide whether to warn about a
//! deficit), one pair process-wide (used only for user-visible progress
//! reporting). Both pairs maintain `processed <= to_process` at every
//! observable point.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-testID `vsids_to_process`/`vsids_processed` counters.
#[derive(Debug, Default)]
pub struct TestIdCounters {
    to_process: AtomicU64,
    processed: AtomicU64,
}

impl TestIdCounters {
    /// Creates counters starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically increments `to_process` by one.
    pub fn increment_to_process(&self) {
        self.to_process.fetch_add(1, Ordering::SeqCst);
    }

    /// Atomically increments `processed` by one.
    pub fn increment_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Current `to_process` value.
    #[must_use]
    pub fn to_process(&self) -> u64 {
        self.to_process.load(Ordering::SeqCst)
    }

    /// Current `processed` value.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// True once every counted unit of work for this testID has been
    /// processed. Callers must also have returned from datastore enumeration
    /// before trusting this, since `to_process` is only final at that point.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.processed() == self.to_process()
    }
}

/// Process-wide `glob_vsids_to_process`/`glob_vsids_processed` counters,
/// used only for user-visible progress.
#[derive(Debug, Default)]
pub struct GlobalCounters {
    to_process: AtomicU64,
    processed: AtomicU64,
}

impl GlobalCounters {
    /// Creates counters starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically increments the global `to_process` counter.
    pub fn increment_to_process(&self) {
        self.to_process.fetch_add(1, Ordering::SeqCst);
    }

    /// Atomically increments the global `processed` counter.
    pub fn increment_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Current global `to_process` value.
    #[must_use]
    pub fn to_process(&self) -> u64 {
        self.to_process.load(Ordering::SeqCst)
    }

    /// Current global `processed` value.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }
}
