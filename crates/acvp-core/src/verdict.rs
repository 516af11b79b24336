// crates/acvp-core/src/verdict.rs
// ============================================================================
// Module: Verdict tracker
// Description: Process-wide bounded, atomic-append record of pass/fail
//              verdicts keyed by vsID, for end-user listing.
// ============================================================================

//! ## Overview
//! Two fixed-capacity sequences (pass, fail) each hold up to
//! [`CAPACITY`] vsIDs, appended by concurrently-running vsID workers.
//!
//! A slot is reserved with one atomic fetch-add, then the vsID value is
//! stored into it. The sequence's published length only ever advances by
//! exactly one, from `index` to `index + 1`, and a writer spins until it is
//! its turn to make that move — so publication happens in strict index
//! order, never past a lower index whose store hasn't landed yet. A
//! reader's `list` call only ever looks at indices below the published
//! length, so it can never observe a reserved but not-yet-written slot.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::VerdictError;
use crate::identifiers::VsId;

/// Maximum number of verdicts retained per outcome.
pub const CAPACITY: usize = 512;

const EMPTY: u64 = u64::MAX;

struct Sequence {
    slots: Vec<AtomicU64>,
    reserved: AtomicUsize,
    published: AtomicUsize,
}

impl Sequence {
    fn new() -> Self {
        let mut slots = Vec::with_capacity(CAPACITY);
        slots.resize_with(CAPACITY, || AtomicU64::new(EMPTY));
        Self {
            slots,
            reserved: AtomicUsize::new(0),
            published: AtomicUsize::new(0),
        }
    }

    fn record(&self, vsid: VsId) -> Result<(), VerdictError> {
        let index = self.reserved.fetch_add(1, Ordering::SeqCst);
        if index >= CAPACITY {
            return Err(VerdictError::CapacityExceeded(CAPACITY));
        }
        self.slots[index].store(vsid.0, Ordering::Release);
        // Advance the published length one slot at a time, in index order.
        // A writer at `index` must wait for `published == index` before its
        // own compare-exchange is attempted, so a fast high-index writer can
        // never publish past a lower index whose store hasn't landed yet.
        while self
            .published
            .compare_exchange(index, index + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            std::hint::spin_loop();
        }
        Ok(())
    }

    fn list_from(&self, cursor: usize) -> (Vec<VsId>, usize) {
        let published = self.published.load(Ordering::Acquire);
        if cursor >= published {
            return (Vec::new(), cursor);
        }
        let mut out = Vec::with_capacity(published - cursor);
        for slot in &self.slots[cursor..published] {
            let value = slot.load(Ordering::Acquire);
            if value != EMPTY {
                out.push(VsId(value));
            }
        }
        (out, published)
    }
}

/// Outcome kind for [`VerdictTracker::record`] and [`VerdictTracker::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The server reported `disposition == "passed"`.
    Passed,
    /// Any other disposition value.
    Failed,
}

/// Bounded, thread-safe pass/fail verdict tracker.
pub struct VerdictTracker {
    passed: Sequence,
    failed: Sequence,
}

impl Default for VerdictTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdictTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            passed: Sequence::new(),
            failed: Sequence::new(),
        }
    }

    /// Appends `vsid` to the pass or fail sequence.
    ///
    /// # Errors
    /// Returns [`VerdictError::CapacityExceeded`] when the relevant sequence
    /// is already at [`CAPACITY`]; callers should log and continue, never
    /// treat this as fatal (per the component's documented failure mode).
    pub fn record(&self, vsid: VsId, disposition: Disposition) -> Result<(), VerdictError> {
        match disposition {
            Disposition::Passed => self.passed.record(vsid),
            Disposition::Failed => self.failed.record(vsid),
        }
    }

    /// Lists vsIDs appended to `disposition`'s sequence strictly after
    /// `cursor`, returning the new cursor to pass on the next call.
    #[must_use]
    pub fn list(&self, disposition: Disposition, cursor: usize) -> (Vec<VsId>, usize) {
        match disposition {
            Disposition::Passed => self.passed.list_from(cursor),
            Disposition::Failed => self.failed.list_from(cursor),
        }
    }
}
