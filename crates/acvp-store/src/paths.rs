// crates/acvp-store/src/paths.rs
// ============================================================================
// Module: Path layout
// Description: Directory/file layout computation for the filesystem
//              datastore, per the reference persistent layout.
// ============================================================================

//! ## Overview
//! All paths derive from a module definition's filesystem-safe components
//! plus numeric testID/vsID values, which are inherently safe (decimal
//! digits only) and never need sanitisation themselves.

use std::path::PathBuf;

use acvp_core::identifiers::{ModuleDefinition, TestId, VsId};

/// Single-byte ASCII version marker written at a store root.
pub const CURRENT_VERSION: u8 = b'1';

/// Directory for one module definition's testID `test_id`, under `root`.
#[must_use]
pub fn testid_dir(root: &std::path::Path, module: &ModuleDefinition, test_id: TestId) -> PathBuf {
    root.join(module.relative_path()).join(test_id.to_string())
}

/// Directory for one vsID under its owning testID's directory.
#[must_use]
pub fn vsid_dir(root: &std::path::Path, module: &ModuleDefinition, test_id: TestId, vs_id: VsId) -> PathBuf {
    testid_dir(root, module, test_id).join(vs_id.to_string())
}

/// Path to the store root's version marker file.
#[must_use]
pub fn version_file(root: &std::path::Path) -> PathBuf {
    root.join("VERSION")
}
