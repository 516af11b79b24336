// crates/acvp-core/src/identifiers.rs
// ============================================================================
// Module: Identifiers
// Description: The module-definition key and the newtype identifiers that
//              index persisted state (testID, vsID).
// ============================================================================

//! ## Overview
//! A [`ModuleDefinition`] is the immutable ownership key for everything this
//! crate persists. `testID`/`vsID` are small numeric newtypes rather than
//! bare integers so datastore and network call sites cannot accidentally
//! transpose them.

use std::fmt;

fn sanitize_path_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Immutable triple identifying one cryptographic module under test.
///
/// `vendor_safe`/`module_safe`/`version_safe` are filesystem-safe variants
/// derived once at construction, per the path-safety rule that every
/// character outside `[A-Za-z0-9_./-]` is replaced with `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleDefinition {
    vendor: String,
    module: String,
    version: String,
    vendor_safe: String,
    module_safe: String,
    version_safe: String,
}

impl ModuleDefinition {
    /// Builds a module definition, computing filesystem-safe variants.
    #[must_use]
    pub fn new(vendor: impl Into<String>, module: impl Into<String>, version: impl Into<String>) -> Self {
        let vendor = vendor.into();
        let module = module.into();
        let version = version.into();
        let vendor_safe = sanitize_path_component(&vendor);
        let module_safe = sanitize_path_component(&module);
        let version_safe = sanitize_path_component(&version);
        Self {
            vendor,
            module,
            version,
            vendor_safe,
            module_safe,
            version_safe,
        }
    }

    /// Raw vendor name as supplied by the caller.
    #[must_use]
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Raw module name as supplied by the caller.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Raw version string as supplied by the caller.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Filesystem-safe vendor name component.
    #[must_use]
    pub fn vendor_safe(&self) -> &str {
        &self.vendor_safe
    }

    /// Filesystem-safe module name component.
    #[must_use]
    pub fn module_safe(&self) -> &str {
        &self.module_safe
    }

    /// Filesystem-safe version component.
    #[must_use]
    pub fn version_safe(&self) -> &str {
        &self.version_safe
    }

    /// Relative path `<vendor_safe>/<module_safe>/<version_safe>` used as the
    /// directory prefix for all state owned by this module definition.
    #[must_use]
    pub fn relative_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(&self.vendor_safe)
            .join(&self.module_safe)
            .join(&self.version_safe)
    }
}

/// Server-assigned test session identifier.
///
/// testID `0` is reserved for session-wide metadata and is never a real
/// session; datastore enumeration skips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestId(pub u64);

impl TestId {
    /// The reserved metadata identifier, always skipped during enumeration.
    pub const METADATA: Self = Self(0);

    /// Returns true for the reserved metadata identifier.
    #[must_use]
    pub const fn is_metadata(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TestId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Vector-set identifier, unique within one test session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VsId(pub u64);

impl fmt::Display for VsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for VsId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
