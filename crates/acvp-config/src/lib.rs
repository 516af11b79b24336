// crates/acvp-config/src/lib.rs
// ============================================================================
// Crate: acvp-config
// Description: TOML configuration loading and validation for the ACVP proxy.
// ============================================================================

//! ## Overview
//! Fail-closed configuration loading: a missing, oversized, malformed, or
//! out-of-range field rejects the whole load rather than falling back to a
//! default that could silently change behavior.

mod config;

pub use config::{
    ConfigError, ModuleEntry, ProxyConfig, ServerId, CONFIG_ENV_VAR, DEFAULT_AUTH_TTL_SECS,
    DEFAULT_TESTID_WORKERS, DEFAULT_VSID_WORKERS, MAX_CONFIG_FILE_SIZE,
};
