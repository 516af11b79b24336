// crates/acvp-config/src/config.rs
// ============================================================================
// Module: ACVP Proxy Configuration
// Description: TOML configuration loading and validation for the ACVP proxy.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: acvp-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with a hard size cap and strict
//! field validation; any malformed or out-of-range field fails the whole
//! load rather than silently substituting a default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use acvp_core::identifiers::ModuleDefinition;
use acvp_core::model::SessionConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "acvp-proxy.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "ACVP_PROXY_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;
/// Minimum allowed JWT TTL in seconds.
pub const MIN_AUTH_TTL_SECS: u64 = 30;
/// Maximum allowed JWT TTL in seconds.
pub const MAX_AUTH_TTL_SECS: u64 = 24 * 3600;
/// Default JWT TTL in seconds.
pub const DEFAULT_AUTH_TTL_SECS: u64 = 3600;
/// Minimum allowed worker pool size for either group.
pub const MIN_WORKERS: usize = 1;
/// Maximum allowed worker pool size for either group.
pub const MAX_WORKERS: usize = 256;
/// Default testID worker pool size (group A).
pub const DEFAULT_TESTID_WORKERS: usize = 4;
/// Default vsID worker pool size (group B).
pub const DEFAULT_VSID_WORKERS: usize = 16;
/// Minimum retry poll-interval cap in seconds.
pub const MIN_POLL_INTERVAL_CAP_SECS: u64 = 1;
/// Maximum retry poll-interval cap in seconds.
pub const MAX_POLL_INTERVAL_CAP_SECS: u64 = 300;
/// Default retry poll-interval cap in seconds.
pub const DEFAULT_POLL_INTERVAL_CAP_SECS: u64 = 30;
/// Minimum total retry poll-time cap in seconds.
pub const MIN_TOTAL_POLL_CAP_SECS: u64 = 10;
/// Maximum total retry poll-time cap in seconds.
pub const MAX_TOTAL_POLL_CAP_SECS: u64 = 3600;
/// Default total retry poll-time cap in seconds.
pub const DEFAULT_TOTAL_POLL_CAP_SECS: u64 = 600;
/// Default network connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default network read timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors from loading or validating [`ProxyConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file exceeds [`MAX_CONFIG_FILE_SIZE`].
    #[error("config file {path} is {size} bytes, exceeds the {MAX_CONFIG_FILE_SIZE} byte limit")]
    TooLarge {
        /// Path of the oversized file.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
    },
    /// The file's contents could not be parsed as TOML matching the schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// A field's value is out of its valid range.
    #[error("invalid config field `{field}`: {reason}")]
    InvalidField {
        /// Dotted field path, e.g. `concurrency.testid_workers`.
        field: &'static str,
        /// Why the value is rejected.
        reason: String,
    },
}

// ============================================================================
// SECTION: Configuration types
// ============================================================================

/// Which ACVP server endpoint is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerId {
    /// The production validation server.
    Production,
    /// The demo/test validation server.
    Demo,
}

impl ServerId {
    /// Identity string persisted alongside a vsID's vectors and compared
    /// against the currently configured server.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Demo => "demo",
        }
    }
}

/// Server endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Base URL of the production ACVP server.
    pub production_url: String,
    /// Base URL of the demo ACVP server.
    pub demo_url: String,
    /// Which of the two is active for this invocation.
    pub active: ServerId,
}

/// Datastore root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatastoreSection {
    /// Root directory for non-sensitive artifacts.
    pub base_dir: PathBuf,
    /// Root directory for auth tokens and module-definition snapshots.
    pub secure_base_dir: PathBuf,
}

/// Auth lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSection {
    /// JWT time-to-live in seconds before a refresh is forced.
    #[serde(default = "default_auth_ttl_secs")]
    pub ttl_secs: u64,
}

const fn default_auth_ttl_secs() -> u64 {
    DEFAULT_AUTH_TTL_SECS
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_AUTH_TTL_SECS,
        }
    }
}

/// Worker pool sizing for the two distinct concurrency groups.
#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencySection {
    /// Size of worker group A (testID tasks).
    #[serde(default = "default_testid_workers")]
    pub testid_workers: usize,
    /// Size of worker group B (vsID tasks).
    #[serde(default = "default_vsid_workers")]
    pub vsid_workers: usize,
}

const fn default_testid_workers() -> usize {
    DEFAULT_TESTID_WORKERS
}

const fn default_vsid_workers() -> usize {
    DEFAULT_VSID_WORKERS
}

impl Default for ConcurrencySection {
    fn default() -> Self {
        Self {
            testid_workers: DEFAULT_TESTID_WORKERS,
            vsid_workers: DEFAULT_VSID_WORKERS,
        }
    }
}

/// Retry/poll engine caps.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Upper bound on any single sleep the retry envelope requests.
    #[serde(default = "default_poll_interval_cap_secs")]
    pub poll_interval_cap_secs: u64,
    /// Upper bound on total time spent polling one URL.
    #[serde(default = "default_total_poll_cap_secs")]
    pub total_poll_cap_secs: u64,
}

const fn default_poll_interval_cap_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_CAP_SECS
}

const fn default_total_poll_cap_secs() -> u64 {
    DEFAULT_TOTAL_POLL_CAP_SECS
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            poll_interval_cap_secs: DEFAULT_POLL_INTERVAL_CAP_SECS,
            total_poll_cap_secs: DEFAULT_TOTAL_POLL_CAP_SECS,
        }
    }
}

/// HTTP transport timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

const fn default_read_timeout_secs() -> u64 {
    DEFAULT_READ_TIMEOUT_SECS
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

/// One `(vendor, module, version)` triple naming a module definition this
/// invocation should walk.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleEntry {
    /// Vendor name, as registered with the validation server.
    pub vendor: String,
    /// Module name.
    pub module: String,
    /// Module version string.
    pub version: String,
}

/// Top-level ACVP proxy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Server endpoint selection.
    pub server: ServerSection,
    /// Datastore roots.
    pub datastore: DatastoreSection,
    /// Module definitions this invocation walks.
    pub modules: Vec<ModuleEntry>,
    /// Auth lifecycle.
    #[serde(default)]
    pub auth: AuthSection,
    /// Worker pool sizing.
    #[serde(default)]
    pub concurrency: ConcurrencySection,
    /// Retry/poll caps.
    #[serde(default)]
    pub retry: RetrySection,
    /// Network timeouts.
    #[serde(default)]
    pub network: NetworkSection,
    /// When true, both worker groups run serially in-process.
    #[serde(default)]
    pub debug: bool,
    /// When true, every intermediate retry-poll response is written to the
    /// datastore under its vsID, as a debug trace of the poll sequence.
    #[serde(default)]
    pub trace_intermediates: bool,
}

impl ProxyConfig {
    /// Loads and validates configuration from `path`, or from the default
    /// location (`ACVP_PROXY_CONFIG` env var, else `./acvp-proxy.toml`) when
    /// `path` is `None`.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read, exceeds
    /// [`MAX_CONFIG_FILE_SIZE`], fails to parse, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path);
        let metadata = fs::metadata(&resolved).map_err(|source| ConfigError::Read {
            path: resolved.clone(),
            source,
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::TooLarge {
                path: resolved,
                size: metadata.len(),
            });
        }
        let contents = fs::read_to_string(&resolved).map_err(|source| ConfigError::Read {
            path: resolved.clone(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: resolved,
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the base URL of the currently active server.
    #[must_use]
    pub fn active_url(&self) -> &str {
        match self.server.active {
            ServerId::Production => &self.server.production_url,
            ServerId::Demo => &self.server.demo_url,
        }
    }

    /// Builds the minimal [`SessionConfig`] that `acvp-core`'s session
    /// contexts depend on.
    #[must_use]
    pub fn session_config(&self) -> Arc<SessionConfig> {
        Arc::new(SessionConfig {
            auth_ttl_secs: self.auth.ttl_secs,
            debug: self.debug,
            trace_intermediates: self.trace_intermediates,
            server_id: self.server.active.as_str().to_string(),
        })
    }

    /// Materializes the configured module entries as [`ModuleDefinition`]s.
    #[must_use]
    pub fn module_definitions(&self) -> Vec<ModuleDefinition> {
        self.modules
            .iter()
            .map(|entry| ModuleDefinition::new(&entry.vendor, &entry.module, &entry.version))
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.modules.is_empty() {
            return Err(ConfigError::InvalidField {
                field: "modules",
                reason: "at least one module definition is required".to_string(),
            });
        }
        if !(MIN_AUTH_TTL_SECS..=MAX_AUTH_TTL_SECS).contains(&self.auth.ttl_secs) {
            return Err(ConfigError::InvalidField {
                field: "auth.ttl_secs",
                reason: format!(
                    "{} is outside [{MIN_AUTH_TTL_SECS}, {MAX_AUTH_TTL_SECS}]",
                    self.auth.ttl_secs
                ),
            });
        }
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.concurrency.testid_workers) {
            return Err(ConfigError::InvalidField {
                field: "concurrency.testid_workers",
                reason: format!(
                    "{} is outside [{MIN_WORKERS}, {MAX_WORKERS}]",
                    self.concurrency.testid_workers
                ),
            });
        }
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.concurrency.vsid_workers) {
            return Err(ConfigError::InvalidField {
                field: "concurrency.vsid_workers",
                reason: format!(
                    "{} is outside [{MIN_WORKERS}, {MAX_WORKERS}]",
                    self.concurrency.vsid_workers
                ),
            });
        }
        if !(MIN_POLL_INTERVAL_CAP_SECS..=MAX_POLL_INTERVAL_CAP_SECS)
            .contains(&self.retry.poll_interval_cap_secs)
        {
            return Err(ConfigError::InvalidField {
                field: "retry.poll_interval_cap_secs",
                reason: format!(
                    "{} is outside [{MIN_POLL_INTERVAL_CAP_SECS}, {MAX_POLL_INTERVAL_CAP_SECS}]",
                    self.retry.poll_interval_cap_secs
                ),
            });
        }
        if !(MIN_TOTAL_POLL_CAP_SECS..=MAX_TOTAL_POLL_CAP_SECS).contains(&self.retry.total_poll_cap_secs) {
            return Err(ConfigError::InvalidField {
                field: "retry.total_poll_cap_secs",
                reason: format!(
                    "{} is outside [{MIN_TOTAL_POLL_CAP_SECS}, {MAX_TOTAL_POLL_CAP_SECS}]",
                    self.retry.total_poll_cap_secs
                ),
            });
        }
        if self.server.production_url.is_empty() || self.server.demo_url.is_empty() {
            return Err(ConfigError::InvalidField {
                field: "server.production_url/demo_url",
                reason: "server URLs must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(from_env) = env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(from_env);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}
