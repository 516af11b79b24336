// crates/acvp-core/src/interfaces.rs
// ============================================================================
// Module: Interfaces
// Description: Capability traits the orchestrator consumes — datastore
//              persistence and the HTTP network layer — plus their error
//              taxonomies. The reference implementations live in
//              `acvp-store` and `acvp-net`; anything satisfying these traits
//              works.
// ============================================================================

//! ## Overview
//! Neither trait is the orchestrator's concern to implement; they are the
//! seams at which a filesystem datastore and a real HTTP client are plugged
//! in (and at which tests plug in in-memory stand-ins instead).

use async_trait::async_trait;
use thiserror::Error;

use crate::identifiers::{ModuleDefinition, TestId, VsId};
use crate::model::{TestSessionContext, VectorSetContext};

/// Logical artifact name under a vsID directory.
pub const ARTIFACT_VECTOR: &str = "vector.json";
/// Logical artifact name under a vsID directory.
pub const ARTIFACT_RESPONSE: &str = "response.json";
/// Logical artifact name under a vsID directory.
pub const ARTIFACT_EXPECTED: &str = "expected.json";
/// Logical artifact name under a vsID directory.
pub const ARTIFACT_VERDICT: &str = "verdict.json";
/// Logical artifact name under a vsID directory: the server identity string
/// that served this vsID's vectors, compared against the configured server
/// before submission.
pub const ARTIFACT_SOURCE_SERVER: &str = "source_server";
/// Logical artifact name under a testID's secure directory.
pub const ARTIFACT_AUTH_TOKEN: &str = "auth.jwt";
/// Logical artifact name under a testID's secure directory.
pub const ARTIFACT_MODULE_DEFINITION: &str = "module_definition.json";
/// Logical artifact name prefix for a traced intermediate retry-poll
/// response, written under a vsID or testID directory as
/// `"{ARTIFACT_TRACE_PREFIX}.{index}.json"` when tracing is enabled.
pub const ARTIFACT_TRACE_PREFIX: &str = "trace";

/// Result of comparing caller-supplied bytes against a persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// The persisted artifact's bytes equal the caller's.
    Equal,
    /// The persisted artifact exists but differs.
    Differ,
    /// No persisted artifact exists.
    Absent,
}

/// Optional identifier subset filters for `find_testsessions`.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict results to these testIDs, if non-empty.
    pub testids: Vec<TestId>,
    /// Restrict per-vsID processing to these vsIDs, if non-empty.
    pub vsids: Vec<VsId>,
}

/// Errors from a [`DatastoreBackend`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A filesystem or equivalent I/O operation failed.
    #[error("datastore I/O error: {0}")]
    Io(String),
    /// The store root's version marker does not match the expected version.
    #[error("datastore version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this build expects.
        expected: u8,
        /// Version found on disk.
        found: u8,
    },
    /// A persisted module-definition snapshot does not match the current
    /// definition.
    #[error("module definition mismatch under stored state")]
    ModuleDefinitionMismatch,
    /// A path component could not be produced safely.
    #[error("invalid path component")]
    InvalidPath,
}

/// Pluggable persistence of vectors, responses, verdicts, auth tokens, and
/// module definitions, keyed by `(vendor, module, version, testID, vsID)`.
#[async_trait]
pub trait DatastoreBackend: Send + Sync {
    /// Returns up to `limit` testIDs recorded under `module`, applying
    /// `search`'s optional subset filters. testID 0 (session-wide metadata)
    /// is always skipped; non-numeric directory names are ignored.
    ///
    /// # Errors
    /// Returns [`StoreError`] on I/O failure or a module-definition mismatch.
    async fn find_testsessions(
        &self,
        module: &ModuleDefinition,
        search: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<TestId>, StoreError>;

    /// Enumerates vsIDs under `testid_ctx`, returning one context per vsID
    /// with its presence flags pre-populated, paired with the persisted
    /// response bytes (`None` signals "download-only" to the caller).
    /// Applies `search`'s `vsids` subset filter when non-empty.
    ///
    /// # Errors
    /// Returns [`StoreError::ModuleDefinitionMismatch`] if the persisted
    /// snapshot disagrees with `module`, or [`StoreError::Io`] on failure.
    async fn find_responses(
        &self,
        testid_ctx: &TestSessionContext,
        search: &SearchFilter,
    ) -> Result<Vec<(VectorSetContext, Option<Vec<u8>>)>, StoreError>;

    /// Reads a vsID-scoped artifact, returning `None` when it is absent.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on any failure other than absence.
    async fn read_vsid(
        &self,
        module: &ModuleDefinition,
        vsid_ctx: &VectorSetContext,
        logical_name: &str,
        secure: bool,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// Atomically writes a vsID-scoped artifact, creating directories on
    /// demand.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on failure.
    async fn write_vsid(
        &self,
        module: &ModuleDefinition,
        vsid_ctx: &VectorSetContext,
        logical_name: &str,
        secure: bool,
        bytes: &[u8],
    ) -> Result<(), StoreError>;

    /// Atomically writes a testID-scoped artifact, creating directories on
    /// demand.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on failure.
    async fn write_testid(
        &self,
        testid_ctx: &TestSessionContext,
        logical_name: &str,
        secure: bool,
        bytes: &[u8],
    ) -> Result<(), StoreError>;

    /// Compares `bytes` against a persisted vsID-scoped artifact.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on any failure other than absence.
    async fn compare(
        &self,
        module: &ModuleDefinition,
        vsid_ctx: &VectorSetContext,
        logical_name: &str,
        secure: bool,
        bytes: &[u8],
    ) -> Result<Comparison, StoreError>;

    /// Loads the persisted JWT for `testid_ctx`, alongside its generation
    /// time (the token file's mtime), or `None` if absent.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on any failure other than absence.
    async fn read_authtoken(
        &self,
        testid_ctx: &TestSessionContext,
    ) -> Result<Option<(String, std::time::SystemTime)>, StoreError>;

    /// Persists `token` as the current JWT for `testid_ctx`. A
    /// partially-written file must be removed on error, never left as a
    /// stale token.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on failure.
    async fn write_authtoken(&self, testid_ctx: &TestSessionContext, token: &str) -> Result<(), StoreError>;

    /// Reads the server identity string previously recorded as the source
    /// of a vsID's vectors, or `None` if none was recorded.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on any failure other than absence.
    async fn source_server(
        &self,
        module: &ModuleDefinition,
        vsid_ctx: &VectorSetContext,
    ) -> Result<Option<String>, StoreError>;

    /// Records `server_id` as the source server for a vsID's vectors.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on failure.
    async fn record_source_server(
        &self,
        module: &ModuleDefinition,
        vsid_ctx: &VectorSetContext,
        server_id: &str,
    ) -> Result<(), StoreError>;
}

/// Errors from a [`NetworkClient`] implementation.
#[derive(Debug, Error)]
pub enum NetError {
    /// The transport itself failed (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),
    /// The server returned a 4xx response.
    #[error("client error: HTTP {0}")]
    ClientError(u16),
    /// The server returned a 5xx response.
    #[error("server error: HTTP {0}")]
    ServerError(u16),
    /// The response body could not be decoded as the expected JSON shape.
    #[error("malformed response body: {0}")]
    MalformedBody(String),
    /// Login did not yield a usable token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),
}

/// HTTP GET/POST/PUT against the ACVP server, injecting a JWT bearer header.
/// TLS client-certificate authentication is handled beneath this trait and
/// is opaque to callers.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Performs the login dance, returning a freshly issued JWT.
    ///
    /// # Errors
    /// Returns [`NetError::AuthFailed`] or a transport/server error.
    async fn login(&self, module: &ModuleDefinition, test_id: TestId) -> Result<String, NetError>;

    /// Issues an authenticated GET against `url`.
    ///
    /// # Errors
    /// Returns a transport or HTTP-status error.
    async fn get(&self, url: &str, token: &str) -> Result<Vec<u8>, NetError>;

    /// Issues an authenticated POST (first submission) with `body`.
    ///
    /// # Errors
    /// Returns a transport or HTTP-status error.
    async fn post(&self, url: &str, token: &str, body: &[u8]) -> Result<Vec<u8>, NetError>;

    /// Issues an authenticated PUT (resubmission) with `body`.
    ///
    /// # Errors
    /// Returns a transport or HTTP-status error.
    async fn put(&self, url: &str, token: &str, body: &[u8]) -> Result<Vec<u8>, NetError>;
}
