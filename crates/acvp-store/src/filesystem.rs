// crates/acvp-store/src/filesystem.rs
// ============================================================================
// Module: Filesystem Datastore
// Description: Reference `DatastoreBackend` implementation: a plain
//              directory tree keyed by (vendor, module, version, testID,
//              vsID), with a version marker and tightened permissions on
//              the secure root.
// Purpose: Persist vectors, responses, verdicts, auth tokens, and module
//          definition snapshots exactly per the reference layout.
// Dependencies: acvp-core, tokio::fs
// ============================================================================

//! ## Overview
//! Two independent roots exist: `base_dir` for artifacts safe to leave
//! world-readable (vectors, responses, verdicts), and `secure_base_dir` for
//! auth tokens and module-definition snapshots, tightened to mode `0700`
//! (directories) / `0600` (token files) after first use.

use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use acvp_core::identifiers::{ModuleDefinition, TestId, VsId};
use acvp_core::interfaces::{
    Comparison, DatastoreBackend, SearchFilter, StoreError, ARTIFACT_MODULE_DEFINITION,
};
use acvp_core::model::{TestSessionContext, VectorSetContext};
use async_trait::async_trait;

use crate::paths::{testid_dir, version_file, vsid_dir, CURRENT_VERSION};

const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

fn io_err(err: std::io::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

/// Reference filesystem-backed [`DatastoreBackend`].
pub struct FilesystemDatastore {
    base_dir: PathBuf,
    secure_base_dir: PathBuf,
}

impl FilesystemDatastore {
    /// Opens (creating if absent) a store rooted at `base_dir` with a
    /// separate secure root at `secure_base_dir`, checking both roots'
    /// version markers.
    ///
    /// # Errors
    /// Returns [`StoreError::VersionMismatch`] if an existing root's version
    /// marker differs from [`CURRENT_VERSION`], or [`StoreError::Io`] on any
    /// other failure.
    pub async fn open(base_dir: PathBuf, secure_base_dir: PathBuf) -> Result<Self, StoreError> {
        ensure_version(&base_dir, false).await?;
        ensure_version(&secure_base_dir, true).await?;
        Ok(Self {
            base_dir,
            secure_base_dir,
        })
    }

    fn testid_base_dir(&self, module: &ModuleDefinition, test_id: TestId) -> PathBuf {
        testid_dir(&self.base_dir, module, test_id)
    }

    fn testid_secure_dir(&self, module: &ModuleDefinition, test_id: TestId) -> PathBuf {
        testid_dir(&self.secure_base_dir, module, test_id)
    }

    fn vsid_path(&self, module: &ModuleDefinition, test_id: TestId, vs_id: VsId, secure: bool, logical_name: &str) -> PathBuf {
        let root = if secure { &self.secure_base_dir } else { &self.base_dir };
        vsid_dir(root, module, test_id, vs_id).join(logical_name)
    }
}

async fn ensure_version(root: &Path, secure: bool) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(root).await.map_err(io_err)?;
    if secure {
        tokio::fs::set_permissions(root, std::fs::Permissions::from_mode(DIR_MODE))
            .await
            .map_err(io_err)?;
    }
    let marker = version_file(root);
    match tokio::fs::read(&marker).await {
        Ok(bytes) => {
            let found = bytes.first().copied().unwrap_or(0);
            if found != CURRENT_VERSION {
                return Err(StoreError::VersionMismatch {
                    expected: CURRENT_VERSION,
                    found,
                });
            }
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            write_atomic(&marker, &[CURRENT_VERSION]).await?;
            if secure {
                tokio::fs::set_permissions(&marker, std::fs::Permissions::from_mode(FILE_MODE))
                    .await
                    .map_err(io_err)?;
            }
            Ok(())
        }
        Err(err) => Err(io_err(err)),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let tmp_path = path.with_extension("tmp-write");
    if let Err(err) = tokio::fs::write(&tmp_path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_err(err));
    }
    tokio::fs::rename(&tmp_path, path).await.map_err(io_err)
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(err)),
    }
}

#[async_trait]
impl DatastoreBackend for FilesystemDatastore {
    async fn find_testsessions(
        &self,
        module: &ModuleDefinition,
        search: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<TestId>, StoreError> {
        check_module_definition(&self.secure_base_dir, module).await?;

        let module_dir = self.base_dir.join(module.relative_path());
        let mut entries = match tokio::fs::read_dir(&module_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(err)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Ok(raw) = name.parse::<u64>() else {
                continue;
            };
            let test_id = TestId::from(raw);
            if test_id.is_metadata() {
                continue;
            }
            if !search.testids.is_empty() && !search.testids.contains(&test_id) {
                continue;
            }
            found.push(test_id);
            if found.len() >= limit {
                break;
            }
        }
        found.sort_unstable();
        Ok(found)
    }

    async fn find_responses(
        &self,
        testid_ctx: &TestSessionContext,
        search: &SearchFilter,
    ) -> Result<Vec<(VectorSetContext, Option<Vec<u8>>)>, StoreError> {
        check_module_definition(&self.secure_base_dir, &testid_ctx.module).await?;

        let dir = self.testid_base_dir(&testid_ctx.module, testid_ctx.test_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(err)),
        };

        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Ok(raw) = name.parse::<u64>() else {
                continue;
            };
            let vs_id = VsId::from(raw);
            if !search.vsids.is_empty() && !search.vsids.contains(&vs_id) {
                continue;
            }
            let vsid_path = dir.join(&name);

            let vector_file_present =
                tokio::fs::try_exists(vsid_path.join(acvp_core::interfaces::ARTIFACT_VECTOR))
                    .await
                    .unwrap_or(false);
            let verdict_file_present =
                tokio::fs::try_exists(vsid_path.join(acvp_core::interfaces::ARTIFACT_VERDICT))
                    .await
                    .unwrap_or(false);
            let sample_file_present =
                tokio::fs::try_exists(vsid_path.join(acvp_core::interfaces::ARTIFACT_EXPECTED))
                    .await
                    .unwrap_or(false);

            let mut ctx = VectorSetContext::new(testid_ctx.test_id, vs_id);
            ctx.vector_file_present = vector_file_present;
            ctx.verdict_file_present = verdict_file_present;
            ctx.sample_file_present = sample_file_present;

            let response = read_optional(&vsid_path.join(acvp_core::interfaces::ARTIFACT_RESPONSE)).await?;
            out.push((ctx, response));
        }
        Ok(out)
    }

    async fn read_vsid(
        &self,
        module: &ModuleDefinition,
        vsid_ctx: &VectorSetContext,
        logical_name: &str,
        secure: bool,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.vsid_path(module, vsid_ctx.test_id, vsid_ctx.vs_id, secure, logical_name);
        read_optional(&path).await
    }

    async fn write_vsid(
        &self,
        module: &ModuleDefinition,
        vsid_ctx: &VectorSetContext,
        logical_name: &str,
        secure: bool,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        let path = self.vsid_path(module, vsid_ctx.test_id, vsid_ctx.vs_id, secure, logical_name);
        write_atomic(&path, bytes).await?;
        if secure {
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(FILE_MODE))
                .await
                .map_err(io_err)?;
        }
        Ok(())
    }

    async fn write_testid(
        &self,
        testid_ctx: &TestSessionContext,
        logical_name: &str,
        secure: bool,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        let dir = if secure {
            self.testid_secure_dir(&testid_ctx.module, testid_ctx.test_id)
        } else {
            self.testid_base_dir(&testid_ctx.module, testid_ctx.test_id)
        };
        let path = dir.join(logical_name);
        write_atomic(&path, bytes).await?;
        if secure {
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(FILE_MODE))
                .await
                .map_err(io_err)?;
        }
        Ok(())
    }

    async fn compare(
        &self,
        module: &ModuleDefinition,
        vsid_ctx: &VectorSetContext,
        logical_name: &str,
        secure: bool,
        bytes: &[u8],
    ) -> Result<Comparison, StoreError> {
        let path = self.vsid_path(module, vsid_ctx.test_id, vsid_ctx.vs_id, secure, logical_name);
        match read_optional(&path).await? {
            None => Ok(Comparison::Absent),
            Some(existing) if existing == bytes => Ok(Comparison::Equal),
            Some(_) => Ok(Comparison::Differ),
        }
    }

    async fn read_authtoken(
        &self,
        testid_ctx: &TestSessionContext,
    ) -> Result<Option<(String, SystemTime)>, StoreError> {
        let path = self
            .testid_secure_dir(&testid_ctx.module, testid_ctx.test_id)
            .join(acvp_core::interfaces::ARTIFACT_AUTH_TOKEN);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_err(err)),
        };
        let mtime = metadata.modified().map_err(io_err)?;
        let bytes = tokio::fs::read(&path).await.map_err(io_err)?;
        let token = String::from_utf8(bytes).map_err(|err| StoreError::Io(err.to_string()))?;
        Ok(Some((token, mtime)))
    }

    async fn write_authtoken(&self, testid_ctx: &TestSessionContext, token: &str) -> Result<(), StoreError> {
        let path = self
            .testid_secure_dir(&testid_ctx.module, testid_ctx.test_id)
            .join(acvp_core::interfaces::ARTIFACT_AUTH_TOKEN);
        write_atomic(&path, token.as_bytes()).await?;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(FILE_MODE))
            .await
            .map_err(io_err)
    }

    async fn source_server(
        &self,
        module: &ModuleDefinition,
        vsid_ctx: &VectorSetContext,
    ) -> Result<Option<String>, StoreError> {
        let path = self.vsid_path(
            module,
            vsid_ctx.test_id,
            vsid_ctx.vs_id,
            false,
            acvp_core::interfaces::ARTIFACT_SOURCE_SERVER,
        );
        match read_optional(&path).await? {
            None => Ok(None),
            Some(bytes) => Ok(Some(String::from_utf8(bytes).map_err(|err| StoreError::Io(err.to_string()))?)),
        }
    }

    async fn record_source_server(
        &self,
        module: &ModuleDefinition,
        vsid_ctx: &VectorSetContext,
        server_id: &str,
    ) -> Result<(), StoreError> {
        let path = self.vsid_path(
            module,
            vsid_ctx.test_id,
            vsid_ctx.vs_id,
            false,
            acvp_core::interfaces::ARTIFACT_SOURCE_SERVER,
        );
        write_atomic(&path, server_id.as_bytes()).await
    }
}

async fn check_module_definition(secure_base_dir: &Path, module: &ModuleDefinition) -> Result<(), StoreError> {
    let snapshot_dir = secure_base_dir.join(module.relative_path());
    let snapshot_path = snapshot_dir.join(ARTIFACT_MODULE_DEFINITION);
    let current = serde_json::json!({
        "vendor": module.vendor(),
        "module": module.module(),
        "version": module.version(),
    });

    match read_optional(&snapshot_path).await? {
        None => {
            let bytes = serde_json::to_vec(&current).map_err(|err| StoreError::Io(err.to_string()))?;
            write_atomic(&snapshot_path, &bytes).await
        }
        Some(existing) => {
            let existing: serde_json::Value =
                serde_json::from_slice(&existing).map_err(|err| StoreError::Io(err.to_string()))?;
            if existing == current {
                Ok(())
            } else {
                Err(StoreError::ModuleDefinitionMismatch)
            }
        }
    }
}
