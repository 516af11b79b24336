// crates/acvp-orchestrator/src/test_support.rs
// ============================================================================
// Module: Test doubles
// Description: In-memory `DatastoreBackend`/`NetworkClient` stand-ins used
//              only by this crate's own test suite, to exercise scheduling
//              and retry semantics without touching a filesystem or network.
// ============================================================================

#![cfg(test)]
#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use acvp_core::identifiers::{ModuleDefinition, TestId, VsId};
use acvp_core::interfaces::{
    Comparison, DatastoreBackend, NetError, NetworkClient, SearchFilter, StoreError, ARTIFACT_VERDICT,
};
use acvp_core::model::{TestSessionContext, VectorSetContext};
use async_trait::async_trait;

/// An in-memory [`DatastoreBackend`] seeded directly by test setup code,
/// standing in for `acvp-store`'s filesystem implementation.
#[derive(Default)]
pub struct InMemoryDatastore {
    testids: Mutex<BTreeSet<u64>>,
    vsids_by_testid: Mutex<HashMap<u64, BTreeSet<u64>>>,
    responses: Mutex<HashMap<(u64, u64), Vec<u8>>>,
    expected: Mutex<HashSet<(u64, u64)>>,
    source_servers: Mutex<HashMap<(u64, u64), String>>,
    artifacts: Mutex<HashMap<(u64, u64, String), Vec<u8>>>,
    testid_artifacts: Mutex<HashMap<(u64, String), Vec<u8>>>,
    forced_find_responses_error: Mutex<Option<StoreError>>,
}

impl InMemoryDatastore {
    /// Builds an empty datastore.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a vsID with a persisted response buffer, ready for submission.
    pub fn seed_response(&self, _module: &ModuleDefinition, test_id: TestId, vs_id: VsId, _logical_name: &str, bytes: Vec<u8>) {
        self.testids.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(test_id.0);
        self.vsids_by_testid
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(test_id.0)
            .or_default()
            .insert(vs_id.0);
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((test_id.0, vs_id.0), bytes);
    }

    /// Marks a vsID as carrying an "expected results" artifact, which
    /// forbids submission regardless of whether a response is present.
    pub fn seed_expected(&self, _module: &ModuleDefinition, test_id: TestId, vs_id: VsId) {
        self.expected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((test_id.0, vs_id.0));
    }

    /// Records a source-server identity for a vsID, as if it had been
    /// downloaded from a different configured server in a prior run.
    pub fn seed_source_server(&self, _module: &ModuleDefinition, test_id: TestId, vs_id: VsId, server_id: &str) {
        self.source_servers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((test_id.0, vs_id.0), server_id.to_string());
    }

    /// Forces the next `find_responses` call to fail with `error`, modeling
    /// a fatal datastore condition mid-run.
    pub fn fail_find_responses_with(&self, error: StoreError) {
        *self.forced_find_responses_error.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(error);
    }
}

#[async_trait]
impl DatastoreBackend for InMemoryDatastore {
    async fn find_testsessions(&self, _module: &ModuleDefinition, search: &SearchFilter, limit: usize) -> Result<Vec<TestId>, StoreError> {
        let testids = self.testids.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut out: Vec<TestId> = if search.testids.is_empty() {
            testids.iter().copied().map(TestId::from).collect()
        } else {
            let wanted: HashSet<u64> = search.testids.iter().map(|id| id.0).collect();
            testids.iter().copied().filter(|id| wanted.contains(id)).map(TestId::from).collect()
        };
        out.truncate(limit);
        Ok(out)
    }

    async fn find_responses(&self, testid_ctx: &TestSessionContext, search: &SearchFilter) -> Result<Vec<(VectorSetContext, Option<Vec<u8>>)>, StoreError> {
        if let Some(err) = self.forced_find_responses_error.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take() {
            return Err(err);
        }

        let test_id = testid_ctx.test_id.0;
        let vsids_by_testid = self.vsids_by_testid.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(vsids) = vsids_by_testid.get(&test_id) else {
            return Ok(Vec::new());
        };

        let responses = self.responses.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let expected = self.expected.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let artifacts = self.artifacts.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let wanted: HashSet<u64> = search.vsids.iter().map(|id| id.0).collect();
        let mut out = Vec::new();
        for &vs_id in vsids {
            if !wanted.is_empty() && !wanted.contains(&vs_id) {
                continue;
            }
            let mut ctx = VectorSetContext::new(testid_ctx.test_id, VsId::from(vs_id));
            ctx.sample_file_present = expected.contains(&(test_id, vs_id));
            ctx.verdict_file_present = artifacts.contains_key(&(test_id, vs_id, ARTIFACT_VERDICT.to_string()));
            let buf = responses.get(&(test_id, vs_id)).cloned();
            out.push((ctx, buf));
        }
        Ok(out)
    }

    async fn read_vsid(&self, _module: &ModuleDefinition, vsid_ctx: &VectorSetContext, logical_name: &str, _secure: bool) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .artifacts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(vsid_ctx.test_id.0, vsid_ctx.vs_id.0, logical_name.to_string()))
            .cloned())
    }

    async fn write_vsid(&self, _module: &ModuleDefinition, vsid_ctx: &VectorSetContext, logical_name: &str, _secure: bool, bytes: &[u8]) -> Result<(), StoreError> {
        self.artifacts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((vsid_ctx.test_id.0, vsid_ctx.vs_id.0, logical_name.to_string()), bytes.to_vec());
        Ok(())
    }

    async fn write_testid(&self, testid_ctx: &TestSessionContext, logical_name: &str, _secure: bool, bytes: &[u8]) -> Result<(), StoreError> {
        self.testid_artifacts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((testid_ctx.test_id.0, logical_name.to_string()), bytes.to_vec());
        Ok(())
    }

    async fn compare(&self, _module: &ModuleDefinition, vsid_ctx: &VectorSetContext, logical_name: &str, _secure: bool, bytes: &[u8]) -> Result<Comparison, StoreError> {
        let artifacts = self.artifacts.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(match artifacts.get(&(vsid_ctx.test_id.0, vsid_ctx.vs_id.0, logical_name.to_string())) {
            Some(existing) if existing.as_slice() == bytes => Comparison::Equal,
            Some(_) => Comparison::Differ,
            None => Comparison::Absent,
        })
    }

    async fn read_authtoken(&self, _testid_ctx: &TestSessionContext) -> Result<Option<(String, SystemTime)>, StoreError> {
        Ok(None)
    }

    async fn write_authtoken(&self, _testid_ctx: &TestSessionContext, _token: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn source_server(&self, _module: &ModuleDefinition, vsid_ctx: &VectorSetContext) -> Result<Option<String>, StoreError> {
        Ok(self
            .source_servers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(vsid_ctx.test_id.0, vsid_ctx.vs_id.0))
            .cloned())
    }

    async fn record_source_server(&self, _module: &ModuleDefinition, vsid_ctx: &VectorSetContext, server_id: &str) -> Result<(), StoreError> {
        self.source_servers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((vsid_ctx.test_id.0, vsid_ctx.vs_id.0), server_id.to_string());
        Ok(())
    }
}

/// An in-memory [`NetworkClient`] whose responses are pre-scripted per URL
/// path, standing in for `acvp-net`'s `reqwest`-backed implementation.
#[derive(Default)]
pub struct StubNetworkClient {
    scripts: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    post_count: AtomicUsize,
}

impl StubNetworkClient {
    /// Builds a client with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the sequence of bytes returned by successive `GET`s whose URL
    /// ends with `path_suffix`.
    pub fn script(&self, path_suffix: &str, responses: Vec<Vec<u8>>) {
        self.scripts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(path_suffix.to_string(), responses);
    }

    /// Number of `post` calls observed so far.
    #[must_use]
    pub fn post_count(&self) -> usize {
        self.post_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkClient for StubNetworkClient {
    async fn login(&self, _module: &ModuleDefinition, _test_id: TestId) -> Result<String, NetError> {
        Ok("stub-token".to_string())
    }

    async fn get(&self, url: &str, _token: &str) -> Result<Vec<u8>, NetError> {
        let mut scripts = self.scripts.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let key = scripts.keys().find(|suffix| url.ends_with(suffix.as_str())).cloned();
        let Some(key) = key else {
            return Err(NetError::Transport(format!("no scripted response for {url}")));
        };
        let queue = scripts.get_mut(&key).expect("key came from this map");
        if queue.is_empty() {
            return Err(NetError::Transport(format!("scripted responses for {key} exhausted")));
        }
        Ok(queue.remove(0))
    }

    async fn post(&self, _url: &str, _token: &str, _body: &[u8]) -> Result<Vec<u8>, NetError> {
        self.post_count.fetch_add(1, Ordering::SeqCst);
        Ok(br#"{"status":"accepted"}"#.to_vec())
    }

    async fn put(&self, _url: &str, _token: &str, _body: &[u8]) -> Result<Vec<u8>, NetError> {
        self.post_count.fetch_add(1, Ordering::SeqCst);
        Ok(br#"{"status":"accepted"}"#.to_vec())
    }
}
