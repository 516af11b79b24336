// crates/acvp-orchestrator/src/orchestrator.rs
// ============================================================================
// Module: Orchestrator
// Description: Walks module definitions, spawns testID workers (group A),
//              each of which spawns vsID workers (group B); aggregates
//              counters, verdicts, and durations.
// Purpose: The concurrent test-session orchestration engine.
// Dependencies: acvp-core, acvp-net, tokio
// ============================================================================

//! ## Overview
//! Two independently-sized `tokio::sync::Semaphore` pools back the two
//! worker groups this component requires: group A runs `handle_testid`
//! tasks, group B runs the per-vsID tasks `handle_testid` spawns. Mixing
//! them into one pool would deadlock if it saturates with group-A tasks
//! each waiting on a group-B task that can never acquire a slot.
//!
//! A testID's context is shared with every vsID task it spawns through an
//! `Arc`, never a raw reference, so group B tasks can be `'static` without
//! reaching for anything unsafe — `AuthContext`'s `RwLock` and the counters'
//! atomics are exactly what make that sharing sound.
//!
//! *stale-datastore* and a module-definition mismatch are the only fatal
//! conditions: any task that observes one flips the shared cancellation
//! token and records the error so [`Orchestrator::run`] returns it once
//! every in-flight task has wound down. Every other error is scoped to the
//! vsID or testID that produced it and is aggregated, never propagated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use acvp_core::cancel::CancellationToken;
use acvp_core::counters::GlobalCounters;
use acvp_core::error::{AcvpError, Outcome};
use acvp_core::identifiers::{ModuleDefinition, TestId};
use acvp_core::interfaces::{DatastoreBackend, NetError, NetworkClient, SearchFilter, StoreError, ARTIFACT_VERDICT};
use acvp_core::model::{SessionConfig, TestSessionContext, VectorSetContext};
use acvp_core::progress::{ProgressEvent, ProgressSink};
use acvp_core::verdict::{Disposition, VerdictTracker};
use acvp_net::{parse_disposition, poll_until_final, urls, RetryCaps, RetryError};
use tokio::sync::Semaphore;

/// CLI-level behavior flags that change `process_one_vsid`'s branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    /// Download vectors for vsIDs that have none yet.
    pub download_pending_vsid: bool,
    /// Force re-upload even when a verdict file is already present.
    pub resubmit_result: bool,
    /// Fetch vectors/expected-results only; never upload.
    pub download_only: bool,
}

/// Aggregate result of one [`Orchestrator::run`] invocation.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// testIDs visited, across every module definition.
    pub testids_visited: usize,
    /// Every non-fatal error observed, aggregated across all testIDs.
    pub errors: Vec<AcvpError>,
}

struct FatalSlot {
    error: Mutex<Option<AcvpError>>,
    set: AtomicBool,
}

impl FatalSlot {
    fn new() -> Self {
        Self {
            error: Mutex::new(None),
            set: AtomicBool::new(false),
        }
    }

    fn set(&self, error: AcvpError) {
        if !self.set.swap(true, Ordering::SeqCst) {
            *self.error.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(error);
        }
    }

    fn take(&self) -> Option<AcvpError> {
        self.error.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take()
    }
}

/// The concurrent test-session orchestration engine.
pub struct Orchestrator {
    datastore: Arc<dyn DatastoreBackend>,
    net: Arc<dyn NetworkClient>,
    sink: Arc<dyn ProgressSink>,
    verdicts: Arc<VerdictTracker>,
    globals: Arc<GlobalCounters>,
    config: Arc<SessionConfig>,
    base_url: String,
    testid_permits: Arc<Semaphore>,
    vsid_permits: Arc<Semaphore>,
    signal_stack: Arc<Mutex<Vec<TestId>>>,
    cancel: CancellationToken,
    retry_caps: RetryCaps,
    flags: RunFlags,
    fatal: Arc<FatalSlot>,
}

impl Orchestrator {
    /// Builds an orchestrator with independently-sized worker pools for
    /// groups A (testID) and B (vsID).
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "Every field is a required collaborator with no natural grouping.")]
    pub fn new(
        datastore: Arc<dyn DatastoreBackend>,
        net: Arc<dyn NetworkClient>,
        sink: Arc<dyn ProgressSink>,
        verdicts: Arc<VerdictTracker>,
        globals: Arc<GlobalCounters>,
        config: Arc<SessionConfig>,
        base_url: String,
        testid_workers: usize,
        vsid_workers: usize,
        retry_caps: RetryCaps,
        flags: RunFlags,
    ) -> Self {
        Self {
            datastore,
            net,
            sink,
            verdicts,
            globals,
            config,
            base_url,
            testid_permits: Arc::new(Semaphore::new(testid_workers.max(1))),
            vsid_permits: Arc::new(Semaphore::new(vsid_workers.max(1))),
            signal_stack: Arc::new(Mutex::new(Vec::new())),
            cancel: CancellationToken::new(),
            retry_caps,
            flags,
            fatal: Arc::new(FatalSlot::new()),
        }
    }

    /// The cancellation token this orchestrator's in-flight work observes;
    /// a host's interrupt handler calls `.cancel()` on it.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Walks every module definition, spawning one group-A task per testID
    /// and awaiting the whole group before returning.
    ///
    /// # Errors
    /// Returns the first fatal [`AcvpError`] (`stale-datastore` or
    /// `mismatch`) observed by any task. Non-fatal per-vsID/per-testID
    /// errors are instead collected into the returned [`RunSummary`].
    pub async fn run(
        self: &Arc<Self>,
        modules: &[ModuleDefinition],
        search: &SearchFilter,
        limit: usize,
    ) -> Result<RunSummary, AcvpError> {
        let mut summary = RunSummary::default();
        let search = Arc::new(search.clone());

        for module in modules {
            let testids = match self.datastore.find_testsessions(module, &search, limit).await {
                Ok(testids) => testids,
                Err(err) => return Err(self.record_fatal(map_store_error(&err))),
            };

            let mut handles = Vec::new();
            for test_id in testids {
                summary.testids_visited += 1;
                if self.config.debug {
                    let errors = self.clone().handle_testid(module.clone(), test_id, Arc::clone(&search)).await;
                    summary.errors.extend(errors);
                } else {
                    let this = Arc::clone(self);
                    let module = module.clone();
                    let permits = Arc::clone(&self.testid_permits);
                    let search = Arc::clone(&search);
                    handles.push(tokio::spawn(async move {
                        let _permit = permits.acquire_owned().await.ok();
                        this.handle_testid(module, test_id, search).await
                    }));
                }
            }
            for handle in handles {
                if let Ok(errors) = handle.await {
                    summary.errors.extend(errors);
                }
            }

            if let Some(fatal) = self.fatal.take() {
                return Err(fatal);
            }
        }

        Ok(summary)
    }

    fn record_fatal(&self, error: AcvpError) -> AcvpError {
        self.fatal.set(error);
        self.cancel.cancel();
        error
    }

    async fn handle_testid(self: Arc<Self>, module: ModuleDefinition, test_id: TestId, search: Arc<SearchFilter>) -> Vec<AcvpError> {
        let ctx = Arc::new(TestSessionContext::new(module, test_id, Arc::clone(&self.config)));
        self.signal_stack
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(test_id);
        let _guard = SignalGuard {
            stack: Arc::clone(&self.signal_stack),
            test_id,
        };

        let (outcome, mut errors) = self.respond_testid(&ctx, &search).await;

        if !matches!(outcome, Outcome::Restarted | Outcome::AlreadyDone) {
            if let Err(err) = self.get_testid_verdict(&ctx).await {
                errors.push(err);
            }
        }

        let to_process = ctx.counters().to_process();
        let processed = ctx.counters().processed();
        if processed < to_process {
            self.sink.emit(
                &ProgressEvent::warning(
                    "orchestrator",
                    format!("{} of {to_process} vsIDs missing for this testID; re-run with --testid={test_id}", to_process - processed),
                )
                .with_test_id(test_id),
            );
        }

        errors
    }

    async fn respond_testid(&self, ctx: &Arc<TestSessionContext>, search: &SearchFilter) -> (Outcome, Vec<AcvpError>) {
        if let Ok(Some((token, generated_at))) = self.datastore.read_authtoken(ctx).await {
            ctx.auth.install_with_generated_at(token, generated_at).await;
        }

        let responses = match self.datastore.find_responses(ctx, search).await {
            Ok(responses) => responses,
            Err(err @ (StoreError::ModuleDefinitionMismatch | StoreError::VersionMismatch { .. })) => {
                return (Outcome::Completed, vec![self.record_fatal(map_store_error(&err))]);
            }
            Err(err) => return (Outcome::Completed, vec![map_store_error(&err)]),
        };

        let mut errors = Vec::new();
        let mut any_restarted = false;

        if self.config.debug {
            let worker = self.clone_for_vsid();
            for (vsid_ctx, buf) in responses {
                match worker.process_one_vsid(ctx, vsid_ctx, buf).await {
                    Ok(Outcome::Restarted) => any_restarted = true,
                    Ok(_) => {}
                    Err(err) => errors.push(err),
                }
            }
        } else {
            let mut handles = Vec::new();
            for (vsid_ctx, buf) in responses {
                let permits = Arc::clone(&self.vsid_permits);
                let worker = self.clone_for_vsid();
                let ctx = Arc::clone(ctx);
                handles.push(tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    worker.process_one_vsid(&ctx, vsid_ctx, buf).await
                }));
            }
            for handle in handles {
                match handle.await {
                    Ok(Ok(Outcome::Restarted)) => any_restarted = true,
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => errors.push(err),
                    Err(_join_err) => errors.push(AcvpError::Cancelled),
                }
            }
        }

        let outcome = if any_restarted { Outcome::Restarted } else { Outcome::Completed };
        (outcome, errors)
    }

    fn clone_for_vsid(&self) -> VsidWorker {
        VsidWorker {
            datastore: Arc::clone(&self.datastore),
            net: Arc::clone(&self.net),
            sink: Arc::clone(&self.sink),
            verdicts: Arc::clone(&self.verdicts),
            globals: Arc::clone(&self.globals),
            config: Arc::clone(&self.config),
            base_url: self.base_url.clone(),
            cancel: self.cancel.clone(),
            retry_caps: self.retry_caps,
            flags: self.flags,
        }
    }

    async fn get_testid_verdict(&self, ctx: &TestSessionContext) -> Result<(), AcvpError> {
        if ctx.counters().processed() != ctx.counters().to_process() {
            return Ok(());
        }
        let url = urls::testid_verdict(&self.base_url, ctx.test_id);
        let token = ctx.auth.current_token().await.map_err(|_| AcvpError::AuthFailed)?;
        let outcome = poll_until_final(self.net.as_ref(), &url, &token, self.retry_caps, &self.cancel)
            .await
            .map_err(map_retry_error)?;
        self.trace_testid(ctx, &outcome.intermediates).await;
        let bytes = serde_json::to_vec(&outcome.final_value).unwrap_or_default();
        self.datastore
            .write_testid(ctx, ARTIFACT_VERDICT, false, &bytes)
            .await
            .map_err(|_| AcvpError::Io)
    }

    async fn trace_testid(&self, ctx: &TestSessionContext, intermediates: &[serde_json::Value]) {
        if !self.config.trace_intermediates {
            return;
        }
        for (index, value) in intermediates.iter().enumerate() {
            let bytes = serde_json::to_vec(value).unwrap_or_default();
            let name = format!("{}.{index}.json", acvp_core::interfaces::ARTIFACT_TRACE_PREFIX);
            if let Err(err) = self.datastore.write_testid(ctx, &name, false, &bytes).await {
                self.sink
                    .emit(&ProgressEvent::warning("orchestrator", format!("failed to write trace artifact `{name}`: {err}")).with_test_id(ctx.test_id));
            }
        }
    }
}

struct SignalGuard {
    stack: Arc<Mutex<Vec<TestId>>>,
    test_id: TestId,
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        let mut stack = self.stack.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(pos) = stack.iter().rposition(|id| *id == self.test_id) {
            stack.remove(pos);
        }
    }
}

/// The per-vsID half of the orchestrator, holding only what one vsID task
/// needs so it can be cloned cheaply into each spawned group-B task.
struct VsidWorker {
    datastore: Arc<dyn DatastoreBackend>,
    net: Arc<dyn NetworkClient>,
    sink: Arc<dyn ProgressSink>,
    verdicts: Arc<VerdictTracker>,
    globals: Arc<GlobalCounters>,
    config: Arc<SessionConfig>,
    base_url: String,
    cancel: CancellationToken,
    retry_caps: RetryCaps,
    flags: RunFlags,
}

impl VsidWorker {
    async fn process_one_vsid(&self, ctx: &TestSessionContext, vsid_ctx: VectorSetContext, buf: Option<Vec<u8>>) -> Result<Outcome, AcvpError> {
        // An "expected results" artifact forbids submission outright,
        // regardless of whether a response is already on disk.
        if vsid_ctx.sample_file_present {
            return Ok(Outcome::Skipped);
        }

        match buf {
            None => {
                if self.flags.download_pending_vsid && !vsid_ctx.vector_file_present {
                    ctx.counters().increment_to_process();
                    self.globals.increment_to_process();
                    self.download_vector(ctx, &vsid_ctx).await?;
                    Ok(Outcome::Restarted)
                } else {
                    Ok(Outcome::Skipped)
                }
            }
            Some(bytes) => {
                if self.flags.download_only {
                    Ok(Outcome::Skipped)
                } else {
                    ctx.counters().increment_to_process();
                    self.globals.increment_to_process();
                    let mut vsid_ctx = vsid_ctx;
                    vsid_ctx.resubmit_result = self.flags.resubmit_result;
                    self.submit_one(ctx, &vsid_ctx, &bytes).await?;
                    Ok(Outcome::Completed)
                }
            }
        }
    }

    async fn download_vector(&self, ctx: &TestSessionContext, vsid_ctx: &VectorSetContext) -> Result<(), AcvpError> {
        let url = urls::vector_set(&self.base_url, ctx.test_id, vsid_ctx.vs_id);
        let token = ctx.auth.current_token().await.map_err(|_| AcvpError::AuthFailed)?;
        let outcome = poll_until_final(self.net.as_ref(), &url, &token, self.retry_caps, &self.cancel)
            .await
            .map_err(map_retry_error)?;
        self.trace_vsid(ctx, vsid_ctx, &outcome.intermediates).await;
        let bytes = serde_json::to_vec(&outcome.final_value).unwrap_or_default();
        self.datastore
            .write_vsid(&ctx.module, vsid_ctx, acvp_core::interfaces::ARTIFACT_VECTOR, false, &bytes)
            .await
            .map_err(|_| AcvpError::Io)
    }

    async fn trace_vsid(&self, ctx: &TestSessionContext, vsid_ctx: &VectorSetContext, intermediates: &[serde_json::Value]) {
        if !self.config.trace_intermediates {
            return;
        }
        for (index, value) in intermediates.iter().enumerate() {
            let bytes = serde_json::to_vec(value).unwrap_or_default();
            let name = format!("{}.{index}.json", acvp_core::interfaces::ARTIFACT_TRACE_PREFIX);
            if let Err(err) = self.datastore.write_vsid(&ctx.module, vsid_ctx, &name, false, &bytes).await {
                self.sink.emit(
                    &ProgressEvent::warning("orchestrator", format!("failed to write trace artifact `{name}`: {err}"))
                        .with_test_id(ctx.test_id)
                        .with_vs_id(vsid_ctx.vs_id),
                );
            }
        }
    }

    async fn submit_one(&self, ctx: &TestSessionContext, vsid_ctx: &VectorSetContext, buf: &[u8]) -> Result<(), AcvpError> {
        let source = self
            .datastore
            .source_server(&ctx.module, vsid_ctx)
            .await
            .map_err(|_| AcvpError::Io)?;
        if let Some(source) = source {
            if source != self.config.server_id {
                self.sink.emit(
                    &ProgressEvent::warning("orchestrator", format!("vsID source server `{source}` does not match configured server `{}`", self.config.server_id))
                        .with_test_id(ctx.test_id)
                        .with_vs_id(vsid_ctx.vs_id),
                );
                return Err(AcvpError::WrongServer);
            }
        } else {
            self.datastore
                .record_source_server(&ctx.module, vsid_ctx, &self.config.server_id)
                .await
                .map_err(|_| AcvpError::Io)?;
        }

        if !vsid_ctx.verdict_file_present || vsid_ctx.resubmit_result {
            if ctx.auth.is_expired(Duration::from_secs(self.config.auth_ttl_secs)).await {
                let token = self.net.login(&ctx.module, ctx.test_id).await.map_err(|_| AcvpError::AuthFailed)?;
                ctx.auth.install(token).await;
            }
            let url = urls::vector_set_results(&self.base_url, ctx.test_id, vsid_ctx.vs_id);
            let token = ctx.auth.current_token().await.map_err(|_| AcvpError::AuthFailed)?;
            let result = if vsid_ctx.resubmit_result {
                self.net.put(&url, &token, buf).await
            } else {
                self.net.post(&url, &token, buf).await
            };
            result.map_err(map_net_error)?;

            let placeholder = br#"{"status":"Test responses uploaded, verdict download pending"}"#;
            self.datastore
                .write_vsid(&ctx.module, vsid_ctx, ARTIFACT_VERDICT, false, placeholder)
                .await
                .map_err(|_| AcvpError::Io)?;
        }

        self.get_vsid_verdict(ctx, vsid_ctx).await
    }

    async fn get_vsid_verdict(&self, ctx: &TestSessionContext, vsid_ctx: &VectorSetContext) -> Result<(), AcvpError> {
        let url = urls::vsid_verdict(&self.base_url, ctx.test_id, vsid_ctx.vs_id);
        let token = ctx.auth.current_token().await.map_err(|_| AcvpError::AuthFailed)?;
        let outcome = poll_until_final(self.net.as_ref(), &url, &token, self.retry_caps, &self.cancel)
            .await
            .map_err(map_retry_error)?;
        self.trace_vsid(ctx, vsid_ctx, &outcome.intermediates).await;

        let bytes = serde_json::to_vec(&outcome.final_value).unwrap_or_default();
        self.datastore
            .write_vsid(&ctx.module, vsid_ctx, ARTIFACT_VERDICT, false, &bytes)
            .await
            .map_err(|_| AcvpError::Io)?;

        ctx.counters().increment_processed();
        self.globals.increment_processed();

        let disposition = parse_disposition(&outcome.final_value);
        let passed = disposition.as_deref() == Some("passed");
        let recorded = self
            .verdicts
            .record(vsid_ctx.vs_id, if passed { Disposition::Passed } else { Disposition::Failed });
        if let Err(err) = recorded {
            self.sink.emit(&ProgressEvent::warning("verdict", err.to_string()).with_vs_id(vsid_ctx.vs_id));
        }
        Ok(())
    }
}

fn map_store_error(err: &StoreError) -> AcvpError {
    match err {
        StoreError::VersionMismatch { .. } => AcvpError::StaleDatastore,
        StoreError::ModuleDefinitionMismatch => AcvpError::Mismatch,
        StoreError::Io(_) | StoreError::InvalidPath => AcvpError::Io,
    }
}

fn map_retry_error(err: RetryError) -> AcvpError {
    match err {
        RetryError::Cancelled => AcvpError::Cancelled,
        RetryError::TimedOut(_) => AcvpError::PollTimeout,
        RetryError::Net(net_err) => map_net_error(net_err),
    }
}

fn map_net_error(err: NetError) -> AcvpError {
    match err {
        NetError::ClientError(_) => AcvpError::Http4xx,
        NetError::ServerError(_) => AcvpError::Http5xx,
        NetError::Transport(_) | NetError::MalformedBody(_) | NetError::AuthFailed(_) => AcvpError::HttpTransport,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions.")]
mod tests {
    use super::*;
    use crate::test_support::{InMemoryDatastore, StubNetworkClient};
    use acvp_core::identifiers::VsId;
    use acvp_core::interfaces::ARTIFACT_RESPONSE;
    use acvp_core::progress::NullProgressSink;

    fn config(server_id: &str, debug: bool) -> Arc<SessionConfig> {
        Arc::new(SessionConfig {
            auth_ttl_secs: 3600,
            debug,
            trace_intermediates: false,
            server_id: server_id.to_string(),
        })
    }

    fn config_with_trace(server_id: &str, debug: bool, trace_intermediates: bool) -> Arc<SessionConfig> {
        Arc::new(SessionConfig {
            auth_ttl_secs: 3600,
            debug,
            trace_intermediates,
            server_id: server_id.to_string(),
        })
    }

    fn retry_caps() -> RetryCaps {
        RetryCaps {
            poll_interval_cap: Duration::from_millis(5),
            total_poll_cap: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn processes_both_vsids_and_records_pass_and_fail_verdicts() {
        let module = ModuleDefinition::new("acme", "widget", "1.0");
        let datastore = Arc::new(InMemoryDatastore::new());
        datastore.seed_response(&module, TestId::from(1234), VsId::from(5678), ARTIFACT_RESPONSE, b"{}".to_vec());
        datastore.seed_response(&module, TestId::from(1234), VsId::from(5679), ARTIFACT_RESPONSE, b"{}".to_vec());

        let net = Arc::new(StubNetworkClient::new());
        net.script("/testSessions/1234/vectorSets/5678/results", vec![br#"{"retry":1}"#.to_vec(), br#"{"retry":1}"#.to_vec(), br#"{"disposition":"passed"}"#.to_vec()]);
        net.script("/testSessions/1234/vectorSets/5679/results", vec![br#"{"disposition":"failed"}"#.to_vec()]);
        net.script("/testSessions/1234/results", vec![br#"{"disposition":"passed"}"#.to_vec()]);

        let verdicts = Arc::new(VerdictTracker::new());
        let globals = Arc::new(GlobalCounters::new());
        let orchestrator = Arc::new(Orchestrator::new(
            datastore,
            net.clone(),
            Arc::new(NullProgressSink),
            Arc::clone(&verdicts),
            Arc::clone(&globals),
            config("production", false),
            "https://example".to_string(),
            4,
            4,
            retry_caps(),
            RunFlags::default(),
        ));

        let summary = orchestrator
            .run(&[module], &SearchFilter::default(), 100)
            .await
            .unwrap();

        assert!(summary.errors.is_empty(), "unexpected errors: {:?}", summary.errors);
        assert_eq!(globals.processed(), 2);

        let (passed, _) = verdicts.list(Disposition::Passed, 0);
        assert_eq!(passed, vec![VsId::from(5678)]);
        let (failed, _) = verdicts.list(Disposition::Failed, 0);
        assert_eq!(failed, vec![VsId::from(5679)]);
        assert_eq!(net.post_count(), 2, "each vsID's response is uploaded exactly once");
    }

    #[tokio::test]
    async fn skips_vsid_with_an_expected_results_artifact() {
        let module = ModuleDefinition::new("acme", "widget", "1.0");
        let datastore = Arc::new(InMemoryDatastore::new());
        datastore.seed_response(&module, TestId::from(1234), VsId::from(5678), ARTIFACT_RESPONSE, b"{}".to_vec());
        datastore.seed_response(&module, TestId::from(1234), VsId::from(5679), ARTIFACT_RESPONSE, b"{}".to_vec());
        datastore.seed_expected(&module, TestId::from(1234), VsId::from(5679));

        let net = Arc::new(StubNetworkClient::new());
        net.script("/testSessions/1234/vectorSets/5678/results", vec![br#"{"disposition":"passed"}"#.to_vec()]);
        net.script("/testSessions/1234/results", vec![br#"{"disposition":"passed"}"#.to_vec()]);

        let verdicts = Arc::new(VerdictTracker::new());
        let globals = Arc::new(GlobalCounters::new());
        let orchestrator = Arc::new(Orchestrator::new(
            datastore,
            net,
            Arc::new(NullProgressSink),
            verdicts,
            Arc::clone(&globals),
            config("production", true),
            "https://example".to_string(),
            4,
            4,
            retry_caps(),
            RunFlags::default(),
        ));

        let summary = orchestrator.run(&[module], &SearchFilter::default(), 100).await.unwrap();
        assert!(summary.errors.is_empty());
        assert_eq!(globals.to_process(), 1);
        assert_eq!(globals.processed(), 1);
    }

    #[tokio::test]
    async fn wrong_server_aborts_the_vsid_without_uploading() {
        let module = ModuleDefinition::new("acme", "widget", "1.0");
        let datastore = Arc::new(InMemoryDatastore::new());
        datastore.seed_response(&module, TestId::from(1234), VsId::from(5678), ARTIFACT_RESPONSE, b"{}".to_vec());
        datastore.seed_source_server(&module, TestId::from(1234), VsId::from(5678), "demo");

        let net = Arc::new(StubNetworkClient::new());

        let verdicts = Arc::new(VerdictTracker::new());
        let globals = Arc::new(GlobalCounters::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&datastore) as Arc<dyn DatastoreBackend>,
            net.clone(),
            Arc::new(NullProgressSink),
            verdicts,
            Arc::clone(&globals),
            config("production", true),
            "https://example".to_string(),
            4,
            4,
            retry_caps(),
            RunFlags::default(),
        ));

        let summary = orchestrator.run(&[module], &SearchFilter::default(), 100).await.unwrap();
        assert_eq!(summary.errors, vec![AcvpError::WrongServer]);
        assert_eq!(net.post_count(), 0);
        assert_eq!(globals.processed(), 0);
    }

    #[tokio::test]
    async fn a_vsid_filter_restricts_processing_to_the_named_vsid() {
        let module = ModuleDefinition::new("acme", "widget", "1.0");
        let datastore = Arc::new(InMemoryDatastore::new());
        datastore.seed_response(&module, TestId::from(1234), VsId::from(5678), ARTIFACT_RESPONSE, b"{}".to_vec());
        datastore.seed_response(&module, TestId::from(1234), VsId::from(5679), ARTIFACT_RESPONSE, b"{}".to_vec());

        let net = Arc::new(StubNetworkClient::new());
        net.script("/testSessions/1234/vectorSets/5678/results", vec![br#"{"disposition":"passed"}"#.to_vec()]);
        net.script("/testSessions/1234/results", vec![br#"{"disposition":"passed"}"#.to_vec()]);

        let verdicts = Arc::new(VerdictTracker::new());
        let globals = Arc::new(GlobalCounters::new());
        let orchestrator = Arc::new(Orchestrator::new(
            datastore,
            net.clone(),
            Arc::new(NullProgressSink),
            Arc::clone(&verdicts),
            Arc::clone(&globals),
            config("production", true),
            "https://example".to_string(),
            4,
            4,
            retry_caps(),
            RunFlags::default(),
        ));

        let search = SearchFilter {
            testids: Vec::new(),
            vsids: vec![VsId::from(5678)],
        };
        let summary = orchestrator.run(&[module], &search, 100).await.unwrap();
        assert!(summary.errors.is_empty());
        assert_eq!(globals.processed(), 1, "only the named vsID should be processed");
        assert_eq!(net.post_count(), 1);
    }

    #[tokio::test]
    async fn tracing_writes_intermediate_poll_responses_under_the_vsid() {
        let module = ModuleDefinition::new("acme", "widget", "1.0");
        let datastore = Arc::new(InMemoryDatastore::new());
        datastore.seed_response(&module, TestId::from(1234), VsId::from(5678), ARTIFACT_RESPONSE, b"{}".to_vec());

        let net = Arc::new(StubNetworkClient::new());
        net.script(
            "/testSessions/1234/vectorSets/5678/results",
            vec![br#"{"retry":1}"#.to_vec(), br#"{"retry":1}"#.to_vec(), br#"{"disposition":"passed"}"#.to_vec()],
        );
        net.script("/testSessions/1234/results", vec![br#"{"disposition":"passed"}"#.to_vec()]);

        let verdicts = Arc::new(VerdictTracker::new());
        let globals = Arc::new(GlobalCounters::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&datastore) as Arc<dyn DatastoreBackend>,
            net,
            Arc::new(NullProgressSink),
            verdicts,
            globals,
            config_with_trace("production", true, true),
            "https://example".to_string(),
            4,
            4,
            retry_caps(),
            RunFlags::default(),
        ));

        let summary = orchestrator.run(&[module.clone()], &SearchFilter::default(), 100).await.unwrap();
        assert!(summary.errors.is_empty(), "unexpected errors: {:?}", summary.errors);

        let vsid_ctx = VectorSetContext::new(TestId::from(1234), VsId::from(5678));
        let first = datastore
            .read_vsid(&module, &vsid_ctx, "trace.0.json", false)
            .await
            .unwrap()
            .expect("first intermediate response should be traced");
        assert_eq!(first, br#"{"retry":1}"#.to_vec());
        let second = datastore
            .read_vsid(&module, &vsid_ctx, "trace.1.json", false)
            .await
            .unwrap()
            .expect("second intermediate response should be traced");
        assert_eq!(second, br#"{"retry":1}"#.to_vec());
    }

    #[tokio::test]
    async fn tracing_disabled_writes_no_intermediate_artifacts() {
        let module = ModuleDefinition::new("acme", "widget", "1.0");
        let datastore = Arc::new(InMemoryDatastore::new());
        datastore.seed_response(&module, TestId::from(1234), VsId::from(5678), ARTIFACT_RESPONSE, b"{}".to_vec());

        let net = Arc::new(StubNetworkClient::new());
        net.script(
            "/testSessions/1234/vectorSets/5678/results",
            vec![br#"{"retry":1}"#.to_vec(), br#"{"disposition":"passed"}"#.to_vec()],
        );
        net.script("/testSessions/1234/results", vec![br#"{"disposition":"passed"}"#.to_vec()]);

        let verdicts = Arc::new(VerdictTracker::new());
        let globals = Arc::new(GlobalCounters::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&datastore) as Arc<dyn DatastoreBackend>,
            net,
            Arc::new(NullProgressSink),
            verdicts,
            globals,
            config("production", true),
            "https://example".to_string(),
            4,
            4,
            retry_caps(),
            RunFlags::default(),
        ));

        let summary = orchestrator.run(&[module.clone()], &SearchFilter::default(), 100).await.unwrap();
        assert!(summary.errors.is_empty());

        let vsid_ctx = VectorSetContext::new(TestId::from(1234), VsId::from(5678));
        let traced = datastore.read_vsid(&module, &vsid_ctx, "trace.0.json", false).await.unwrap();
        assert!(traced.is_none(), "no trace artifact should be written when tracing is disabled");
    }

    #[tokio::test]
    async fn a_module_definition_mismatch_is_fatal_and_aborts_the_run() {
        let module = ModuleDefinition::new("acme", "widget", "1.0");
        let datastore = Arc::new(InMemoryDatastore::new());
        datastore.seed_response(&module, TestId::from(1234), VsId::from(5678), ARTIFACT_RESPONSE, b"{}".to_vec());
        datastore.fail_find_responses_with(StoreError::ModuleDefinitionMismatch);

        let net = Arc::new(StubNetworkClient::new());
        let verdicts = Arc::new(VerdictTracker::new());
        let globals = Arc::new(GlobalCounters::new());
        let orchestrator = Arc::new(Orchestrator::new(
            datastore,
            net,
            Arc::new(NullProgressSink),
            verdicts,
            globals,
            config("production", true),
            "https://example".to_string(),
            4,
            4,
            retry_caps(),
            RunFlags::default(),
        ));

        let result = orchestrator.run(&[module], &SearchFilter::default(), 100).await;
        assert_eq!(result.unwrap_err(), AcvpError::Mismatch);
    }
}
