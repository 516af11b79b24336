// crates/acvp-cli/src/main.rs
// ============================================================================
// Module: ACVP Proxy CLI Entry Point
// Description: Command-line front end wiring configuration, the filesystem
//              datastore, the HTTP network client, and the orchestrator into
//              a single run.
// Purpose: Translate CLI flags into a bounded orchestrator invocation and
//          map its outcome onto a process exit code.
// Dependencies: clap, acvp-config, acvp-store, acvp-net, acvp-orchestrator.
// ============================================================================

//! ## Overview
//! This crate contains no cryptographic or protocol logic of its own; it
//! resolves configuration, constructs the concrete `DatastoreBackend` and
//! `NetworkClient` implementations, and hands them to
//! [`acvp_orchestrator::Orchestrator`]. A SIGINT during a run cancels the
//! orchestrator's token so in-flight tasks wind down instead of being
//! abruptly killed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use acvp_config::{ConfigError, ProxyConfig, ServerId};
use acvp_core::counters::GlobalCounters;
use acvp_core::identifiers::VsId;
use acvp_core::interfaces::SearchFilter;
use acvp_core::progress::StderrProgressSink;
use acvp_core::verdict::{Disposition, VerdictTracker};
use acvp_net::{HttpNetworkClient, RetryCaps};
use acvp_orchestrator::{Orchestrator, RunFlags};
use acvp_store::FilesystemDatastore;
use clap::{Parser, ValueEnum};
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Command-line surface for one orchestrator invocation.
#[derive(Parser, Debug)]
#[command(name = "acvp-proxy", about = "Concurrent ACVP test-session proxy")]
struct Cli {
    /// Path to the TOML configuration file (defaults to `ACVP_PROXY_CONFIG`
    /// or `./acvp-proxy.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Overrides the active server selected in the config file.
    #[arg(long, value_enum)]
    server: Option<ServerChoice>,
    /// Downloads vectors for vsIDs that have none yet, instead of only
    /// uploading already-persisted responses.
    #[arg(long)]
    download_pending_vsid: bool,
    /// Re-submits a response even if a prior submission's verdict already
    /// exists.
    #[arg(long)]
    resubmit_result: bool,
    /// Restricts the run to this testID. Repeatable.
    #[arg(long = "testid", value_name = "N")]
    testids: Vec<u64>,
    /// Restricts the run to this vsID. Repeatable.
    #[arg(long = "vsid", value_name = "N")]
    vsids: Vec<u64>,
    /// Prints the accumulated pass or fail verdict list after the run.
    #[arg(long, value_enum)]
    list_verdicts: Option<VerdictChoice>,
    /// Maximum testIDs to enumerate per module definition.
    #[arg(long, default_value_t = 10_000)]
    limit: usize,
}

/// CLI-facing mirror of [`ServerId`], since `clap::ValueEnum` cannot be
/// derived on a type owned by another crate.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum ServerChoice {
    /// The production validation server.
    Production,
    /// The demo/test validation server.
    Demo,
}

impl From<ServerChoice> for ServerId {
    fn from(choice: ServerChoice) -> Self {
        match choice {
            ServerChoice::Production => Self::Production,
            ServerChoice::Demo => Self::Demo,
        }
    }
}

/// Which verdict list to print after a run.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum VerdictChoice {
    /// vsIDs whose disposition was "passed".
    Passed,
    /// vsIDs whose disposition was anything other than "passed".
    Failed,
}

impl From<VerdictChoice> for Disposition {
    fn from(choice: VerdictChoice) -> Self {
        match choice {
            VerdictChoice::Passed => Self::Passed,
            VerdictChoice::Failed => Self::Failed,
        }
    }
}

// ============================================================================
// SECTION: Errors and exit codes
// ============================================================================

/// Top-level CLI error, wrapping whichever stage failed.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The filesystem datastore could not be opened.
    #[error("datastore error: {0}")]
    Store(#[from] acvp_core::interfaces::StoreError),
    /// The orchestrator aborted the entire run on a fatal condition.
    #[error("run aborted: {0}")]
    Fatal(acvp_core::error::AcvpError),
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_GENERAL_ERROR: u8 = 1;
const EXIT_RETRY_EXCEEDED: u8 = 75;
const EXIT_INVALID_CONFIG: u8 = 22;

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => EXIT_INVALID_CONFIG,
            Self::Store(_) | Self::Fatal(_) => EXIT_GENERAL_ERROR,
        }
    }
}

/// Writes one line to stdout, ignoring a broken pipe.
fn write_stdout_line(message: &str) {
    let _ = writeln!(std::io::stdout(), "{message}");
}

/// Writes one line to stderr, ignoring a broken pipe.
fn write_stderr_line(message: &str) {
    let _ = writeln!(std::io::stderr(), "{message}");
}

// ============================================================================
// SECTION: Entry point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            write_stderr_line(&format!("acvp-proxy: {err}"));
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<u8, CliError> {
    let mut config = ProxyConfig::load(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.server.active = server.into();
    }

    let datastore = Arc::new(
        FilesystemDatastore::open(
            config.datastore.base_dir.clone(),
            config.datastore.secure_base_dir.clone(),
        )
        .await?,
    );

    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.network.connect_timeout_secs))
        .timeout(Duration::from_secs(config.network.read_timeout_secs))
        .build()
        .unwrap_or_default();
    let net = Arc::new(HttpNetworkClient::new(http_client, config.active_url()));

    let sink = Arc::new(StderrProgressSink);
    let verdicts = Arc::new(VerdictTracker::new());
    let globals = Arc::new(GlobalCounters::new());
    let session_config = config.session_config();

    let retry_caps = RetryCaps {
        poll_interval_cap: Duration::from_secs(config.retry.poll_interval_cap_secs),
        total_poll_cap: Duration::from_secs(config.retry.total_poll_cap_secs),
    };
    let flags = RunFlags {
        download_pending_vsid: cli.download_pending_vsid,
        resubmit_result: cli.resubmit_result,
        download_only: false,
    };

    let orchestrator = Arc::new(Orchestrator::new(
        datastore,
        net,
        sink,
        Arc::clone(&verdicts),
        globals,
        session_config,
        config.active_url().to_string(),
        config.concurrency.testid_workers,
        config.concurrency.vsid_workers,
        retry_caps,
        flags,
    ));

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let search = SearchFilter {
        testids: cli.testids.into_iter().map(Into::into).collect(),
        vsids: cli.vsids.into_iter().map(VsId::from).collect(),
    };
    let modules = config.module_definitions();

    let summary = orchestrator
        .run(&modules, &search, cli.limit)
        .await
        .map_err(CliError::Fatal)?;

    for error in &summary.errors {
        write_stderr_line(&format!("acvp-proxy: task error: {error}"));
    }

    if let Some(choice) = cli.list_verdicts {
        let (vsids, _cursor) = verdicts.list(choice.into(), 0);
        for vsid in vsids {
            write_stdout_line(&vsid.to_string());
        }
    }

    if summary
        .errors
        .iter()
        .any(|err| matches!(err, acvp_core::error::AcvpError::PollTimeout))
    {
        return Ok(EXIT_RETRY_EXCEEDED);
    }
    if !summary.errors.is_empty() {
        return Ok(EXIT_GENERAL_ERROR);
    }
    Ok(EXIT_SUCCESS)
}
