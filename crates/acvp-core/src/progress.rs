// crates/acvp-core/src/progress.rs
// ============================================================================
// Module: Progress / audit events
// Description: Structured event payloads and the sink trait the
//              orchestrator and network layer report through, replacing a
//              global logger with an injected collaborator.
// ============================================================================

//! ## Overview
//! Callers never format their own log lines; they build a [`ProgressEvent`]
//! and hand it to whatever [`ProgressSink`] the host wired in. This keeps
//! the orchestrator's logging untestable-by-accident: a test can install
//! [`NullProgressSink`] or capture events in a `Vec` without touching
//! stderr.

use std::fmt;
use std::io::Write as _;

use crate::identifiers::{TestId, VsId};

/// Severity of a [`ProgressEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Routine status, visible at default verbosity.
    Status,
    /// A recoverable condition worth surfacing to the user.
    Warning,
    /// Verbose tracing, visible only in debug mode.
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Status => "status",
            Self::Warning => "warning",
            Self::Debug => "debug",
        };
        f.write_str(label)
    }
}

/// One structured progress/audit event.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Severity.
    pub level: Level,
    /// Short component tag identifying the emitting subsystem (e.g.
    /// `"orchestrator"`, `"auth"`, `"retry"`).
    pub component: &'static str,
    /// Human-readable message.
    pub message: String,
    /// testID this event pertains to, if any.
    pub test_id: Option<TestId>,
    /// vsID this event pertains to, if any.
    pub vs_id: Option<VsId>,
}

impl ProgressEvent {
    /// Builds a bare status event with no testID/vsID.
    #[must_use]
    pub fn status(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: Level::Status,
            component,
            message: message.into(),
            test_id: None,
            vs_id: None,
        }
    }

    /// Builds a bare warning event with no testID/vsID.
    #[must_use]
    pub fn warning(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            component,
            message: message.into(),
            test_id: None,
            vs_id: None,
        }
    }

    /// Builds a bare debug-trace event with no testID/vsID.
    #[must_use]
    pub fn debug(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: Level::Debug,
            component,
            message: message.into(),
            test_id: None,
            vs_id: None,
        }
    }

    /// Attaches a testID to this event.
    #[must_use]
    pub fn with_test_id(mut self, test_id: TestId) -> Self {
        self.test_id = Some(test_id);
        self
    }

    /// Attaches a vsID to this event.
    #[must_use]
    pub fn with_vs_id(mut self, vs_id: VsId) -> Self {
        self.vs_id = Some(vs_id);
        self
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.component)?;
        if let Some(test_id) = self.test_id {
            write!(f, " testid={test_id}")?;
        }
        if let Some(vs_id) = self.vs_id {
            write!(f, " vsid={vs_id}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A destination for [`ProgressEvent`]s.
pub trait ProgressSink: Send + Sync {
    /// Emits one event. Must not block on network or disk I/O that could
    /// stall a worker's suspension points.
    fn emit(&self, event: &ProgressEvent);
}

/// Default sink: writes one line per event to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrProgressSink;

impl ProgressSink for StderrProgressSink {
    fn emit(&self, event: &ProgressEvent) {
        let _ = writeln!(std::io::stderr(), "{event}");
    }
}

/// Discards every event. Used in tests that do not want stderr noise.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions.")]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        events: Mutex<Vec<String>>,
    }

    impl ProgressSink for CapturingSink {
        fn emit(&self, event: &ProgressEvent) {
            self.events.lock().unwrap().push(event.to_string());
        }
    }

    #[test]
    fn event_display_includes_identifiers_when_present() {
        let event = ProgressEvent::warning("orchestrator", "deficit detected")
            .with_test_id(TestId::from(1234))
            .with_vs_id(VsId::from(5678));
        let rendered = event.to_string();
        assert!(rendered.contains("testid=1234"));
        assert!(rendered.contains("vsid=5678"));
        assert!(rendered.contains("deficit detected"));
    }

    #[test]
    fn capturing_sink_records_emitted_events_in_order() {
        let sink = CapturingSink::default();
        sink.emit(&ProgressEvent::status("auth", "login ok"));
        sink.emit(&ProgressEvent::debug("retry", "sleeping 1s"));
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].contains("login ok"));
    }

    #[test]
    fn null_sink_discards_everything() {
        let sink = NullProgressSink;
        sink.emit(&ProgressEvent::status("noop", "discarded"));
    }
}
