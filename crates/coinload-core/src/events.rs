// crates/coinload-core/src/events.rs
// ============================================================================
// Module: Harness Events
// Description: Structured JSON-line events for load-test runs.
// Purpose: Emit run lifecycle and failure events without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Events are serialized as one JSON object per line with an `event` label
//! and a `timestamp_ms`. Sinks are pluggable so the CLI can route them to
//! stderr, an append-only file, or nowhere. Session tokens and passwords are
//! never part of an event payload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Harness event payloads.
///
/// # Invariants
/// - Variant labels are stable for log consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HarnessEvent {
    /// The scheduler is about to admit the first iteration.
    RunStarted {
        /// Target base URL.
        base_url: String,
        /// Target arrival rate.
        rate_per_second: f64,
        /// Admission window in milliseconds.
        duration_ms: u64,
        /// Workers available at start.
        pre_allocated_workers: usize,
        /// Hard worker limit.
        max_workers: usize,
        /// Number of synthetic users.
        user_pool_size: usize,
    },
    /// The worker pool grew beyond its pre-allocated size.
    WorkerPoolGrown {
        /// Workers allocated after growth.
        workers: usize,
        /// Hard worker limit.
        max_workers: usize,
    },
    /// An admission was dropped because every worker stayed busy.
    IterationDropped {
        /// Dropped iterations so far.
        dropped_total: u64,
        /// Hard worker limit.
        max_workers: usize,
    },
    /// Login failed; the iteration was aborted.
    LoginFailed {
        /// Acting username.
        username: String,
        /// Failure label.
        error_kind: &'static str,
        /// Status code when the server answered.
        status: Option<u16>,
    },
    /// An endpoint call failed at the transport level.
    RequestFailed {
        /// Acting username.
        username: String,
        /// Endpoint label.
        endpoint: &'static str,
        /// Failure label.
        error_kind: &'static str,
        /// Failure description.
        message: String,
    },
    /// A cached session was dropped after a 401.
    SessionInvalidated {
        /// Username whose session was dropped.
        username: String,
        /// Endpoint that answered 401.
        endpoint: &'static str,
    },
    /// All admitted iterations finished.
    RunFinished {
        /// Iterations admitted.
        admitted: u64,
        /// Iterations that ran to completion.
        completed: u64,
        /// Iterations dropped at admission.
        dropped: u64,
        /// Wall-clock run time in milliseconds.
        elapsed_ms: u64,
    },
}

/// Timestamped event as written to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event payload.
    #[serde(flatten)]
    pub event: HarnessEvent,
}

impl EventRecord {
    /// Stamps `event` with the current time.
    #[must_use]
    pub fn now(event: HarnessEvent) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            timestamp_ms,
            event,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Destination for harness events.
pub trait EventSink: Send + Sync {
    /// Records a timestamped event.
    fn record(&self, record: &EventRecord);

    /// Stamps and records `event`.
    fn emit(&self, event: HarnessEvent) {
        self.record(&EventRecord::now(event));
    }
}

/// Sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl EventSink for StderrEventSink {
    fn record(&self, record: &EventRecord) {
        if let Ok(payload) = serde_json::to_string(record) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileEventSink {
    /// Opens the event log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for FileEventSink {
    fn record(&self, record: &EventRecord) {
        if let Ok(payload) = serde_json::to_string(record)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
        }
    }
}

/// Sink that discards events.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn record(&self, _record: &EventRecord) {}
}

/// Sink that keeps events in memory for inspection.
#[derive(Default)]
pub struct MemoryEventSink {
    /// Recorded events in arrival order.
    records: Mutex<Vec<EventRecord>>,
}

impl MemoryEventSink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns recorded events in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<HarnessEvent> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|record| record.event.clone())
            .collect()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, record: &EventRecord) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record.clone());
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
