// crates/coinload-core/src/checks.rs
// ============================================================================
// Module: Check Aggregator
// Description: Append-only log of named pass/fail assertions.
// Purpose: Tally check outcomes across concurrent iterations.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every scored response becomes an immutable [`CheckResult`]. The
//! [`CheckAggregator`] appends results under a mutex and keeps running
//! per-name tallies so summaries never rescan the log. Tallies count every
//! result; the log itself only retains the most recent results up to its
//! capacity, so memory stays flat on long high-rate runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Check Names
// ============================================================================

/// Login succeeded with status 200 and a token.
pub const LOGIN_CHECK: &str = "logged in successfully";
/// Purchase did not answer with a server error.
pub const BUY_CHECK: &str = "buy status is not 500";
/// Coin transfer did not answer with a server error.
pub const SEND_COIN_CHECK: &str = "send coin status is not 500";
/// Account info did not answer with a server error.
pub const INFO_CHECK: &str = "info status is not 500";

/// Results retained in the log by default.
pub const DEFAULT_RESULT_LOG_CAPACITY: usize = 10_000;

/// Status code treated as a failed "not server error" check.
pub const SERVER_ERROR_STATUS: u16 = 500;

/// Scores a status for the "not server error" checks.
#[must_use]
pub const fn status_is_not_server_error(status: u16) -> bool {
    status != SERVER_ERROR_STATUS
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// A single recorded assertion.
///
/// # Invariants
/// - Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    /// Check name.
    pub name: String,
    /// Whether the assertion held.
    pub passed: bool,
    /// Creation time (milliseconds since epoch).
    pub timestamp_ms: u128,
}

impl CheckResult {
    /// Creates a result stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, passed: bool) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            name: name.into(),
            passed,
            timestamp_ms,
        }
    }
}

/// Pass/fail counts for one check name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckTally {
    /// Number of passing results.
    pub passes: u64,
    /// Number of failing results.
    pub fails: u64,
}

impl CheckTally {
    /// Returns the total number of results.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.passes.saturating_add(self.fails)
    }

    /// Adds one outcome.
    const fn add(&mut self, passed: bool) {
        if passed {
            self.passes = self.passes.saturating_add(1);
        } else {
            self.fails = self.fails.saturating_add(1);
        }
    }
}

/// Mutable aggregator state guarded by a single lock.
#[derive(Debug, Default)]
struct AggregatorState {
    /// Most recent results in insertion order.
    log: VecDeque<CheckResult>,
    /// Running tallies keyed by check name.
    tallies: BTreeMap<String, CheckTally>,
    /// Results recorded so far, retained or not.
    recorded: usize,
}

impl AggregatorState {
    /// Counts `result` and retains it within `capacity`.
    fn push(&mut self, result: CheckResult, capacity: usize) {
        self.tallies.entry(result.name.clone()).or_default().add(result.passed);
        self.recorded = self.recorded.saturating_add(1);
        if capacity == 0 {
            return;
        }
        if self.log.len() == capacity {
            self.log.pop_front();
        }
        self.log.push_back(result);
    }
}

/// Thread-safe, append-only check log.
///
/// # Invariants
/// - Tallies include every recorded result, including ones evicted from the
///   retained log.
/// - The retained log never exceeds its capacity.
#[derive(Debug)]
pub struct CheckAggregator {
    /// Guarded log and tallies.
    state: Mutex<AggregatorState>,
    /// Maximum number of retained results.
    log_capacity: usize,
}

impl Default for CheckAggregator {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_RESULT_LOG_CAPACITY)
    }
}

impl CheckAggregator {
    /// Creates an empty aggregator retaining [`DEFAULT_RESULT_LOG_CAPACITY`]
    /// results.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty aggregator retaining at most `log_capacity` results.
    /// Zero keeps tallies only.
    #[must_use]
    pub fn with_log_capacity(log_capacity: usize) -> Self {
        Self {
            state: Mutex::new(AggregatorState::default()),
            log_capacity,
        }
    }

    /// Records a new outcome for `name`.
    pub fn record(&self, name: &str, passed: bool) {
        self.record_result(CheckResult::new(name, passed));
    }

    /// Appends an already-created result.
    pub fn record_result(&self, result: CheckResult) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.push(result, self.log_capacity);
    }

    /// Appends a batch of results while holding the lock once.
    pub fn record_all(&self, results: impl IntoIterator<Item = CheckResult>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for result in results {
            state.push(result, self.log_capacity);
        }
    }

    /// Returns per-name pass/fail counts.
    #[must_use]
    pub fn summary(&self) -> BTreeMap<String, CheckTally> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).tallies.clone()
    }

    /// Returns the tally for a single check name (zero when never recorded).
    #[must_use]
    pub fn tally(&self, name: &str) -> CheckTally {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tallies
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    /// Returns the retained results in insertion order.
    #[must_use]
    pub fn results(&self) -> Vec<CheckResult> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).log.iter().cloned().collect()
    }

    /// Returns the number of recorded results, retained or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).recorded
    }

    /// Returns true when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns pass/fail counts across all check names.
    #[must_use]
    pub fn totals(&self) -> CheckTally {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.tallies.values().fold(CheckTally::default(), |mut acc, tally| {
            acc.passes = acc.passes.saturating_add(tally.passes);
            acc.fails = acc.fails.saturating_add(tally.fails);
            acc
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
