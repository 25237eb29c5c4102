// crates/coinload-core/src/report.rs
// ============================================================================
// Module: Run Report
// Description: Summary of a finished load-test run.
// Purpose: Render scheduler counters and check tallies for the CLI.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`RunReport`] combines scheduler counters with per-check tallies and
//! decides whether the run passed its failure threshold. A run that recorded
//! no checks passes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::checks::CheckTally;
use crate::scheduler::SchedulerStats;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Pass/fail counts for one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummaryEntry {
    /// Check name.
    pub name: String,
    /// Passing results.
    pub passes: u64,
    /// Failing results.
    pub fails: u64,
}

/// Final run summary.
///
/// # Invariants
/// - `checks` is sorted by name.
/// - `passed` is true iff `failure_ratio <= max_check_failure_ratio`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Iterations started.
    pub admitted: u64,
    /// Iterations that ran to completion.
    pub completed: u64,
    /// Admissions dropped at the worker limit.
    pub dropped: u64,
    /// Iterations that panicked.
    pub panicked: u64,
    /// Workers allocated by the end of the run.
    pub peak_workers: usize,
    /// Wall-clock run time in milliseconds.
    pub elapsed_ms: u64,
    /// Per-check tallies sorted by name.
    pub checks: Vec<CheckSummaryEntry>,
    /// Passing results across all checks.
    pub total_passes: u64,
    /// Failing results across all checks.
    pub total_fails: u64,
    /// `total_fails / (total_passes + total_fails)`, zero when nothing ran.
    pub failure_ratio: f64,
    /// Threshold the ratio was compared against.
    pub max_check_failure_ratio: f64,
    /// Whether the run met its threshold.
    pub passed: bool,
}

impl RunReport {
    /// Builds a report from scheduler counters and check tallies.
    #[must_use]
    pub fn new(
        stats: &SchedulerStats,
        summary: &BTreeMap<String, CheckTally>,
        max_check_failure_ratio: f64,
    ) -> Self {
        let checks: Vec<CheckSummaryEntry> = summary
            .iter()
            .map(|(name, tally)| CheckSummaryEntry {
                name: name.clone(),
                passes: tally.passes,
                fails: tally.fails,
            })
            .collect();
        let total_passes = checks.iter().map(|entry| entry.passes).fold(0_u64, u64::saturating_add);
        let total_fails = checks.iter().map(|entry| entry.fails).fold(0_u64, u64::saturating_add);
        let failure_ratio = ratio(total_fails, total_passes.saturating_add(total_fails));
        Self {
            admitted: stats.admitted,
            completed: stats.completed,
            dropped: stats.dropped,
            panicked: stats.panicked,
            peak_workers: stats.peak_workers,
            elapsed_ms: u64::try_from(stats.elapsed.as_millis()).unwrap_or(u64::MAX),
            checks,
            total_passes,
            total_fails,
            failure_ratio,
            max_check_failure_ratio,
            passed: failure_ratio <= max_check_failure_ratio,
        }
    }

    /// Renders the report as human-readable text.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let verdict = if self.passed { "PASSED" } else { "FAILED" };
        let _ = writeln!(out, "run {verdict}");
        let _ = writeln!(
            out,
            "iterations: admitted={} completed={} dropped={} panicked={}",
            self.admitted, self.completed, self.dropped, self.panicked
        );
        let _ = writeln!(out, "workers: peak={}", self.peak_workers);
        let _ = writeln!(out, "elapsed: {} ms", self.elapsed_ms);
        let _ = writeln!(out, "checks:");
        let width = self.checks.iter().map(|entry| entry.name.len()).max().unwrap_or(0);
        for entry in &self.checks {
            let _ = writeln!(
                out,
                "  {:<width$}  passes={} fails={}",
                entry.name, entry.passes, entry.fails
            );
        }
        let _ = write!(
            out,
            "totals: passes={} fails={} failure_ratio={:.4} threshold={:.4}",
            self.total_passes, self.total_fails, self.failure_ratio, self.max_check_failure_ratio
        );
        out
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns `part / whole`, or zero for an empty whole.
#[allow(clippy::cast_precision_loss, reason = "Check counts stay far below 2^53.")]
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::missing_docs_in_private_items,
        clippy::float_cmp,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use std::time::Duration;

    use super::*;

    fn stats() -> SchedulerStats {
        SchedulerStats {
            admitted: 10,
            completed: 9,
            dropped: 1,
            panicked: 0,
            peak_workers: 4,
            elapsed: Duration::from_millis(1_500),
        }
    }

    fn summary(entries: &[(&str, u64, u64)]) -> BTreeMap<String, CheckTally> {
        entries
            .iter()
            .map(|(name, passes, fails)| {
                (
                    (*name).to_string(),
                    CheckTally {
                        passes: *passes,
                        fails: *fails,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn empty_run_passes() {
        let report = RunReport::new(&SchedulerStats::default(), &BTreeMap::new(), 0.0);
        assert!(report.passed);
        assert_eq!(report.failure_ratio, 0.0);
        assert!(report.checks.is_empty());
    }

    #[test]
    fn ratio_above_threshold_fails() {
        let report = RunReport::new(&stats(), &summary(&[("b", 8, 2), ("a", 10, 0)]), 0.05);
        assert_eq!(report.total_passes, 18);
        assert_eq!(report.total_fails, 2);
        assert_eq!(report.failure_ratio, 0.1);
        assert!(!report.passed);
        let names: Vec<&str> = report.checks.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn ratio_equal_to_threshold_passes() {
        let report = RunReport::new(&stats(), &summary(&[("a", 3, 1)]), 0.25);
        assert!(report.passed);
    }

    #[test]
    fn text_rendering_lists_counters_and_checks() {
        let report = RunReport::new(&stats(), &summary(&[("info status is not 500", 9, 0)]), 0.05);
        let text = report.render_text();
        assert!(text.starts_with("run PASSED"));
        assert!(text.contains("admitted=10 completed=9 dropped=1"));
        assert!(text.contains("info status is not 500  passes=9 fails=0"));
        assert!(text.contains("elapsed: 1500 ms"));
    }

    #[test]
    fn json_rendering_uses_field_names() {
        let report = RunReport::new(&stats(), &summary(&[("a", 1, 0)]), 0.05);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["admitted"], 10);
        assert_eq!(value["checks"][0]["name"], "a");
        assert_eq!(value["passed"], true);
    }
}
