//! Run statistics and progress reporting
//!
//! This module provides the progress snapshot emitted at every drain or
//! poll boundary and the final report printed after a run.

use crate::crawler::Strategy;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Progress counters recomputed at each observation point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatistics {
    /// Requests whose result has been dispatched
    pub completed: usize,

    /// Requests not yet completed (queued or in flight)
    pub pending: usize,

    /// Time since the run started
    pub elapsed: Duration,
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "done={} pending={} elapsed={}",
            self.completed,
            self.pending,
            format_duration(self.elapsed)
        )
    }
}

/// Final report of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Wall-clock time the run started
    pub started_at: DateTime<Utc>,

    /// Monotonic duration of the whole run
    pub elapsed: Duration,

    /// Draining strategy used
    pub strategy: Strategy,

    /// Concurrency budget used
    pub concurrency: usize,

    /// Number of requests in the run
    pub total: usize,

    /// Requests that received a body
    pub succeeded: usize,

    /// Requests that ended in a network failure
    pub failed: usize,

    /// Callback invocations that panicked
    pub callback_errors: usize,

    /// Highest number of simultaneously admitted requests
    pub peak_in_flight: usize,

    /// Admissions that had to wait for a free slot
    pub admission_waits: usize,

    /// Progress lines emitted
    pub progress_reports: usize,

    /// Whether the run was stopped before every request completed
    pub aborted: bool,

    /// Requests that were in flight when the run was aborted
    pub abandoned: usize,

    /// Requests that were never admitted because of an abort
    pub never_admitted: usize,
}

impl RunReport {
    /// Requests whose result was dispatched
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Returns true if every request completed
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.completed() == self.total
    }

    /// Final `total duration=...` line
    pub fn total_duration_line(&self) -> String {
        format!("total duration={}", format_duration(self.elapsed))
    }
}

/// Formats a duration as `H:MM:SS.mmm`
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// Prints a run report to stdout in a formatted manner
pub fn print_statistics(report: &RunReport) {
    println!("=== Fetch Statistics ===\n");

    println!("Run:");
    println!("  Started at: {}", report.started_at.to_rfc3339());
    println!("  Strategy: {}", report.strategy);
    println!("  Concurrency: {}", report.concurrency);
    println!();

    println!("Requests:");
    println!("  Total: {}", report.total);
    println!("  Succeeded: {}", report.succeeded);
    println!("  Failed: {}", report.failed);
    if report.callback_errors > 0 {
        println!("  Callback errors: {}", report.callback_errors);
    }
    println!();

    println!("Concurrency:");
    println!("  Peak in flight: {}", report.peak_in_flight);
    println!("  Admission waits: {}", report.admission_waits);
    println!("  Progress reports: {}", report.progress_reports);
    println!();

    if report.aborted {
        println!("Aborted:");
        println!("  Abandoned in flight: {}", report.abandoned);
        println!("  Never admitted: {}", report.never_admitted);
        println!();
    }

    let success_rate = if report.total > 0 {
        (report.succeeded as f64 / report.total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} requests)",
        success_rate, report.succeeded, report.total
    );
    println!("{}", report.total_duration_line());
}
