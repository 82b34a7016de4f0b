//! Output module for run statistics and reports
//!
//! This module handles:
//! - Progress lines emitted while a run drains completions
//! - The final run report and its console rendering

pub mod stats;

pub use stats::{format_duration, print_statistics, RunReport, RunStatistics};
