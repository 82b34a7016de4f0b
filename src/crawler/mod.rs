//! Crawler module for bounded-concurrency fetching
//!
//! This module contains the core fetch engine, including:
//! - Admission control against the concurrency budget
//! - The fetch boundary and the pooled HTTP transport
//! - Task tracking with eager or wave draining
//! - Exactly-once callback dispatch
//! - Overall run coordination and abort

mod abort;
mod admission;
mod coordinator;
mod dispatcher;
mod fetcher;
mod tracker;

#[cfg(test)]
mod test_support;

pub use abort::{AbortHandle, AbortSignal};
pub use admission::{AdmissionController, Permit};
pub use coordinator::{run_fetch, Coordinator, CoordinatorBuilder};
pub use dispatcher::{DispatchStatus, Dispatcher, FetchCallback, LoggingCallback};
pub use fetcher::{
    build_http_client, classify_error, fetch_request, host_key, ConnectionLimiter,
    ConnectionPermit, FetchOutcome, FetchResult, Fetcher, HttpFetcher, Request,
};
pub use tracker::{Strategy, TaskTracker, TrackerSummary};
