//! Spider-Pool: a bounded-concurrency HTTP fetch engine
//!
//! This crate fetches a list of URLs while keeping the number of in-flight
//! requests under a fixed budget, invokes a callback exactly once per
//! completed request, and reports timing and outcome statistics.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;

use thiserror::Error;

/// Main error type for Spider-Pool operations
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid state transition for request {index}: {from:?} -> {to:?}")]
    InvalidTransition {
        index: usize,
        from: state::RequestState,
        to: state::RequestState,
    },

    #[error("Unknown request index {index}")]
    UnknownRequest { index: usize },

    #[error("Request {index} was already dispatched")]
    DuplicateDispatch { index: usize },

    #[error("Admission gate closed")]
    AdmissionClosed,

    #[error("Fetch task failed to join: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
///
/// Every variant is raised before the first fetch is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("No transport configured: a fetcher is required before the run starts")]
    MissingTransport,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Network failure kinds for a single fetch
///
/// These never abort a run: they are captured per request and surfaced as
/// a failed outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch task panicked")]
    Panicked,
}

/// Result type alias for Spider-Pool operations
pub type Result<T> = std::result::Result<T, SpiderError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    AbortHandle, Coordinator, FetchCallback, FetchOutcome, FetchResult, Fetcher, HttpFetcher,
    Request, Strategy,
};
pub use output::RunReport;
pub use state::RequestState;
