use crate::crawler::Strategy;
use serde::Deserialize;

/// Default number of simultaneously outstanding fetches
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default wave poll interval (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Default total connection limit of the transport pool
pub const DEFAULT_MAX_CONNECTIONS: usize = 8;

/// Default per-host connection limit of the transport pool
pub const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 2;

/// Main configuration structure for Spider-Pool
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub input: InputConfig,
}

/// Admission and draining behavior
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of concurrently outstanding fetches
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Completion draining strategy
    #[serde(default)]
    pub strategy: Strategy,

    /// How long a wave waits on outstanding fetches before reporting (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            strategy: Strategy::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Connection pool configuration for the HTTP transport
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Total simultaneous connections across all hosts
    #[serde(rename = "max-connections", default = "default_max_connections")]
    pub max_connections: usize,

    /// Simultaneous connections to a single host
    #[serde(
        rename = "max-connections-per-host",
        default = "default_max_connections_per_host"
    )]
    pub max_connections_per_host: usize,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_connections_per_host: DEFAULT_MAX_CONNECTIONS_PER_HOST,
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// URL list to fetch
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub urls: Vec<String>,

    /// Number of times the URL list is repeated back to back
    #[serde(default = "default_repeat")]
    pub repeat: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            repeat: default_repeat(),
        }
    }
}

impl InputConfig {
    /// Expands the URL list by the repeat count, preserving order
    ///
    /// Callers are expected to have validated the config, which bounds the
    /// expanded length.
    pub fn expanded_urls(&self) -> Vec<String> {
        if self.urls.is_empty() {
            return Vec::new();
        }

        let mut urls =
            Vec::with_capacity(self.urls.len().checked_mul(self.repeat).unwrap_or(0));
        for _ in 0..self.repeat {
            urls.extend(self.urls.iter().cloned());
        }
        urls
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

fn default_max_connections_per_host() -> usize {
    DEFAULT_MAX_CONNECTIONS_PER_HOST
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("spider-pool/{}", env!("CARGO_PKG_VERSION"))
}

fn default_repeat() -> usize {
    1
}
