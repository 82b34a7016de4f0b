//! HTTP fetcher implementation
//!
//! This module handles the fetch operation for the engine, including:
//! - The `Fetcher` abstraction the task tracker drives
//! - A reqwest-backed transport with pooled connections
//! - Total and per-host connection limits
//! - Error classification into per-request failures

use crate::config::{validate_transport_config, TransportConfig};
use crate::{ConfigError, FetchError};
use async_trait::async_trait;
use reqwest::Client;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// A single URL to fetch, tagged with its position in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Zero-based position in the input list
    pub index: usize,

    /// The URL to fetch
    pub url: String,
}

impl Request {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
        }
    }
}

/// Terminal outcome of a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The full body was received
    Success {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: Vec<u8>,
    },

    /// The fetch failed; any partial body is discarded
    Failure(FetchError),
}

impl FetchOutcome {
    /// Returns true if the body was received
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the body, if the fetch succeeded
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            Self::Success { body, .. } => Some(body.as_slice()),
            Self::Failure(_) => None,
        }
    }

    /// Returns the HTTP status, if the fetch succeeded
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. } => Some(*status),
            Self::Failure(_) => None,
        }
    }

    /// Returns the failure, if the fetch failed
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(e) => Some(e),
        }
    }
}

/// Result of a fetch operation, created once per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub request: Request,
    pub outcome: FetchOutcome,
}

impl FetchResult {
    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn index(&self) -> usize {
        self.request.index
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.outcome.body()
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.body().map(String::from_utf8_lossy)
    }
}

/// Retrieves a URL through some transport
///
/// Implementations must not panic and must turn every transport problem
/// into [`FetchOutcome::Failure`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> FetchOutcome;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, request: &Request) -> FetchOutcome {
        (**self).fetch(request).await
    }
}

/// Runs one fetch and wraps its outcome into a [`FetchResult`]
///
/// Emits a trace event when the fetch starts and when it finishes.
pub async fn fetch_request(fetcher: &dyn Fetcher, request: Request) -> FetchResult {
    tracing::debug!(index = request.index, url = %request.url, "fetch started");
    let started = Instant::now();

    let outcome = fetcher.fetch(&request).await;

    match &outcome {
        FetchOutcome::Success { status, body } => tracing::debug!(
            index = request.index,
            url = %request.url,
            status,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetch finished"
        ),
        FetchOutcome::Failure(error) => tracing::warn!(
            index = request.index,
            url = %request.url,
            %error,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetch failed"
        ),
    }

    FetchResult { request, outcome }
}

/// Connection slots held for the duration of one HTTP exchange
#[derive(Debug)]
pub struct ConnectionPermit {
    _host: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

/// Total and per-host connection limits for the transport
///
/// Per-host semaphores are created lazily on first use of a host.
#[derive(Debug)]
pub struct ConnectionLimiter {
    global: Arc<Semaphore>,
    per_host: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize, max_connections_per_host: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(max_connections)),
            per_host: max_connections_per_host,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for a connection slot to `host`
    ///
    /// The host slot is taken first so a request queued behind a busy host
    /// does not sit on a global slot. Returns `None` if the limiter was
    /// poisoned or closed.
    pub async fn acquire(&self, host: &str) -> Option<ConnectionPermit> {
        // Lock only long enough to clone the semaphore handle
        let host_semaphore = {
            let mut hosts = self.hosts.lock().ok()?;
            Arc::clone(
                hosts
                    .entry(host.to_string())
                    .or_insert_with(|| Arc::new(Semaphore::new(self.per_host))),
            )
        };

        let host_permit = host_semaphore.acquire_owned().await.ok()?;
        let global_permit = self.global.clone().acquire_owned().await.ok()?;

        Some(ConnectionPermit {
            _host: host_permit,
            _global: global_permit,
        })
    }
}

/// Key used to group connections by destination (`host:port`)
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port_or_known_default() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host.to_string()),
    }
}

/// Builds an HTTP client from the transport configuration
///
/// # Example
///
/// ```no_run
/// use spider_pool::config::TransportConfig;
/// use spider_pool::crawler::build_http_client;
///
/// let client = build_http_client(&TransportConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &TransportConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.max_connections_per_host)
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`Fetcher`] sharing one connection pool
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<ConnectionLimiter>,
}

impl HttpFetcher {
    /// Creates a fetcher from a validated transport configuration
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the limits are invalid or the client
    /// cannot be built. Nothing is fetched before this succeeds.
    pub fn new(config: &TransportConfig) -> Result<Self, ConfigError> {
        validate_transport_config(config)?;
        let client = build_http_client(config)?;

        tracing::debug!(
            max_connections = config.max_connections,
            max_connections_per_host = config.max_connections_per_host,
            timeout_secs = config.request_timeout_secs,
            "HTTP transport ready"
        );

        Ok(Self {
            client,
            limiter: Arc::new(ConnectionLimiter::new(
                config.max_connections,
                config.max_connections_per_host,
            )),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> FetchOutcome {
        let url = match Url::parse(&request.url) {
            Ok(url) => url,
            Err(e) => return FetchOutcome::Failure(FetchError::InvalidUrl(e.to_string())),
        };
        let Some(host) = host_key(&url) else {
            return FetchOutcome::Failure(FetchError::InvalidUrl(format!(
                "no host in {}",
                request.url
            )));
        };

        let Some(_connection) = self.limiter.acquire(&host).await else {
            return FetchOutcome::Failure(FetchError::Request(
                "connection pool unavailable".to_string(),
            ));
        };

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failure(classify_error(&e)),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => FetchOutcome::Success {
                status,
                body: body.to_vec(),
            },
            Err(e) if e.is_timeout() => FetchOutcome::Failure(FetchError::Timeout),
            Err(e) => FetchOutcome::Failure(FetchError::Body(e.to_string())),
        }
    }
}

/// Maps a reqwest error onto a per-request failure kind
pub fn classify_error(error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_connect() {
        FetchError::Connect(error.to_string())
    } else {
        FetchError::Request(error.to_string())
    }
}
