//! Run coordinator - entry point for a complete fetch run
//!
//! This module wires the pieces of a run together:
//! - Validating the URL list and turning it into indexed requests
//! - Building the task tracker with the configured strategy and budget
//! - Timing the run and logging the final duration
//! - Exposing an abort handle to the embedding code

use crate::config::{
    validate, validate_engine_config, validate_url, Config, EngineConfig, DEFAULT_CONCURRENCY,
    DEFAULT_POLL_INTERVAL_MS,
};
use crate::crawler::abort::AbortHandle;
use crate::crawler::dispatcher::{FetchCallback, LoggingCallback};
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::tracker::{Strategy, TaskTracker};
use crate::output::RunReport;
use crate::state::RequestTable;
use crate::{ConfigError, SpiderError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Main coordinator structure
///
/// A coordinator can run any number of URL lists one after another; each
/// call to [`Coordinator::run`] gets its own tracker and request table.
pub struct Coordinator {
    fetcher: Arc<dyn Fetcher>,
    callback: Arc<dyn FetchCallback>,
    strategy: Strategy,
    concurrency: usize,
    poll_interval: Duration,
    abort: AbortHandle,
}

/// Builder for [`Coordinator`]
pub struct CoordinatorBuilder {
    fetcher: Option<Arc<dyn Fetcher>>,
    callback: Option<Arc<dyn FetchCallback>>,
    strategy: Strategy,
    concurrency: usize,
    poll_interval: Duration,
    abort: Option<AbortHandle>,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self {
            fetcher: None,
            callback: None,
            strategy: Strategy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            abort: None,
        }
    }
}

impl CoordinatorBuilder {
    /// Sets the transport used for every fetch (required)
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sets the completion callback; defaults to [`LoggingCallback`]
    pub fn callback(mut self, callback: Arc<dyn FetchCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the concurrency budget
    ///
    /// Budgets outside `1..=1000` are rejected by [`build`](Self::build),
    /// the same range accepted for `[engine] concurrency` in the config file.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Uses an existing abort handle instead of creating one
    pub fn abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Validates the settings and builds the coordinator
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(ConfigError::MissingTransport)` - No fetcher was supplied
    /// * `Err(ConfigError::Validation)` - Budget or poll interval out of range
    pub fn build(self) -> Result<Coordinator, ConfigError> {
        let fetcher = self.fetcher.ok_or(ConfigError::MissingTransport)?;

        validate_engine_config(&EngineConfig {
            concurrency: self.concurrency,
            strategy: self.strategy,
            poll_interval_ms: u64::try_from(self.poll_interval.as_millis()).unwrap_or(u64::MAX),
        })?;

        Ok(Coordinator {
            fetcher,
            callback: self.callback.unwrap_or_else(|| Arc::new(LoggingCallback)),
            strategy: self.strategy,
            concurrency: self.concurrency,
            poll_interval: self.poll_interval,
            abort: self.abort.unwrap_or_else(|| AbortHandle::new().0),
        })
    }
}

impl Coordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::default()
    }

    /// Creates a coordinator backed by the reqwest transport
    ///
    /// # Arguments
    ///
    /// * `config` - Engine and transport settings; the input table is ignored
    /// * `callback` - Invoked once per completed request
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ConfigError)` - Invalid settings or the HTTP client could not be built
    pub fn from_config(
        config: &Config,
        callback: Arc<dyn FetchCallback>,
    ) -> Result<Self, ConfigError> {
        validate(config)?;
        let fetcher = HttpFetcher::new(&config.transport)?;

        Self::builder()
            .fetcher(Arc::new(fetcher))
            .callback(callback)
            .strategy(config.engine.strategy)
            .concurrency(config.engine.concurrency)
            .poll_interval(Duration::from_millis(config.engine.poll_interval_ms))
            .build()
    }

    /// Handle that stops the current and any later run of this coordinator
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches every URL and returns the run report
    ///
    /// Indices are assigned by position in `urls`. All URLs are validated
    /// before the first fetch starts, so a malformed entry fails the whole
    /// run without any network traffic.
    pub async fn run<I, S>(&self, urls: I) -> Result<RunReport, SpiderError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        for url in &urls {
            validate_url(url)?;
        }

        let table = RequestTable::from_urls(urls);
        let tracker = TaskTracker::new(
            table,
            self.concurrency,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.callback),
        )?
        .with_strategy(self.strategy)
        .with_poll_interval(self.poll_interval)
        .with_abort_signal(self.abort.signal());

        let started_at = Utc::now();
        let start = Instant::now();
        let summary = tracker.run().await?;
        let elapsed = start.elapsed();

        let report = RunReport {
            started_at,
            elapsed,
            strategy: self.strategy,
            concurrency: self.concurrency,
            total: summary.total,
            succeeded: summary.succeeded,
            failed: summary.failed,
            callback_errors: summary.callback_errors,
            peak_in_flight: summary.peak_in_flight,
            admission_waits: summary.admission_waits,
            progress_reports: summary.progress_reports,
            aborted: summary.aborted,
            abandoned: summary.abandoned,
            never_admitted: summary.never_admitted,
        };

        tracing::info!("{}", report.total_duration_line());
        Ok(report)
    }
}

/// Runs a complete fetch over the configured input
///
/// This is the main entry point for a configuration-driven run: it builds
/// the HTTP transport, expands the input list by its repeat count, and
/// fetches everything.
pub async fn run_fetch(
    config: &Config,
    callback: Arc<dyn FetchCallback>,
) -> Result<RunReport, SpiderError> {
    let coordinator = Coordinator::from_config(config, callback)?;
    coordinator.run(config.input.expanded_urls()).await
}
