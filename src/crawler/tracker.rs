//! Task tracker - admission, in-flight bookkeeping and completion draining
//!
//! The tracker is the single owner of the request table, the in-flight set
//! and the admission controller. Every request moves through
//! `Queued -> Admitted -> InFlight -> Completed`, and its admission permit
//! travels with the fetch task and is only dropped after the completion has
//! been observed and dispatched. The in-flight set therefore never holds
//! more entries than the budget, even between a fetch finishing and the
//! tracker noticing it.
//!
//! Two draining strategies are available:
//!
//! | Strategy | Drains | Progress line |
//! |----------|--------|---------------|
//! | `Eager`  | as soon as one fetch finishes, plus any others already done | after every drain |
//! | `Wave`   | everything finished within one poll interval | after every poll |

use crate::crawler::abort::AbortSignal;
use crate::crawler::admission::{AdmissionController, Permit};
use crate::crawler::dispatcher::{Dispatcher, FetchCallback};
use crate::crawler::fetcher::{fetch_request, FetchOutcome, FetchResult, Fetcher, Request};
use crate::config::DEFAULT_POLL_INTERVAL_MS;
use crate::output::RunStatistics;
use crate::state::{RequestState, RequestTable};
use crate::{ConfigError, FetchError, SpiderError};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Completion draining strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Continuous replacement: start a new fetch as soon as a slot frees up
    #[default]
    Eager,

    /// Batch waves: poll outstanding fetches on a fixed interval
    Wave,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eager => "eager",
            Self::Wave => "wave",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eager" => Ok(Self::Eager),
            "wave" => Ok(Self::Wave),
            other => Err(format!(
                "unknown strategy '{}', expected 'eager' or 'wave'",
                other
            )),
        }
    }
}

/// Counters produced by one tracker run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub callback_errors: usize,
    pub peak_in_flight: usize,
    pub admission_waits: usize,
    pub progress_reports: usize,
    pub aborted: bool,
    pub abandoned: usize,
    pub never_admitted: usize,
}

/// A finished fetch together with the admission slot it occupied
struct Completion {
    result: FetchResult,
    permit: Permit,
}

/// Drives a set of requests to completion under a concurrency budget
pub struct TaskTracker {
    table: RequestTable,
    admission: AdmissionController,
    dispatcher: Dispatcher,
    fetcher: Arc<dyn Fetcher>,
    in_flight: JoinSet<Completion>,
    next: usize,
    strategy: Strategy,
    poll_interval: Duration,
    abort: AbortSignal,
    started: Instant,
    succeeded: usize,
    failed: usize,
    progress_reports: usize,
    saturated: usize,
}

impl TaskTracker {
    /// Creates a tracker over `table` with `budget` admission slots
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `budget` is zero.
    pub fn new(
        table: RequestTable,
        budget: usize,
        fetcher: Arc<dyn Fetcher>,
        callback: Arc<dyn FetchCallback>,
    ) -> Result<Self, ConfigError> {
        let admission = AdmissionController::new(budget)?;
        let dispatcher = Dispatcher::new(callback, table.len());

        Ok(Self {
            table,
            admission,
            dispatcher,
            fetcher,
            in_flight: JoinSet::new(),
            next: 0,
            strategy: Strategy::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            abort: AbortSignal::never(),
            started: Instant::now(),
            succeeded: 0,
            failed: 0,
            progress_reports: 0,
            saturated: 0,
        })
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets how long a wave waits on outstanding fetches (`Wave` only)
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Current progress counters
    pub fn statistics(&self) -> RunStatistics {
        RunStatistics {
            completed: self.table.completed(),
            pending: self.table.pending(),
            elapsed: self.started.elapsed(),
        }
    }

    /// Runs every request to completion, or until aborted
    ///
    /// Individual fetch failures never make this return an error; they are
    /// dispatched as failed results. An error means the tracker's own
    /// bookkeeping broke and the run cannot be trusted.
    pub async fn run(mut self) -> Result<TrackerSummary, SpiderError> {
        self.started = Instant::now();
        tracing::info!(
            total = self.table.len(),
            budget = self.admission.budget(),
            strategy = %self.strategy,
            "starting fetch run"
        );

        match self.strategy {
            Strategy::Eager => self.run_eager().await?,
            Strategy::Wave => self.run_wave().await?,
        }

        if self.table.all_completed() {
            Ok(self.summary())
        } else {
            Ok(self.abandon())
        }
    }

    /// Continuous replacement
    ///
    /// Keeps the in-flight set pinned at the budget: when it is full, wait
    /// for one fetch to finish, drain every finished fetch, then start
    /// exactly one new one.
    async fn run_eager(&mut self) -> Result<(), SpiderError> {
        while self.next < self.table.len() {
            if self.abort.is_aborted() {
                return Ok(());
            }

            if self.in_flight.len() >= self.admission.budget() {
                self.saturated += 1;
                if !self.drain_at_least_one().await? {
                    return Ok(());
                }
            }

            let permit = self.admission.admit().await?;
            self.start_next(permit)?;
        }

        while !self.in_flight.is_empty() {
            if !self.drain_at_least_one().await? {
                return Ok(());
            }
        }

        Ok(())
    }

    /// Waits for one completion, then drains all others already finished
    ///
    /// Returns `false` if the run was aborted while waiting.
    async fn drain_at_least_one(&mut self) -> Result<bool, SpiderError> {
        let joined = tokio::select! {
            biased;
            _ = self.abort.aborted() => return Ok(false),
            joined = self.in_flight.join_next() => joined,
        };

        let Some(joined) = joined else {
            return Ok(true);
        };
        self.complete(joined?)?;

        while let Some(joined) = self.in_flight.try_join_next() {
            self.complete(joined?)?;
        }

        self.report_progress();
        Ok(true)
    }

    /// Batch waves
    ///
    /// Admits as many requests as there are free slots, then collects
    /// whatever finishes within one poll interval (returning early once
    /// nothing is outstanding). Slots are only handed back at the wave
    /// boundary.
    async fn run_wave(&mut self) -> Result<(), SpiderError> {
        loop {
            if self.abort.is_aborted() {
                return Ok(());
            }

            while self.next < self.table.len() {
                let Some(permit) = self.admission.try_admit() else {
                    self.saturated += 1;
                    break;
                };
                self.start_next(permit)?;
            }

            // Every slot is free once the set is empty, so nothing is left to submit
            if self.in_flight.is_empty() {
                return Ok(());
            }

            let finished = self.poll_wave().await?;
            tracing::debug!(
                done = finished.len(),
                pending = self.in_flight.len(),
                "wave polled"
            );
            for completion in finished {
                self.complete(completion)?;
            }
            self.report_progress();
        }
    }

    async fn poll_wave(&mut self) -> Result<Vec<Completion>, SpiderError> {
        let deadline = Instant::now() + self.poll_interval;
        let mut finished = Vec::new();

        while !self.in_flight.is_empty() {
            let joined = tokio::select! {
                biased;
                _ = self.abort.aborted() => break,
                joined = tokio::time::timeout_at(deadline, self.in_flight.join_next()) => joined,
            };

            match joined {
                Ok(Some(joined)) => finished.push(joined?),
                Ok(None) | Err(_) => break,
            }
        }

        Ok(finished)
    }

    /// Admits the next queued request and starts its fetch
    fn start_next(&mut self, permit: Permit) -> Result<(), SpiderError> {
        let index = self.next;
        let request = self
            .table
            .get(index)
            .cloned()
            .ok_or(SpiderError::UnknownRequest { index })?;

        self.table.advance(index, RequestState::Admitted)?;
        self.in_flight
            .spawn(run_isolated(Arc::clone(&self.fetcher), request, permit));
        self.table.advance(index, RequestState::InFlight)?;
        self.next += 1;

        debug_assert!(self.table.in_flight() <= self.admission.budget());
        tracing::trace!(index, in_flight = self.table.in_flight(), "request admitted");
        Ok(())
    }

    /// Finalizes one observed completion; its slot is freed afterwards
    fn complete(&mut self, completion: Completion) -> Result<(), SpiderError> {
        let Completion { result, permit } = completion;
        let index = result.index();

        self.table.advance(index, RequestState::Completed)?;
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.dispatcher.dispatch(&result)?;

        drop(permit);
        Ok(())
    }

    fn report_progress(&mut self) {
        self.progress_reports += 1;
        tracing::info!("{}", self.statistics());
    }

    /// Stops admission and detaches whatever is still running
    fn abandon(mut self) -> TrackerSummary {
        self.admission.close();
        let abandoned = self.in_flight.len();
        self.in_flight.detach_all();

        let mut summary = self.summary();
        summary.aborted = true;
        summary.abandoned = abandoned;
        summary.never_admitted = self.table.count(RequestState::Queued);

        tracing::warn!(
            completed = self.table.completed(),
            abandoned,
            never_admitted = summary.never_admitted,
            "fetch run aborted"
        );
        summary
    }

    fn summary(&self) -> TrackerSummary {
        TrackerSummary {
            total: self.table.len(),
            succeeded: self.succeeded,
            failed: self.failed,
            callback_errors: self.dispatcher.callback_errors(),
            peak_in_flight: self.admission.peak_in_use(),
            admission_waits: self.admission.waits() + self.saturated,
            progress_reports: self.progress_reports,
            aborted: false,
            abandoned: 0,
            never_admitted: 0,
        }
    }
}

/// Runs one fetch on its own task so a panicking transport still yields a result
async fn run_isolated(fetcher: Arc<dyn Fetcher>, request: Request, permit: Permit) -> Completion {
    let fallback = request.clone();
    let fetch = tokio::spawn(async move { fetch_request(fetcher.as_ref(), request).await });

    let result = match fetch.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(
                index = fallback.index,
                url = %fallback.url,
                error = %e,
                "fetch task panicked"
            );
            FetchResult {
                request: fallback,
                outcome: FetchOutcome::Failure(FetchError::Panicked),
            }
        }
    };

    Completion { result, permit }
}
