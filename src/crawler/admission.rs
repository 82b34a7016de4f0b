//! Admission controller enforcing the concurrency budget
//!
//! The budget is a tokio semaphore with one permit per allowed in-flight
//! fetch. A [`Permit`] is released when it is dropped, so every admission
//! is released exactly once.

use crate::{ConfigError, SpiderError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// An admission slot; dropping it frees the slot
#[derive(Debug)]
pub struct Permit {
    _inner: OwnedSemaphorePermit,
}

/// Gates how many fetches may be outstanding at once
///
/// The controller is independent of the transport's connection limits: a
/// request can hold an admission slot while it waits for a pooled
/// connection.
#[derive(Debug)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    budget: usize,
    peak_in_use: AtomicUsize,
    waits: AtomicUsize,
}

impl AdmissionController {
    /// Creates a controller with `budget` slots
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `budget` is zero or larger
    /// than the semaphore can represent.
    pub fn new(budget: usize) -> Result<Self, ConfigError> {
        if budget == 0 {
            return Err(ConfigError::Validation(
                "concurrency budget must be at least 1".to_string(),
            ));
        }
        if budget > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Validation(format!(
                "concurrency budget must be at most {}, got {}",
                Semaphore::MAX_PERMITS,
                budget
            )));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(budget)),
            budget,
            peak_in_use: AtomicUsize::new(0),
            waits: AtomicUsize::new(0),
        })
    }

    /// Returns the configured budget
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Number of slots currently held
    pub fn in_use(&self) -> usize {
        self.budget - self.semaphore.available_permits()
    }

    /// Highest number of slots held at the same time
    pub fn peak_in_use(&self) -> usize {
        self.peak_in_use.load(Ordering::SeqCst)
    }

    /// Number of admissions that had to suspend because the budget was exhausted
    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    /// Grants a slot if one is free, without suspending
    pub fn try_admit(&self) -> Option<Permit> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(inner) => Some(self.granted(inner)),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    /// Grants a slot, suspending until one is released if the budget is exhausted
    ///
    /// # Errors
    ///
    /// Returns [`SpiderError::AdmissionClosed`] if the controller was closed
    /// while waiting.
    pub async fn admit(&self) -> Result<Permit, SpiderError> {
        if let Some(permit) = self.try_admit() {
            return Ok(permit);
        }

        self.waits.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(budget = self.budget, "admission waiting for a free slot");

        let inner = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SpiderError::AdmissionClosed)?;
        Ok(self.granted(inner))
    }

    /// Stops granting slots; pending and future `admit` calls fail
    pub fn close(&self) {
        self.semaphore.close();
    }

    fn granted(&self, inner: OwnedSemaphorePermit) -> Permit {
        self.peak_in_use.fetch_max(self.in_use(), Ordering::SeqCst);
        Permit { _inner: inner }
    }
}
