//! Callback dispatch for completed fetches
//!
//! The dispatcher hands each [`FetchResult`] to the user callback exactly
//! once. A panic inside the callback is caught and counted; it neither
//! aborts the run nor changes the outcome of the request.

use crate::crawler::FetchResult;
use crate::SpiderError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Receives every completed fetch
///
/// Any `Fn(&str, usize, &FetchResult)` closure is a callback. Callbacks
/// that touch shared state are responsible for their own synchronization.
pub trait FetchCallback: Send + Sync {
    fn on_complete(&self, url: &str, index: usize, result: &FetchResult);
}

impl<F> FetchCallback for F
where
    F: Fn(&str, usize, &FetchResult) + Send + Sync,
{
    fn on_complete(&self, url: &str, index: usize, result: &FetchResult) {
        self(url, index, result)
    }
}

/// Callback that logs each completion and does nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCallback;

impl FetchCallback for LoggingCallback {
    fn on_complete(&self, url: &str, index: usize, result: &FetchResult) {
        match (result.outcome.status(), result.body()) {
            (Some(status), Some(body)) => {
                tracing::info!(index, url, status, bytes = body.len(), "callback: response received")
            }
            _ => {
                let error = result
                    .outcome
                    .error()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                tracing::info!(index, url, %error, "callback: request failed")
            }
        }
    }
}

/// What happened to a single dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The callback returned normally
    Delivered,

    /// The callback panicked; the panic was logged and contained
    CallbackFailed,
}

/// Invokes the callback once per request index
pub struct Dispatcher {
    callback: Arc<dyn FetchCallback>,
    dispatched: Vec<bool>,
    delivered: usize,
    callback_errors: usize,
}

impl Dispatcher {
    /// Creates a dispatcher for `total` requests
    pub fn new(callback: Arc<dyn FetchCallback>, total: usize) -> Self {
        Self {
            callback,
            dispatched: vec![false; total],
            delivered: 0,
            callback_errors: 0,
        }
    }

    /// Delivers a result to the callback
    ///
    /// # Errors
    ///
    /// Returns [`SpiderError::DuplicateDispatch`] if this index was already
    /// dispatched (the callback is not invoked again) and
    /// [`SpiderError::UnknownRequest`] for an index outside the run.
    pub fn dispatch(&mut self, result: &FetchResult) -> Result<DispatchStatus, SpiderError> {
        let index = result.index();
        let seen = self
            .dispatched
            .get_mut(index)
            .ok_or(SpiderError::UnknownRequest { index })?;
        if *seen {
            return Err(SpiderError::DuplicateDispatch { index });
        }
        *seen = true;

        let callback = &self.callback;
        match catch_unwind(AssertUnwindSafe(|| {
            callback.on_complete(result.url(), index, result)
        })) {
            Ok(()) => {
                self.delivered += 1;
                Ok(DispatchStatus::Delivered)
            }
            Err(panic) => {
                self.callback_errors += 1;
                tracing::error!(
                    index,
                    url = %result.url(),
                    message = %panic_message(panic.as_ref()),
                    "callback panicked; continuing run"
                );
                Ok(DispatchStatus::CallbackFailed)
            }
        }
    }

    /// Number of dispatches, including ones whose callback panicked
    pub fn dispatched(&self) -> usize {
        self.delivered + self.callback_errors
    }

    /// Number of callback invocations that panicked
    pub fn callback_errors(&self) -> usize {
        self.callback_errors
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{FetchOutcome, Request};
    use crate::FetchError;
    use std::sync::Mutex;

    fn success(index: usize) -> FetchResult {
        FetchResult {
            request: Request::new(index, format!("http://localhost/?count={}", index)),
            outcome: FetchOutcome::Success {
                status: 200,
                body: b"hello".to_vec(),
            },
        }
    }

    #[test]
    fn test_closure_receives_url_index_and_result() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut dispatcher = Dispatcher::new(
            Arc::new(move |url: &str, index: usize, result: &FetchResult| {
                sink.lock()
                    .unwrap()
                    .push((url.to_string(), index, result.is_success()));
            }),
            2,
        );

        assert_eq!(
            dispatcher.dispatch(&success(1)).unwrap(),
            DispatchStatus::Delivered
        );

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[("http://localhost/?count=1".to_string(), 1, true)]
        );
        assert_eq!(dispatcher.dispatched(), 1);
    }

    #[test]
    fn test_second_dispatch_is_refused() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let mut dispatcher = Dispatcher::new(
            Arc::new(move |_: &str, _: usize, _: &FetchResult| {
                *counter.lock().unwrap() += 1;
            }),
            1,
        );

        dispatcher.dispatch(&success(0)).unwrap();
        let second = dispatcher.dispatch(&success(0));

        assert!(matches!(
            second,
            Err(SpiderError::DuplicateDispatch { index: 0 })
        ));
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(dispatcher.dispatched(), 1);
    }

    #[test]
    fn test_out_of_range_index() {
        let mut dispatcher = Dispatcher::new(Arc::new(LoggingCallback), 1);
        assert!(matches!(
            dispatcher.dispatch(&success(3)),
            Err(SpiderError::UnknownRequest { index: 3 })
        ));
    }

    #[test]
    fn test_callback_panic_is_contained() {
        let mut dispatcher = Dispatcher::new(
            Arc::new(|_: &str, index: usize, _: &FetchResult| {
                if index == 0 {
                    panic!("callback exploded");
                }
            }),
            2,
        );

        assert_eq!(
            dispatcher.dispatch(&success(0)).unwrap(),
            DispatchStatus::CallbackFailed
        );
        assert_eq!(
            dispatcher.dispatch(&success(1)).unwrap(),
            DispatchStatus::Delivered
        );
        assert_eq!(dispatcher.callback_errors(), 1);
        assert_eq!(dispatcher.dispatched(), 2);
        // A panicked dispatch still counts as delivered once
        assert!(dispatcher.dispatch(&success(0)).is_err());
    }

    #[test]
    fn test_logging_callback_handles_failure() {
        let mut dispatcher = Dispatcher::new(Arc::new(LoggingCallback), 1);
        let failed = FetchResult {
            request: Request::new(0, "http://127.0.0.1:1/"),
            outcome: FetchOutcome::Failure(FetchError::Connect("refused".to_string())),
        };
        assert_eq!(
            dispatcher.dispatch(&failed).unwrap(),
            DispatchStatus::Delivered
        );
    }
}
