//! In-process fakes shared by the crawler unit tests

use crate::crawler::{FetchCallback, FetchOutcome, FetchResult, Fetcher, Request};
use crate::FetchError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sleeps for a fixed delay and echoes the URL back as the body
///
/// URLs containing `unreachable` fail immediately with a connect error;
/// URLs containing `panic` make the fetch panic.
pub(crate) struct FakeFetcher {
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub(crate) fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    /// Highest number of fetches observed running at once
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: &Request) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.url.contains("panic") {
            panic!("fake fetcher asked to panic");
        }
        if request.url.contains("unreachable") {
            return FetchOutcome::Failure(FetchError::Connect("connection refused".to_string()));
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        FetchOutcome::Success {
            status: 200,
            body: request.url.as_bytes().to_vec(),
        }
    }
}

/// Records every dispatched result in arrival order
#[derive(Default)]
pub(crate) struct RecordingCallback {
    seen: Mutex<Vec<FetchResult>>,
}

impl RecordingCallback {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn results(&self) -> Vec<FetchResult> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn indices(&self) -> Vec<usize> {
        self.results().iter().map(FetchResult::index).collect()
    }
}

impl FetchCallback for RecordingCallback {
    fn on_complete(&self, url: &str, index: usize, result: &FetchResult) {
        assert_eq!(url, result.url());
        assert_eq!(index, result.index());
        self.seen.lock().unwrap().push(result.clone());
    }
}

pub(crate) fn urls(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("http://localhost:8080/?count={}", i))
        .collect()
}
