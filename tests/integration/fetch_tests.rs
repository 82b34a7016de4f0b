//! Integration tests for the fetch engine
//!
//! These tests use wiremock to create mock HTTP servers and drive full
//! runs through the real reqwest transport.

use spider_pool::config::{parse_config, TransportConfig};
use spider_pool::crawler::{run_fetch, Coordinator, FetchCallback, HttpFetcher, Strategy};
use spider_pool::{FetchError, FetchOutcome, FetchResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Collects `(index, outcome)` pairs in dispatch order
#[derive(Default)]
struct Collector {
    seen: Mutex<Vec<(usize, String, FetchOutcome)>>,
}

impl Collector {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn indices(&self) -> Vec<usize> {
        self.seen.lock().unwrap().iter().map(|(i, _, _)| *i).collect()
    }

    fn sorted_indices(&self) -> Vec<usize> {
        let mut indices = self.indices();
        indices.sort_unstable();
        indices
    }

    fn outcome(&self, index: usize) -> Option<FetchOutcome> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .find(|(i, _, _)| *i == index)
            .map(|(_, _, outcome)| outcome.clone())
    }
}

impl FetchCallback for Collector {
    fn on_complete(&self, url: &str, index: usize, result: &FetchResult) {
        self.seen
            .lock()
            .unwrap()
            .push((index, url.to_string(), result.outcome.clone()));
    }
}

/// Transport limits loose enough that a single mock host is never throttled
fn open_transport() -> TransportConfig {
    TransportConfig {
        max_connections: 64,
        max_connections_per_host: 64,
        ..TransportConfig::default()
    }
}

fn coordinator(
    transport: &TransportConfig,
    collector: Arc<Collector>,
    strategy: Strategy,
    concurrency: usize,
) -> Coordinator {
    Coordinator::builder()
        .fetcher(Arc::new(HttpFetcher::new(transport).expect("transport")))
        .callback(collector)
        .strategy(strategy)
        .concurrency(concurrency)
        .poll_interval(Duration::from_millis(20))
        .build()
        .expect("coordinator")
}

async fn delayed_server(delay: Duration) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ok")
                .set_delay(delay),
        )
        .mount(&mock_server)
        .await;
    mock_server
}

fn page_urls(base: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}/page?count={}", base, i)).collect()
}

#[tokio::test]
async fn test_twenty_five_urls_with_budget_ten() {
    let mock_server = delayed_server(Duration::from_millis(100)).await;
    let collector = Collector::new();

    let report = coordinator(&open_transport(), collector.clone(), Strategy::Eager, 10)
        .run(page_urls(&mock_server.uri(), 25))
        .await
        .expect("run");

    assert_eq!(collector.sorted_indices(), (0..25).collect::<Vec<_>>());
    assert_eq!(report.succeeded, 25);
    assert_eq!(report.failed, 0);
    assert!(report.peak_in_flight <= 10);

    // Three rounds of 100ms, not 25
    assert!(report.elapsed >= Duration::from_millis(300), "{:?}", report.elapsed);
    assert!(report.elapsed < Duration::from_millis(1500), "{:?}", report.elapsed);
}

#[tokio::test]
async fn test_budget_matching_input_fetches_in_parallel() {
    let mock_server = delayed_server(Duration::from_millis(200)).await;
    let collector = Collector::new();

    let report = coordinator(&open_transport(), collector.clone(), Strategy::Eager, 4)
        .run(page_urls(&mock_server.uri(), 4))
        .await
        .expect("run");

    assert_eq!(collector.sorted_indices(), vec![0, 1, 2, 3]);
    assert_eq!(report.admission_waits, 0);
    assert!(report.elapsed < Duration::from_millis(600), "{:?}", report.elapsed);
}

#[tokio::test]
async fn test_unreachable_host_does_not_affect_others() {
    let mock_server = delayed_server(Duration::from_millis(10)).await;
    let collector = Collector::new();

    let mut urls = page_urls(&mock_server.uri(), 4);
    urls.insert(2, "http://127.0.0.1:1/".to_string());

    let report = coordinator(&open_transport(), collector.clone(), Strategy::Eager, 2)
        .run(urls)
        .await
        .expect("run");

    assert_eq!(report.total, 5);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 1);
    assert!(report.is_complete());

    let failed = collector.outcome(2).expect("index 2 dispatched");
    assert!(
        matches!(
            failed,
            FetchOutcome::Failure(FetchError::Connect(_)) | FetchOutcome::Failure(FetchError::Request(_))
        ),
        "{:?}",
        failed
    );
    assert!(failed.body().is_none());

    for index in [0, 1, 3, 4] {
        let outcome = collector.outcome(index).expect("dispatched");
        assert_eq!(outcome.body(), Some(b"ok".as_slice()));
    }
}

#[tokio::test]
async fn test_budget_of_one_completes_in_submission_order() {
    let mock_server = delayed_server(Duration::from_millis(5)).await;
    let collector = Collector::new();

    coordinator(&open_transport(), collector.clone(), Strategy::Eager, 1)
        .run(page_urls(&mock_server.uri(), 5))
        .await
        .expect("run");

    assert_eq!(collector.indices(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_wave_strategy_end_to_end() {
    let mock_server = delayed_server(Duration::from_millis(50)).await;
    let collector = Collector::new();

    let report = coordinator(&open_transport(), collector.clone(), Strategy::Wave, 4)
        .run(page_urls(&mock_server.uri(), 12))
        .await
        .expect("run");

    assert_eq!(collector.sorted_indices(), (0..12).collect::<Vec<_>>());
    assert_eq!(report.strategy, Strategy::Wave);
    assert!(report.peak_in_flight <= 4);
    assert!(report.progress_reports >= 3);
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&mock_server)
        .await;

    let collector = Collector::new();
    let report = coordinator(&open_transport(), collector.clone(), Strategy::Eager, 2)
        .run(vec![format!("{}/missing", mock_server.uri())])
        .await
        .expect("run");

    assert_eq!(report.succeeded, 1);
    let outcome = collector.outcome(0).expect("dispatched");
    assert_eq!(outcome.status(), Some(404));
    assert_eq!(outcome.body(), Some(b"not here".as_slice()));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = delayed_server(Duration::from_secs(3)).await;
    let transport = TransportConfig {
        request_timeout_secs: 1,
        ..open_transport()
    };
    let collector = Collector::new();

    let report = coordinator(&transport, collector.clone(), Strategy::Eager, 1)
        .run(page_urls(&mock_server.uri(), 1))
        .await
        .expect("run");

    assert_eq!(report.failed, 1);
    assert_eq!(
        collector.outcome(0),
        Some(FetchOutcome::Failure(FetchError::Timeout))
    );
}

#[tokio::test]
async fn test_run_fetch_from_config() {
    let mock_server = delayed_server(Duration::from_millis(10)).await;
    let toml = format!(
        r#"
[engine]
concurrency = 3
strategy = "wave"
poll-interval-ms = 20

[transport]
max-connections = 16
max-connections-per-host = 16

[input]
urls = ["{base}/a", "{base}/b"]
repeat = 3
"#,
        base = mock_server.uri()
    );
    let config = parse_config(&toml).expect("config");
    let collector = Collector::new();

    let report = run_fetch(&config, collector.clone()).await.expect("run");

    assert_eq!(report.total, 6);
    assert_eq!(report.succeeded, 6);
    assert_eq!(report.concurrency, 3);
    assert_eq!(collector.sorted_indices(), (0..6).collect::<Vec<_>>());
    assert!(report.peak_in_flight <= 3);
}
