//! Error classification, retries and cooldowns over real HTTP

use super::support::{envelope, executor, quiet, request_count, rows, API_PATH};
use comtrade_downloader::downloader::{BackoffConfig, DownloadExecutor};
use comtrade_downloader::fetcher::retry_formatter::FailureClass;
use comtrade_downloader::fetcher::{ApiErrorKind, ApiResponse, ComtradeHttpClient, TradeFetcher};
use comtrade_downloader::shutdown::ShutdownCoordinator;
use comtrade_downloader::slicer::{SliceOptions, SlicePlan};
use comtrade_downloader::{AreaCatalogs, OutputMode, TradeQuery};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_success(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(rows(842, 2))))
        .mount(server)
        .await;
}

async fn mount_once(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(response)
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_malformed_body_enters_cooldown_then_retries() {
    let server = MockServer::start().await;
    mount_once(
        &server,
        ResponseTemplate::new(200).set_body_string("<html>Service Unavailable</html>"),
    )
    .await;
    mount_success(&server).await;
    let dir = TempDir::new().unwrap();

    let report = executor(&server)
        .download(&TradeQuery::new("842", "0", "2017"), dir.path().join("out"), &quiet())
        .await
        .unwrap();

    assert_eq!(report.calls, 2);
    assert_eq!(report.retries, 1);
    assert_eq!(report.cooldowns, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.rows_written, 2);
}

#[tokio::test]
async fn test_conflict_status_is_throttling() {
    let server = MockServer::start().await;
    mount_once(&server, ResponseTemplate::new(409)).await;
    mount_success(&server).await;
    let dir = TempDir::new().unwrap();

    let report = executor(&server)
        .download(&TradeQuery::new("842", "0", "2017"), dir.path().join("out"), &quiet())
        .await
        .unwrap();

    assert_eq!(report.cooldowns, 1);
    assert_eq!(report.calls, 2);
    assert_eq!(report.status(), "completed");
}

#[tokio::test]
async fn test_server_error_retries_without_cooldown() {
    let server = MockServer::start().await;
    mount_once(&server, ResponseTemplate::new(503)).await;
    mount_success(&server).await;
    let dir = TempDir::new().unwrap();

    let report = executor(&server)
        .download(&TradeQuery::new("842", "0", "2017"), dir.path().join("out"), &quiet())
        .await
        .unwrap();

    assert_eq!(report.calls, 2);
    assert_eq!(report.retries, 1);
    assert_eq!(report.cooldowns, 0);
    assert_eq!(report.rows_written, 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let report = executor(&server)
        .download(&TradeQuery::new("842", "0", "2017"), dir.path().join("out"), &quiet())
        .await
        .unwrap();

    assert_eq!(report.calls, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.retries, 0);
    assert_eq!(report.status(), "partial");
    assert!(!report.artifact.exists());
}

#[tokio::test]
async fn test_retry_budget_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let report = executor(&server)
        .with_max_retries(3)
        .download(&TradeQuery::new("842", "0", "2017"), dir.path().join("out"), &quiet())
        .await
        .unwrap();

    assert_eq!(report.calls, 4);
    assert_eq!(report.retries, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(request_count(&server).await, 4);
}

#[tokio::test]
async fn test_failed_slice_does_not_stop_the_plan() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(wiremock::matchers::query_param("r", "1,2,3,4,5"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(wiremock::matchers::query_param("r", "6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(rows(6, 3))))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let query = TradeQuery::new(["1", "2", "3", "4", "5", "6"], "0", "2017");
    let report = executor(&server)
        .download(&query, dir.path().join("batch"), &quiet())
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.status(), "partial");
    // The artifact waits for every slice; the finished one is kept aside
    assert_eq!(report.rows_written, 0);
    assert!(!report.artifact.exists());
    assert!(dir.path().join("batch.slice-1.csv").exists());
    // A failed slice leaves no file behind
    assert!(!dir.path().join("batch.slice-0.csv").exists());
}

#[tokio::test]
async fn test_status_code_reaches_the_failure_class() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    let client = ComtradeHttpClient::new(format!("{}{}", server.uri(), API_PATH)).unwrap();
    let params = TradeQuery::new("842", "0", "2017")
        .normalize(&AreaCatalogs::default())
        .unwrap();
    let plan = SlicePlan::new(&params, SliceOptions::default()).unwrap();
    let slice = plan.iter().next().unwrap();

    match client.execute(&slice, OutputMode::MachineReadable).await {
        ApiResponse::Error { kind, failure, detail } => {
            assert_eq!(kind, ApiErrorKind::Throttled);
            assert_eq!(failure, FailureClass::Throttled(429));
            assert!(detail.starts_with("rate limit exceeded"), "{detail}");
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = ComtradeHttpClient::new(format!("http://127.0.0.1:{port}/api/get")).unwrap();
    let backoff = BackoffConfig::default()
        .with_pacing(Duration::from_millis(1))
        .with_cooldown(Duration::from_millis(20))
        .with_max_retries(1);
    let dir = TempDir::new().unwrap();

    let report = DownloadExecutor::with_fetcher(Arc::new(client))
        .with_backoff(backoff)
        .with_shutdown(ShutdownCoordinator::shared())
        .download(&TradeQuery::new("842", "0", "2017"), dir.path().join("out"), &quiet())
        .await
        .unwrap();

    assert_eq!(report.calls, 2);
    assert_eq!(report.cooldowns, 0);
    assert_eq!(report.failed, 1);
}
