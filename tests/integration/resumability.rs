//! Reruns against existing artifacts and markers

use super::support::{empty_envelope, envelope, executor, mount_json, quiet, request_count, rows, API_PATH};
use comtrade_downloader::TradeQuery;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_rerun_after_success_makes_no_calls() {
    let server = MockServer::start().await;
    mount_json(&server, envelope(rows(842, 2))).await;
    let dir = TempDir::new().unwrap();
    let query = TradeQuery::new("842", "0", "2016-2017");
    let target = dir.path().join("usa");

    let first = executor(&server).download(&query, &target, &quiet()).await.unwrap();
    assert_eq!(first.calls, 1);
    let content = std::fs::read_to_string(&first.artifact).unwrap();

    let second = executor(&server).download(&query, &target, &quiet()).await.unwrap();
    assert!(second.skipped_existing);
    assert_eq!(second.calls, 0);
    assert_eq!(second.status(), "skipped_existing");
    assert_eq!(request_count(&server).await, 1);

    // Untouched
    assert_eq!(std::fs::read_to_string(&second.artifact).unwrap(), content);
}

#[tokio::test]
async fn test_existing_artifact_skips_even_without_prior_run() {
    let server = MockServer::start().await;
    mount_json(&server, envelope(rows(842, 2))).await;
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("manual.csv"), "x\n1\n").unwrap();

    let report = executor(&server)
        .download(&TradeQuery::new("842", "0", "2017"), dir.path().join("manual"), &quiet())
        .await
        .unwrap();

    assert!(report.skipped_existing);
    assert_eq!(request_count(&server).await, 0);
    assert_eq!(std::fs::read_to_string(dir.path().join("manual.csv")).unwrap(), "x\n1\n");
}

#[tokio::test]
async fn test_all_empty_rerun_makes_no_calls() {
    let server = MockServer::start().await;
    mount_json(&server, empty_envelope()).await;
    let dir = TempDir::new().unwrap();
    let query = TradeQuery::new(["1", "2", "3", "4", "5", "6"], "0", "2017");
    let target = dir.path().join("empty");

    let first = executor(&server).download(&query, &target, &quiet()).await.unwrap();
    assert_eq!(first.empty, 2);
    assert_eq!(request_count(&server).await, 2);

    let second = executor(&server).download(&query, &target, &quiet()).await.unwrap();
    assert_eq!(second.calls, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_single_empty_call_marks_artifact_path() {
    let server = MockServer::start().await;
    mount_json(&server, empty_envelope()).await;
    let dir = TempDir::new().unwrap();
    let query = TradeQuery::new("842", "0", "1962");
    let target = dir.path().join("nothing");

    let first = executor(&server).download(&query, &target, &quiet()).await.unwrap();
    assert_eq!(first.empty, 1);
    assert!(first.artifact.exists());
    assert_eq!(std::fs::metadata(&first.artifact).unwrap().len(), 0);

    let second = executor(&server).download(&query, &target, &quiet()).await.unwrap();
    assert!(second.skipped_existing);
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_existing_marker_skips_only_that_slice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("r", "6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(rows(6, 4))))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("batch.slice-0.csv"), "").unwrap();

    let query = TradeQuery::new(["1", "2", "3", "4", "5", "6"], "0", "2017");
    let report = executor(&server)
        .download(&query, dir.path().join("batch"), &quiet())
        .await
        .unwrap();

    assert_eq!(report.calls, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.rows_written, 4);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.query().unwrap().contains("r=6"));
}

/// A slice that failed is fetched on the next run; finished slices are not.
#[tokio::test]
async fn test_failed_slice_is_retried_on_rerun() {
    let query = TradeQuery::new(["1", "2", "3", "4", "5", "6"], "0", "2017");
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("batch");

    let flaky = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("r", "1,2,3,4,5"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&flaky)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("r", "6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(rows(6, 3))))
        .mount(&flaky)
        .await;

    let first = executor(&flaky)
        .with_max_retries(0)
        .download(&query, &target, &quiet())
        .await
        .unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(first.succeeded, 1);
    assert!(!first.artifact.exists());
    assert!(dir.path().join("batch.slice-1.csv").exists());

    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("r", "1,2,3,4,5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(rows(1, 2))))
        .mount(&healthy)
        .await;

    let second = executor(&healthy).download(&query, &target, &quiet()).await.unwrap();

    assert!(!second.skipped_existing);
    assert_eq!(second.calls, 1);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.status(), "completed");
    assert_eq!(second.rows_written, 5);
    assert_eq!(request_count(&healthy).await, 1);
    let reporters: Vec<String> = std::fs::read_to_string(&second.artifact)
        .unwrap()
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').next().map(str::to_string))
        .collect();
    assert_eq!(reporters, vec!["1", "1", "6", "6", "6"]);
    assert!(!dir.path().join("batch.slice-1.csv").exists());
}
