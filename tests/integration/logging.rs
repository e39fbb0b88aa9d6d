//! Integration tests for logging and tracing

use super::support::{empty_envelope, executor, mount_json, quiet};
use comtrade_downloader::TradeQuery;
use tempfile::TempDir;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wiremock::MockServer;

#[test]
fn test_tracing_subscriber_initialization() {
    // Either succeeds or fails because already initialized (both are OK)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("comtrade_downloader=debug")),
        )
        .with_test_writer()
        .try_init();

    info!("This is an info message");
    warn!("This is a warning message");
    error!("This is an error message");
}

#[test]
fn test_env_filter_parsing() {
    for directive in [
        "info",
        "comtrade_downloader=debug",
        "warn,comtrade_downloader=trace",
        "comtrade_downloader::fetcher=debug,comtrade_downloader=info",
    ] {
        assert!(EnvFilter::try_new(directive).is_ok(), "rejected {directive}");
    }
}

#[test]
fn test_structured_fields_and_spans() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("comtrade_downloader=debug"))
        .with_test_writer()
        .try_init();

    let span = tracing::info_span!("download", artifact = "usa.csv", slices = 3);
    let _enter = span.enter();
    info!(slice = 0, records = 120, "Slice returned records");
}

/// Downloads log from inside the executor's span with any subscriber installed.
#[tokio::test]
async fn test_download_logs_with_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("comtrade_downloader=trace"))
        .with_test_writer()
        .try_init();

    let server = MockServer::start().await;
    mount_json(&server, empty_envelope()).await;
    let dir = TempDir::new().unwrap();

    let report = executor(&server)
        .download(&TradeQuery::new("842", "0", "1962"), dir.path().join("quiet"), &quiet())
        .await
        .unwrap();

    assert_eq!(report.empty, 1);
}
