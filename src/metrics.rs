//! Download metrics
//!
//! Counters and histograms for API calls, slice outcomes and cooldowns,
//! recorded through the `metrics` facade. Without an installed recorder
//! every call is a no-op; [`init_metrics`] installs a Prometheus exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Install the Prometheus exporter on `addr`.
///
/// Idempotent: a second call is a no-op.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!(addr = %addr, "Initializing metrics exporter");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "comtrade_api_calls_total",
        Unit::Count,
        "API calls issued, by outcome"
    );
    describe_histogram!(
        "comtrade_api_call_duration_seconds",
        Unit::Seconds,
        "API call duration in seconds"
    );
    describe_counter!(
        "comtrade_slices_total",
        Unit::Count,
        "Slices finished, by outcome"
    );
    describe_counter!(
        "comtrade_cooldowns_total",
        Unit::Count,
        "Throttling cooldowns entered"
    );
    describe_counter!(
        "comtrade_rows_written_total",
        Unit::Count,
        "Rows written to artifacts"
    );
    describe_counter!(
        "comtrade_downloads_total",
        Unit::Count,
        "Downloads finished, by status"
    );

    *initialized = true;
    Ok(())
}

/// Whether [`init_metrics`] has installed the exporter
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// One API call and how it ended (`success`, `empty`, `error`)
pub fn record_api_call(outcome: &'static str, duration: Duration) {
    counter!("comtrade_api_calls_total", "outcome" => outcome).increment(1);
    histogram!("comtrade_api_call_duration_seconds").record(duration.as_secs_f64());
}

/// A finished slice (`succeeded`, `empty`, `failed`, `skipped`)
pub fn record_slice(outcome: &'static str) {
    counter!("comtrade_slices_total", "outcome" => outcome).increment(1);
}

/// A throttling cooldown, labelled with the triggering error kind
pub fn record_cooldown(kind: &'static str) {
    counter!("comtrade_cooldowns_total", "kind" => kind).increment(1);
}

/// A finished download
pub fn record_download(status: &'static str, rows_written: usize) {
    counter!("comtrade_downloads_total", "status" => status).increment(1);
    counter!("comtrade_rows_written_total").increment(rows_written as u64);
}
