//! Comtrade HTTP client
//!
//! Performs exactly one GET per slice. The query string is deterministic:
//! parameters are emitted in name order, list values are comma-joined, and
//! classification (`px=HS`), type (`type=C`) and row cap (`max=100000`) are
//! always pinned.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn};

use super::comtrade_parser::{parse_csv_table, parse_json_envelope, MAX_ROWS};
use super::retry_formatter::{classify_failure, FailureClass};
use super::{ApiErrorKind, ApiResponse, FetcherError, FetcherResult, TradeFetcher};
use crate::downloader::config::request_timeout;
use crate::normalize::AreaCatalog;
use crate::slicer::RequestSlice;
use crate::OutputMode;

/// Public data endpoint
pub const COMTRADE_BASE_URL: &str = "https://comtrade.un.org/api/get";

/// Reporter area listing
pub const REPORTER_AREAS_URL: &str = "https://comtrade.un.org/data/cache/reporterAreas.json";

/// Partner area listing
pub const PARTNER_AREAS_URL: &str = "https://comtrade.un.org/data/cache/partnerAreas.json";

/// Harmonized System, as reported
const CLASSIFICATION: &str = "HS";

/// Commodities (as opposed to services)
const TRADE_TYPE: &str = "C";

/// Build the query parameters for a slice, in parameter-name order
pub fn build_query(slice: &RequestSlice, mode: OutputMode) -> Vec<(&'static str, String)> {
    let params: BTreeMap<&'static str, String> = BTreeMap::from([
        ("ps", slice.period.query_value()),
        ("freq", slice.frequency.code().to_string()),
        ("r", slice.reporter.query_value()),
        ("p", slice.partner.query_value()),
        ("cc", slice.product.query_value()),
        ("rg", slice.tradeflow.to_string()),
        ("px", CLASSIFICATION.to_string()),
        ("type", TRADE_TYPE.to_string()),
        ("fmt", mode.format().to_string()),
        ("max", MAX_ROWS.to_string()),
        ("head", mode.heading().to_string()),
    ]);
    params.into_iter().collect()
}

/// Full request URL for a slice.
///
/// Each list element is percent-encoded; the commas joining them are kept
/// literal, the way the API documents them.
pub fn request_url(base_url: &str, slice: &RequestSlice, mode: OutputMode) -> FetcherResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| FetcherError::HttpError(format!("invalid base URL '{base_url}': {e}")))?;
    let query = build_query(slice, mode)
        .into_iter()
        .map(|(key, value)| format!("{key}={}", encode_list(&value)))
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(Some(&query));
    Ok(url)
}

fn encode_list(value: &str) -> String {
    value
        .split(',')
        .map(|element| urlencoding::encode(element).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

/// HTTP implementation of [`TradeFetcher`]
#[derive(Debug, Clone)]
pub struct ComtradeHttpClient {
    client: Client,
    base_url: String,
}

impl ComtradeHttpClient {
    /// Create a client for `base_url` with the per-call timeout applied
    pub fn new(base_url: impl Into<String>) -> FetcherResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout())
            .user_agent(concat!("comtrade-downloader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetcherError::HttpError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client for the public endpoint
    pub fn public() -> FetcherResult<Self> {
        Self::new(COMTRADE_BASE_URL)
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Download and parse an area listing (`reporterAreas.json` format)
    pub async fn fetch_area_catalog(&self, url: &str) -> FetcherResult<AreaCatalog> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetcherError::HttpError(format!(
                "area listing {url} returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;
        AreaCatalog::from_json(&body).map_err(|e| FetcherError::ParseError(e.to_string()))
    }

    fn transport_error(
        status: Option<reqwest::StatusCode>,
        err: Option<&reqwest::Error>,
        detail: String,
    ) -> ApiResponse {
        let failure: FailureClass = classify_failure(status, err);
        ApiResponse::failure(failure, format!("{}: {detail}", failure.description()))
    }
}

#[async_trait]
impl TradeFetcher for ComtradeHttpClient {
    async fn execute(&self, slice: &RequestSlice, mode: OutputMode) -> ApiResponse {
        let url = match request_url(&self.base_url, slice, mode) {
            Ok(url) => url,
            Err(e) => return ApiResponse::error(ApiErrorKind::Rejected, e.to_string()),
        };

        debug!(url = %url, slice = slice.index, "Requesting slice");
        let started = Instant::now();

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(slice = slice.index, error = %e, "Request failed");
                return Self::transport_error(None, Some(&e), e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(slice = slice.index, status = %status, "API returned an error status");
            return Self::transport_error(Some(status), None, format!("HTTP {status}: {text}"));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Self::transport_error(None, Some(&e), e.to_string()),
        };

        debug!(
            slice = slice.index,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Response received"
        );

        match mode {
            OutputMode::MachineReadable => parse_json_envelope(&body),
            OutputMode::HumanReadable => parse_csv_table(&body),
        }
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
