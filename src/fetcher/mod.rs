//! Comtrade API access
//!
//! One HTTP call per [`RequestSlice`], with the response envelope interpreted
//! into an [`ApiResponse`]. Per-call failures are values, not errors: the
//! orchestrator decides what to do with them.

use crate::slicer::RequestSlice;
use crate::{OutputMode, Record};
use async_trait::async_trait;
use retry_formatter::FailureClass;

pub mod comtrade_http;
pub mod comtrade_parser;
pub mod retry_formatter;

pub use comtrade_http::ComtradeHttpClient;

/// Fetcher errors, raised by client construction and catalogue downloads
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response parse error
    #[error("parse error: {0}")]
    ParseError(String),

    /// Network error
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Failure category of a single API call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Timeout, connection failure or server error; retry after a short delay
    Transient,
    /// Body could not be parsed; the API answers this way when throttling
    MalformedResponse,
    /// Explicit rate/quota rejection (HTTP 409 or 429)
    Throttled,
    /// Request refused for another reason; retrying will not help
    Rejected,
}

impl ApiErrorKind {
    /// Whether this failure should trigger the long cooldown
    pub fn is_throttling(&self) -> bool {
        matches!(self, ApiErrorKind::MalformedResponse | ApiErrorKind::Throttled)
    }

    /// Whether the same call may succeed if repeated
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ApiErrorKind::Rejected)
    }

    /// Stable lowercase name, used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorKind::Transient => "transient",
            ApiErrorKind::MalformedResponse => "malformed_response",
            ApiErrorKind::Throttled => "throttled",
            ApiErrorKind::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpreted outcome of one API call
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// Records returned, in API order
    Success {
        /// Dataset rows
        records: Vec<Record>,
        /// Validation message from the API, if any
        message: Option<String>,
    },
    /// The API answered but the dataset is empty
    Empty {
        /// Validation message from the API, if any
        message: Option<String>,
    },
    /// The call failed
    Error {
        /// Failure category
        kind: ApiErrorKind,
        /// What exactly went wrong, for log messages
        failure: FailureClass,
        /// Human-readable detail
        detail: String,
    },
}

impl ApiResponse {
    /// Shorthand for an error response with the default failure class for `kind`
    pub fn error(kind: ApiErrorKind, detail: impl Into<String>) -> Self {
        ApiResponse::Error {
            kind,
            failure: FailureClass::from(kind),
            detail: detail.into(),
        }
    }

    /// Error response for a classified transport failure
    pub fn failure(failure: FailureClass, detail: impl Into<String>) -> Self {
        ApiResponse::Error {
            kind: failure.api_error_kind(),
            failure,
            detail: detail.into(),
        }
    }

    /// Outcome label for logs and metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            ApiResponse::Success { .. } => "success",
            ApiResponse::Empty { .. } => "empty",
            ApiResponse::Error { .. } => "error",
        }
    }
}

/// Executes one API call per slice
#[async_trait]
pub trait TradeFetcher: Send + Sync {
    /// Perform the call for `slice` and interpret the response
    async fn execute(&self, slice: &RequestSlice, mode: OutputMode) -> ApiResponse;

    /// Endpoint this fetcher talks to
    fn base_url(&self) -> &str;
}
