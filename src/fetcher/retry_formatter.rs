//! Failure classification and retry message formatting.
//!
//! Transport failures are classified into a [`FailureClass`] which maps onto
//! an [`ApiErrorKind`]; [`RetryContext`] renders the log lines the
//! orchestrator emits while backing off.

use super::ApiErrorKind;
use chrono::{DateTime, Local};
use reqwest::{Error as ReqwestError, StatusCode};
use std::time::Duration;

/// Classification of a failed call for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network timeout or a stalled body read
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    NetworkOffline,
    /// HTTP 409/429: usage limit hit
    Throttled(u16),
    /// HTTP 5xx server error
    ServerError(u16),
    /// Other HTTP 4xx
    ClientError(u16),
    /// Body did not parse
    MalformedBody,
    /// Generic fallback when no better classification fits
    NetworkGeneric,
}

impl FailureClass {
    /// User-friendly description string used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::Throttled(409) => "usage limit reached (409)",
            Self::Throttled(_) => "rate limit exceeded",
            Self::ServerError(code) => match code {
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::ClientError(code) => match code {
                400 => "invalid request",
                404 => "resource not found",
                _ => "client error",
            },
            Self::MalformedBody => "malformed response body",
            Self::NetworkGeneric => "network error",
        }
    }

    /// Suggested remediation shown when a slice is given up on.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "The query may be too large; narrow periods or products",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::Throttled(_) | Self::MalformedBody => {
                "The hourly quota is probably exhausted; wait an hour before retrying"
            }
            Self::ServerError(_) => "Comtrade may be experiencing issues, try again later",
            Self::ClientError(_) => "Check reporter, partner, period and commodity codes",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }

    /// Map onto the per-call error kind
    pub fn api_error_kind(&self) -> ApiErrorKind {
        match self {
            Self::Throttled(_) => ApiErrorKind::Throttled,
            Self::MalformedBody => ApiErrorKind::MalformedResponse,
            Self::ClientError(_) => ApiErrorKind::Rejected,
            Self::NetworkTimeout
            | Self::NetworkOffline
            | Self::ServerError(_)
            | Self::NetworkGeneric => ApiErrorKind::Transient,
        }
    }
}

impl From<ApiErrorKind> for FailureClass {
    fn from(kind: ApiErrorKind) -> Self {
        match kind {
            ApiErrorKind::Transient => FailureClass::NetworkGeneric,
            ApiErrorKind::MalformedResponse => FailureClass::MalformedBody,
            ApiErrorKind::Throttled => FailureClass::Throttled(409),
            ApiErrorKind::Rejected => FailureClass::ClientError(400),
        }
    }
}

/// Extract a [`FailureClass`] from an HTTP status or reqwest error.
pub fn classify_failure(status: Option<StatusCode>, err: Option<&ReqwestError>) -> FailureClass {
    if let Some(status) = status {
        let code = status.as_u16();
        if code == 409 || code == 429 {
            return FailureClass::Throttled(code);
        }
        if status.is_server_error() {
            return FailureClass::ServerError(code);
        }
        if status.is_client_error() {
            return FailureClass::ClientError(code);
        }
    }

    if let Some(err) = err {
        if err.is_timeout() {
            return FailureClass::NetworkTimeout;
        }
        if err.is_connect() {
            return FailureClass::NetworkOffline;
        }
    }

    FailureClass::NetworkGeneric
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts for one slice
    pub max_attempts: u32,
    /// What went wrong
    pub failure: FailureClass,
    /// Delay before the next call
    pub backoff_duration: Duration,
    /// Slice description
    pub slice: String,
    /// Original error detail
    pub detail: String,
}

impl RetryContext {
    /// Create a context
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        failure: FailureClass,
        backoff_duration: Duration,
        slice: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            failure,
            backoff_duration,
            slice: slice.into(),
            detail: detail.into(),
        }
    }

    /// Format standardized retry message with attempt counters.
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying {} (attempt {}/{}) after {} - waiting {:.1} seconds...",
            self.slice,
            self.attempt + 1,
            self.max_attempts,
            self.failure.description(),
            self.backoff_duration.as_secs_f64()
        )
    }

    /// Format the cooldown notice, including the local wake-up time.
    pub fn format_cooldown(&self, now: DateTime<Local>) -> String {
        let wake = chrono::Duration::from_std(self.backoff_duration)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(now);
        format!(
            "Suspected throttling ({}) on {} - sleeping for {}, resuming at {}",
            self.failure.description(),
            self.slice,
            format_duration(self.backoff_duration),
            wake.format("%d/%m/%Y %H:%M")
        )
    }

    /// Format final failure summary with an actionable suggestion.
    pub fn format_failure(&self) -> String {
        [
            format!(
                "[FAILED] {} gave up after {} attempt(s)",
                self.slice, self.attempt
            ),
            format!("  Last error: {}", self.detail),
            format!("  Suggestion: {}", self.failure.suggestion()),
        ]
        .join("\n")
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
