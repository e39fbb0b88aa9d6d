use chrono::{Local, TimeZone};
use comtrade_downloader::fetcher::retry_formatter::{FailureClass, RetryContext};
use comtrade_downloader::fetcher::ApiErrorKind;
use reqwest::StatusCode;
use std::time::Duration;

use comtrade_downloader::fetcher::retry_formatter::classify_failure;

#[test]
fn test_status_classification() {
    let kind = |code: u16| classify_failure(StatusCode::from_u16(code).ok(), None).api_error_kind();

    assert_eq!(kind(409), ApiErrorKind::Throttled);
    assert_eq!(kind(429), ApiErrorKind::Throttled);
    assert_eq!(kind(500), ApiErrorKind::Transient);
    assert_eq!(kind(503), ApiErrorKind::Transient);
    assert_eq!(kind(400), ApiErrorKind::Rejected);
    assert_eq!(kind(404), ApiErrorKind::Rejected);
    assert_eq!(classify_failure(None, None), FailureClass::NetworkGeneric);
}

#[test]
fn test_throttling_kinds_trigger_cooldown() {
    assert!(ApiErrorKind::Throttled.is_throttling());
    assert!(ApiErrorKind::MalformedResponse.is_throttling());
    assert!(!ApiErrorKind::Transient.is_throttling());
    assert!(!ApiErrorKind::Rejected.is_retryable());
}

#[test]
fn test_retry_message_counts_attempts() {
    let ctx = RetryContext::new(
        1,
        3,
        FailureClass::ServerError(503),
        Duration::from_secs(1),
        "slice 4 (r=842 p=all ps=2017 cc=TOTAL)",
        "HTTP 503",
    );
    let msg = ctx.format_retry();
    assert!(msg.contains("attempt 2/3"), "got: {msg}");
    assert!(msg.contains("service unavailable"));
    assert!(msg.contains("slice 4"));
}

#[test]
fn test_cooldown_message_shows_wake_time() {
    let ctx = RetryContext::new(
        1,
        3,
        FailureClass::MalformedBody,
        Duration::from_secs(3600),
        "slice 0",
        "failed to parse JSON envelope",
    );
    let now = Local.with_ymd_and_hms(2017, 3, 9, 22, 15, 0).unwrap();
    let msg = ctx.format_cooldown(now);
    assert!(msg.contains("sleeping for 1h"), "got: {msg}");
    assert!(msg.contains("resuming at 09/03/2017 23:15"), "got: {msg}");
}

#[test]
fn test_failure_message_has_suggestion() {
    let ctx = RetryContext::new(
        1,
        3,
        FailureClass::ClientError(400),
        Duration::from_secs(1),
        "slice 2",
        "HTTP 400: bad request",
    );
    let msg = ctx.format_failure();
    assert!(msg.starts_with("[FAILED] slice 2 gave up after 1 attempt(s)"));
    assert!(msg.contains("Last error: HTTP 400: bad request"));
    assert!(msg.contains("Suggestion: Check reporter"));
}
