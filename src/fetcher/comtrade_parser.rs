//! Comtrade response parsing
//!
//! Machine-readable calls return a JSON envelope:
//!
//! ```json
//! {
//!   "validation": { "status": {...}, "message": null, "count": { "value": 2 } },
//!   "dataset": [ { "rtCode": 842, "ptCode": 0, "TradeValue": 1.5e12 }, ... ]
//! }
//! ```
//!
//! Human-readable calls return a flat CSV table.

use super::{ApiErrorKind, ApiResponse};
use crate::Record;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Row cap requested on every call (`max` parameter)
pub const MAX_ROWS: u64 = 100_000;

#[derive(Debug, Deserialize)]
struct Envelope {
    validation: Validation,
    #[serde(default)]
    dataset: Option<Vec<Record>>,
}

#[derive(Debug, Deserialize)]
struct Validation {
    count: Count,
    // Required, but the API sends null when it has nothing to say
    message: Value,
}

#[derive(Debug, Deserialize)]
struct Count {
    value: u64,
}

fn message_text(message: Value) -> Option<String> {
    match message {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Interpret a JSON envelope.
///
/// An empty or missing `dataset` is [`ApiResponse::Empty`]; a body that is not
/// a valid envelope is a [`ApiErrorKind::MalformedResponse`] error.
pub fn parse_json_envelope(body: &str) -> ApiResponse {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return ApiResponse::error(
                ApiErrorKind::MalformedResponse,
                format!("failed to parse JSON envelope: {e}"),
            )
        }
    };

    let count = envelope.validation.count.value;
    let message = message_text(envelope.validation.message);

    if count > MAX_ROWS {
        warn!(
            count = count,
            max_rows = MAX_ROWS,
            "Result exceeds the row cap; the API truncates the dataset"
        );
    }

    match envelope.dataset {
        Some(records) if !records.is_empty() => ApiResponse::Success { records, message },
        _ => ApiResponse::Empty { message },
    }
}

/// Interpret a CSV table; the header row names the fields.
pub fn parse_csv_table(body: &str) -> ApiResponse {
    let malformed = |detail: String| ApiResponse::error(ApiErrorKind::MalformedResponse, detail);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => return malformed(format!("failed to read CSV header: {e}")),
    };

    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return malformed("CSV body has no header row".to_string());
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => return malformed(format!("failed to read CSV row {}: {e}", line + 1)),
        };

        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect();
        records.push(record);
    }

    if records.is_empty() {
        ApiResponse::Empty { message: None }
    } else {
        ApiResponse::Success {
            records,
            message: None,
        }
    }
}
