//! Download configuration constants

use std::time::Duration;

/// Delay between consecutive API calls, in milliseconds.
/// The API allows one request per second per caller.
pub const PACING_DELAY_MS: u64 = 1000;

/// Cooldown after a response that looks throttled, in seconds.
/// The hourly quota window resets within an hour.
pub const THROTTLE_COOLDOWN_SECS: u64 = 60 * 60;

/// Timeout budget for a single API call, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Maximum retries of one slice after an error.
/// Each retry consumes hourly quota, so this stays small.
pub const MAX_RETRIES: u32 = 2;

/// Calls allowed per hour for a guest caller.
pub const HOURLY_CALL_QUOTA: u32 = 100;

/// Base pacing delay
pub fn pacing_delay() -> Duration {
    Duration::from_millis(PACING_DELAY_MS)
}

/// Cooldown applied on suspected throttling
pub fn throttle_cooldown() -> Duration {
    Duration::from_secs(THROTTLE_COOLDOWN_SECS)
}

/// Per-call timeout
pub fn request_timeout() -> Duration {
    Duration::from_secs(REQUEST_TIMEOUT_SECS)
}
