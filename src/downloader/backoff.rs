//! Pacing, retry and throttling cooldown
//!
//! The controller is a two-state machine. `Idle` paces calls one second apart;
//! a throttling signal moves it to `Cooldown` until the deadline passes. Every
//! sleep races the shutdown coordinator.

use crate::downloader::config::{pacing_delay, throttle_cooldown, MAX_RETRIES};
use crate::fetcher::ApiErrorKind;
use crate::metrics;
use crate::shutdown::{sleep_unless_cancelled, SharedShutdown};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Delays and retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay after every call, and after a transient error
    pub pacing: Duration,
    /// Delay after a throttling signal
    pub cooldown: Duration,
    /// Re-attempts allowed for one slice after an error
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            pacing: pacing_delay(),
            cooldown: throttle_cooldown(),
            max_retries: MAX_RETRIES,
        }
    }
}

impl BackoffConfig {
    /// Set the pacing delay
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set the throttling cooldown
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the per-slice retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffState {
    /// Calls proceed at the pacing rate
    Idle,
    /// Calls are suspended until the deadline
    Cooldown {
        /// End of the cooldown
        until: Instant,
    },
}

/// What to do after a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffDecision {
    /// How long to wait before the next call
    pub delay: Duration,
    /// Whether the same slice should be attempted again
    pub retry: bool,
    /// Whether the delay is a throttling cooldown
    pub cooldown: bool,
}

/// Pacing and cooldown state for one download
#[derive(Debug)]
pub struct BackoffController {
    config: BackoffConfig,
    state: BackoffState,
    shutdown: Option<SharedShutdown>,
}

impl BackoffController {
    /// Create an idle controller
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            state: BackoffState::Idle,
            shutdown: None,
        }
    }

    /// Make sleeps interruptible by `shutdown`
    pub fn with_shutdown(mut self, shutdown: Option<SharedShutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Current state
    pub fn state(&self) -> BackoffState {
        self.state
    }

    /// Configuration in use
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// A call returned a response (records or empty); returns the pacing delay
    pub fn on_success(&mut self) -> Duration {
        self.state = BackoffState::Idle;
        self.config.pacing
    }

    /// A call failed. `retries_used` counts earlier re-attempts of this slice.
    pub fn on_error(&mut self, kind: ApiErrorKind, retries_used: u32) -> BackoffDecision {
        let retry = kind.is_retryable() && retries_used < self.config.max_retries;

        if kind.is_throttling() {
            self.state = BackoffState::Cooldown {
                until: Instant::now() + self.config.cooldown,
            };
            metrics::record_cooldown(kind.as_str());
            return BackoffDecision {
                delay: self.config.cooldown,
                retry,
                cooldown: true,
            };
        }

        BackoffDecision {
            delay: self.config.pacing,
            retry,
            cooldown: false,
        }
    }

    /// Sleep for `delay`. Returns `false` if cancelled before it elapsed.
    ///
    /// A completed sleep ends any cooldown.
    pub async fn wait(&mut self, delay: Duration) -> bool {
        let completed = sleep_unless_cancelled(self.shutdown.as_ref(), delay).await;
        if completed {
            if let BackoffState::Cooldown { until } = self.state {
                if Instant::now() >= until {
                    debug!("Cooldown finished");
                    self.state = BackoffState::Idle;
                }
            }
        }
        completed
    }
}
