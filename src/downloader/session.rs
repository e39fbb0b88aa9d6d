//! Per-download bookkeeping.
//!
//! Owned by a single `download` call and dropped when it returns.

/// How a slice ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// Records were returned and saved to the slice file
    Succeeded,
    /// The API answered with no rows; a marker was written
    Empty,
    /// Gave up after errors
    Failed,
    /// Slice file already present; no call made
    Skipped,
}

impl SliceOutcome {
    /// Label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            SliceOutcome::Succeeded => "succeeded",
            SliceOutcome::Empty => "empty",
            SliceOutcome::Failed => "failed",
            SliceOutcome::Skipped => "skipped",
        }
    }
}

/// Counters for one download
#[derive(Debug, Default)]
pub struct SessionState {
    /// API calls issued
    pub calls: usize,
    /// Re-attempts after errors
    pub retries: usize,
    /// Throttling cooldowns entered
    pub cooldowns: usize,
    /// Records saved by slices that succeeded during this run
    pub rows_fetched: usize,
    /// Slices that returned records
    pub succeeded: usize,
    /// Slices that came back empty
    pub empty: usize,
    /// Slices given up on
    pub failed: usize,
    /// Slices skipped because their file already existed
    pub skipped: usize,
}

impl SessionState {
    /// Fresh state
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a finished slice
    pub fn record_outcome(&mut self, outcome: SliceOutcome) {
        match outcome {
            SliceOutcome::Succeeded => self.succeeded += 1,
            SliceOutcome::Empty => self.empty += 1,
            SliceOutcome::Failed => self.failed += 1,
            SliceOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Slices finished in any way
    pub fn finished(&self) -> usize {
        self.succeeded + self.empty + self.failed + self.skipped
    }

    /// Progress line such as `3/10 slices (30.0%) - 1204 records`
    pub fn progress_line(&self, total: usize) -> String {
        let percent = if total == 0 {
            100.0
        } else {
            self.finished() as f64 / total as f64 * 100.0
        };
        format!(
            "{}/{} slices ({:.1}%) - {} records",
            self.finished(),
            total,
            percent,
            self.rows_fetched
        )
    }
}
