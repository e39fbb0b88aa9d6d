//! Download orchestration and backoff control
//!
//! A download runs in four steps:
//!
//! 1. **Normalization**: [`TradeQuery::normalize`](crate::TradeQuery::normalize)
//!    resolves labels, ranges and area names
//! 2. **Slicing**: [`SlicePlan`](crate::slicer::SlicePlan) splits the query
//!    into API-legal calls
//! 3. **Execution**: [`executor::DownloadExecutor`] issues the calls one at a
//!    time, paced and throttle-aware via [`backoff::BackoffController`]
//! 4. **Output**: records are merged into one CSV; empty slices leave a
//!    marker so later runs skip them
//!
//! # Quick Start
//!
//! ```no_run
//! use comtrade_downloader::downloader::{DownloadExecutor, DownloadOptions};
//! use comtrade_downloader::TradeQuery;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let query = TradeQuery::new(vec!["842", "124"], "0", "201601-201612")
//!     .with_frequency("M")
//!     .with_tradeflow("imports");
//!
//! let report = DownloadExecutor::new()?
//!     .with_max_retries(1)
//!     .download(&query, "data/na_imports_2016", &DownloadOptions::default())
//!     .await?;
//! assert_eq!(report.slices_total, 3);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! [`DownloadError`] covers what ends a download early:
//! - Normalization errors (bad tradeflow, period or area name)
//! - Slicing errors (several wildcards, refused human-readable multi-call)
//! - Output errors writing slice files or the final artifact
//!
//! Per-slice API failures never surface here; they are counted in
//! [`DownloadReport`].

pub mod backoff;
pub mod config;
pub mod executor;
pub mod session;

pub use backoff::{BackoffConfig, BackoffController, BackoffDecision, BackoffState};
pub use executor::{DownloadExecutor, DownloadOptions, DownloadReport};
pub use session::{SessionState, SliceOutcome};

use crate::fetcher::FetcherError;
use crate::normalize::NormalizeError;
use crate::output::OutputError;
use crate::slicer::SliceError;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Query could not be normalized
    #[error("invalid query: {0}")]
    NormalizeError(#[from] NormalizeError),

    /// Query could not be sliced
    #[error("invalid query: {0}")]
    SliceError(#[from] SliceError),

    /// HTTP client could not be set up
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Final artifact could not be written
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),
}
