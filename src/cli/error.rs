//! CLI error types and conversions

use crate::downloader::DownloadError;
use crate::fetcher::FetcherError;
use crate::normalize::NormalizeError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Download error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Area catalogue could not be loaded
    #[error("area catalogue error: {0}")]
    CatalogError(#[from] NormalizeError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
