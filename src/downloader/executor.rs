//! Download executor: normalize, slice, call, merge
//!
//! Slices run strictly one after another. Each finished slice leaves its own
//! file next to the artifact: its records, or a zero-byte marker when it came
//! back empty. The artifact is merged from those files only once every slice
//! has one, so a rerun requests just the slices that failed or never ran.
//!
//! Per-slice API failures are logged and counted, never propagated; only
//! validation and file-write errors end a download with `Err`.

use crate::downloader::backoff::{BackoffConfig, BackoffController};
use crate::downloader::config::HOURLY_CALL_QUOTA;
use crate::downloader::session::{SessionState, SliceOutcome};
use crate::downloader::DownloadError;
use crate::fetcher::comtrade_http::request_url;
use crate::fetcher::retry_formatter::RetryContext;
use crate::fetcher::{ApiResponse, ComtradeHttpClient, TradeFetcher};
use crate::metrics;
use crate::normalize::AreaCatalogs;
use crate::output::{
    read_records_csv, resolve_artifact_path, slice_marker_path, write_empty_marker, write_records_csv,
};
use crate::shutdown::{self, SharedShutdown};
use crate::slicer::{RequestSlice, SliceOptions, SlicePlan};
use crate::{OutputMode, TradeQuery};
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Per-download switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Request CSV with human-readable headings instead of the JSON envelope
    pub human_readable: bool,
    /// Log request URLs and API messages at info level
    pub verbose: bool,
    /// Permit human-readable output for queries that need several calls
    pub allow_human_readable_multi_call: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            human_readable: false,
            verbose: true,
            allow_human_readable_multi_call: false,
        }
    }
}

impl DownloadOptions {
    /// Set human-readable output
    pub fn with_human_readable(mut self, human_readable: bool) -> Self {
        self.human_readable = human_readable;
        self
    }

    /// Set verbosity
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Permit multi-call human-readable downloads
    pub fn with_allow_human_readable_multi_call(mut self, allow: bool) -> Self {
        self.allow_human_readable_multi_call = allow;
        self
    }

    fn output_mode(&self) -> OutputMode {
        OutputMode::from_human_readable(self.human_readable)
    }

    fn slice_options(&self) -> SliceOptions {
        SliceOptions {
            allow_human_readable_multi_call: self.allow_human_readable_multi_call,
        }
    }
}

/// Summary of one download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    /// API calls actually issued
    pub calls: usize,
    /// Resolved artifact path
    pub artifact: PathBuf,
    /// Data rows in the written artifact (0 when none was written)
    pub rows_written: usize,
    /// Slices in the plan
    pub slices_total: usize,
    /// Slices that returned records
    pub succeeded: usize,
    /// Slices that came back empty
    pub empty: usize,
    /// Slices given up on
    pub failed: usize,
    /// Slices skipped because their marker existed
    pub skipped: usize,
    /// Re-attempts after errors
    pub retries: usize,
    /// Throttling cooldowns entered
    pub cooldowns: usize,
    /// Cancellation was requested before the plan finished
    pub cancelled: bool,
    /// The artifact already existed; nothing was requested
    pub skipped_existing: bool,
}

impl DownloadReport {
    fn existing(artifact: PathBuf, slices_total: usize) -> Self {
        Self {
            calls: 0,
            artifact,
            rows_written: 0,
            slices_total,
            succeeded: 0,
            empty: 0,
            failed: 0,
            skipped: slices_total,
            retries: 0,
            cooldowns: 0,
            cancelled: false,
            skipped_existing: true,
        }
    }

    fn from_session(
        session: &SessionState,
        artifact: PathBuf,
        slices_total: usize,
        rows_written: usize,
        cancelled: bool,
    ) -> Self {
        Self {
            calls: session.calls,
            artifact,
            rows_written,
            slices_total,
            succeeded: session.succeeded,
            empty: session.empty,
            failed: session.failed,
            skipped: session.skipped,
            retries: session.retries,
            cooldowns: session.cooldowns,
            cancelled,
            skipped_existing: false,
        }
    }

    /// Status label for logs and metrics
    pub fn status(&self) -> &'static str {
        if self.skipped_existing {
            "skipped_existing"
        } else if self.cancelled {
            "cancelled"
        } else if self.failed > 0 {
            "partial"
        } else {
            "completed"
        }
    }
}

/// Result of running one slice to completion (or interruption)
struct SliceRun {
    outcome: Option<SliceOutcome>,
    interrupted: bool,
}

/// Orchestrates a complete download
pub struct DownloadExecutor {
    fetcher: Arc<dyn TradeFetcher>,
    catalogs: AreaCatalogs,
    backoff: BackoffConfig,
    shutdown: Option<SharedShutdown>,
}

impl DownloadExecutor {
    /// Executor talking to the public Comtrade endpoint
    pub fn new() -> Result<Self, DownloadError> {
        Ok(Self::with_fetcher(Arc::new(ComtradeHttpClient::public()?)))
    }

    /// Executor using a custom fetcher
    pub fn with_fetcher(fetcher: Arc<dyn TradeFetcher>) -> Self {
        Self {
            fetcher,
            catalogs: AreaCatalogs::default(),
            backoff: BackoffConfig::default(),
            shutdown: shutdown::get_global_shutdown(),
        }
    }

    /// Resolve reporter/partner names through these catalogues
    pub fn with_catalogs(mut self, catalogs: AreaCatalogs) -> Self {
        self.catalogs = catalogs;
        self
    }

    /// Override delays and retry budget
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set maximum number of retries per slice
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.backoff.max_retries = max_retries;
        self
    }

    /// Attach a shared shutdown handle for cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Normalize and slice `query` without calling the API
    pub fn plan(&self, query: &TradeQuery, options: &DownloadOptions) -> Result<SlicePlan, DownloadError> {
        let params = query
            .normalize(&self.catalogs)?
            .with_output_mode(options.output_mode());
        Ok(SlicePlan::new(&params, options.slice_options())?)
    }

    /// Download `query` into a CSV at `target`.
    ///
    /// `.csv` is appended to `target` when it has no extension. If the
    /// artifact already exists nothing is requested.
    ///
    /// # Errors
    /// Normalization and slicing errors, before any call is made, and errors
    /// writing the final artifact. Failed slices are reported, not returned.
    pub async fn download(
        &self,
        query: &TradeQuery,
        target: impl AsRef<Path>,
        options: &DownloadOptions,
    ) -> Result<DownloadReport, DownloadError> {
        let artifact = resolve_artifact_path(target);
        let plan = self.plan(query, options)?;

        if artifact.exists() {
            info!(
                artifact = %artifact.display(),
                "Artifact already exists; skipping download"
            );
            let report = DownloadReport::existing(artifact, plan.len());
            metrics::record_download(report.status(), 0);
            return Ok(report);
        }

        let (reporters, partners, periods, products) = plan.chunk_counts();
        info!(
            slices = plan.len(),
            reporter_chunks = reporters,
            partner_chunks = partners,
            period_chunks = periods,
            product_chunks = products,
            "Download planned"
        );

        if plan.len() > HOURLY_CALL_QUOTA as usize {
            warn!(
                slices = plan.len(),
                quota = HOURLY_CALL_QUOTA,
                "Plan exceeds the hourly call quota; expect throttling cooldowns"
            );
        }

        let span = tracing::info_span!(
            "download",
            artifact = %artifact.display(),
            slices = plan.len()
        );
        self.run(&plan, artifact, options).instrument(span).await
    }

    async fn run(
        &self,
        plan: &SlicePlan,
        artifact: PathBuf,
        options: &DownloadOptions,
    ) -> Result<DownloadReport, DownloadError> {
        let total = plan.len();
        let mode = options.output_mode();
        let mut session = SessionState::new();
        let mut backoff = BackoffController::new(self.backoff).with_shutdown(self.shutdown.clone());
        let mut cancelled = false;

        for slice in plan {
            if self.shutdown_requested() {
                cancelled = true;
                break;
            }

            let slice_file = slice_marker_path(&artifact, slice.index, total);
            if slice_file.exists() {
                debug!(slice = slice.index, file = %slice_file.display(), "Slice file exists; skipping slice");
                session.record_outcome(SliceOutcome::Skipped);
                metrics::record_slice(SliceOutcome::Skipped.as_str());
                continue;
            }

            let run = self
                .run_slice(&slice, mode, &slice_file, &mut backoff, &mut session, options)
                .await?;

            if let Some(outcome) = run.outcome {
                session.record_outcome(outcome);
                metrics::record_slice(outcome.as_str());
                debug!(progress = %session.progress_line(total), "Slice finished");
            }

            if run.interrupted {
                cancelled = true;
                break;
            }
        }

        let rows_written = if cancelled {
            warn!(
                finished = session.finished(),
                total = total,
                "Download cancelled; finished slices are kept for the next run"
            );
            0
        } else if session.failed > 0 {
            warn!(
                failed = session.failed,
                total = total,
                "Slices failed; artifact not written, rerun to fetch them"
            );
            0
        } else if total == 1 {
            // The only slice file is the artifact itself
            session.rows_fetched
        } else {
            merge_slice_files(&artifact, total)?
        };

        let report = DownloadReport::from_session(&session, artifact, total, rows_written, cancelled);
        metrics::record_download(report.status(), rows_written);

        info!(
            status = report.status(),
            calls = report.calls,
            rows = report.rows_written,
            succeeded = report.succeeded,
            empty = report.empty,
            failed = report.failed,
            skipped = report.skipped,
            "Download finished"
        );

        Ok(report)
    }

    async fn run_slice(
        &self,
        slice: &RequestSlice,
        mode: OutputMode,
        slice_file: &Path,
        backoff: &mut BackoffController,
        session: &mut SessionState,
        options: &DownloadOptions,
    ) -> Result<SliceRun, DownloadError> {
        let mut retries_used = 0;

        loop {
            if options.verbose {
                match request_url(self.fetcher.base_url(), slice, mode) {
                    Ok(url) => info!(url = %url, "{}", slice.label()),
                    Err(_) => info!("{}", slice.label()),
                }
            }

            session.calls += 1;
            let started = Instant::now();
            let response = self.fetcher.execute(slice, mode).await;
            metrics::record_api_call(response.outcome(), started.elapsed());

            match response {
                ApiResponse::Success { records, message } => {
                    self.log_api_message(slice, message.as_deref(), options);
                    debug!(slice = slice.index, records = records.len(), "Slice returned records");
                    session.rows_fetched += write_records_csv(slice_file, &records)?;

                    let delay = backoff.on_success();
                    return Ok(SliceRun {
                        outcome: Some(SliceOutcome::Succeeded),
                        interrupted: !backoff.wait(delay).await,
                    });
                }
                ApiResponse::Empty { message } => {
                    self.log_api_message(slice, message.as_deref(), options);
                    info!(slice = slice.index, "Slice returned no data");
                    if let Err(e) = write_empty_marker(slice_file) {
                        warn!(slice = slice.index, error = %e, "Failed to write empty marker");
                    }

                    let delay = backoff.on_success();
                    return Ok(SliceRun {
                        outcome: Some(SliceOutcome::Empty),
                        interrupted: !backoff.wait(delay).await,
                    });
                }
                ApiResponse::Error { kind, failure, detail } => {
                    let decision = backoff.on_error(kind, retries_used);
                    let context = RetryContext::new(
                        retries_used + 1,
                        backoff.config().max_retries + 1,
                        failure,
                        decision.delay,
                        slice.label(),
                        detail,
                    );

                    if decision.cooldown {
                        session.cooldowns += 1;
                        warn!(kind = %kind, "{}", context.format_cooldown(Local::now()));
                    }

                    if decision.retry {
                        if !decision.cooldown {
                            warn!(kind = %kind, "{}", context.format_retry());
                        }
                    } else {
                        error!(kind = %kind, "{}", context.format_failure());
                    }

                    if !backoff.wait(decision.delay).await {
                        return Ok(SliceRun {
                            outcome: (!decision.retry).then_some(SliceOutcome::Failed),
                            interrupted: true,
                        });
                    }

                    if !decision.retry {
                        return Ok(SliceRun {
                            outcome: Some(SliceOutcome::Failed),
                            interrupted: false,
                        });
                    }

                    retries_used += 1;
                    session.retries += 1;
                }
            }
        }
    }

    fn log_api_message(&self, slice: &RequestSlice, message: Option<&str>, options: &DownloadOptions) {
        let Some(message) = message else {
            return;
        };
        if options.verbose {
            info!(slice = slice.index, api_message = %message, "API message");
        } else {
            debug!(slice = slice.index, api_message = %message, "API message");
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

/// Concatenate the per-slice record files into `artifact`, in slice order.
///
/// Zero-byte markers contribute nothing and are kept; record files are
/// removed once the artifact is in place. Returns the rows written.
fn merge_slice_files(artifact: &Path, total: usize) -> Result<usize, DownloadError> {
    let mut records = Vec::new();
    let mut merged = Vec::new();
    for index in 0..total {
        let path = slice_marker_path(artifact, index, total);
        let len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            continue;
        }
        records.extend(read_records_csv(&path)?);
        merged.push(path);
    }

    if records.is_empty() {
        info!("No slice returned records; no artifact written");
        return Ok(0);
    }

    let rows = write_records_csv(artifact, &records)?;
    for path in merged {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "Failed to remove merged slice file");
        }
    }
    Ok(rows)
}
