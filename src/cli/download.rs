//! Command-line definitions and the download command

use crate::downloader::{BackoffConfig, DownloadExecutor, DownloadOptions, DownloadReport};
use crate::fetcher::comtrade_http::COMTRADE_BASE_URL;
use crate::fetcher::ComtradeHttpClient;
use crate::normalize::{AreaCatalog, AreaCatalogs};
use crate::output::default_artifact_name;
use crate::shutdown::SharedShutdown;
use crate::{ParamInput, TradeQuery};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{CliError, PlanArgs};

/// Comtrade batch downloader
#[derive(Parser, Debug)]
#[command(name = "comtrade-downloader")]
#[command(about = "Download UN Comtrade trade statistics in API-legal batches", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a query into one CSV file
    Download(DownloadArgs),

    /// Print the request slices a query needs, without calling the API
    Plan(PlanArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Query fields shared by `download` and `plan`
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Reporter codes or names, comma-separated, or `all`
    #[arg(long, value_delimiter = ',', required = true)]
    pub reporter: Vec<String>,

    /// Partner codes or names, comma-separated, or `all`
    #[arg(long, value_delimiter = ',', default_value = "all")]
    pub partner: Vec<String>,

    /// Periods, comma-separated; ranges such as 2016-2018 or 201611-201702 are expanded
    #[arg(long, value_delimiter = ',', default_value = "recent")]
    pub period: Vec<String>,

    /// Frequency: A (annual) or M (monthly)
    #[arg(long, default_value = "A")]
    pub frequency: String,

    /// HS commodity codes, comma-separated
    #[arg(long, value_delimiter = ',', default_value = "TOTAL")]
    pub product: Vec<String>,

    /// Trade direction: exports, imports, or a regime code
    #[arg(long, default_value = "exports")]
    pub tradeflow: String,

    /// Reporter area listing (file path or URL) used to resolve names
    #[arg(long)]
    pub reporter_areas: Option<String>,

    /// Partner area listing (file path or URL) used to resolve names
    #[arg(long)]
    pub partner_areas: Option<String>,
}

impl QueryArgs {
    /// Build the library query
    pub fn to_query(&self) -> TradeQuery {
        TradeQuery::new(
            ParamInput::from_list(self.reporter.clone()),
            ParamInput::from_list(self.partner.clone()),
            ParamInput::from_list(self.period.clone()),
        )
        .with_frequency(self.frequency.clone())
        .with_product(ParamInput::from_list(self.product.clone()))
        .with_tradeflow(self.tradeflow.clone())
    }

    /// Load whichever area catalogues were requested
    pub async fn load_catalogs(&self, client: &ComtradeHttpClient) -> Result<AreaCatalogs, CliError> {
        let reporters = match &self.reporter_areas {
            Some(source) => Some(load_catalog(source, client).await?),
            None => None,
        };
        let partners = match &self.partner_areas {
            Some(source) => Some(load_catalog(source, client).await?),
            None => None,
        };
        Ok(AreaCatalogs { reporters, partners })
    }
}

async fn load_catalog(source: &str, client: &ComtradeHttpClient) -> Result<AreaCatalog, CliError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        info!(url = %source, "Fetching area listing");
        return Ok(client.fetch_area_catalog(source).await?);
    }

    let json = std::fs::read_to_string(source).map_err(|e| {
        CliError::ConfigurationError(format!("Failed to read area listing {source}: {e}"))
    })?;
    Ok(AreaCatalog::from_json(&json)?)
}

/// Download command arguments
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Query to download
    #[command(flatten)]
    pub query: QueryArgs,

    /// Output CSV path; `.csv` is appended when it has no extension.
    /// Defaults to a name derived from the query.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Request human-readable CSV instead of the JSON envelope
    #[arg(long, default_value_t = false)]
    pub human_readable: bool,

    /// Allow human-readable output when the query needs several calls
    #[arg(long, default_value_t = false)]
    pub allow_multi_call: bool,

    /// Log request URLs and API messages at debug level only
    #[arg(long, short, default_value_t = false)]
    pub quiet: bool,

    /// Maximum re-attempts of one slice after an error
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: u32,

    /// API endpoint
    #[arg(long, default_value = COMTRADE_BASE_URL)]
    pub base_url: String,

    /// Delay between calls, in milliseconds
    #[arg(long, default_value = "1000")]
    pub pacing_ms: u64,

    /// Cooldown after a throttled response, in seconds
    #[arg(long, default_value = "3600")]
    pub cooldown_secs: u64,
}

impl DownloadArgs {
    fn options(&self) -> DownloadOptions {
        DownloadOptions::default()
            .with_human_readable(self.human_readable)
            .with_verbose(!self.quiet)
            .with_allow_human_readable_multi_call(self.allow_multi_call)
    }

    fn backoff(&self) -> BackoffConfig {
        BackoffConfig::default()
            .with_pacing(Duration::from_millis(self.pacing_ms))
            .with_cooldown(Duration::from_secs(self.cooldown_secs))
            .with_max_retries(self.max_retries)
    }

    /// Run the download
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let client = ComtradeHttpClient::new(self.base_url.clone())?;
        let catalogs = self.query.load_catalogs(&client).await?;
        let query = self.query.to_query();
        let options = self.options();

        let target = match &self.output {
            Some(path) => path.clone(),
            None => {
                let params = query.normalize(&catalogs).map_err(|e| {
                    CliError::InvalidArgument(format!("Cannot derive an output name: {e}"))
                })?;
                PathBuf::from(default_artifact_name(&params))
            }
        };

        let executor = DownloadExecutor::with_fetcher(Arc::new(client))
            .with_catalogs(catalogs)
            .with_backoff(self.backoff())
            .with_shutdown(shutdown);

        let report = executor.download(&query, &target, &options).await?;

        match cli.output_format {
            OutputFormat::Json => output_json(&report),
            OutputFormat::Human => output_human(&report),
        }
        Ok(())
    }
}

fn output_json(report: &DownloadReport) {
    let output = serde_json::json!({
        "success": report.failed == 0 && !report.cancelled,
        "status": report.status(),
        "report": report,
    });
    println!("{output}");
}

fn output_human(report: &DownloadReport) {
    if report.skipped_existing {
        println!(
            "Output already exists, nothing downloaded: {}",
            report.artifact.display()
        );
        return;
    }

    if report.cancelled {
        println!("\nDownload cancelled; finished slices are kept for the next run.");
    } else if report.failed > 0 {
        println!(
            "\nDownload incomplete: {} slice(s) failed; rerun to fetch them.",
            report.failed
        );
    } else if report.rows_written > 0 {
        println!("\nDownload completed!");
        println!("Output: {}", report.artifact.display());
    } else {
        println!("\nDownload completed with no data.");
    }

    println!("Rows written: {}", report.rows_written);
    println!("API calls: {}", report.calls);
    println!(
        "Slices: {} total, {} with data, {} empty, {} skipped, {} failed",
        report.slices_total, report.succeeded, report.empty, report.skipped, report.failed
    );
    if report.retries > 0 {
        println!("Retries: {}", report.retries);
    }
    if report.cooldowns > 0 {
        println!("Throttling cooldowns: {}", report.cooldowns);
    }
}
