//! Plan subcommand: show the slices a query needs without calling the API

use super::download::{Cli, OutputFormat, QueryArgs};
use super::CliError;
use crate::downloader::{DownloadExecutor, DownloadOptions};
use crate::fetcher::ComtradeHttpClient;
use crate::slicer::SlicePlan;
use clap::Args;
use std::sync::Arc;

/// Plan command arguments
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Query to plan
    #[command(flatten)]
    pub query: QueryArgs,

    /// Plan for human-readable CSV output
    #[arg(long, default_value_t = false)]
    pub human_readable: bool,

    /// Allow human-readable output when the query needs several calls
    #[arg(long, default_value_t = false)]
    pub allow_multi_call: bool,
}

impl PlanArgs {
    /// Normalize, slice and print
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let client = ComtradeHttpClient::public()?;
        let catalogs = self.query.load_catalogs(&client).await?;
        let options = DownloadOptions::default()
            .with_human_readable(self.human_readable)
            .with_allow_human_readable_multi_call(self.allow_multi_call);

        let plan = DownloadExecutor::with_fetcher(Arc::new(client))
            .with_catalogs(catalogs)
            .plan(&self.query.to_query(), &options)?;

        match cli.output_format {
            OutputFormat::Json => output_json(&plan),
            OutputFormat::Human => output_human(&plan),
        }
        Ok(())
    }
}

fn output_json(plan: &SlicePlan) {
    let slices: Vec<_> = plan.iter().collect();
    let output = serde_json::json!({
        "calls": plan.len(),
        "slices": slices,
    });
    println!("{output}");
}

fn output_human(plan: &SlicePlan) {
    let (reporters, partners, periods, products) = plan.chunk_counts();
    println!(
        "{} API call(s): {} reporter x {} partner x {} period x {} product chunk(s)",
        plan.len(),
        reporters,
        partners,
        periods,
        products
    );
    for slice in plan {
        println!("  {}", slice.label());
    }
}
