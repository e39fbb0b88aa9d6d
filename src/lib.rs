//! # Comtrade Downloader Library
//!
//! A batch client for the UN Comtrade trade-statistics API. It turns a
//! user-level query into a sequence of API-legal calls, paces those calls to
//! stay within the service's rate and quota limits, and persists the merged
//! result as a CSV file that later runs can skip.
//!
//! ## Features
//!
//! - **Friendly Parameters**: country names, `"exports"`/`"imports"` and period
//!   ranges such as `"2016-2018"` or `"201611-201702"` are normalized for you
//! - **Request Slicing**: queries over more reporters, partners, periods or
//!   products than one call allows are split automatically
//! - **Throttle Aware**: one call per second, with a long cooldown when the
//!   service starts answering with truncated or rejected responses
//! - **Resumable**: existing artifacts and empty-slice markers are never
//!   requested again
//!
//! ## Quick Start
//!
//! ```no_run
//! use comtrade_downloader::downloader::{DownloadExecutor, DownloadOptions};
//! use comtrade_downloader::TradeQuery;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let query = TradeQuery::new("842", "all", "2016-2018")
//!     .with_product("TOTAL")
//!     .with_tradeflow("exports");
//!
//! let executor = DownloadExecutor::new()?;
//! let report = executor
//!     .download(&query, "usa_exports", &DownloadOptions::default())
//!     .await?;
//! println!("{} API calls made", report.calls);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`normalize`] - Parameter normalization (tradeflow, periods, area names)
//! - [`slicer`] - Splitting a query into API-legal request slices
//! - [`fetcher`] - One HTTP call per slice and response envelope parsing
//! - [`downloader`] - Backoff control and download orchestration
//! - [`output`] - CSV artifacts and resumability markers
//! - [`shutdown`] - Cooperative cancellation

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Download orchestration and backoff control
pub mod downloader;

/// Comtrade API access
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// Parameter normalization
pub mod normalize;

/// CSV artifacts and resumability markers
pub mod output;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Request slicing
pub mod slicer;

pub use normalize::{AreaCatalog, AreaCatalogs, NormalizeError};
pub use slicer::{RequestSlice, SliceError, SlicePlan};

/// One record as returned by the API.
///
/// Field order is preserved so that CSV columns follow the order the API used.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Token the API understands as "every value" for a field.
pub const WILDCARD: &str = "all";

/// Data frequency (`freq` parameter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// Annual data, periods are `YYYY`
    #[serde(rename = "A")]
    Annual,
    /// Monthly data, periods are `YYYYMM`
    #[serde(rename = "M")]
    Monthly,
}

impl Frequency {
    /// Code sent to the API
    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Annual => "A",
            Frequency::Monthly => "M",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" | "annual" => Ok(Frequency::Annual),
            "m" | "monthly" => Ok(Frequency::Monthly),
            _ => Err(format!("Invalid frequency: {s}")),
        }
    }
}

/// Response flavour requested from the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputMode {
    /// JSON envelope with machine-readable headings; API messages are available
    #[default]
    MachineReadable,
    /// CSV with human-readable headings; API messages are not available
    HumanReadable,
}

impl OutputMode {
    /// Build from the `human_readable` flag
    pub fn from_human_readable(human_readable: bool) -> Self {
        if human_readable {
            OutputMode::HumanReadable
        } else {
            OutputMode::MachineReadable
        }
    }

    /// Value of the `fmt` parameter
    pub fn format(&self) -> &'static str {
        match self {
            OutputMode::MachineReadable => "json",
            OutputMode::HumanReadable => "csv",
        }
    }

    /// Value of the `head` parameter
    pub fn heading(&self) -> &'static str {
        match self {
            OutputMode::MachineReadable => "M",
            OutputMode::HumanReadable => "H",
        }
    }
}

/// Trade regime code (`rg` parameter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeFlow(pub u32);

impl TradeFlow {
    /// Imports
    pub const IMPORT: TradeFlow = TradeFlow(1);
    /// Exports
    pub const EXPORT: TradeFlow = TradeFlow(2);

    /// Numeric regime code
    pub fn code(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TradeFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tradeflow as supplied by a caller: a label such as `"Exports"` or a raw code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeFlowInput {
    /// Regime code, passed through unchanged
    Code(u32),
    /// Free-form label
    Label(String),
}

impl From<u32> for TradeFlowInput {
    fn from(code: u32) -> Self {
        TradeFlowInput::Code(code)
    }
}

impl From<&str> for TradeFlowInput {
    fn from(label: &str) -> Self {
        TradeFlowInput::Label(label.to_string())
    }
}

impl From<String> for TradeFlowInput {
    fn from(label: String) -> Self {
        TradeFlowInput::Label(label)
    }
}

/// A parameter value as supplied by a caller: one token or an ordered list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamInput {
    /// A single token, e.g. `"842"` or `"2016-2018"`
    Single(String),
    /// An ordered list of tokens
    Many(Vec<String>),
}

impl ParamInput {
    /// Tokens in caller order, trimmed
    pub fn tokens(&self) -> Vec<String> {
        match self {
            ParamInput::Single(token) => vec![token.trim().to_string()],
            ParamInput::Many(tokens) => tokens.iter().map(|t| t.trim().to_string()).collect(),
        }
    }

    /// Build from a list, collapsing one-element lists to [`ParamInput::Single`]
    pub fn from_list(mut tokens: Vec<String>) -> Self {
        if tokens.len() == 1 {
            ParamInput::Single(tokens.remove(0))
        } else {
            ParamInput::Many(tokens)
        }
    }
}

impl From<&str> for ParamInput {
    fn from(token: &str) -> Self {
        ParamInput::Single(token.to_string())
    }
}

impl From<String> for ParamInput {
    fn from(token: String) -> Self {
        ParamInput::Single(token)
    }
}

impl From<Vec<String>> for ParamInput {
    fn from(tokens: Vec<String>) -> Self {
        ParamInput::Many(tokens)
    }
}

impl From<Vec<&str>> for ParamInput {
    fn from(tokens: Vec<&str>) -> Self {
        ParamInput::Many(tokens.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ParamInput {
    fn from(tokens: [&str; N]) -> Self {
        ParamInput::Many(tokens.iter().map(|t| t.to_string()).collect())
    }
}

/// A normalized, multi-valued field: either the wildcard or explicit codes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selection {
    /// Every value (`all`)
    All,
    /// Explicit codes in caller order
    Codes(Vec<String>),
}

impl Selection {
    /// Build from tokens; any token equal to `all` (case-insensitive) makes
    /// the whole selection the wildcard.
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        if tokens.iter().any(|t| t.eq_ignore_ascii_case(WILDCARD)) {
            Selection::All
        } else {
            Selection::Codes(tokens)
        }
    }

    /// Whether this is the wildcard
    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    /// Number of values sent in one call; the wildcard counts as one
    pub fn len(&self) -> usize {
        match self {
            Selection::All => 1,
            Selection::Codes(codes) => codes.len(),
        }
    }

    /// Whether there are no explicit codes
    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Codes(codes) if codes.is_empty())
    }

    /// Split into consecutive chunks of at most `size` codes.
    ///
    /// The wildcard is never split.
    pub fn chunks(&self, size: usize) -> Vec<Selection> {
        match self {
            Selection::All => vec![Selection::All],
            Selection::Codes(codes) => codes
                .chunks(size.max(1))
                .map(|chunk| Selection::Codes(chunk.to_vec()))
                .collect(),
        }
    }

    /// Value as sent on the query string (comma-joined)
    pub fn query_value(&self) -> String {
        match self {
            Selection::All => WILDCARD.to_string(),
            Selection::Codes(codes) => codes.join(","),
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.query_value())
    }
}

/// A user-level query, before normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeQuery {
    /// Reporting areas: codes, catalogue names, or `all`
    pub reporter: ParamInput,
    /// Partner areas: codes, catalogue names, or `all`
    pub partner: ParamInput,
    /// Periods: `YYYY`, `YYYYMM`, ranges, `now`, `recent` or `all`
    pub period: ParamInput,
    /// Frequency code (`A` or `M`)
    pub frequency: String,
    /// Commodity codes or aggregate markers (`TOTAL`, `AG2`, `all`, ...)
    pub product: ParamInput,
    /// Import/export label or regime code
    pub tradeflow: TradeFlowInput,
}

impl TradeQuery {
    /// Create a query for annual total exports
    pub fn new(
        reporter: impl Into<ParamInput>,
        partner: impl Into<ParamInput>,
        period: impl Into<ParamInput>,
    ) -> Self {
        Self {
            reporter: reporter.into(),
            partner: partner.into(),
            period: period.into(),
            frequency: Frequency::Annual.code().to_string(),
            product: ParamInput::Single("TOTAL".to_string()),
            tradeflow: TradeFlowInput::Label("exports".to_string()),
        }
    }

    /// Set the frequency code
    pub fn with_frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = frequency.into();
        self
    }

    /// Set the commodity selection
    pub fn with_product(mut self, product: impl Into<ParamInput>) -> Self {
        self.product = product.into();
        self
    }

    /// Set the tradeflow
    pub fn with_tradeflow(mut self, tradeflow: impl Into<TradeFlowInput>) -> Self {
        self.tradeflow = tradeflow.into();
        self
    }
}

/// A normalized query, ready to be sliced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameters {
    /// Reporting areas
    pub reporter: Selection,
    /// Partner areas
    pub partner: Selection,
    /// Periods
    pub period: Selection,
    /// Data frequency
    pub frequency: Frequency,
    /// Commodity codes
    pub product: Selection,
    /// Trade regime
    pub tradeflow: TradeFlow,
    /// Requested response flavour
    pub output_mode: OutputMode,
}

impl QueryParameters {
    /// Set the response flavour
    pub fn with_output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }
}
