//! Parameter normalization
//!
//! Turns user-friendly query inputs into the primitive values the Comtrade API
//! accepts:
//!
//! - tradeflow labels (`"Exports"`, `"imports"`) become regime codes
//! - period ranges (`"2016-2018"`, `"201611-201702"`) expand into every period
//!   they cover
//! - area names become numeric codes via an [`AreaCatalog`]
//!
//! Normalization happens once, in [`TradeQuery::normalize`]; everything
//! downstream works on [`QueryParameters`].

use crate::{
    Frequency, ParamInput, QueryParameters, Selection, TradeFlow, TradeFlowInput, TradeQuery,
    WILDCARD,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

/// Normalization errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// Tradeflow label names neither imports nor exports
    #[error("invalid tradeflow '{0}': expected a label containing 'import' or 'export', or a regime code")]
    InvalidTradeflow(String),

    /// Frequency is neither annual nor monthly
    #[error("unsupported frequency '{0}': expected 'A' (annual) or 'M' (monthly)")]
    UnsupportedFrequency(String),

    /// Period token cannot be expanded
    #[error("invalid period '{token}': {reason}")]
    InvalidPeriod {
        /// Offending token
        token: String,
        /// What is wrong with it
        reason: String,
    },

    /// Area name not present in the catalogue
    #[error("unknown area '{0}' (names are case-sensitive)")]
    UnknownArea(String),

    /// Area catalogue could not be read
    #[error("area catalog error: {0}")]
    Catalog(String),
}

/// Result type for normalization
pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Parse a frequency code (`A`/`M`, case-insensitive)
pub fn parse_frequency(input: &str) -> NormalizeResult<Frequency> {
    Frequency::from_str(input).map_err(|_| NormalizeError::UnsupportedFrequency(input.to_string()))
}

/// Map a tradeflow label to its regime code.
///
/// Labels containing `export` map to 2 and labels containing `import` map to 1
/// (case-insensitive). Codes, and labels that are plain numbers, pass through.
pub fn normalize_tradeflow(input: &TradeFlowInput) -> NormalizeResult<TradeFlow> {
    match input {
        TradeFlowInput::Code(code) => Ok(TradeFlow(*code)),
        TradeFlowInput::Label(label) => {
            let lower = label.to_lowercase();
            if lower.contains("export") {
                Ok(TradeFlow::EXPORT)
            } else if lower.contains("import") {
                Ok(TradeFlow::IMPORT)
            } else if let Ok(code) = label.trim().parse::<u32>() {
                Ok(TradeFlow(code))
            } else {
                Err(NormalizeError::InvalidTradeflow(label.clone()))
            }
        }
    }
}

/// Expand period ranges.
///
/// `"A-B"` expands to every year in `[A, B]` for annual data; `"YYYYMM-YYYYMM"`
/// expands month by month for monthly data. Tokens without `-` pass through
/// unchanged, including `now`, `recent` and `all`. The frequency is only
/// consulted when a ranged token is present.
pub fn normalize_period(input: &ParamInput, frequency: &str) -> NormalizeResult<Vec<String>> {
    let mut periods = Vec::new();

    for token in input.tokens() {
        let Some((start, end)) = token.split_once('-') else {
            periods.push(token);
            continue;
        };

        match parse_frequency(frequency)? {
            Frequency::Annual => expand_years(&token, start.trim(), end.trim(), &mut periods)?,
            Frequency::Monthly => expand_months(&token, start.trim(), end.trim(), &mut periods)?,
        }
    }

    Ok(periods)
}

fn invalid_period(token: &str, reason: impl Into<String>) -> NormalizeError {
    NormalizeError::InvalidPeriod {
        token: token.to_string(),
        reason: reason.into(),
    }
}

fn parse_year(token: &str, value: &str) -> NormalizeResult<i32> {
    if value.len() != 4 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_period(token, format!("'{value}' is not in YYYY form")));
    }
    value
        .parse()
        .map_err(|_| invalid_period(token, format!("'{value}' is not a year")))
}

fn expand_years(token: &str, start: &str, end: &str, out: &mut Vec<String>) -> NormalizeResult<()> {
    let start = parse_year(token, start)?;
    let end = parse_year(token, end)?;

    if end < start {
        return Err(invalid_period(token, "range ends before it starts"));
    }

    out.extend((start..=end).map(|year| year.to_string()));
    Ok(())
}

fn parse_year_month(token: &str, value: &str) -> NormalizeResult<(i32, u32)> {
    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_period(token, format!("'{value}' is not in YYYYMM form")));
    }

    let year: i32 = value[..4]
        .parse()
        .map_err(|_| invalid_period(token, format!("'{value}' has an invalid year")))?;
    let month: u32 = value[4..]
        .parse()
        .map_err(|_| invalid_period(token, format!("'{value}' has an invalid month")))?;

    if !(1..=12).contains(&month) {
        return Err(invalid_period(token, format!("month {month} is outside 1-12")));
    }

    Ok((year, month))
}

fn expand_months(token: &str, start: &str, end: &str, out: &mut Vec<String>) -> NormalizeResult<()> {
    let (mut year, mut month) = parse_year_month(token, start)?;
    let (end_year, end_month) = parse_year_month(token, end)?;

    if (end_year, end_month) < (year, month) {
        return Err(invalid_period(token, "range ends before it starts"));
    }

    loop {
        out.push(format!("{year}{month:02}"));
        if (year, month) == (end_year, end_month) {
            break;
        }
        if month == 12 {
            month = 1;
            year += 1;
        } else {
            month += 1;
        }
    }

    Ok(())
}

/// One entry of the API's area listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AreaEntry {
    /// Numeric area code
    pub id: String,
    /// Display name
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct AreaListing {
    results: Vec<AreaEntry>,
}

/// Name-to-code lookup for reporter or partner areas.
///
/// Built from the API's `reporterAreas.json` / `partnerAreas.json` listings.
/// Lookups are case-sensitive, as the API's own names are.
#[derive(Debug, Clone, Default)]
pub struct AreaCatalog {
    by_name: HashMap<String, String>,
}

impl AreaCatalog {
    /// Build from entries; the listing's own `all` entry is ignored
    pub fn from_entries(entries: impl IntoIterator<Item = AreaEntry>) -> Self {
        let by_name = entries
            .into_iter()
            .filter(|entry| !entry.id.eq_ignore_ascii_case(WILDCARD))
            .map(|entry| (entry.text, entry.id))
            .collect();
        Self { by_name }
    }

    /// Parse a listing in the API's `{"results": [{"id", "text"}]}` format
    pub fn from_json(json: &str) -> NormalizeResult<Self> {
        let listing: AreaListing =
            serde_json::from_str(json).map_err(|e| NormalizeError::Catalog(e.to_string()))?;
        let catalog = Self::from_entries(listing.results);
        debug!(areas = catalog.len(), "Loaded area catalog");
        Ok(catalog)
    }

    /// Number of named areas
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the catalogue has no entries
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Resolve a name or code.
    ///
    /// Numeric codes and the wildcard pass through; names are looked up.
    pub fn resolve(&self, name: &str) -> NormalizeResult<String> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(WILDCARD) || is_numeric_code(name) {
            return Ok(name.to_string());
        }
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| NormalizeError::UnknownArea(name.to_string()))
    }
}

fn is_numeric_code(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Optional catalogues used to resolve reporter and partner names
#[derive(Debug, Clone, Default)]
pub struct AreaCatalogs {
    /// Reporter areas
    pub reporters: Option<AreaCatalog>,
    /// Partner areas
    pub partners: Option<AreaCatalog>,
}

/// Resolve area inputs to a selection; without a catalogue values pass through
pub fn normalize_areas(
    input: &ParamInput,
    catalog: Option<&AreaCatalog>,
) -> NormalizeResult<Selection> {
    let tokens = input.tokens();
    let resolved = match catalog {
        Some(catalog) => tokens
            .iter()
            .map(|token| catalog.resolve(token))
            .collect::<NormalizeResult<Vec<_>>>()?,
        None => tokens,
    };
    Ok(Selection::from_tokens(resolved))
}

impl TradeQuery {
    /// Normalize every field into [`QueryParameters`].
    ///
    /// The output mode defaults to machine-readable; see
    /// [`QueryParameters::with_output_mode`].
    pub fn normalize(&self, catalogs: &AreaCatalogs) -> NormalizeResult<QueryParameters> {
        let period = normalize_period(&self.period, &self.frequency)?;
        let frequency = parse_frequency(&self.frequency)?;
        let tradeflow = normalize_tradeflow(&self.tradeflow)?;

        let params = QueryParameters {
            reporter: normalize_areas(&self.reporter, catalogs.reporters.as_ref())?,
            partner: normalize_areas(&self.partner, catalogs.partners.as_ref())?,
            period: Selection::from_tokens(period),
            frequency,
            product: Selection::from_tokens(self.product.tokens()),
            tradeflow,
            output_mode: Default::default(),
        };

        debug!(
            reporter = %params.reporter,
            partner = %params.partner,
            period = %params.period,
            product = %params.product,
            tradeflow = %params.tradeflow,
            "Normalized query parameters"
        );

        Ok(params)
    }
}
