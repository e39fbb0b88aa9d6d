//! Request slicing
//!
//! The API limits each call to 5 reporters, 5 partners, 5 periods and 20
//! commodity codes, and only one of reporter, partner and period may be the
//! `all` wildcard. [`SlicePlan`] splits a normalized query into the minimal
//! sequence of calls that respects those limits.
//!
//! Slices are ordered reporter-outermost, then partner, period and product
//! innermost. Callers rely on this order: merged output follows it.

use crate::{Frequency, OutputMode, QueryParameters, Selection, TradeFlow};
use serde::Serialize;

/// Maximum reporter codes per call
pub const MAX_REPORTERS: usize = 5;

/// Maximum partner codes per call
pub const MAX_PARTNERS: usize = 5;

/// Maximum periods per call
pub const MAX_PERIODS: usize = 5;

/// Maximum commodity codes per call
pub const MAX_PRODUCTS: usize = 20;

/// Slicing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SliceError {
    /// More than one of reporter/partner/period is the wildcard
    #[error(
        "only one of reporter, partner and period may use the ALL value in a single API call (found: {})",
        .0.join(", ")
    )]
    MultipleWildcards(Vec<&'static str>),

    /// A field has no values at all
    #[error("{0} selection is empty")]
    EmptySelection(&'static str),

    /// Human-readable output over several calls was not explicitly allowed
    #[error(
        "human-readable output needs {calls} API calls and hides API messages; \
         allow multi-call human-readable downloads explicitly to proceed"
    )]
    HumanReadableMultiCall {
        /// Number of calls the query needs
        calls: usize,
    },
}

/// Slicing options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceOptions {
    /// Permit human-readable output when more than one call is needed
    pub allow_human_readable_multi_call: bool,
}

/// One API-legal call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSlice {
    /// Position in the plan (0-based)
    pub index: usize,
    /// Reporter chunk
    pub reporter: Selection,
    /// Partner chunk
    pub partner: Selection,
    /// Period chunk
    pub period: Selection,
    /// Commodity chunk
    pub product: Selection,
    /// Data frequency
    pub frequency: Frequency,
    /// Trade regime
    pub tradeflow: TradeFlow,
}

impl RequestSlice {
    /// Short description for log lines
    pub fn label(&self) -> String {
        format!(
            "slice {} (r={} p={} ps={} cc={})",
            self.index, self.reporter, self.partner, self.period, self.product
        )
    }
}

/// Ordered, restartable sequence of request slices for one query
#[derive(Debug, Clone)]
pub struct SlicePlan {
    reporter: Vec<Selection>,
    partner: Vec<Selection>,
    period: Vec<Selection>,
    product: Vec<Selection>,
    frequency: Frequency,
    tradeflow: TradeFlow,
}

impl SlicePlan {
    /// Validate a query and compute its slices.
    ///
    /// # Errors
    /// - [`SliceError::MultipleWildcards`] if more than one of
    ///   reporter/partner/period is `all`
    /// - [`SliceError::EmptySelection`] if a field has no codes
    /// - [`SliceError::HumanReadableMultiCall`] if human-readable output needs
    ///   several calls and that was not allowed
    pub fn new(params: &QueryParameters, options: SliceOptions) -> Result<Self, SliceError> {
        let wildcards: Vec<&'static str> = [
            ("reporter", &params.reporter),
            ("partner", &params.partner),
            ("period", &params.period),
        ]
        .into_iter()
        .filter(|(_, selection)| selection.is_all())
        .map(|(name, _)| name)
        .collect();

        if wildcards.len() > 1 {
            return Err(SliceError::MultipleWildcards(wildcards));
        }

        for (name, selection) in [
            ("reporter", &params.reporter),
            ("partner", &params.partner),
            ("period", &params.period),
            ("product", &params.product),
        ] {
            if selection.is_empty() {
                return Err(SliceError::EmptySelection(name));
            }
        }

        let plan = Self {
            reporter: params.reporter.chunks(MAX_REPORTERS),
            partner: params.partner.chunks(MAX_PARTNERS),
            period: params.period.chunks(MAX_PERIODS),
            product: params.product.chunks(MAX_PRODUCTS),
            frequency: params.frequency,
            tradeflow: params.tradeflow,
        };

        if params.output_mode == OutputMode::HumanReadable
            && plan.len() > 1
            && !options.allow_human_readable_multi_call
        {
            return Err(SliceError::HumanReadableMultiCall { calls: plan.len() });
        }

        Ok(plan)
    }

    /// Number of slices (API calls needed without retries)
    pub fn len(&self) -> usize {
        self.reporter.len() * self.partner.len() * self.period.len() * self.product.len()
    }

    /// Whether the plan has no slices
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chunk counts per field: (reporter, partner, period, product)
    pub fn chunk_counts(&self) -> (usize, usize, usize, usize) {
        (
            self.reporter.len(),
            self.partner.len(),
            self.period.len(),
            self.product.len(),
        )
    }

    /// Slice at `index`, decoding the index reporter-outermost
    pub fn get(&self, index: usize) -> Option<RequestSlice> {
        if index >= self.len() {
            return None;
        }

        let product = index % self.product.len();
        let rest = index / self.product.len();
        let period = rest % self.period.len();
        let rest = rest / self.period.len();
        let partner = rest % self.partner.len();
        let reporter = rest / self.partner.len();

        Some(RequestSlice {
            index,
            reporter: self.reporter[reporter].clone(),
            partner: self.partner[partner].clone(),
            period: self.period[period].clone(),
            product: self.product[product].clone(),
            frequency: self.frequency,
            tradeflow: self.tradeflow,
        })
    }

    /// Iterate the slices in order; may be called any number of times
    pub fn iter(&self) -> SliceIter<'_> {
        SliceIter {
            plan: self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &'a SlicePlan {
    type Item = RequestSlice;
    type IntoIter = SliceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`SlicePlan`]
#[derive(Debug, Clone)]
pub struct SliceIter<'a> {
    plan: &'a SlicePlan,
    next: usize,
}

impl Iterator for SliceIter<'_> {
    type Item = RequestSlice;

    fn next(&mut self) -> Option<Self::Item> {
        let slice = self.plan.get(self.next)?;
        self.next += 1;
        Some(slice)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SliceIter<'_> {}
