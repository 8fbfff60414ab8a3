//! Request-parameter parsing for the claim listing.
//!
//! Every malformed value degrades to "not applied" plus a warning message;
//! nothing in here can fail the request.

use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::pagination::{parse_page, parse_per_page, PageSelector};
use crate::messages::Message;
use crate::store::{ClaimFilter, SortDirection, SortField, SortSpec};
use crate::types::ClaimStatus;

/// Raw listing parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub insurer: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub per_page: Option<String>,
    pub page: Option<String>,
}

/// Trimmed echoes of the submitted filter values, for re-rendering controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedFilters {
    pub search_query: String,
    pub status_filter: String,
    pub insurer_filter: String,
    pub min_amount: String,
    pub max_amount: String,
    pub date_from: String,
    pub date_to: String,
}

/// A fully parsed listing request.
#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub filter: ClaimFilter,
    pub sort: SortSpec,
    pub per_page: u64,
    pub page: PageSelector,
    pub echo: AppliedFilters,
    pub warnings: Vec<Message>,
}

impl ListParams {
    /// Collect raw query pairs. A repeated key keeps its last value; unknown
    /// keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "search" => &mut params.search,
                "status" => &mut params.status,
                "insurer" => &mut params.insurer,
                "min_amount" => &mut params.min_amount,
                "max_amount" => &mut params.max_amount,
                "date_from" => &mut params.date_from,
                "date_to" => &mut params.date_to,
                "sort" => &mut params.sort,
                "direction" => &mut params.direction,
                "per_page" => &mut params.per_page,
                "page" => &mut params.page,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        params
    }
}

fn clean(raw: &Option<String>) -> &str {
    raw.as_deref().map(str::trim).unwrap_or("")
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Parse a billed-amount bound. Non-numeric, non-finite and negative values
/// are rejected with the returned warning text.
fn parse_amount(raw: &str, label: &str) -> Result<Decimal, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("Invalid {} amount format.", label))?;
    if !value.is_finite() {
        return Err(format!("Invalid {} amount format.", label));
    }
    if value < 0.0 {
        return Err(format!("The {} amount cannot be negative.", label));
    }
    // Finite values beyond Decimal's range saturate so the bound still applies.
    Ok(Decimal::from_f64(value).unwrap_or(Decimal::MAX))
}

fn parse_date(raw: &str, label: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format for {}; expected YYYY-MM-DD.", label))
}

/// Resolve sort field and direction. Unknown fields fall back to the default
/// order; a missing or unrecognised direction means descending.
pub fn parse_sort(field: &str, direction: &str) -> SortSpec {
    let Some(field) = SortField::parse(field) else {
        return SortSpec::default();
    };
    let direction = match direction {
        "asc" => SortDirection::Asc,
        _ => SortDirection::Desc,
    };
    SortSpec { field, direction }
}

impl ListingRequest {
    pub fn from_params(params: &ListParams) -> Self {
        let mut filter = ClaimFilter::default();
        let mut warnings = Vec::new();

        let echo = AppliedFilters {
            search_query: clean(&params.search).to_string(),
            status_filter: clean(&params.status).to_string(),
            insurer_filter: clean(&params.insurer).to_string(),
            min_amount: clean(&params.min_amount).to_string(),
            max_amount: clean(&params.max_amount).to_string(),
            date_from: clean(&params.date_from).to_string(),
            date_to: clean(&params.date_to).to_string(),
        };

        filter.search = non_empty(&echo.search_query).map(String::from);
        filter.insurer = non_empty(&echo.insurer_filter).map(String::from);

        if let Some(raw) = non_empty(&echo.status_filter) {
            match raw.parse::<ClaimStatus>() {
                Ok(status) => filter.status = Some(status),
                Err(_) => {
                    filter.match_nothing = true;
                    warnings.push(Message::warning(format!("Unknown status: {}", raw)));
                }
            }
        }

        if let Some(raw) = non_empty(&echo.min_amount) {
            match parse_amount(raw, "minimum") {
                Ok(v) => filter.min_billed = Some(v),
                Err(w) => warnings.push(Message::warning(w)),
            }
        }
        if let Some(raw) = non_empty(&echo.max_amount) {
            match parse_amount(raw, "maximum") {
                Ok(v) => filter.max_billed = Some(v),
                Err(w) => warnings.push(Message::warning(w)),
            }
        }

        if let Some(raw) = non_empty(&echo.date_from) {
            match parse_date(raw, "date_from") {
                Ok(d) => filter.discharged_from = Some(d),
                Err(w) => warnings.push(Message::warning(w)),
            }
        }
        if let Some(raw) = non_empty(&echo.date_to) {
            match parse_date(raw, "date_to") {
                Ok(d) => filter.discharged_to = Some(d),
                Err(w) => warnings.push(Message::warning(w)),
            }
        }

        for w in &warnings {
            warn!(warning = %w.text, "Ignoring listing filter");
        }

        Self {
            filter,
            sort: parse_sort(clean(&params.sort), clean(&params.direction)),
            per_page: parse_per_page(params.per_page.as_deref()),
            page: parse_page(params.page.as_deref()),
            echo,
            warnings,
        }
    }

    pub fn filters_applied(&self) -> bool {
        !self.filter.is_unfiltered()
    }
}
