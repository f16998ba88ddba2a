//! Carbon emission report query payloads
//!
//! Typed request and response bodies for the `carbonEmissionReports`
//! endpoint. Optional fields are omitted from the wire when unset.

use super::filter::FilterTree;
use crate::azure::scope::Scope;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Rows per page requested from the emissions endpoint
pub const DEFAULT_PAGE_SIZE: u32 = 10;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reporting period of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    /// One calendar month, stored as its first day
    Month(NaiveDate),
    /// Explicit inclusive range
    Custom { from: NaiveDate, to: NaiveDate },
}

impl Timeframe {
    /// `None` for an invalid year/month pair
    pub fn month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Timeframe::Month)
    }

    /// `None` when `from` is after `to`
    pub fn custom(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        (from <= to).then_some(Timeframe::Custom { from, to })
    }

    /// The calendar month before the one containing `today`
    pub fn previous_month(today: NaiveDate) -> Self {
        let (year, month) = match today.month() {
            1 => (today.year() - 1, 12),
            m => (today.year(), m - 1),
        };
        // Day 1 exists in every month
        Timeframe::Month(NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today))
    }

    fn date_range(&self) -> DateRange {
        let (start, end) = match self {
            Timeframe::Month(first) => (*first, *first),
            Timeframe::Custom { from, to } => (*from, *to),
        };

        DateRange {
            start: start.format(DATE_FORMAT).to_string(),
            end: end.format(DATE_FORMAT).to_string(),
        }
    }
}

/// Emission scope categories of the GHG protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmissionScope {
    /// Direct emissions
    Scope1,
    /// Indirect, from purchased energy
    Scope2,
    /// Other indirect emissions
    Scope3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Body of a `carbonEmissionReports` query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionsRequest {
    pub carbon_scope_list: Vec<EmissionScope>,
    pub category_type: String,
    pub date_range: DateRange,
    pub order_by: String,
    pub page_size: u32,
    pub report_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_url_list: Option<Vec<String>>,
    pub sort_direction: String,
    pub subscription_list: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterTree>,
}

impl EmissionsRequest {
    /// Per-resource report over all three emission scopes, smallest emitters first
    pub fn build(
        scope: &Scope,
        subscription_ids: &[String],
        timeframe: &Timeframe,
        page_size: u32,
        filter: Option<FilterTree>,
    ) -> Self {
        Self {
            carbon_scope_list: vec![
                EmissionScope::Scope1,
                EmissionScope::Scope2,
                EmissionScope::Scope3,
            ],
            category_type: "Resource".to_string(),
            date_range: timeframe.date_range(),
            order_by: "TotalCarbonEmission".to_string(),
            page_size,
            report_type: "ItemDetailsReport".to_string(),
            resource_group_url_list: scope
                .resource_group_name()
                .map(|_| vec![scope.path()]),
            sort_direction: "Asc".to_string(),
            subscription_list: subscription_ids.to_vec(),
            skip_token: None,
            filter,
        }
    }

    /// Same query, continued from a previous page
    pub fn with_skip_token(mut self, skip_token: Option<String>) -> Self {
        self.skip_token = skip_token;
        self
    }
}

/// One row of the per-resource emission report
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionRecord {
    pub subscription_id: String,
    pub resource_id: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub resource_group: String,
    pub total_carbon_emission: f64,
}

/// One page of emission report results
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionsPage {
    #[serde(default)]
    pub skip_token: Option<String>,
    #[serde(default)]
    pub value: Vec<EmissionRecord>,
}

impl EmissionsPage {
    /// Continuation token, treating an empty string as the last page
    pub fn continuation(&self) -> Option<&str> {
        self.skip_token.as_deref().filter(|t| !t.is_empty())
    }
}
