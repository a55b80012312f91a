#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the police log server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the record types to allow independent evolution of the API
//! contract.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use police_log_analytics_models::{QueryId, QueryResult};
use police_log_stop_models::{
    AgeRange, DEFAULT_DRIVER_AGE, DriverGender, FilterOptions, InvalidStopError, MAX_DRIVER_AGE,
    StopFilter, StopOutcome, StopRecord, VIOLATION_SUGGESTIONS,
};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Active record store backend (`file` or `database`).
    pub backend: String,
}

/// A traffic stop as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStop {
    pub country_name: String,
    pub driver_gender: DriverGender,
    pub driver_age: u8,
    pub driver_race: String,
    pub violation: String,
    pub search_conducted: bool,
    pub search_type: Option<String>,
    pub stop_outcome: StopOutcome,
    pub is_arrested: bool,
    pub stop_duration: String,
    pub drugs_related_stop: bool,
    pub vehicle_number: String,
    pub stop_datetime: NaiveDateTime,
}

impl From<StopRecord> for ApiStop {
    fn from(record: StopRecord) -> Self {
        Self {
            country_name: record.country_name,
            driver_gender: record.driver_gender,
            driver_age: record.driver_age,
            driver_race: record.driver_race,
            violation: record.violation,
            search_conducted: record.search_conducted,
            search_type: record.search_type,
            stop_outcome: record.stop_outcome,
            is_arrested: record.is_arrested,
            stop_duration: record.stop_duration,
            drugs_related_stop: record.drugs_related_stop,
            vehicle_number: record.vehicle_number,
            stop_datetime: record.stop_datetime,
        }
    }
}

/// Sidebar filter parameters shared by the stops and query endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopQueryParams {
    /// Comma-separated list of countries to include.
    pub countries: Option<String>,
    /// Comma-separated list of genders to include.
    pub genders: Option<String>,
    /// Youngest driver age to include.
    pub age_min: Option<u8>,
    /// Oldest driver age to include.
    pub age_max: Option<u8>,
    /// Maximum number of stops to return.
    pub limit: Option<usize>,
}

impl StopQueryParams {
    /// Builds the record filter. A missing age bound falls back to the full
    /// range.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStopError::InvalidField`] if a listed gender is not
    /// recognized.
    pub fn to_filter(&self) -> Result<StopFilter, InvalidStopError> {
        let defaults = AgeRange::default();

        Ok(StopFilter {
            countries: self
                .countries
                .as_deref()
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            genders: self
                .genders
                .as_deref()
                .map(parse_genders)
                .transpose()?
                .unwrap_or_default(),
            age_range: AgeRange::new(
                self.age_min.unwrap_or(defaults.min),
                self.age_max.unwrap_or(defaults.max),
            ),
        })
    }
}

fn parse_genders(list: &str) -> Result<BTreeSet<DriverGender>, InvalidStopError> {
    list.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(|g| {
            g.parse().map_err(|_| InvalidStopError::InvalidField {
                field: "gender",
                value: g.to_string(),
            })
        })
        .collect()
}

/// Filtered stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopsResponse {
    /// Number of stops matching the filter.
    pub count: usize,
    /// Matching stops, possibly truncated by `limit`.
    pub stops: Vec<ApiStop>,
    /// Inline store error; `stops` is empty when set.
    pub error: Option<String>,
}

/// Sidebar widget options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFilterOptions {
    pub countries: Vec<String>,
    pub genders: Vec<DriverGender>,
    pub age_min: u8,
    pub age_max: u8,
    /// Inline store error; options are empty when set.
    pub error: Option<String>,
}

impl ApiFilterOptions {
    #[must_use]
    pub fn new(options: FilterOptions, error: Option<String>) -> Self {
        Self {
            countries: options.countries,
            genders: options.genders,
            age_min: options.age_min,
            age_max: options.age_max,
            error,
        }
    }
}

/// Choices offered by the new-stop form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFormOptions {
    pub genders: Vec<DriverGender>,
    pub violations: Vec<String>,
    pub outcomes: Vec<StopOutcome>,
    pub default_age: u8,
    pub max_age: u8,
}

impl Default for ApiFormOptions {
    fn default() -> Self {
        Self {
            genders: DriverGender::all().to_vec(),
            violations: VIOLATION_SUGGESTIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            outcomes: StopOutcome::all().to_vec(),
            default_age: DEFAULT_DRIVER_AGE,
            max_age: MAX_DRIVER_AGE,
        }
    }
}

/// Response to a form submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitStopResponse {
    pub stop: ApiStop,
    /// One-paragraph summary of the stop.
    pub narrative: String,
}

/// One entry of the query selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiQuerySummary {
    pub id: QueryId,
    pub title: String,
}

impl From<QueryId> for ApiQuerySummary {
    fn from(id: QueryId) -> Self {
        Self {
            id,
            title: id.title().to_string(),
        }
    }
}

/// Result of running a catalog query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRunResponse {
    /// `None` when the query failed.
    pub result: Option<QueryResult>,
    /// Inline error message.
    pub error: Option<String>,
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
