#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query catalog identifiers and result types.
//!
//! Every catalog query produces a [`QueryResult`]: either a scalar or a
//! [`ResultTable`] of typed [`Cell`]s, plus an optional [`ChartSeries`] for
//! the bar chart shown next to the table.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Stable identifier of a catalog query.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum QueryId {
    TopDrugVehicles,
    MostSearchedVehicles,
    AgeGroupArrestRate,
    GenderByCountry,
    RaceGenderSearchRate,
    StopsByHour,
    AvgDurationByViolation,
    NightArrestRate,
    ViolationsSearchArrest,
    YoungDriverViolations,
    RarelySearchedViolations,
    DrugStopCountries,
    ArrestRateByCountryViolation,
    SearchedStopCountries,
    YearlyStopsByCountry,
    ViolationTrendsByAgeRace,
    TimePeriodBreakdown,
    HighSearchArrestViolations,
    DemographicsByCountry,
    TopViolationsByArrestRate,
}

impl QueryId {
    /// Returns all variants of this enum, in catalog order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::TopDrugVehicles,
            Self::MostSearchedVehicles,
            Self::AgeGroupArrestRate,
            Self::GenderByCountry,
            Self::RaceGenderSearchRate,
            Self::StopsByHour,
            Self::AvgDurationByViolation,
            Self::NightArrestRate,
            Self::ViolationsSearchArrest,
            Self::YoungDriverViolations,
            Self::RarelySearchedViolations,
            Self::DrugStopCountries,
            Self::ArrestRateByCountryViolation,
            Self::SearchedStopCountries,
            Self::YearlyStopsByCountry,
            Self::ViolationTrendsByAgeRace,
            Self::TimePeriodBreakdown,
            Self::HighSearchArrestViolations,
            Self::DemographicsByCountry,
            Self::TopViolationsByArrestRate,
        ]
    }

    /// Human-readable name shown in the query selector.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::TopDrugVehicles => "Top 10 vehicles involved in drug-related stops",
            Self::MostSearchedVehicles => "Vehicles most frequently searched",
            Self::AgeGroupArrestRate => "Driver age group with highest arrest rate",
            Self::GenderByCountry => "Gender distribution of drivers stopped in each country",
            Self::RaceGenderSearchRate => "Race and gender combination with highest search rate",
            Self::StopsByHour => "Time of day with most traffic stops",
            Self::AvgDurationByViolation => "Average stop duration for different violations",
            Self::NightArrestRate => "Are stops during the night more likely to lead to arrests?",
            Self::ViolationsSearchArrest => "Violations most associated with searches or arrests",
            Self::YoungDriverViolations => "Violations most common among younger drivers (<25)",
            Self::RarelySearchedViolations => "Violations that rarely result in search or arrest",
            Self::DrugStopCountries => "Countries with highest rate of drug-related stops",
            Self::ArrestRateByCountryViolation => "Arrest rate by country and violation",
            Self::SearchedStopCountries => "Country with most stops with search conducted",
            Self::YearlyStopsByCountry => "Yearly breakdown of stops and arrests by country",
            Self::ViolationTrendsByAgeRace => "Driver violation trends by age and race",
            Self::TimePeriodBreakdown => "Time period analysis of stops by year, month and hour",
            Self::HighSearchArrestViolations => "Violations with high search and arrest rates",
            Self::DemographicsByCountry => "Driver demographics by country",
            Self::TopViolationsByArrestRate => "Top 5 violations with highest arrest rates",
        }
    }
}

/// Shape of a query's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputShape {
    /// A single number.
    Scalar,
    /// Groups ordered by one measure.
    RankedList,
    /// Grouped rows with several measures.
    Table,
    /// Two grouping dimensions spread into rows and columns.
    CrossTable,
}

/// Value type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Int,
    Float,
}

/// One result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One result value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Cell {
    /// Numeric value of the cell, if it has one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) | Self::Null => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:.2}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Null => write!(f, "-"),
        }
    }
}

/// Tabular query output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultTable {
    #[must_use]
    pub const fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Position of the column called `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cells of the column called `name`, top to bottom.
    pub fn column_cells<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Cell> + 'a {
        let idx = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What a query returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutput {
    /// A single value; `None` when no record matched.
    Scalar {
        label: String,
        value: Option<f64>,
    },
    /// Rows and columns.
    Table(ResultTable),
}

impl QueryOutput {
    /// Whether there is nothing to show.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        match self {
            Self::Scalar { value, .. } => value.is_none(),
            Self::Table(table) => table.is_empty(),
        }
    }
}

/// One bar of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Bar chart derived from a result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    /// Name of the column(s) the labels come from.
    pub label_column: String,
    /// Name of the plotted column.
    pub value_column: String,
    pub points: Vec<ChartPoint>,
}

/// A catalog query's complete result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: QueryId,
    pub title: String,
    pub shape: OutputShape,
    pub output: QueryOutput,
    /// `None` when the result is a scalar or empty.
    pub chart: Option<ChartSeries>,
}
