//! Sidebar filter predicates over [`StopRecord`]s.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{DriverGender, MAX_DRIVER_AGE, StopRecord};

/// Inclusive driver-age bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    /// Lowest accepted age.
    pub min: u8,
    /// Highest accepted age.
    pub max: u8,
}

impl AgeRange {
    /// Creates a range, swapping the bounds if they are given in reverse.
    #[must_use]
    pub const fn new(min: u8, max: u8) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Whether `age` lies inside the range.
    #[must_use]
    pub const fn contains(self, age: u8) -> bool {
        age >= self.min && age <= self.max
    }
}

impl Default for AgeRange {
    fn default() -> Self {
        Self {
            min: 0,
            max: MAX_DRIVER_AGE,
        }
    }
}

/// Country / gender / age restriction applied before every query.
///
/// An empty country or gender set places no restriction on that dimension.
/// The age range always applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopFilter {
    /// Countries to keep; empty keeps all.
    pub countries: BTreeSet<String>,
    /// Genders to keep; empty keeps all.
    pub genders: BTreeSet<DriverGender>,
    /// Inclusive age bounds.
    pub age_range: AgeRange,
}

impl StopFilter {
    /// Whether `record` passes every active restriction.
    #[must_use]
    pub fn matches(&self, record: &StopRecord) -> bool {
        (self.countries.is_empty() || self.countries.contains(&record.country_name))
            && (self.genders.is_empty() || self.genders.contains(&record.driver_gender))
            && self.age_range.contains(record.driver_age)
    }

    /// Whether the filter only restricts by the default full age range.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.countries.is_empty()
            && self.genders.is_empty()
            && self.age_range == AgeRange::default()
    }
}

/// Returns the records that pass `filter`, in their original order.
#[must_use]
pub fn apply(records: &[StopRecord], filter: &StopFilter) -> Vec<StopRecord> {
    records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect()
}

/// Options offered by the sidebar filter widgets for a record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Distinct countries, sorted.
    pub countries: Vec<String>,
    /// Distinct genders present, sorted.
    pub genders: Vec<DriverGender>,
    /// Youngest driver in the set.
    pub age_min: u8,
    /// Oldest driver in the set.
    pub age_max: u8,
}

impl FilterOptions {
    /// Collects widget options from `records`. An empty set yields the full
    /// default age range.
    #[must_use]
    pub fn from_records(records: &[StopRecord]) -> Self {
        let countries: BTreeSet<&str> = records.iter().map(|r| r.country_name.as_str()).collect();
        let genders: BTreeSet<DriverGender> = records.iter().map(|r| r.driver_gender).collect();
        let defaults = AgeRange::default();

        Self {
            countries: countries.into_iter().map(str::to_string).collect(),
            genders: genders.into_iter().collect(),
            age_min: records
                .iter()
                .map(|r| r.driver_age)
                .min()
                .unwrap_or(defaults.min),
            age_max: records
                .iter()
                .map(|r| r.driver_age)
                .max()
                .unwrap_or(defaults.max),
        }
    }
}
