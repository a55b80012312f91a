#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Traffic-stop record types shared across the police log workspace.
//!
//! A [`StopRecord`] is one row of the police log: a single flat fact with no
//! identity beyond its position in the store. Records only ever grow by
//! append, either from a bulk dataset load or from a [`NewStopForm`]
//! submission.

pub mod filter;
pub mod form;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use filter::{AgeRange, FilterOptions, StopFilter};
pub use form::NewStopForm;

/// Highest driver age accepted by the form and by [`StopRecord::validate`].
pub const MAX_DRIVER_AGE: u8 = 120;

/// Age pre-filled in the new-stop form.
pub const DEFAULT_DRIVER_AGE: u8 = 27;

/// Race recorded for stops entered through the form.
pub const UNKNOWN_RACE: &str = "Unknown";

/// Violations offered as suggestions by the new-stop form.
pub const VIOLATION_SUGGESTIONS: &[&str] = &["Speeding", "DUI", "Equipment", "Other"];

/// Text layout of `stop_datetime` when persisted.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Gender of the stopped driver.
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
#[strum(ascii_case_insensitive)]
pub enum DriverGender {
    /// Recorded as `Male` (or `M` in the bulk dataset).
    #[strum(to_string = "Male", serialize = "M")]
    #[serde(alias = "M")]
    Male,
    /// Recorded as `Female` (or `F` in the bulk dataset).
    #[strum(to_string = "Female", serialize = "F")]
    #[serde(alias = "F")]
    Female,
    /// Any other recorded gender.
    Other,
}

impl DriverGender {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Male, Self::Female, Self::Other]
    }
}

/// How a stop ended.
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
#[strum(ascii_case_insensitive)]
pub enum StopOutcome {
    /// A citation (ticket) was issued.
    #[strum(to_string = "Citation", serialize = "Ticket")]
    #[serde(alias = "Ticket")]
    Citation,
    /// The driver was let go with a warning.
    Warning,
    /// The stop ended in an arrest.
    #[strum(
        to_string = "Arrest",
        serialize = "Arrest Driver",
        serialize = "Arrest Passenger"
    )]
    #[serde(alias = "Arrest Driver", alias = "Arrest Passenger")]
    Arrest,
}

impl StopOutcome {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Citation, Self::Warning, Self::Arrest]
    }
}

/// One traffic stop observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    /// Country the stop happened in.
    pub country_name: String,
    /// Driver gender.
    pub driver_gender: DriverGender,
    /// Driver age in years, `0..=MAX_DRIVER_AGE`.
    pub driver_age: u8,
    /// Age exactly as it appeared in the source data, if kept.
    #[serde(default)]
    pub driver_age_raw: Option<String>,
    /// Driver race, [`UNKNOWN_RACE`] when unspecified.
    pub driver_race: String,
    /// Violation exactly as entered, if kept.
    #[serde(default)]
    pub violation_raw: Option<String>,
    /// Normalized violation.
    pub violation: String,
    /// Whether the vehicle or driver was searched.
    pub search_conducted: bool,
    /// Kind of search, if any.
    #[serde(default)]
    pub search_type: Option<String>,
    /// How the stop ended.
    pub stop_outcome: StopOutcome,
    /// Whether the driver was arrested.
    pub is_arrested: bool,
    /// Free-form duration range such as `"6-15 minutes"`.
    pub stop_duration: String,
    /// Whether the stop was drug related.
    pub drugs_related_stop: bool,
    /// Vehicle plate number.
    pub vehicle_number: String,
    /// Date and time of the stop.
    pub stop_datetime: NaiveDateTime,
}

impl StopRecord {
    /// Checks the record invariants.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStopError::AgeOutOfRange`] if the driver age exceeds
    /// [`MAX_DRIVER_AGE`].
    pub const fn validate(&self) -> Result<(), InvalidStopError> {
        if self.driver_age > MAX_DRIVER_AGE {
            return Err(InvalidStopError::AgeOutOfRange {
                age: self.driver_age as u32,
            });
        }
        Ok(())
    }

    /// Returns `stop_datetime` in its persisted text layout.
    #[must_use]
    pub fn stop_datetime_text(&self) -> String {
        self.stop_datetime.format(DATETIME_FORMAT).to_string()
    }
}

/// Errors raised when building or validating a [`StopRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidStopError {
    /// Driver age outside `0..=MAX_DRIVER_AGE`.
    #[error("driver age {age} out of range: expected 0-120")]
    AgeOutOfRange {
        /// The rejected age.
        age: u32,
    },

    /// A field value could not be interpreted.
    #[error("invalid {field}: {value:?}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Parses a stored timestamp, accepting `YYYY-MM-DD HH:MM[:SS]` with either a
/// space or a `T` separator, and a bare date (midnight).
#[must_use]
pub fn parse_stop_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_parses_dataset_and_form_spellings() {
        assert_eq!("M".parse::<DriverGender>().unwrap(), DriverGender::Male);
        assert_eq!("female".parse::<DriverGender>().unwrap(), DriverGender::Female);
        assert_eq!("Other".parse::<DriverGender>().unwrap(), DriverGender::Other);
        assert!("X".parse::<DriverGender>().is_err());
        assert_eq!(DriverGender::Male.to_string(), "Male");
        assert_eq!(DriverGender::Female.as_ref(), "Female");
    }

    #[test]
    fn outcome_parses_aliases() {
        assert_eq!("Ticket".parse::<StopOutcome>().unwrap(), StopOutcome::Citation);
        assert_eq!(
            "arrest driver".parse::<StopOutcome>().unwrap(),
            StopOutcome::Arrest
        );
        assert_eq!(StopOutcome::Arrest.to_string(), "Arrest");
    }

    #[test]
    fn validate_rejects_ages_over_limit() {
        let mut record = test_support::record("India", DriverGender::Male, 40);
        assert!(record.validate().is_ok());
        record.driver_age = 121;
        assert_eq!(
            record.validate(),
            Err(InvalidStopError::AgeOutOfRange { age: 121 })
        );
    }

    #[test]
    fn parses_stop_datetime_layouts() {
        let expected = parse_stop_datetime("2021-03-04 05:06:07").unwrap();
        assert_eq!(expected.to_string(), "2021-03-04 05:06:07");
        assert_eq!(parse_stop_datetime("2021-03-04T05:06:07"), Some(expected));
        assert_eq!(
            parse_stop_datetime("2021-03-04 05:06").unwrap().to_string(),
            "2021-03-04 05:06:00"
        );
        assert_eq!(
            parse_stop_datetime("2021-03-04").unwrap().to_string(),
            "2021-03-04 00:00:00"
        );
        assert!(parse_stop_datetime("yesterday").is_none());
    }

    #[test]
    fn datetime_text_round_trips() {
        let record = test_support::record("India", DriverGender::Male, 40);
        assert_eq!(record.stop_datetime_text(), "2020-01-01 10:00:00");
        assert_eq!(
            parse_stop_datetime(&record.stop_datetime_text()),
            Some(record.stop_datetime)
        );
    }
}
