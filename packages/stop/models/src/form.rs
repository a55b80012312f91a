//! The "Add New Police Log" form and its confirmation narrative.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{DriverGender, InvalidStopError, MAX_DRIVER_AGE, StopOutcome, StopRecord, UNKNOWN_RACE};

/// Field values collected by the new-stop form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStopForm {
    /// Country name (free text).
    pub country_name: String,
    /// Driver gender.
    pub driver_gender: DriverGender,
    /// Driver age, bounded by the form control to `0..=MAX_DRIVER_AGE`.
    pub driver_age: u8,
    /// Violation, usually one of [`crate::VIOLATION_SUGGESTIONS`].
    pub violation: String,
    /// Whether a search was conducted.
    #[serde(default)]
    pub search_conducted: bool,
    /// Search type, empty when none.
    #[serde(default)]
    pub search_type: String,
    /// Stop outcome.
    pub stop_outcome: StopOutcome,
    /// Whether the driver was arrested.
    #[serde(default)]
    pub is_arrested: bool,
    /// Duration text such as `"6-15 minutes"`.
    #[serde(default)]
    pub stop_duration: String,
    /// Whether the stop was drug related.
    #[serde(default)]
    pub drugs_related_stop: bool,
    /// Vehicle plate number.
    #[serde(default)]
    pub vehicle_number: String,
    /// Date of the stop.
    pub stop_date: NaiveDate,
    /// Time of day of the stop.
    pub stop_time: NaiveTime,
}

impl NewStopForm {
    /// Builds the record to append.
    ///
    /// Race is recorded as [`UNKNOWN_RACE`] and the selected violation is also
    /// kept as the raw violation.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStopError::AgeOutOfRange`] if the age exceeds
    /// [`MAX_DRIVER_AGE`].
    pub fn to_record(&self) -> Result<StopRecord, InvalidStopError> {
        if self.driver_age > MAX_DRIVER_AGE {
            return Err(InvalidStopError::AgeOutOfRange {
                age: u32::from(self.driver_age),
            });
        }

        let search_type = self.search_type.trim();

        Ok(StopRecord {
            country_name: self.country_name.trim().to_string(),
            driver_gender: self.driver_gender,
            driver_age: self.driver_age,
            driver_age_raw: None,
            driver_race: UNKNOWN_RACE.to_string(),
            violation_raw: Some(self.violation.clone()),
            violation: self.violation.clone(),
            search_conducted: self.search_conducted,
            search_type: (!search_type.is_empty()).then(|| search_type.to_string()),
            stop_outcome: self.stop_outcome,
            is_arrested: self.is_arrested,
            stop_duration: self.stop_duration.trim().to_string(),
            drugs_related_stop: self.drugs_related_stop,
            vehicle_number: self.vehicle_number.trim().to_string(),
            stop_datetime: self.stop_date.and_time(self.stop_time),
        })
    }

    /// One-paragraph summary of the submitted stop shown after submission.
    #[must_use]
    pub fn narrative(&self) -> String {
        let at = self.stop_date.and_time(self.stop_time).format("%I:%M %p");
        let search = if self.search_conducted {
            "A search was conducted"
        } else {
            "No search was conducted"
        };
        let duration = if self.stop_duration.trim().is_empty() {
            "N/A"
        } else {
            self.stop_duration.trim()
        };
        let drugs = if self.drugs_related_stop {
            "was"
        } else {
            "was not"
        };

        format!(
            "A {age}-year-old {gender} driver was stopped for {violation} at {at}. \
             {search}, and they received a {outcome}. \
             The stop lasted {duration} and {drugs} drug-related.",
            age = self.driver_age,
            gender = self.driver_gender.as_ref().to_lowercase(),
            violation = self.violation,
            outcome = self.stop_outcome.as_ref().to_lowercase(),
        )
    }
}
