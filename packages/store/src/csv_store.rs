//! File-backed record store.
//!
//! The CSV dataset is read once when the store opens. Appends land in the
//! in-memory working copy only and are visible for the rest of the session;
//! the source file is never rewritten.

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use police_log_stop_models::{
    DriverGender, StopOutcome, StopRecord, UNKNOWN_RACE, parse_stop_datetime,
};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{RecordStore, StoreBackend, StoreError};

/// CSV-backed working copy of the stop records.
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    records: RwLock<Vec<StopRecord>>,
}

impl CsvStore {
    /// Reads every parsable row of the CSV file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Csv`] if the file cannot be opened or its header
    /// cannot be read.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = std::fs::File::open(path).map_err(|e| StoreError::Csv {
            path: path.display().to_string(),
            source: e.into(),
        })?;
        let records = read_records(file).map_err(|e| StoreError::Csv {
            path: path.display().to_string(),
            source: e,
        })?;

        log::info!("Loaded {} stop records from {}", records.len(), path.display());

        Ok(Self::from_records(path, records))
    }

    /// Wraps already-loaded records.
    #[must_use]
    pub fn from_records(path: &Path, records: Vec<StopRecord>) -> Self {
        Self {
            path: path.to_path_buf(),
            records: RwLock::new(records),
        }
    }

    /// Path of the source dataset.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the working copy.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the working copy holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for CsvStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::File
    }

    async fn load_all(&self) -> Result<Vec<StopRecord>, StoreError> {
        Ok(self.records.read().await.clone())
    }

    async fn append(&self, record: StopRecord) -> Result<(), StoreError> {
        record.validate()?;
        self.records.write().await.push(record);
        log::debug!("Appended stop record to session copy of {}", self.path.display());
        Ok(())
    }
}

/// Parses stop records from CSV text with a header row.
///
/// Rows that cannot be interpreted, or whose driver age is out of range, are
/// skipped with a trace log.
///
/// # Errors
///
/// Returns [`csv::Error`] if the header row cannot be read.
pub fn read_records(reader: impl Read) -> Result<Vec<StopRecord>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    csv_reader.headers()?;

    let mut records = Vec::new();
    let mut skipped = 0u64;

    for (line, result) in csv_reader.deserialize::<CsvStopRow>().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::trace!("  skipping malformed row {}: {e}", line + 2);
                skipped += 1;
                continue;
            }
        };

        if let Some(record) = row.to_record() {
            records.push(record);
        } else {
            log::trace!("  skipping uninterpretable row {}", line + 2);
            skipped += 1;
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} unreadable stop rows");
    }

    Ok(records)
}

/// One row of the stop dataset as it appears on disk.
///
/// The timestamp comes either from a combined `stop_datetime` column or from
/// separate `stop_date` and `stop_time` columns.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvStopRow {
    country_name: Option<String>,
    driver_gender: Option<String>,
    driver_age: Option<String>,
    driver_age_raw: Option<String>,
    driver_race: Option<String>,
    violation_raw: Option<String>,
    violation: Option<String>,
    search_conducted: Option<String>,
    search_type: Option<String>,
    stop_outcome: Option<String>,
    is_arrested: Option<String>,
    stop_duration: Option<String>,
    drugs_related_stop: Option<String>,
    vehicle_number: Option<String>,
    stop_datetime: Option<String>,
    stop_date: Option<String>,
    stop_time: Option<String>,
}

impl CsvStopRow {
    fn to_record(&self) -> Option<StopRecord> {
        let driver_gender: DriverGender = non_empty(self.driver_gender.as_deref())?.parse().ok()?;
        let stop_outcome: StopOutcome = non_empty(self.stop_outcome.as_deref())?.parse().ok()?;
        let driver_age = parse_age(non_empty(self.driver_age.as_deref())?)?;
        let stop_datetime = self.stop_datetime()?;

        let record = StopRecord {
            country_name: non_empty(self.country_name.as_deref())?.to_string(),
            driver_gender,
            driver_age,
            driver_age_raw: non_empty(self.driver_age_raw.as_deref()).map(str::to_string),
            driver_race: non_empty(self.driver_race.as_deref())
                .unwrap_or(UNKNOWN_RACE)
                .to_string(),
            violation_raw: non_empty(self.violation_raw.as_deref()).map(str::to_string),
            violation: non_empty(self.violation.as_deref())?.to_string(),
            search_conducted: parse_flag(self.search_conducted.as_deref())?,
            search_type: non_empty(self.search_type.as_deref()).map(str::to_string),
            stop_outcome,
            is_arrested: parse_flag(self.is_arrested.as_deref())?,
            stop_duration: non_empty(self.stop_duration.as_deref())
                .unwrap_or_default()
                .to_string(),
            drugs_related_stop: parse_flag(self.drugs_related_stop.as_deref())?,
            vehicle_number: non_empty(self.vehicle_number.as_deref())
                .unwrap_or_default()
                .to_string(),
            stop_datetime,
        };
        record.validate().ok()?;
        Some(record)
    }

    fn stop_datetime(&self) -> Option<chrono::NaiveDateTime> {
        if let Some(combined) = non_empty(self.stop_datetime.as_deref()) {
            return parse_stop_datetime(combined);
        }
        let date = non_empty(self.stop_date.as_deref())?;
        let time = non_empty(self.stop_time.as_deref()).unwrap_or("00:00:00");
        parse_stop_datetime(&format!("{date} {time}"))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parses an age written as an integer or a float (`"22"`, `"22.0"`).
fn parse_age(s: &str) -> Option<u8> {
    if let Ok(age) = s.parse::<u8>() {
        return Some(age);
    }
    let age = s.parse::<f64>().ok()?;
    if age.is_finite() && (0.0..=255.0).contains(&age) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(age.round() as u8)
    } else {
        None
    }
}

/// Parses a boolean cell. Empty cells count as `false`.
fn parse_flag(value: Option<&str>) -> Option<bool> {
    let Some(v) = non_empty(value) else {
        return Some(false);
    };
    match v.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "0.0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use police_log_stop_models::{MAX_DRIVER_AGE, StopFilter};

    use super::*;

    const SAMPLE: &str = "\
country_name,driver_gender,driver_age,driver_race,violation,search_conducted,search_type,stop_outcome,is_arrested,stop_duration,drugs_related_stop,vehicle_number,stop_datetime
Canada,M,22,Asian,Speeding,False,,Citation,False,0-15 Min,False,TN12AB3456,2020-01-01 09:15:00
India,F,30.0,White,DUI,True,Vehicle Search,Arrest,True,16-30 Min,True,KA01ZZ0001,2020-01-02T22:40:00
USA,X,41,Black,Equipment,0,,Warning,0,30+ Min,0,MH02CD7777,2020-01-03 03:00:00
USA,Female,,Hispanic,Other,0,,Warning,0,30+ Min,0,MH02CD7778,2020-01-03 03:00:00
USA,Male,150,White,Speeding,0,,Warning,0,0-15 Min,0,MH02CD7779,2020-01-04 08:00:00
";

    #[test]
    fn reads_rows_and_skips_unparsable_ones() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.driver_age <= MAX_DRIVER_AGE));

        let first = &records[0];
        assert_eq!(first.country_name, "Canada");
        assert_eq!(first.driver_gender, DriverGender::Male);
        assert!(!first.search_conducted);
        assert_eq!(first.search_type, None);

        let second = &records[1];
        assert_eq!(second.driver_age, 30);
        assert!(second.is_arrested);
        assert!(second.drugs_related_stop);
        assert_eq!(second.search_type.as_deref(), Some("Vehicle Search"));
        assert_eq!(second.stop_datetime.to_string(), "2020-01-02 22:40:00");
    }

    #[test]
    fn combines_separate_date_and_time_columns() {
        let csv = "\
country_name,driver_gender,driver_age,violation,stop_outcome,stop_date,stop_time
Canada,Male,50,Speeding,Warning,2019-07-04,18:05
";
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stop_datetime.to_string(), "2019-07-04 18:05:00");
        assert_eq!(records[0].driver_race, UNKNOWN_RACE);
    }

    #[test]
    fn parses_flags() {
        assert_eq!(parse_flag(Some("True")), Some(true));
        assert_eq!(parse_flag(Some("0")), Some(false));
        assert_eq!(parse_flag(None), Some(false));
        assert_eq!(parse_flag(Some("maybe")), None);
    }

    #[tokio::test]
    async fn appends_stay_in_session_copy() {
        let dir =
            std::env::temp_dir().join(format!("police_log_csv_store_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stops.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let store = CsvStore::open(&path).unwrap();
        assert_eq!(store.len().await, 2);

        let mut extra = store.load_all().await.unwrap()[0].clone();
        extra.vehicle_number = "NEW0001".to_string();
        store.append(extra.clone()).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.last(), Some(&extra));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE);

        let canada = store
            .load_filtered(&StopFilter {
                countries: ["Canada".to_string()].into_iter().collect(),
                ..StopFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(canada.len(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn rejects_invalid_append() {
        let store = CsvStore::from_records(Path::new("unused.csv"), Vec::new());
        let mut record = read_records(SAMPLE.as_bytes()).unwrap().remove(0);
        record.driver_age = 200;
        assert!(matches!(
            store.append(record).await,
            Err(StoreError::Invalid(_))
        ));
        assert!(store.is_empty().await);
    }

    #[test]
    fn missing_file_is_a_csv_error() {
        let err = CsvStore::open(Path::new("/nonexistent/stops.csv")).unwrap_err();
        assert!(matches!(err, StoreError::Csv { .. }));
    }
}
