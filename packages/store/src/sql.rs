//! SQL building blocks shared by the store and the SQL query engine.
//!
//! Booleans are stored as `0`/`1` integers and `stop_datetime` as
//! `YYYY-MM-DD HH:MM:SS` text so the same statements run on `SQLite` and
//! `PostgreSQL`. Parameters use positional `$n` placeholders.

use moosicbox_json_utils::database::ToValue as _;
use police_log_stop_models::{
    DriverGender, StopFilter, StopOutcome, StopRecord, parse_stop_datetime,
};
use switchy_database::{Database, DatabaseValue, Row};

use crate::StoreError;
use crate::db::Dialect;

/// Name of the stop table.
pub const TABLE: &str = "traffic_stops";

/// Persisted columns in insert order.
pub const COLUMNS: &[&str] = &[
    "country_name",
    "driver_gender",
    "driver_age",
    "driver_age_raw",
    "driver_race",
    "violation_raw",
    "violation",
    "search_conducted",
    "search_type",
    "stop_outcome",
    "is_arrested",
    "stop_duration",
    "drugs_related_stop",
    "vehicle_number",
    "stop_datetime",
];

/// Creates the `traffic_stops` table and its indexes if missing.
///
/// # Errors
///
/// Returns [`StoreError`] if a DDL statement fails.
pub async fn ensure_schema(db: &dyn Database, dialect: Dialect) -> Result<(), StoreError> {
    let id_column = match dialect {
        Dialect::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        Dialect::Postgres => "id BIGSERIAL PRIMARY KEY",
    };

    db.exec_raw(&format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (
            {id_column},
            country_name       TEXT NOT NULL,
            driver_gender      TEXT NOT NULL,
            driver_age         INTEGER NOT NULL,
            driver_age_raw     TEXT,
            driver_race        TEXT NOT NULL,
            violation_raw      TEXT,
            violation          TEXT NOT NULL,
            search_conducted   INTEGER NOT NULL DEFAULT 0,
            search_type        TEXT,
            stop_outcome       TEXT NOT NULL,
            is_arrested        INTEGER NOT NULL DEFAULT 0,
            stop_duration      TEXT NOT NULL DEFAULT '',
            drugs_related_stop INTEGER NOT NULL DEFAULT 0,
            vehicle_number     TEXT NOT NULL DEFAULT '',
            stop_datetime      TEXT NOT NULL
        )"
    ))
    .await?;

    db.exec_raw(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{TABLE}_country ON {TABLE} (country_name)"
    ))
    .await?;

    db.exec_raw(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{TABLE}_violation ON {TABLE} (violation)"
    ))
    .await?;

    Ok(())
}

/// Returns the `INSERT` statement for one record.
#[must_use]
pub fn insert_sql() -> String {
    let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {TABLE} ({}) VALUES ({})",
        COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

/// Binds a record's fields in [`COLUMNS`] order.
#[must_use]
pub fn insert_params(record: &StopRecord) -> Vec<DatabaseValue> {
    vec![
        DatabaseValue::String(record.country_name.clone()),
        DatabaseValue::String(record.driver_gender.to_string()),
        DatabaseValue::Int32(i32::from(record.driver_age)),
        optional_text(record.driver_age_raw.as_deref()),
        DatabaseValue::String(record.driver_race.clone()),
        optional_text(record.violation_raw.as_deref()),
        DatabaseValue::String(record.violation.clone()),
        flag(record.search_conducted),
        optional_text(record.search_type.as_deref()),
        DatabaseValue::String(record.stop_outcome.to_string()),
        flag(record.is_arrested),
        DatabaseValue::String(record.stop_duration.clone()),
        flag(record.drugs_related_stop),
        DatabaseValue::String(record.vehicle_number.clone()),
        DatabaseValue::String(record.stop_datetime_text()),
    ]
}

fn optional_text(value: Option<&str>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |v| DatabaseValue::String(v.to_string()))
}

fn flag(value: bool) -> DatabaseValue {
    DatabaseValue::Int32(i32::from(value))
}

/// Converts a `traffic_stops` row back into a record.
///
/// Returns `None` (and logs) when a value cannot be interpreted, so a single
/// bad row never fails a whole read.
#[must_use]
pub fn row_to_record(row: &Row) -> Option<StopRecord> {
    let gender: String = row.to_value("driver_gender").unwrap_or_default();
    let outcome: String = row.to_value("stop_outcome").unwrap_or_default();
    let datetime: String = row.to_value("stop_datetime").unwrap_or_default();
    let age: i64 = row.to_value("driver_age").unwrap_or(-1);

    let (Ok(driver_gender), Ok(stop_outcome), Some(stop_datetime), Ok(driver_age)) = (
        gender.parse::<DriverGender>(),
        outcome.parse::<StopOutcome>(),
        parse_stop_datetime(&datetime),
        u8::try_from(age),
    ) else {
        log::warn!(
            "Skipping unreadable stop row (gender={gender:?}, outcome={outcome:?}, \
             datetime={datetime:?}, age={age})"
        );
        return None;
    };

    let flag = |col: &str| {
        let value: i64 = row.to_value(col).unwrap_or(0);
        value != 0
    };

    Some(StopRecord {
        country_name: row.to_value("country_name").unwrap_or_default(),
        driver_gender,
        driver_age,
        driver_age_raw: row.to_value("driver_age_raw").unwrap_or(None),
        driver_race: row.to_value("driver_race").unwrap_or_default(),
        violation_raw: row.to_value("violation_raw").unwrap_or(None),
        violation: row.to_value("violation").unwrap_or_default(),
        search_conducted: flag("search_conducted"),
        search_type: row.to_value("search_type").unwrap_or(None),
        stop_outcome,
        is_arrested: flag("is_arrested"),
        stop_duration: row.to_value("stop_duration").unwrap_or_default(),
        drugs_related_stop: flag("drugs_related_stop"),
        vehicle_number: row.to_value("vehicle_number").unwrap_or_default(),
        stop_datetime,
    })
}

/// Builds `WHERE` fragments and parameters for a [`StopFilter`].
///
/// Returns `(where_fragments, params, next_param_index)`.
#[must_use]
pub fn filter_fragments(
    filter: &StopFilter,
    start_idx: u32,
) -> (Vec<String>, Vec<DatabaseValue>, u32) {
    let mut frags = Vec::new();
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut idx = start_idx;

    if !filter.countries.is_empty() {
        let mut slots = Vec::with_capacity(filter.countries.len());
        for country in &filter.countries {
            slots.push(format!("${idx}"));
            params.push(DatabaseValue::String(country.clone()));
            idx += 1;
        }
        frags.push(format!("country_name IN ({})", slots.join(", ")));
    }

    if !filter.genders.is_empty() {
        let mut slots = Vec::with_capacity(filter.genders.len());
        for gender in &filter.genders {
            slots.push(format!("${idx}"));
            params.push(DatabaseValue::String(gender.to_string()));
            idx += 1;
        }
        frags.push(format!("driver_gender IN ({})", slots.join(", ")));
    }

    frags.push(format!("driver_age >= ${idx}"));
    params.push(DatabaseValue::Int32(i32::from(filter.age_range.min)));
    idx += 1;

    frags.push(format!("driver_age <= ${idx}"));
    params.push(DatabaseValue::Int32(i32::from(filter.age_range.max)));
    idx += 1;

    (frags, params, idx)
}

/// Joins fragments into a `WHERE` clause, or nothing when empty.
#[must_use]
pub fn where_clause(frags: &[String]) -> String {
    if frags.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", frags.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use police_log_stop_models::AgeRange;

    use super::*;

    #[test]
    fn insert_statement_numbers_every_column() {
        let sql = insert_sql();
        assert!(sql.starts_with("INSERT INTO traffic_stops (country_name, driver_gender"));
        assert!(sql.ends_with("$14, $15)"));
    }

    #[test]
    fn default_filter_only_bounds_age() {
        let (frags, params, next) = filter_fragments(&StopFilter::default(), 1);
        assert_eq!(frags, vec!["driver_age >= $1", "driver_age <= $2"]);
        assert_eq!(params.len(), 2);
        assert_eq!(next, 3);
    }

    #[test]
    fn filter_sets_become_in_lists() {
        let filter = StopFilter {
            countries: ["Canada".to_string(), "India".to_string()]
                .into_iter()
                .collect(),
            genders: [DriverGender::Female].into_iter().collect(),
            age_range: AgeRange::new(18, 30),
        };
        let (frags, params, next) = filter_fragments(&filter, 4);
        assert_eq!(
            where_clause(&frags),
            " WHERE country_name IN ($4, $5) AND driver_gender IN ($6) \
             AND driver_age >= $7 AND driver_age <= $8"
        );
        assert_eq!(params.len(), 5);
        assert_eq!(next, 9);
    }

    #[test]
    fn empty_where_clause_is_blank() {
        assert_eq!(where_clause(&[]), "");
    }
}
