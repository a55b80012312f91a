//! Database-backed record store.

use std::path::Path;

use async_trait::async_trait;
use moosicbox_json_utils::database::ToValue as _;
use police_log_stop_models::{StopFilter, StopRecord};
use switchy_database::Database;

use crate::db::{self, DatabaseConfig};
use crate::sql::{self, TABLE};
use crate::{RecordStore, StoreBackend, StoreError};

/// Record store over the `traffic_stops` table.
///
/// Holds only the connection settings. Every operation opens a fresh
/// connection, makes sure the schema exists, and drops the connection when
/// it returns.
#[derive(Debug, Clone)]
pub struct SqlStore {
    config: DatabaseConfig,
}

impl SqlStore {
    #[must_use]
    pub const fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    /// `SQLite` store at `path`.
    #[must_use]
    pub fn sqlite(path: &Path) -> Self {
        Self::new(DatabaseConfig::Sqlite {
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Opens a connection with the schema in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the connection or the DDL fails.
    pub async fn connect(&self) -> Result<Box<dyn Database>, StoreError> {
        let db = db::connect(&self.config).await?;
        sql::ensure_schema(db.as_ref(), self.config.dialect()).await?;
        Ok(db)
    }

    /// Appends many records over one connection. Returns how many were
    /// inserted.
    ///
    /// Invalid records are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the connection or an insert fails.
    pub async fn append_many(&self, records: &[StopRecord]) -> Result<u64, StoreError> {
        let db = self.connect().await?;
        let insert = sql::insert_sql();
        let mut inserted = 0u64;

        for record in records {
            if let Err(e) = record.validate() {
                log::warn!("Skipping invalid stop {}: {e}", record.vehicle_number);
                continue;
            }
            inserted += db
                .exec_raw_params(&insert, &sql::insert_params(record))
                .await?;
        }

        log::info!("Inserted {inserted} stop records into {TABLE}");
        Ok(inserted)
    }

    /// Number of rows in the table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the connection or the query fails.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let db = self.connect().await?;
        let rows = db
            .query_raw_params(&format!("SELECT COUNT(*) AS n FROM {TABLE}"), &[])
            .await?;
        let n: i64 = rows.first().and_then(|r| r.to_value("n").ok()).unwrap_or(0);
        #[allow(clippy::cast_sign_loss)]
        Ok(n.max(0) as u64)
    }
}

#[async_trait]
impl RecordStore for SqlStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Database
    }

    async fn load_all(&self) -> Result<Vec<StopRecord>, StoreError> {
        let db = self.connect().await?;
        let rows = db
            .query_raw_params(&format!("SELECT * FROM {TABLE} ORDER BY id"), &[])
            .await?;
        Ok(rows.iter().filter_map(sql::row_to_record).collect())
    }

    async fn load_filtered(&self, filter: &StopFilter) -> Result<Vec<StopRecord>, StoreError> {
        let db = self.connect().await?;
        let (frags, params, _) = sql::filter_fragments(filter, 1);
        let query = format!(
            "SELECT * FROM {TABLE}{} ORDER BY id",
            sql::where_clause(&frags)
        );
        log::debug!("load_filtered: {query}");

        let rows = db.query_raw_params(&query, &params).await?;
        Ok(rows.iter().filter_map(sql::row_to_record).collect())
    }

    async fn append(&self, record: StopRecord) -> Result<(), StoreError> {
        record.validate()?;
        let db = self.connect().await?;
        db.exec_raw_params(&sql::insert_sql(), &sql::insert_params(&record))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use police_log_stop_models::{AgeRange, DriverGender, StopOutcome, parse_stop_datetime};

    use super::*;

    fn record(country: &str, gender: DriverGender, age: u8) -> StopRecord {
        StopRecord {
            country_name: country.to_string(),
            driver_gender: gender,
            driver_age: age,
            driver_age_raw: Some(age.to_string()),
            driver_race: "Asian".to_string(),
            violation_raw: Some("Speeding".to_string()),
            violation: "Speeding".to_string(),
            search_conducted: true,
            search_type: Some("Frisk".to_string()),
            stop_outcome: StopOutcome::Arrest,
            is_arrested: true,
            stop_duration: "16-30 Min".to_string(),
            drugs_related_stop: false,
            vehicle_number: format!("{country}-{age}"),
            stop_datetime: parse_stop_datetime("2021-06-01 23:10:00").unwrap(),
        }
    }

    fn temp_store(name: &str) -> (SqlStore, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "police_log_sql_store_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        (SqlStore::sqlite(&dir.join("stops.db")), dir)
    }

    #[tokio::test]
    async fn append_then_read_back_in_insert_order() {
        let (store, dir) = temp_store("append");

        store
            .append(record("Canada", DriverGender::Male, 22))
            .await
            .unwrap();
        store
            .append(record("India", DriverGender::Female, 40))
            .await
            .unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], record("Canada", DriverGender::Male, 22));
        assert_eq!(all[1].country_name, "India");
        assert_eq!(store.count().await.unwrap(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn filtered_read_pushes_filter_into_sql() {
        let (store, dir) = temp_store("filter");
        let inserted = store
            .append_many(&[
                record("Canada", DriverGender::Male, 22),
                record("Canada", DriverGender::Female, 35),
                record("India", DriverGender::Female, 50),
                record("USA", DriverGender::Other, 130),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let filter = StopFilter {
            countries: ["Canada".to_string(), "India".to_string()]
                .into_iter()
                .collect(),
            genders: [DriverGender::Female].into_iter().collect(),
            age_range: AgeRange::new(30, 45),
        };
        let rows = store.load_filtered(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].driver_age, 35);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn invalid_append_touches_nothing() {
        let (store, dir) = temp_store("invalid");
        let result = store.append(record("Canada", DriverGender::Male, 121)).await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert_eq!(store.count().await.unwrap(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
