#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record store for the police log.
//!
//! Two interchangeable backends implement [`RecordStore`]:
//!
//! - [`csv_store::CsvStore`] loads a CSV file once and keeps a working copy
//!   in memory. Appends only touch that copy and are never written back.
//! - [`sql_store::SqlStore`] keeps rows in a `traffic_stops` table through
//!   `switchy_database`, opening one connection per operation and committing
//!   every append immediately.
//!
//! Callers that must always receive a collection use [`load_or_empty`],
//! which logs store failures and hands back an empty set with the error
//! message attached.

pub mod config;
pub mod csv_store;
pub mod db;
pub mod sql;
pub mod sql_store;

use std::sync::Arc;

use async_trait::async_trait;
use police_log_stop_models::filter::apply;
use police_log_stop_models::{InvalidStopError, StopFilter, StopRecord};
use strum_macros::{AsRefStr, Display, EnumString};

pub use config::StoreConfig;
pub use csv_store::CsvStore;
pub use db::DatabaseConfig;
pub use sql_store::SqlStore;

/// Errors that can occur during record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The database could not be reached or opened.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// The CSV dataset could not be read.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The record violates an invariant.
    #[error("Invalid record: {0}")]
    Invalid(#[from] InvalidStopError),

    /// Configuration could not be interpreted.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Which backend a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StoreBackend {
    /// CSV file loaded once per session.
    File,
    /// Relational `traffic_stops` table.
    Database,
}

/// Read-all / filtered-read / append access to stop records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns which backend this store uses.
    fn backend(&self) -> StoreBackend;

    /// Reads every persisted record without filtering.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    async fn load_all(&self) -> Result<Vec<StopRecord>, StoreError>;

    /// Reads the records that pass `filter`, preserving store order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    async fn load_filtered(&self, filter: &StopFilter) -> Result<Vec<StopRecord>, StoreError> {
        let records = self.load_all().await?;
        if filter.is_unrestricted() {
            return Ok(records);
        }
        Ok(apply(&records, filter))
    }

    /// Appends exactly one record, leaving existing records untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record is invalid or cannot be stored.
    async fn append(&self, record: StopRecord) -> Result<(), StoreError>;
}

/// Records read from a store, with the failure message if the read failed.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    /// Records read; empty when the read failed.
    pub records: Vec<StopRecord>,
    /// Human-readable failure, if any.
    pub error: Option<String>,
}

/// Reads the filtered records, turning any store failure into an empty
/// collection plus an error message.
pub async fn load_or_empty(store: &dyn RecordStore, filter: &StopFilter) -> LoadedRecords {
    match store.load_filtered(filter).await {
        Ok(records) => LoadedRecords {
            records,
            error: None,
        },
        Err(e) => {
            log::error!("Failed to load stop records: {e}");
            LoadedRecords {
                records: Vec::new(),
                error: Some(format!("Could not load stop records: {e}")),
            }
        }
    }
}

/// An opened store together with its concrete backend.
///
/// The analytics layer picks its query engine from the variant, so the
/// concrete type stays reachable next to the trait object.
#[derive(Clone)]
pub enum StoreHandle {
    /// CSV-backed working copy.
    File(Arc<CsvStore>),
    /// SQL-backed table.
    Database(Arc<SqlStore>),
}

impl StoreHandle {
    /// Opens the backend selected by `config`.
    ///
    /// The database backend connects lazily, so only a missing or unreadable
    /// CSV file fails here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the CSV dataset cannot be read.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        match config.backend {
            StoreBackend::File => {
                log::info!("Loading stop records from {}", config.csv_path.display());
                Ok(Self::File(Arc::new(CsvStore::open(&config.csv_path)?)))
            }
            StoreBackend::Database => {
                log::info!("Using {} database backend", config.database.dialect());
                Ok(Self::Database(Arc::new(SqlStore::new(
                    config.database.clone(),
                ))))
            }
        }
    }

    /// Returns the store as a trait object.
    #[must_use]
    pub fn records(&self) -> Arc<dyn RecordStore> {
        match self {
            Self::File(store) => Arc::clone(store) as Arc<dyn RecordStore>,
            Self::Database(store) => Arc::clone(store) as Arc<dyn RecordStore>,
        }
    }

    /// Returns which backend this handle wraps.
    #[must_use]
    pub const fn backend(&self) -> StoreBackend {
        match self {
            Self::File(_) => StoreBackend::File,
            Self::Database(_) => StoreBackend::Database,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        fn backend(&self) -> StoreBackend {
            StoreBackend::Database
        }

        async fn load_all(&self) -> Result<Vec<StopRecord>, StoreError> {
            Err(StoreError::Connection {
                message: "refused".to_string(),
            })
        }

        async fn append(&self, _record: StopRecord) -> Result<(), StoreError> {
            Err(StoreError::Connection {
                message: "refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn load_failure_yields_empty_collection_and_message() {
        let loaded = load_or_empty(&FailingStore, &StopFilter::default()).await;
        assert!(loaded.records.is_empty());
        let message = loaded.error.unwrap();
        assert!(message.contains("refused"), "{message}");
    }

    #[test]
    fn backend_parses_config_values() {
        assert_eq!("file".parse::<StoreBackend>().unwrap(), StoreBackend::File);
        assert_eq!(
            "Database".parse::<StoreBackend>().unwrap(),
            StoreBackend::Database
        );
        assert_eq!(StoreBackend::Database.to_string(), "database");
    }
}
