//! Store configuration read from the environment.

use std::path::PathBuf;

use crate::db::DatabaseConfig;
use crate::{StoreBackend, StoreError};

/// Default location of the CSV dataset.
pub const DEFAULT_CSV_PATH: &str = "data/traffic_stops.csv";

/// Which backend to open and where its data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Selected backend.
    pub backend: StoreBackend,
    /// CSV dataset used by the file backend and by `import`.
    pub csv_path: PathBuf,
    /// Database used by the database backend.
    pub database: DatabaseConfig,
}

impl StoreConfig {
    /// Reads `POLICE_LOG_BACKEND` (`file` or `database`, default `file`),
    /// `POLICE_LOG_CSV` and the database variables read by
    /// [`DatabaseConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `POLICE_LOG_BACKEND` names an
    /// unknown backend.
    pub fn from_env() -> Result<Self, StoreError> {
        let backend = match std::env::var("POLICE_LOG_BACKEND") {
            Ok(value) => parse_backend(&value)?,
            Err(_) => StoreBackend::File,
        };

        let csv_path = std::env::var("POLICE_LOG_CSV")
            .map_or_else(|_| PathBuf::from(DEFAULT_CSV_PATH), PathBuf::from);

        Ok(Self {
            backend,
            csv_path,
            database: DatabaseConfig::from_env(),
        })
    }

    /// Returns a copy with a different backend.
    #[must_use]
    pub fn with_backend(mut self, backend: StoreBackend) -> Self {
        self.backend = backend;
        self
    }
}

fn parse_backend(value: &str) -> Result<StoreBackend, StoreError> {
    value.trim().parse().map_err(|_| StoreError::Config {
        message: format!("unknown POLICE_LOG_BACKEND {value:?}, expected \"file\" or \"database\""),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_backends() {
        assert_eq!(parse_backend(" database ").unwrap(), StoreBackend::Database);
        assert_eq!(parse_backend("FILE").unwrap(), StoreBackend::File);
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        let err = parse_backend("mongo").unwrap_err();
        assert!(matches!(err, StoreError::Config { .. }));
        assert!(err.to_string().contains("mongo"));
    }

    #[test]
    fn with_backend_overrides_selection() {
        let config = StoreConfig {
            backend: StoreBackend::File,
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            database: DatabaseConfig::Sqlite {
                path: PathBuf::from("x.db"),
            },
        }
        .with_backend(StoreBackend::Database);
        assert_eq!(config.backend, StoreBackend::Database);
    }
}
