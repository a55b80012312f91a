#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query catalog execution for the police log.
//!
//! Each catalog entry is a [`plan::QueryPlan`]. A [`QueryEngine`] executes
//! plans against the configured store:
//!
//! - [`memory::MemoryEngine`] loads the filtered records and aggregates them
//!   in Rust (file backend).
//! - [`sql::SqlEngine`] renders the plan to a single SQL statement
//!   (database backend).
//!
//! [`run_query`] ties a catalog id, an engine and the sidebar filter
//! together and returns the displayed result with its chart.

pub mod catalog;
pub mod duration;
pub mod memory;
pub mod output;
pub mod plan;
pub mod sql;

use std::sync::Arc;

use async_trait::async_trait;
use police_log_analytics_models::{QueryId, QueryResult, ResultTable};
use police_log_stop_models::StopFilter;
use police_log_store::{StoreError, StoreHandle};
use thiserror::Error;

use crate::memory::MemoryEngine;
use crate::plan::QueryPlan;
use crate::sql::SqlEngine;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Records could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No catalog entry for the requested id.
    #[error("Unknown query: {id}")]
    UnknownQuery {
        /// The requested id.
        id: String,
    },

    /// The plan cannot be executed by this engine.
    #[error("Unsupported plan: {message}")]
    Unsupported {
        /// Description of what went wrong.
        message: String,
    },
}

/// Executes query plans.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Runs `plan` over the records passing `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the records cannot be read or the plan
    /// cannot be executed.
    async fn execute(
        &self,
        plan: &QueryPlan,
        filter: &StopFilter,
    ) -> Result<ResultTable, AnalyticsError>;
}

/// Picks the engine matching the store's backend.
#[must_use]
pub fn engine_for(store: &StoreHandle) -> Arc<dyn QueryEngine> {
    match store {
        StoreHandle::File(_) => Arc::new(MemoryEngine::new(store.records())),
        StoreHandle::Database(sql_store) => Arc::new(SqlEngine::new(Arc::clone(sql_store))),
    }
}

/// Runs catalog query `id` over the records passing `filter`.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query is not in the catalog or the
/// engine fails.
pub async fn run_query(
    engine: &dyn QueryEngine,
    id: QueryId,
    filter: &StopFilter,
) -> Result<QueryResult, AnalyticsError> {
    let definition = catalog::definition(id).ok_or_else(|| AnalyticsError::UnknownQuery {
        id: id.to_string(),
    })?;
    let plan = definition.plan();

    log::info!("Running query {id} with the {} engine", engine.name());
    let table = engine.execute(&plan, filter).await?;
    log::debug!("Query {id} returned {} rows", table.len());

    Ok(QueryResult {
        id,
        title: id.title().to_string(),
        shape: plan.shape,
        output: output::shape_output(&plan, &table),
        chart: output::chart_for(&plan, &table),
    })
}

/// Parses a query id, mapping failures to [`AnalyticsError::UnknownQuery`].
///
/// # Errors
///
/// Returns [`AnalyticsError::UnknownQuery`] if `s` is not a catalog id.
pub fn parse_query_id(s: &str) -> Result<QueryId, AnalyticsError> {
    s.parse().map_err(|_| AnalyticsError::UnknownQuery { id: s.to_string() })
}
