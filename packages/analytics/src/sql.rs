//! SQL execution of query plans.
//!
//! A plan renders to one `SELECT` over `traffic_stops`:
//!
//! ```text
//! SELECT <group exprs>, <aggregates>[, RANK() OVER (...)]
//! FROM traffic_stops
//! WHERE <stop filter> AND <predicate>
//! GROUP BY <group exprs>
//! HAVING COUNT(*) > $n
//! ORDER BY <explicit keys>, <group columns ASC>
//! LIMIT n
//! ```
//!
//! Plans averaging the parsed stop duration cannot be expressed in SQL.
//! For those the stop filter is still pushed into the database and the
//! aggregation runs in memory.

use std::sync::Arc;

use async_trait::async_trait;
use moosicbox_json_utils::database::ToValue as _;
use police_log_analytics_models::{Cell, Column, ColumnKind, ResultTable};
use police_log_stop_models::StopFilter;
use police_log_store::sql::{TABLE, filter_fragments, where_clause};
use police_log_store::{RecordStore as _, SqlStore};
use switchy_database::{DatabaseValue, Row};

use crate::memory::{evaluate, output_columns};
use crate::plan::{Aggregate, Dimension, Flag, Numeric, Predicate, QueryPlan};
use crate::{AnalyticsError, QueryEngine};

/// Runs plans as SQL against the database backend.
pub struct SqlEngine {
    store: Arc<SqlStore>,
}

impl SqlEngine {
    #[must_use]
    pub const fn new(store: Arc<SqlStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QueryEngine for SqlEngine {
    fn name(&self) -> &'static str {
        "sql"
    }

    async fn execute(
        &self,
        plan: &QueryPlan,
        filter: &StopFilter,
    ) -> Result<ResultTable, AnalyticsError> {
        if plan.needs_record_values() {
            log::debug!("Plan needs per-record values, aggregating filtered rows in memory");
            let records = self.store.load_filtered(filter).await?;
            return Ok(evaluate(plan, &records));
        }

        let (query, params) = render(plan, filter)?;
        log::debug!("execute: {query}");

        let db = self.store.connect().await?;
        let rows = db.query_raw_params(&query, &params).await?;

        let mut table = ResultTable::new(output_columns(plan));
        table.rows = rows
            .iter()
            .map(|row| {
                table
                    .columns
                    .iter()
                    .map(|column| decode_cell(row, column))
                    .collect()
            })
            .collect();
        Ok(table)
    }
}

/// Renders `plan` restricted by `filter` to SQL and its parameters.
///
/// # Errors
///
/// Returns [`AnalyticsError::Unsupported`] if the plan uses a value with no
/// SQL rendering.
pub fn render(
    plan: &QueryPlan,
    filter: &StopFilter,
) -> Result<(String, Vec<DatabaseValue>), AnalyticsError> {
    let (mut frags, mut params, idx) = filter_fragments(filter, 1);
    if let Some(predicate) = &plan.predicate {
        frags.push(predicate_sql(predicate));
    }

    let mut select: Vec<String> = plan
        .group_by
        .iter()
        .map(|d| format!("{} AS {}", dimension_sql(*d), d.name()))
        .collect();
    for measure in &plan.measures {
        select.push(format!(
            "{} AS {}",
            aggregate_sql(measure.aggregate)?,
            measure.name
        ));
    }

    if let Some(window) = &plan.rank {
        let measure = plan
            .measures
            .iter()
            .find(|m| m.name == window.measure)
            .ok_or_else(|| AnalyticsError::Unsupported {
                message: format!("rank measure {} is not part of the plan", window.measure),
            })?;
        let partition = if window.partition_by.is_empty() {
            String::new()
        } else {
            let dims: Vec<&str> = window
                .partition_by
                .iter()
                .map(|d| dimension_sql(*d))
                .collect();
            format!("PARTITION BY {} ", dims.join(", "))
        };
        select.push(format!(
            "RANK() OVER ({partition}ORDER BY {} {} NULLS LAST) AS {}",
            aggregate_sql(measure.aggregate)?,
            direction(window.descending),
            window.name
        ));
    }

    let mut sql = format!(
        "SELECT {} FROM {TABLE}{}",
        select.join(", "),
        where_clause(&frags)
    );

    if !plan.group_by.is_empty() {
        let dims: Vec<&str> = plan.group_by.iter().map(|d| dimension_sql(*d)).collect();
        sql.push_str(&format!(" GROUP BY {}", dims.join(", ")));
    }

    if let Some(n) = plan.having_count_gt {
        sql.push_str(&format!(" HAVING COUNT(*) > ${idx}"));
        params.push(DatabaseValue::Int64(i64::try_from(n).unwrap_or(i64::MAX)));
    }

    let mut order: Vec<String> = plan
        .order_by
        .iter()
        .map(|o| format!("{} {} NULLS LAST", o.column, direction(o.descending)))
        .collect();
    order.extend(plan.group_by.iter().map(|d| format!("{} ASC", d.name())));
    if !order.is_empty() {
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }

    if let Some(limit) = plan.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    Ok((sql, params))
}

const fn direction(descending: bool) -> &'static str {
    if descending { "DESC" } else { "ASC" }
}

const fn dimension_sql(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Country => "country_name",
        Dimension::Gender => "driver_gender",
        Dimension::Race => "driver_race",
        Dimension::Violation => "violation",
        Dimension::VehicleNumber => "vehicle_number",
        Dimension::Age => "CAST(driver_age AS BIGINT)",
        Dimension::AgeDecade => "CAST((driver_age / 10) * 10 AS BIGINT)",
        Dimension::Hour => "CAST(SUBSTR(stop_datetime, 12, 2) AS BIGINT)",
        Dimension::Year => "CAST(SUBSTR(stop_datetime, 1, 4) AS BIGINT)",
        Dimension::Month => "CAST(SUBSTR(stop_datetime, 6, 2) AS BIGINT)",
    }
}

fn aggregate_sql(aggregate: Aggregate) -> Result<String, AnalyticsError> {
    Ok(match aggregate {
        Aggregate::Count => "COUNT(*)".to_string(),
        Aggregate::Sum(flag) => format!("CAST(COALESCE(SUM({}), 0) AS BIGINT)", flag.column()),
        Aggregate::RatePct(flag) => {
            format!("100.0 * AVG(CAST({} AS DOUBLE PRECISION))", flag.column())
        }
        Aggregate::Mean(Numeric::Age) => "AVG(CAST(driver_age AS DOUBLE PRECISION))".to_string(),
        Aggregate::Mean(Numeric::DurationMinutes) => {
            return Err(AnalyticsError::Unsupported {
                message: "stop duration minutes have no SQL rendering".to_string(),
            });
        }
    })
}

fn predicate_sql(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Is(flag) => flag_sql(*flag),
        Predicate::Not(inner) => format!("NOT ({})", predicate_sql(inner)),
        Predicate::All(parts) if parts.is_empty() => "1 = 1".to_string(),
        Predicate::Any(parts) if parts.is_empty() => "1 = 0".to_string(),
        Predicate::All(parts) => {
            let parts: Vec<String> = parts.iter().map(predicate_sql).collect();
            format!("({})", parts.join(" AND "))
        }
        Predicate::Any(parts) => {
            let parts: Vec<String> = parts.iter().map(predicate_sql).collect();
            format!("({})", parts.join(" OR "))
        }
        Predicate::Compare {
            dimension,
            op,
            value,
        } => format!("{} {} {value}", dimension_sql(*dimension), op.sql()),
    }
}

fn flag_sql(flag: Flag) -> String {
    format!("{} = 1", flag.column())
}

fn decode_cell(row: &Row, column: &Column) -> Cell {
    let name = column.name.as_str();
    match column.kind {
        ColumnKind::Text => {
            let value: Option<String> = row.to_value(name).unwrap_or(None);
            value.map_or(Cell::Null, Cell::Text)
        }
        ColumnKind::Int => {
            let value: Option<i64> = row.to_value(name).unwrap_or(None);
            value.map_or(Cell::Null, Cell::Int)
        }
        ColumnKind::Float => {
            let value: Option<f64> = row.to_value(name).unwrap_or(None);
            value.map_or(Cell::Null, Cell::Float)
        }
    }
}
