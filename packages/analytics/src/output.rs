//! Turns an executed plan's table into what the caller displays.

use std::collections::{BTreeMap, BTreeSet};

use police_log_analytics_models::{
    Cell, ChartPoint, ChartSeries, Column, ColumnKind, OutputShape, QueryOutput, ResultTable,
};

use crate::plan::{Pivot, QueryPlan};

/// Builds the displayed output of `plan` from its long-form `table`.
#[must_use]
pub fn shape_output(plan: &QueryPlan, table: &ResultTable) -> QueryOutput {
    if plan.shape == OutputShape::Scalar {
        let label = plan
            .measures
            .first()
            .map_or_else(String::new, |m| m.name.to_string());
        let value = table
            .rows
            .first()
            .and_then(|row| row.last())
            .and_then(Cell::as_f64);
        return QueryOutput::Scalar { label, value };
    }

    match &plan.pivot {
        Some(pivot) => QueryOutput::Table(pivot_table(table, pivot)),
        None => QueryOutput::Table(table.clone()),
    }
}

/// Spreads `(rows, columns, value)` triples into one row per distinct
/// `rows` value and one column per distinct `columns` value, zero-filled.
#[must_use]
pub fn pivot_table(table: &ResultTable, pivot: &Pivot) -> ResultTable {
    let (Some(row_idx), Some(col_idx), Some(value_idx)) = (
        table.column_index(pivot.rows.name()),
        table.column_index(pivot.columns.name()),
        table.column_index(pivot.value),
    ) else {
        log::warn!("Pivot columns missing from result, returning it unchanged");
        return table.clone();
    };

    let header: BTreeSet<String> = table.rows.iter().map(|r| r[col_idx].to_string()).collect();

    let mut cells: BTreeMap<String, (Cell, BTreeMap<String, i64>)> = BTreeMap::new();
    for row in &table.rows {
        let entry = cells
            .entry(row[row_idx].to_string())
            .or_insert_with(|| (row[row_idx].clone(), BTreeMap::new()));
        let value = match &row[value_idx] {
            Cell::Int(v) => *v,
            _ => 0,
        };
        *entry.1.entry(row[col_idx].to_string()).or_default() += value;
    }

    let mut columns = vec![Column::new(pivot.rows.name(), pivot.rows.kind())];
    columns.extend(header.iter().map(|h| Column::new(h.clone(), ColumnKind::Int)));

    let mut out = ResultTable::new(columns);
    for (label, counts) in cells.into_values() {
        let mut row = vec![label];
        row.extend(header.iter().map(|h| Cell::Int(counts.get(h).copied().unwrap_or(0))));
        out.rows.push(row);
    }
    out
}

/// Bar chart for a long-form result: group columns joined by `" / "` as the
/// label, the first numeric measure as the value.
///
/// `None` for scalars, empty tables and tables without a numeric measure.
#[must_use]
pub fn chart_for(plan: &QueryPlan, table: &ResultTable) -> Option<ChartSeries> {
    if plan.shape == OutputShape::Scalar || table.is_empty() {
        return None;
    }

    let groups = plan.group_by.len();
    let value_idx = table
        .columns
        .iter()
        .enumerate()
        .skip(groups)
        .find(|(_, c)| matches!(c.kind, ColumnKind::Int | ColumnKind::Float))
        .map(|(i, _)| i)?;

    let label_column = table.columns[..groups]
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(" / ");

    let points = table
        .rows
        .iter()
        .filter_map(|row| {
            let value = row[value_idx].as_f64()?;
            let label = row[..groups]
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" / ");
            Some(ChartPoint { label, value })
        })
        .collect();

    Some(ChartSeries {
        label_column,
        value_column: table.columns[value_idx].name.clone(),
        points,
    })
}
