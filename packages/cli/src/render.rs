//! Plain-text rendering of query results and stop listings.

use std::fmt::Write as _;

use police_log_analytics_models::{ChartSeries, ColumnKind, QueryOutput, QueryResult, ResultTable};
use police_log_stop_models::StopRecord;

/// Widest bar drawn by [`chart`].
pub const BAR_WIDTH: usize = 40;

/// Renders a query result: title, table or scalar, then its bar chart.
#[must_use]
pub fn query_result(result: &QueryResult) -> String {
    let mut out = format!("{}\n\n", result.title);

    match &result.output {
        QueryOutput::Scalar { label, value } => match value {
            Some(v) => {
                let _ = writeln!(out, "{label}: {v:.2}");
            }
            None => out.push_str("No matching records.\n"),
        },
        QueryOutput::Table(table) if table.is_empty() => {
            out.push_str("No matching records.\n");
        }
        QueryOutput::Table(table) => {
            out.push_str(&table_text(table));
            let _ = writeln!(out, "\n{} row(s)", table.len());
        }
    }

    if let Some(series) = &result.chart {
        out.push('\n');
        out.push_str(&chart(series));
    }

    out
}

/// Renders `table` with aligned columns; numeric columns are right-aligned.
#[must_use]
pub fn table_text(table: &ResultTable) -> String {
    let rendered: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            rendered
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(column.name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let numeric: Vec<bool> = table
        .columns
        .iter()
        .map(|c| c.kind != ColumnKind::Text)
        .collect();

    let mut out = String::new();
    let header: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
    push_line(&mut out, &header, &widths, &numeric);
    let rule_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    let _ = writeln!(out, "{}", "-".repeat(rule_width));
    for row in &rendered {
        push_line(&mut out, row, &widths, &numeric);
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize], numeric: &[bool]) {
    let line = cells
        .iter()
        .zip(widths)
        .zip(numeric)
        .map(|((cell, &width), &right)| {
            if right {
                format!("{cell:>width$}")
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

/// Horizontal bar chart, bars scaled to the largest value.
#[must_use]
pub fn chart(series: &ChartSeries) -> String {
    let label_width = series
        .points
        .iter()
        .map(|p| p.label.chars().count())
        .max()
        .unwrap_or(0);
    let max = series
        .points
        .iter()
        .map(|p| p.value)
        .fold(0.0_f64, f64::max);

    let mut out = format!("{} by {}\n", series.value_column, series.label_column);
    for point in &series.points {
        let _ = writeln!(
            out,
            "{:<label_width$}  {} {}",
            point.label,
            "#".repeat(bar_len(point.value, max)),
            format_value(point.value),
        );
    }
    out
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn bar_len(value: f64, max: f64) -> usize {
    if max <= 0.0 || value <= 0.0 {
        return 0;
    }
    ((value / max) * BAR_WIDTH as f64).round().max(1.0) as usize
}

fn format_value(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// One line per stop, newest last.
#[must_use]
pub fn stops(records: &[StopRecord]) -> String {
    let mut out = format!(
        "{:<19}  {:<12}  {:<6}  {:>3}  {:<12}  {:<10}  VEHICLE\n",
        "DATETIME", "COUNTRY", "GENDER", "AGE", "VIOLATION", "OUTCOME"
    );
    let _ = writeln!(out, "{}", "-".repeat(90));
    for r in records {
        let _ = writeln!(
            out,
            "{:<19}  {:<12}  {:<6}  {:>3}  {:<12}  {:<10}  {}",
            r.stop_datetime_text(),
            r.country_name,
            r.driver_gender.as_ref(),
            r.driver_age,
            r.violation,
            r.stop_outcome.as_ref(),
            r.vehicle_number,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use police_log_analytics_models::{Cell, ChartPoint, Column, OutputShape, QueryId};

    use super::*;

    fn violations() -> ResultTable {
        let mut table = ResultTable::new(vec![
            Column::new("violation", ColumnKind::Text),
            Column::new("stops", ColumnKind::Int),
        ]);
        table.rows = vec![
            vec![Cell::Text("Speeding".to_string()), Cell::Int(120)],
            vec![Cell::Text("DUI".to_string()), Cell::Int(7)],
        ];
        table
    }

    #[test]
    fn table_columns_are_aligned() {
        let text = table_text(&violations());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "violation  stops");
        assert_eq!(lines[1], "----------------");
        assert_eq!(lines[2], "Speeding     120");
        assert_eq!(lines[3], "DUI            7");
    }

    #[test]
    fn chart_scales_to_largest_value() {
        let series = ChartSeries {
            label_column: "violation".to_string(),
            value_column: "stops".to_string(),
            points: vec![
                ChartPoint {
                    label: "Speeding".to_string(),
                    value: 10.0,
                },
                ChartPoint {
                    label: "DUI".to_string(),
                    value: 5.0,
                },
                ChartPoint {
                    label: "Other".to_string(),
                    value: 0.0,
                },
            ],
        };
        let text = chart(&series);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "stops by violation");
        assert_eq!(lines[1], format!("Speeding  {} 10", "#".repeat(BAR_WIDTH)));
        assert_eq!(lines[2], format!("DUI       {} 5", "#".repeat(BAR_WIDTH / 2)));
        assert_eq!(lines[3], "Other      0");
    }

    #[test]
    fn empty_scalar_says_no_records() {
        let result = QueryResult {
            id: QueryId::NightArrestRate,
            title: QueryId::NightArrestRate.title().to_string(),
            shape: OutputShape::Scalar,
            output: QueryOutput::Scalar {
                label: "arrest_rate".to_string(),
                value: None,
            },
            chart: None,
        };
        let text = query_result(&result);
        assert!(text.ends_with("No matching records.\n"));
    }

    #[test]
    fn table_result_includes_row_count() {
        let result = QueryResult {
            id: QueryId::YoungDriverViolations,
            title: QueryId::YoungDriverViolations.title().to_string(),
            shape: OutputShape::RankedList,
            output: QueryOutput::Table(violations()),
            chart: None,
        };
        assert!(query_result(&result).contains("\n2 row(s)\n"));
    }
}
