//! In-memory execution of query plans.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use police_log_analytics_models::{Cell, Column, ColumnKind, ResultTable};
use police_log_stop_models::{StopFilter, StopRecord};
use police_log_store::RecordStore;

use crate::plan::{Aggregate, GroupKey, Measure, QueryPlan, RankWindow};
use crate::{AnalyticsError, QueryEngine};

/// Runs plans over records loaded from any [`RecordStore`].
pub struct MemoryEngine {
    store: Arc<dyn RecordStore>,
}

impl MemoryEngine {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QueryEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn execute(
        &self,
        plan: &QueryPlan,
        filter: &StopFilter,
    ) -> Result<ResultTable, AnalyticsError> {
        let records = self.store.load_filtered(filter).await?;
        log::debug!("Evaluating plan over {} records", records.len());
        Ok(evaluate(plan, &records))
    }
}

/// Running totals for one group.
#[derive(Debug, Default)]
struct Accumulator {
    count: u64,
    per_measure: Vec<MeasureState>,
}

#[derive(Debug, Default, Clone, Copy)]
struct MeasureState {
    hits: u64,
    sum: f64,
    n: u64,
}

impl Accumulator {
    fn new(measures: usize) -> Self {
        Self {
            count: 0,
            per_measure: vec![MeasureState::default(); measures],
        }
    }

    fn add(&mut self, record: &StopRecord, measures: &[Measure]) {
        self.count += 1;
        for (state, measure) in self.per_measure.iter_mut().zip(measures) {
            match measure.aggregate {
                Aggregate::Count => {}
                Aggregate::Sum(flag) | Aggregate::RatePct(flag) => {
                    if flag.get(record) {
                        state.hits += 1;
                    }
                }
                Aggregate::Mean(numeric) => {
                    if let Some(v) = numeric.get(record) {
                        state.sum += v;
                        state.n += 1;
                    }
                }
            }
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn finish(&self, measures: &[Measure]) -> Vec<Cell> {
        self.per_measure
            .iter()
            .zip(measures)
            .map(|(state, measure)| match measure.aggregate {
                Aggregate::Count => Cell::Int(self.count as i64),
                Aggregate::Sum(_) => Cell::Int(state.hits as i64),
                Aggregate::RatePct(_) => {
                    if self.count == 0 {
                        Cell::Null
                    } else {
                        Cell::Float(100.0 * state.hits as f64 / self.count as f64)
                    }
                }
                Aggregate::Mean(_) => {
                    if state.n == 0 {
                        Cell::Null
                    } else {
                        Cell::Float(state.sum / state.n as f64)
                    }
                }
            })
            .collect()
    }
}

/// Output columns of `plan`: group keys, measures, then the rank.
#[must_use]
pub fn output_columns(plan: &QueryPlan) -> Vec<Column> {
    let mut columns: Vec<Column> = plan
        .group_by
        .iter()
        .map(|d| Column::new(d.name(), d.kind()))
        .collect();
    columns.extend(
        plan.measures
            .iter()
            .map(|m| Column::new(m.name, m.aggregate.kind())),
    );
    if let Some(rank) = &plan.rank {
        columns.push(Column::new(rank.name, ColumnKind::Int));
    }
    columns
}

/// Runs `plan` over already-filtered `records`.
#[must_use]
pub fn evaluate(plan: &QueryPlan, records: &[StopRecord]) -> ResultTable {
    let mut groups: BTreeMap<Vec<GroupKey>, Accumulator> = BTreeMap::new();

    if plan.group_by.is_empty() {
        // An ungrouped aggregate always yields exactly one row.
        groups.insert(Vec::new(), Accumulator::new(plan.measures.len()));
    }

    for record in records {
        if let Some(predicate) = &plan.predicate
            && !predicate.matches(record)
        {
            continue;
        }
        let key: Vec<GroupKey> = plan.group_by.iter().map(|d| d.key(record)).collect();
        groups
            .entry(key)
            .or_insert_with(|| Accumulator::new(plan.measures.len()))
            .add(record, &plan.measures);
    }

    let mut table = ResultTable::new(output_columns(plan));

    for (key, acc) in &groups {
        if let Some(min) = plan.having_count_gt
            && acc.count <= min
        {
            continue;
        }
        let mut row: Vec<Cell> = key
            .iter()
            .map(|k| match k {
                GroupKey::Int(v) => Cell::Int(*v),
                GroupKey::Text(v) => Cell::Text(v.clone()),
            })
            .collect();
        row.extend(acc.finish(&plan.measures));
        table.rows.push(row);
    }

    if let Some(window) = &plan.rank {
        apply_rank(&mut table, plan, window);
    }

    // Rows are already in group-key order, so a stable sort on the explicit
    // keys leaves that order as the tie-break.
    let keys: Vec<(usize, bool)> = plan
        .order_by
        .iter()
        .filter_map(|o| table.column_index(o.column).map(|i| (i, o.descending)))
        .collect();
    if !keys.is_empty() {
        table.rows.sort_by(|a, b| {
            keys.iter()
                .map(|&(i, desc)| compare_cells(&a[i], &b[i], desc))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
    }

    if let Some(limit) = plan.limit {
        table.rows.truncate(limit);
    }

    table
}

/// Appends `RANK()` values: rows in the same partition are ordered by the
/// ranked measure, ties share a rank and the next rank skips.
fn apply_rank(table: &mut ResultTable, plan: &QueryPlan, window: &RankWindow) {
    let Some(measure_idx) = table.column_index(window.measure) else {
        log::warn!("Rank measure {} is not an output column", window.measure);
        for row in &mut table.rows {
            row.push(Cell::Null);
        }
        return;
    };
    let partition_idx: Vec<usize> = window
        .partition_by
        .iter()
        .filter_map(|d| plan.group_by.iter().position(|g| g == d))
        .collect();

    let mut partitions: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
    for (i, row) in table.rows.iter().enumerate() {
        let key = partition_idx.iter().map(|&p| row[p].to_string()).collect();
        partitions.entry(key).or_default().push(i);
    }

    let mut ranks = vec![0i64; table.rows.len()];
    for members in partitions.values_mut() {
        members.sort_by(|&a, &b| {
            compare_cells(
                &table.rows[a][measure_idx],
                &table.rows[b][measure_idx],
                window.descending,
            )
        });
        let mut rank = 0i64;
        for (pos, &row_idx) in members.iter().enumerate() {
            let tied = pos > 0
                && table.rows[members[pos - 1]][measure_idx] == table.rows[row_idx][measure_idx];
            if !tied {
                rank = i64::try_from(pos).unwrap_or(i64::MAX) + 1;
            }
            ranks[row_idx] = rank;
        }
    }

    for (row, rank) in table.rows.iter_mut().zip(ranks) {
        row.push(Cell::Int(rank));
    }
}

/// Orders two cells of the same column. Nulls sort last in both directions.
fn compare_cells(a: &Cell, b: &Cell, descending: bool) -> Ordering {
    let ord = match (a, b) {
        (Cell::Null, Cell::Null) => return Ordering::Equal,
        (Cell::Null, _) => return Ordering::Greater,
        (_, Cell::Null) => return Ordering::Less,
        (Cell::Text(x), Cell::Text(y)) => x.cmp(y),
        (Cell::Int(x), Cell::Int(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => a.to_string().cmp(&b.to_string()),
        },
    };
    if descending { ord.reverse() } else { ord }
}

#[cfg(test)]
mod tests {
    use police_log_analytics_models::{OutputShape, QueryId};
    use police_log_stop_models::{DriverGender, StopOutcome, parse_stop_datetime};

    use super::*;
    use crate::catalog::{CATALOG, definition};
    use crate::test_support::{record, records_for, sample_records};

    fn plan(id: QueryId) -> QueryPlan {
        definition(id).unwrap().plan()
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn young_driver_violations_count_drivers_under_25() {
        let mut a = record("Canada", DriverGender::Male, 22);
        a.violation = "Speeding".to_string();
        let mut b = record("Canada", DriverGender::Male, 30);
        b.violation = "DUI".to_string();

        let table = evaluate(&plan(QueryId::YoungDriverViolations), &[a, b]);
        assert_eq!(table.rows, vec![vec![text("Speeding"), Cell::Int(1)]]);
    }

    #[test]
    fn counts_sort_descending_with_key_ascending_tie_break() {
        let records = records_for(&[
            ("India", "DUI"),
            ("Canada", "Speeding"),
            ("India", "Speeding"),
            ("USA", "DUI"),
            ("Canada", "Equipment"),
            ("India", "Other"),
        ]);
        let table = evaluate(
            &QueryPlan::new(OutputShape::RankedList)
                .group_by(&[crate::plan::Dimension::Country])
                .measure("stops", Aggregate::Count)
                .order_by(&[crate::plan::OrderBy::desc("stops")])
                .limit(2),
            &records,
        );
        assert_eq!(
            table.rows,
            vec![
                vec![text("India"), Cell::Int(3)],
                vec![text("Canada"), Cell::Int(2)],
            ]
        );
    }

    #[test]
    fn top_n_never_exceeds_limit() {
        let records: Vec<StopRecord> = (0..30)
            .map(|i| {
                let mut r = record("Canada", DriverGender::Male, 30);
                r.vehicle_number = format!("V{i:02}");
                r.drugs_related_stop = true;
                r
            })
            .collect();
        let table = evaluate(&plan(QueryId::TopDrugVehicles), &records);
        assert_eq!(table.len(), 10);
        assert_eq!(table.rows[0][0], text("V00"));
    }

    #[test]
    fn rates_are_percentages_of_the_group() {
        let mut records = Vec::new();
        for (age, arrested) in [(21, true), (24, false), (25, false), (33, true), (38, true)] {
            let mut r = record("India", DriverGender::Female, age);
            r.is_arrested = arrested;
            records.push(r);
        }
        let table = evaluate(&plan(QueryId::AgeGroupArrestRate), &records);
        assert_eq!(table.rows, vec![vec![Cell::Int(30), Cell::Float(100.0)]]);

        let table = evaluate(
            &QueryPlan::new(OutputShape::Table)
                .group_by(&[crate::plan::Dimension::AgeDecade])
                .measure("arrest_rate", Aggregate::RatePct(crate::plan::Flag::IsArrested)),
            &records,
        );
        let rate = table.rows[0][1].as_f64().unwrap();
        assert!((rate - 100.0 / 3.0).abs() < 1e-9, "{rate}");
        for row in &table.rows {
            let rate = row[1].as_f64().unwrap();
            assert!((0.0..=100.0).contains(&rate));
        }
    }

    #[test]
    fn night_arrest_rate_is_a_single_value() {
        let mut records = Vec::new();
        for (at, arrested) in [
            ("2020-01-01 21:00:00", true),
            ("2020-01-01 03:00:00", false),
            ("2020-01-01 12:00:00", true),
            ("2020-01-01 05:30:00", false),
        ] {
            let mut r = record("India", DriverGender::Male, 40);
            r.stop_datetime = parse_stop_datetime(at).unwrap();
            r.is_arrested = arrested;
            records.push(r);
        }
        let table = evaluate(&plan(QueryId::NightArrestRate), &records);
        assert_eq!(table.rows, vec![vec![Cell::Float(100.0 / 3.0)]]);

        let empty = evaluate(&plan(QueryId::NightArrestRate), &[]);
        assert_eq!(empty.rows, vec![vec![Cell::Null]]);
    }

    #[test]
    fn duration_average_skips_unparsable_text() {
        let mut records = Vec::new();
        for (violation, duration) in [
            ("Speeding", "6-15 minutes"),
            ("Speeding", "N/A"),
            ("DUI", "30+ Min"),
            ("Equipment", ""),
        ] {
            let mut r = record("India", DriverGender::Male, 40);
            r.violation = violation.to_string();
            r.stop_duration = duration.to_string();
            records.push(r);
        }
        let table = evaluate(&plan(QueryId::AvgDurationByViolation), &records);
        assert_eq!(
            table.rows,
            vec![
                vec![text("DUI"), Cell::Float(30.0)],
                vec![text("Speeding"), Cell::Float(10.5)],
                vec![text("Equipment"), Cell::Null],
            ]
        );
    }

    #[test]
    fn having_excludes_groups_of_ten_or_fewer() {
        let mut records = Vec::new();
        for i in 0..11 {
            let mut r = record("India", DriverGender::Male, 40);
            r.violation = "DUI".to_string();
            r.is_arrested = i < 3;
            records.push(r);
        }
        for _ in 0..10 {
            let mut r = record("India", DriverGender::Male, 40);
            r.violation = "Speeding".to_string();
            r.is_arrested = true;
            records.push(r);
        }
        for id in [
            QueryId::TopViolationsByArrestRate,
            QueryId::HighSearchArrestViolations,
        ] {
            let table = evaluate(&plan(id), &records);
            assert_eq!(table.len(), 1, "{id}");
            assert_eq!(table.rows[0][0], text("DUI"));
            assert_eq!(table.rows[0][1], Cell::Int(11));
        }
    }

    #[test]
    fn rank_ties_share_a_rank_and_skip_the_next() {
        let mut records = Vec::new();
        for (violation, n, arrests) in [("A", 12, 6), ("B", 12, 6), ("C", 12, 3), ("D", 12, 12)] {
            for i in 0..n {
                let mut r = record("India", DriverGender::Male, 40);
                r.violation = violation.to_string();
                r.is_arrested = i < arrests;
                records.push(r);
            }
        }
        let table = evaluate(&plan(QueryId::HighSearchArrestViolations), &records);
        let rank_idx = table.column_index("arrest_rank").unwrap();
        let got: Vec<(Cell, Cell)> = table
            .rows
            .iter()
            .map(|r| (r[0].clone(), r[rank_idx].clone()))
            .collect();
        assert_eq!(
            got,
            vec![
                (text("D"), Cell::Int(1)),
                (text("A"), Cell::Int(2)),
                (text("B"), Cell::Int(2)),
                (text("C"), Cell::Int(4)),
            ]
        );
    }

    #[test]
    fn yearly_rank_is_partitioned_by_country() {
        let mut records = Vec::new();
        for (country, year, n) in [
            ("Canada", 2020, 2),
            ("Canada", 2021, 5),
            ("India", 2020, 1),
            ("India", 2021, 1),
        ] {
            for _ in 0..n {
                let mut r = record(country, DriverGender::Male, 40);
                r.stop_datetime = parse_stop_datetime(&format!("{year}-06-01 10:00:00")).unwrap();
                records.push(r);
            }
        }
        let table = evaluate(&plan(QueryId::YearlyStopsByCountry), &records);
        let rank_idx = table.column_index("stop_rank").unwrap();
        let got: Vec<(Cell, Cell, Cell)> = table
            .rows
            .iter()
            .map(|r| (r[0].clone(), r[1].clone(), r[rank_idx].clone()))
            .collect();
        assert_eq!(
            got,
            vec![
                (text("Canada"), Cell::Int(2020), Cell::Int(2)),
                (text("Canada"), Cell::Int(2021), Cell::Int(1)),
                (text("India"), Cell::Int(2020), Cell::Int(1)),
                (text("India"), Cell::Int(2021), Cell::Int(1)),
            ]
        );
    }

    #[test]
    fn violations_search_arrest_orders_by_arrests_then_searches() {
        let mut records = Vec::new();
        for (violation, searched, arrested) in [
            ("DUI", true, true),
            ("Speeding", true, true),
            ("Speeding", true, false),
            ("Equipment", false, false),
        ] {
            let mut r = record("India", DriverGender::Male, 40);
            r.violation = violation.to_string();
            r.search_conducted = searched;
            r.is_arrested = arrested;
            records.push(r);
        }
        let table = evaluate(&plan(QueryId::ViolationsSearchArrest), &records);
        let order: Vec<&Cell> = table.rows.iter().map(|r| &r[0]).collect();
        assert_eq!(
            order,
            vec![&text("Speeding"), &text("DUI"), &text("Equipment")]
        );
    }

    #[test]
    fn demographics_average_age() {
        let records = vec![
            record("India", DriverGender::Male, 20),
            record("India", DriverGender::Male, 31),
            record("Canada", DriverGender::Female, 50),
        ];
        let table = evaluate(&plan(QueryId::DemographicsByCountry), &records);
        assert_eq!(
            table.rows,
            vec![
                vec![
                    text("Canada"),
                    text("Female"),
                    text("White"),
                    Cell::Float(50.0),
                    Cell::Int(1),
                ],
                vec![
                    text("India"),
                    text("Male"),
                    text("White"),
                    Cell::Float(25.5),
                    Cell::Int(2),
                ],
            ]
        );
    }

    #[test]
    fn empty_input_gives_empty_grouped_table() {
        let table = evaluate(&plan(QueryId::StopsByHour), &[]);
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), 2);
    }

    #[test]
    fn arrest_rate_reads_the_arrest_flag_not_the_outcome() {
        let mut r = record("India", DriverGender::Male, 40);
        r.stop_datetime = parse_stop_datetime("2020-01-01 22:00:00").unwrap();
        r.stop_outcome = StopOutcome::Arrest;
        r.is_arrested = false;
        let table = evaluate(&plan(QueryId::NightArrestRate), &[r]);
        assert_eq!(table.rows, vec![vec![Cell::Float(0.0)]]);
    }

    #[test]
    fn every_query_respects_its_limit_and_first_order_key() {
        let records = sample_records();
        for def in CATALOG {
            let plan = def.plan();
            let table = evaluate(&plan, &records);
            assert!(!table.is_empty(), "{}", def.id);
            if let Some(limit) = plan.limit {
                assert!(table.len() <= limit, "{}: {} rows", def.id, table.len());
            }
            let Some(key) = plan.order_by.first() else {
                continue;
            };
            let idx = table.column_index(key.column).unwrap();
            for pair in table.rows.windows(2) {
                assert_ne!(
                    compare_cells(&pair[0][idx], &pair[1][idx], key.descending),
                    Ordering::Greater,
                    "{}: {} out of order",
                    def.id,
                    key.column
                );
            }
        }
    }

    #[test]
    fn race_gender_search_rate_keeps_top_five() {
        let mut records = Vec::new();
        for (race, gender, total, searched) in [
            ("Asian", DriverGender::Male, 1, 1),
            ("Asian", DriverGender::Female, 2, 1),
            ("Black", DriverGender::Male, 8, 1),
            ("Black", DriverGender::Female, 4, 1),
            ("White", DriverGender::Male, 4, 3),
            ("White", DriverGender::Female, 2, 0),
        ] {
            for i in 0..total {
                let mut r = record("India", gender, 40);
                r.driver_race = race.to_string();
                r.search_conducted = i < searched;
                records.push(r);
            }
        }

        let table = evaluate(&plan(QueryId::RaceGenderSearchRate), &records);
        assert_eq!(
            table.rows,
            vec![
                vec![text("Asian"), text("Male"), Cell::Float(100.0)],
                vec![text("White"), text("Male"), Cell::Float(75.0)],
                vec![text("Asian"), text("Female"), Cell::Float(50.0)],
                vec![text("Black"), text("Female"), Cell::Float(25.0)],
                vec![text("Black"), text("Male"), Cell::Float(12.5)],
            ]
        );
    }

    #[test]
    fn rarely_searched_violations_skip_searched_and_arrested_stops() {
        let mut records = Vec::new();
        for (violation, n, searched, arrested) in [
            ("Speeding", 3, false, false),
            ("DUI", 2, true, false),
            ("DUI", 1, false, false),
            ("Equipment", 2, false, true),
            ("Seatbelt", 2, false, false),
        ] {
            for _ in 0..n {
                let mut r = record("India", DriverGender::Male, 40);
                r.violation = violation.to_string();
                r.search_conducted = searched;
                r.is_arrested = arrested;
                records.push(r);
            }
        }

        let table = evaluate(&plan(QueryId::RarelySearchedViolations), &records);
        assert_eq!(
            table.rows,
            vec![
                vec![text("Speeding"), Cell::Int(3)],
                vec![text("Seatbelt"), Cell::Int(2)],
                vec![text("DUI"), Cell::Int(1)],
            ]
        );
    }

    #[test]
    fn violation_trends_group_by_race_and_age_decade() {
        let mut records = Vec::new();
        for age in [21, 24, 29] {
            let mut r = record("India", DriverGender::Male, age);
            r.driver_race = "Black".to_string();
            r.violation = "V00".to_string();
            records.push(r);
        }
        for i in 0..25 {
            let mut r = record("India", DriverGender::Male, 45);
            r.violation = format!("V{i:02}");
            records.push(r);
        }

        let table = evaluate(&plan(QueryId::ViolationTrendsByAgeRace), &records);
        assert_eq!(table.len(), 20);
        assert_eq!(
            table.rows[0],
            vec![text("Black"), Cell::Int(20), text("V00"), Cell::Int(3)]
        );
        assert_eq!(
            table.rows[1],
            vec![text("White"), Cell::Int(40), text("V00"), Cell::Int(1)]
        );
        assert_eq!(
            table.rows[19],
            vec![text("White"), Cell::Int(40), text("V18"), Cell::Int(1)]
        );
    }
}
