//! The fixed query catalog.
//!
//! Each entry pairs a [`QueryId`] with a function building its
//! [`QueryPlan`]. Engines never special-case a query; everything a query
//! does is in its plan.

use police_log_analytics_models::{OutputShape, QueryId};

use crate::plan::{
    Aggregate, CmpOp, Dimension, Flag, Numeric, OrderBy, Pivot, Predicate, QueryPlan, RankWindow,
};

/// A catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct QueryDefinition {
    pub id: QueryId,
    pub build: fn() -> QueryPlan,
}

impl QueryDefinition {
    #[must_use]
    pub fn plan(&self) -> QueryPlan {
        (self.build)()
    }
}

/// Every catalog query, in display order.
pub static CATALOG: &[QueryDefinition] = &[
    QueryDefinition {
        id: QueryId::TopDrugVehicles,
        build: top_drug_vehicles,
    },
    QueryDefinition {
        id: QueryId::MostSearchedVehicles,
        build: most_searched_vehicles,
    },
    QueryDefinition {
        id: QueryId::AgeGroupArrestRate,
        build: age_group_arrest_rate,
    },
    QueryDefinition {
        id: QueryId::GenderByCountry,
        build: gender_by_country,
    },
    QueryDefinition {
        id: QueryId::RaceGenderSearchRate,
        build: race_gender_search_rate,
    },
    QueryDefinition {
        id: QueryId::StopsByHour,
        build: stops_by_hour,
    },
    QueryDefinition {
        id: QueryId::AvgDurationByViolation,
        build: avg_duration_by_violation,
    },
    QueryDefinition {
        id: QueryId::NightArrestRate,
        build: night_arrest_rate,
    },
    QueryDefinition {
        id: QueryId::ViolationsSearchArrest,
        build: violations_search_arrest,
    },
    QueryDefinition {
        id: QueryId::YoungDriverViolations,
        build: young_driver_violations,
    },
    QueryDefinition {
        id: QueryId::RarelySearchedViolations,
        build: rarely_searched_violations,
    },
    QueryDefinition {
        id: QueryId::DrugStopCountries,
        build: drug_stop_countries,
    },
    QueryDefinition {
        id: QueryId::ArrestRateByCountryViolation,
        build: arrest_rate_by_country_violation,
    },
    QueryDefinition {
        id: QueryId::SearchedStopCountries,
        build: searched_stop_countries,
    },
    QueryDefinition {
        id: QueryId::YearlyStopsByCountry,
        build: yearly_stops_by_country,
    },
    QueryDefinition {
        id: QueryId::ViolationTrendsByAgeRace,
        build: violation_trends_by_age_race,
    },
    QueryDefinition {
        id: QueryId::TimePeriodBreakdown,
        build: time_period_breakdown,
    },
    QueryDefinition {
        id: QueryId::HighSearchArrestViolations,
        build: high_search_arrest_violations,
    },
    QueryDefinition {
        id: QueryId::DemographicsByCountry,
        build: demographics_by_country,
    },
    QueryDefinition {
        id: QueryId::TopViolationsByArrestRate,
        build: top_violations_by_arrest_rate,
    },
];

/// Looks up the catalog entry for `id`.
#[must_use]
pub fn definition(id: QueryId) -> Option<&'static QueryDefinition> {
    CATALOG.iter().find(|d| d.id == id)
}

/// `count by <dimension>` where the predicate holds, most frequent first.
fn top_counts(predicate: Option<Predicate>, dimension: Dimension, limit: usize) -> QueryPlan {
    let plan = QueryPlan::new(OutputShape::RankedList)
        .group_by(&[dimension])
        .measure("stops", Aggregate::Count)
        .order_by(&[OrderBy::desc("stops")])
        .limit(limit);
    match predicate {
        Some(p) => plan.filter(p),
        None => plan,
    }
}

fn top_drug_vehicles() -> QueryPlan {
    top_counts(
        Some(Predicate::Is(Flag::DrugsRelated)),
        Dimension::VehicleNumber,
        10,
    )
}

fn most_searched_vehicles() -> QueryPlan {
    top_counts(
        Some(Predicate::Is(Flag::SearchConducted)),
        Dimension::VehicleNumber,
        10,
    )
}

fn age_group_arrest_rate() -> QueryPlan {
    QueryPlan::new(OutputShape::RankedList)
        .group_by(&[Dimension::AgeDecade])
        .measure("arrest_rate", Aggregate::RatePct(Flag::IsArrested))
        .order_by(&[OrderBy::desc("arrest_rate")])
        .limit(1)
}

fn gender_by_country() -> QueryPlan {
    QueryPlan::new(OutputShape::CrossTable)
        .group_by(&[Dimension::Country, Dimension::Gender])
        .measure("stops", Aggregate::Count)
        .pivot(Pivot {
            rows: Dimension::Country,
            columns: Dimension::Gender,
            value: "stops",
        })
}

fn race_gender_search_rate() -> QueryPlan {
    QueryPlan::new(OutputShape::Table)
        .group_by(&[Dimension::Race, Dimension::Gender])
        .measure("search_rate", Aggregate::RatePct(Flag::SearchConducted))
        .order_by(&[OrderBy::desc("search_rate")])
        .limit(5)
}

fn stops_by_hour() -> QueryPlan {
    QueryPlan::new(OutputShape::RankedList)
        .group_by(&[Dimension::Hour])
        .measure("stops", Aggregate::Count)
        .order_by(&[OrderBy::desc("stops")])
}

fn avg_duration_by_violation() -> QueryPlan {
    QueryPlan::new(OutputShape::RankedList)
        .group_by(&[Dimension::Violation])
        .measure(
            "avg_duration_min",
            Aggregate::Mean(Numeric::DurationMinutes),
        )
        .order_by(&[OrderBy::desc("avg_duration_min")])
}

fn night_arrest_rate() -> QueryPlan {
    QueryPlan::new(OutputShape::Scalar)
        .filter(Predicate::Any(vec![
            Predicate::compare(Dimension::Hour, CmpOp::Ge, 20),
            Predicate::compare(Dimension::Hour, CmpOp::Le, 5),
        ]))
        .measure("arrest_rate", Aggregate::RatePct(Flag::IsArrested))
}

fn violations_search_arrest() -> QueryPlan {
    QueryPlan::new(OutputShape::Table)
        .group_by(&[Dimension::Violation])
        .measure("total_searches", Aggregate::Sum(Flag::SearchConducted))
        .measure("total_arrests", Aggregate::Sum(Flag::IsArrested))
        .order_by(&[
            OrderBy::desc("total_arrests"),
            OrderBy::desc("total_searches"),
        ])
        .limit(10)
}

fn young_driver_violations() -> QueryPlan {
    top_counts(
        Some(Predicate::compare(Dimension::Age, CmpOp::Lt, 25)),
        Dimension::Violation,
        10,
    )
}

fn rarely_searched_violations() -> QueryPlan {
    top_counts(
        Some(Predicate::All(vec![
            Predicate::Is(Flag::SearchConducted).not(),
            Predicate::Is(Flag::IsArrested).not(),
        ])),
        Dimension::Violation,
        10,
    )
}

fn drug_stop_countries() -> QueryPlan {
    top_counts(
        Some(Predicate::Is(Flag::DrugsRelated)),
        Dimension::Country,
        10,
    )
}

fn arrest_rate_by_country_violation() -> QueryPlan {
    QueryPlan::new(OutputShape::Table)
        .group_by(&[Dimension::Country, Dimension::Violation])
        .measure("arrest_rate", Aggregate::RatePct(Flag::IsArrested))
        .order_by(&[OrderBy::desc("arrest_rate")])
}

fn searched_stop_countries() -> QueryPlan {
    top_counts(
        Some(Predicate::Is(Flag::SearchConducted)),
        Dimension::Country,
        10,
    )
}

fn yearly_stops_by_country() -> QueryPlan {
    QueryPlan::new(OutputShape::Table)
        .group_by(&[Dimension::Country, Dimension::Year])
        .measure("total_stops", Aggregate::Count)
        .measure("total_arrests", Aggregate::Sum(Flag::IsArrested))
        .measure("arrest_rate", Aggregate::RatePct(Flag::IsArrested))
        .rank(RankWindow {
            name: "stop_rank",
            partition_by: vec![Dimension::Country],
            measure: "total_stops",
            descending: true,
        })
        .order_by(&[OrderBy::asc("country_name"), OrderBy::asc("year")])
}

fn violation_trends_by_age_race() -> QueryPlan {
    QueryPlan::new(OutputShape::Table)
        .group_by(&[Dimension::Race, Dimension::AgeDecade, Dimension::Violation])
        .measure("violation_count", Aggregate::Count)
        .order_by(&[OrderBy::desc("violation_count")])
        .limit(20)
}

fn time_period_breakdown() -> QueryPlan {
    QueryPlan::new(OutputShape::Table)
        .group_by(&[Dimension::Year, Dimension::Month, Dimension::Hour])
        .measure("stops", Aggregate::Count)
        .order_by(&[
            OrderBy::asc("year"),
            OrderBy::asc("month"),
            OrderBy::asc("hour"),
        ])
}

fn high_search_arrest_violations() -> QueryPlan {
    QueryPlan::new(OutputShape::Table)
        .group_by(&[Dimension::Violation])
        .measure("total_stops", Aggregate::Count)
        .measure("search_rate", Aggregate::RatePct(Flag::SearchConducted))
        .measure("arrest_rate", Aggregate::RatePct(Flag::IsArrested))
        .having_count_gt(10)
        .rank(RankWindow {
            name: "arrest_rank",
            partition_by: Vec::new(),
            measure: "arrest_rate",
            descending: true,
        })
        .order_by(&[OrderBy::asc("arrest_rank")])
        .limit(20)
}

fn demographics_by_country() -> QueryPlan {
    QueryPlan::new(OutputShape::Table)
        .group_by(&[Dimension::Country, Dimension::Gender, Dimension::Race])
        .measure("avg_age", Aggregate::Mean(Numeric::Age))
        .measure("total_stops", Aggregate::Count)
}

fn top_violations_by_arrest_rate() -> QueryPlan {
    QueryPlan::new(OutputShape::RankedList)
        .group_by(&[Dimension::Violation])
        .measure("total_stops", Aggregate::Count)
        .measure("arrest_rate", Aggregate::RatePct(Flag::IsArrested))
        .having_count_gt(10)
        .order_by(&[OrderBy::desc("arrest_rate")])
        .limit(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_query_id_has_exactly_one_entry() {
        assert_eq!(CATALOG.len(), QueryId::all().len());
        for id in QueryId::all() {
            assert_eq!(
                CATALOG.iter().filter(|d| d.id == *id).count(),
                1,
                "{id} registered more than once or missing"
            );
        }
    }

    #[test]
    fn catalog_order_matches_query_ids() {
        let ids: Vec<QueryId> = CATALOG.iter().map(|d| d.id).collect();
        assert_eq!(ids, QueryId::all());
    }

    #[test]
    fn order_keys_name_output_columns() {
        for def in CATALOG {
            let plan = def.plan();
            let mut columns: Vec<&str> = plan.group_by.iter().map(|d| d.name()).collect();
            columns.extend(plan.measures.iter().map(|m| m.name));
            if let Some(rank) = &plan.rank {
                assert!(columns.contains(&rank.measure), "{}", def.id);
                columns.push(rank.name);
            }
            for key in &plan.order_by {
                assert!(columns.contains(&key.column), "{}: {}", def.id, key.column);
            }
        }
    }

    #[test]
    fn scalar_plans_are_ungrouped_with_one_measure() {
        for def in CATALOG {
            let plan = def.plan();
            if plan.shape == OutputShape::Scalar {
                assert!(plan.group_by.is_empty(), "{}", def.id);
                assert_eq!(plan.measures.len(), 1, "{}", def.id);
            }
        }
    }

    #[test]
    fn sparse_groups_are_excluded_where_required() {
        for id in [
            QueryId::HighSearchArrestViolations,
            QueryId::TopViolationsByArrestRate,
        ] {
            let plan = definition(id).unwrap().plan();
            assert_eq!(plan.having_count_gt, Some(10));
        }
    }
}
