//! Declarative description of a catalog query.
//!
//! A [`QueryPlan`] is the single "group / aggregate / sort / limit" shape
//! every catalog entry fits. Both engines run the same pipeline:
//!
//! 1. keep records matching [`QueryPlan::predicate`]
//! 2. group by [`QueryPlan::group_by`] (one group when empty)
//! 3. drop groups with `count <= having_count_gt`
//! 4. compute the optional [`RankWindow`]
//! 5. sort by [`QueryPlan::order_by`], then by the group keys ascending
//! 6. truncate to [`QueryPlan::limit`]

use chrono::{Datelike as _, Timelike as _};
use police_log_analytics_models::{ColumnKind, OutputShape};
use police_log_stop_models::StopRecord;

/// A value a record can be grouped by or compared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Country,
    Gender,
    Race,
    Violation,
    VehicleNumber,
    Age,
    /// Age rounded down to its decade (`37` -> `30`).
    AgeDecade,
    Hour,
    Year,
    Month,
}

impl Dimension {
    /// Output column name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Country => "country_name",
            Self::Gender => "driver_gender",
            Self::Race => "driver_race",
            Self::Violation => "violation",
            Self::VehicleNumber => "vehicle_number",
            Self::Age => "driver_age",
            Self::AgeDecade => "age_group",
            Self::Hour => "hour",
            Self::Year => "year",
            Self::Month => "month",
        }
    }

    #[must_use]
    pub const fn kind(self) -> ColumnKind {
        match self {
            Self::Country | Self::Gender | Self::Race | Self::Violation | Self::VehicleNumber => {
                ColumnKind::Text
            }
            Self::Age | Self::AgeDecade | Self::Hour | Self::Year | Self::Month => ColumnKind::Int,
        }
    }

    /// Value of this dimension for `record`.
    #[must_use]
    pub fn key(self, record: &StopRecord) -> GroupKey {
        match self {
            Self::Country => GroupKey::Text(record.country_name.clone()),
            Self::Gender => GroupKey::Text(record.driver_gender.to_string()),
            Self::Race => GroupKey::Text(record.driver_race.clone()),
            Self::Violation => GroupKey::Text(record.violation.clone()),
            Self::VehicleNumber => GroupKey::Text(record.vehicle_number.clone()),
            Self::Age => GroupKey::Int(i64::from(record.driver_age)),
            Self::AgeDecade => GroupKey::Int(i64::from(record.driver_age / 10 * 10)),
            Self::Hour => GroupKey::Int(i64::from(record.stop_datetime.hour())),
            Self::Year => GroupKey::Int(i64::from(record.stop_datetime.year())),
            Self::Month => GroupKey::Int(i64::from(record.stop_datetime.month())),
        }
    }
}

/// A grouping key component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Int(i64),
    Text(String),
}

/// A boolean attribute of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    SearchConducted,
    IsArrested,
    DrugsRelated,
}

impl Flag {
    /// Column holding the flag.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::SearchConducted => "search_conducted",
            Self::IsArrested => "is_arrested",
            Self::DrugsRelated => "drugs_related_stop",
        }
    }

    #[must_use]
    pub const fn get(self, record: &StopRecord) -> bool {
        match self {
            Self::SearchConducted => record.search_conducted,
            Self::IsArrested => record.is_arrested,
            Self::DrugsRelated => record.drugs_related_stop,
        }
    }
}

/// A numeric attribute that can be averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Numeric {
    Age,
    /// Minutes parsed out of the free-form `stop_duration` text.
    DurationMinutes,
}

impl Numeric {
    /// Value for `record`; `None` when it cannot be determined.
    #[must_use]
    pub fn get(self, record: &StopRecord) -> Option<f64> {
        match self {
            Self::Age => Some(f64::from(record.driver_age)),
            Self::DurationMinutes => crate::duration::parse_minutes(&record.stop_duration),
        }
    }
}

/// Comparison operator used by [`Predicate::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Ge,
    Gt,
}

impl CmpOp {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Gt => ">",
        }
    }

    #[must_use]
    pub const fn holds(self, left: i64, right: i64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Ge => left >= right,
            Self::Gt => left > right,
        }
    }
}

/// Row predicate applied before grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Is(Flag),
    Not(Box<Self>),
    All(Vec<Self>),
    Any(Vec<Self>),
    /// Integer comparison of a numeric dimension against a constant.
    Compare {
        dimension: Dimension,
        op: CmpOp,
        value: i64,
    },
}

impl Predicate {
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    #[must_use]
    pub const fn compare(dimension: Dimension, op: CmpOp, value: i64) -> Self {
        Self::Compare {
            dimension,
            op,
            value,
        }
    }

    #[must_use]
    pub fn matches(&self, record: &StopRecord) -> bool {
        match self {
            Self::Is(flag) => flag.get(record),
            Self::Not(inner) => !inner.matches(record),
            Self::All(parts) => parts.iter().all(|p| p.matches(record)),
            Self::Any(parts) => parts.iter().any(|p| p.matches(record)),
            Self::Compare {
                dimension,
                op,
                value,
            } => match dimension.key(record) {
                GroupKey::Int(v) => op.holds(v, *value),
                GroupKey::Text(_) => false,
            },
        }
    }
}

/// How a measure is computed over a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    /// Number of records.
    Count,
    /// Number of records with the flag set.
    Sum(Flag),
    /// `100 * count(flag) / count(*)`.
    RatePct(Flag),
    /// Mean of the values that could be determined; null when none.
    Mean(Numeric),
}

impl Aggregate {
    #[must_use]
    pub const fn kind(self) -> ColumnKind {
        match self {
            Self::Count | Self::Sum(_) => ColumnKind::Int,
            Self::RatePct(_) | Self::Mean(_) => ColumnKind::Float,
        }
    }
}

/// A named aggregate output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measure {
    pub name: &'static str,
    pub aggregate: Aggregate,
}

impl Measure {
    #[must_use]
    pub const fn new(name: &'static str, aggregate: Aggregate) -> Self {
        Self { name, aggregate }
    }
}

/// `RANK()` over a measure, optionally partitioned by group dimensions.
///
/// Ties share a rank and the following rank is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankWindow {
    /// Output column name.
    pub name: &'static str,
    pub partition_by: Vec<Dimension>,
    /// Measure to rank by.
    pub measure: &'static str,
    pub descending: bool,
}

/// One sort key, referring to an output column by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

impl OrderBy {
    #[must_use]
    pub const fn asc(column: &'static str) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    #[must_use]
    pub const fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// Spreads a long `(row, column, value)` table into a cross table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pivot {
    pub rows: Dimension,
    pub columns: Dimension,
    pub value: &'static str,
}

/// A complete query description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub predicate: Option<Predicate>,
    pub group_by: Vec<Dimension>,
    pub measures: Vec<Measure>,
    pub having_count_gt: Option<u64>,
    pub rank: Option<RankWindow>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub shape: OutputShape,
    pub pivot: Option<Pivot>,
}

impl QueryPlan {
    /// Empty plan producing `shape`.
    #[must_use]
    pub fn new(shape: OutputShape) -> Self {
        Self {
            predicate: None,
            group_by: Vec::new(),
            measures: Vec::new(),
            having_count_gt: None,
            rank: None,
            order_by: Vec::new(),
            limit: None,
            shape,
            pivot: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    #[must_use]
    pub fn group_by(mut self, dimensions: &[Dimension]) -> Self {
        self.group_by = dimensions.to_vec();
        self
    }

    #[must_use]
    pub fn measure(mut self, name: &'static str, aggregate: Aggregate) -> Self {
        self.measures.push(Measure::new(name, aggregate));
        self
    }

    #[must_use]
    pub const fn having_count_gt(mut self, n: u64) -> Self {
        self.having_count_gt = Some(n);
        self
    }

    #[must_use]
    pub fn rank(mut self, window: RankWindow) -> Self {
        self.rank = Some(window);
        self
    }

    #[must_use]
    pub fn order_by(mut self, keys: &[OrderBy]) -> Self {
        self.order_by = keys.to_vec();
        self
    }

    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub const fn pivot(mut self, pivot: Pivot) -> Self {
        self.pivot = Some(pivot);
        self
    }

    /// Whether any measure needs a value SQL cannot compute.
    #[must_use]
    pub fn needs_record_values(&self) -> bool {
        self.measures
            .iter()
            .any(|m| matches!(m.aggregate, Aggregate::Mean(Numeric::DurationMinutes)))
    }
}
