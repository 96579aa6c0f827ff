// src/aggregation.rs
use chrono::{Months, NaiveDate};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    fmt,
    str::FromStr,
};
use tracing::debug;

use crate::error::PeriodError;
use crate::period::{MonthKey, ReportingPeriod, WeekKey};
use crate::records::{PunchRecord, TeamId, TechnicianId};

/// Monthly productivity ratios keyed by month, oldest first.
pub type MonthlySeries = BTreeMap<MonthKey, f64>;

/// Billable over worked hours, 0 when nothing was worked.
pub fn productivity_ratio(hours_billable: Decimal, hours_worked: Decimal) -> f64 {
    if hours_worked.is_zero() {
        return 0.0;
    }
    match (hours_billable.to_f64(), hours_worked.to_f64()) {
        (Some(billable), Some(worked)) if worked > 0.0 => billable / worked,
        _ => 0.0,
    }
}

// --- Running Sums ---

/// Numerator and denominator sums. Ratios are only ever derived from these,
/// which keeps recombination of partial aggregates exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HoursTotals {
    pub hours_worked: Decimal,
    pub hours_billable: Decimal,
    pub record_count: usize,
}

impl HoursTotals {
    /// Sums saturate at `Decimal::MAX` instead of overflowing.
    pub fn add(&mut self, record: &PunchRecord) {
        self.hours_worked = self.hours_worked.saturating_add(record.hours_worked);
        self.hours_billable = self.hours_billable.saturating_add(record.hours_billable);
        self.record_count += 1;
    }

    pub fn merge(self, other: HoursTotals) -> HoursTotals {
        HoursTotals {
            hours_worked: self.hours_worked.saturating_add(other.hours_worked),
            hours_billable: self.hours_billable.saturating_add(other.hours_billable),
            record_count: self.record_count + other.record_count,
        }
    }

    pub fn ratio(&self) -> f64 {
        productivity_ratio(self.hours_billable, self.hours_worked)
    }
}

impl<'a> FromIterator<&'a PunchRecord> for HoursTotals {
    fn from_iter<I: IntoIterator<Item = &'a PunchRecord>>(iter: I) -> Self {
        let mut totals = HoursTotals::default();
        for record in iter {
            totals.add(record);
        }
        totals
    }
}

// --- Grouping ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Global,
    Month,
    Week,
    Day,
    Team,
    Technician,
    TeamMonth,
    TechnicianMonth,
    TechnicianWeek,
}

impl FromStr for Grouping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" | "none" => Ok(Grouping::Global),
            "month" | "monthly" => Ok(Grouping::Month),
            "week" | "weekly" => Ok(Grouping::Week),
            "day" | "daily" => Ok(Grouping::Day),
            "team" => Ok(Grouping::Team),
            "technician" | "tech" => Ok(Grouping::Technician),
            "team_month" | "team-month" => Ok(Grouping::TeamMonth),
            "technician_month" | "technician-month" => Ok(Grouping::TechnicianMonth),
            "technician_week" | "technician-week" => Ok(Grouping::TechnicianWeek),
            other => Err(format!("Unknown grouping '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateScope {
    Global,
    Month { month: MonthKey },
    Week { week: WeekKey },
    Day { date: NaiveDate },
    Team { team_id: TeamId },
    Technician { technician_id: TechnicianId },
    TeamMonth { team_id: TeamId, month: MonthKey },
    TechnicianMonth { technician_id: TechnicianId, month: MonthKey },
    TechnicianWeek { technician_id: TechnicianId, week: WeekKey },
}

impl AggregateScope {
    fn for_record(grouping: Grouping, record: &PunchRecord) -> Self {
        match grouping {
            Grouping::Global => AggregateScope::Global,
            Grouping::Month => AggregateScope::Month {
                month: MonthKey::of(record.date),
            },
            Grouping::Week => AggregateScope::Week {
                week: WeekKey::of(record.date),
            },
            Grouping::Day => AggregateScope::Day { date: record.date },
            Grouping::Team => AggregateScope::Team {
                team_id: record.team_id.clone(),
            },
            Grouping::Technician => AggregateScope::Technician {
                technician_id: record.technician_id.clone(),
            },
            Grouping::TeamMonth => AggregateScope::TeamMonth {
                team_id: record.team_id.clone(),
                month: MonthKey::of(record.date),
            },
            Grouping::TechnicianMonth => AggregateScope::TechnicianMonth {
                technician_id: record.technician_id.clone(),
                month: MonthKey::of(record.date),
            },
            Grouping::TechnicianWeek => AggregateScope::TechnicianWeek {
                technician_id: record.technician_id.clone(),
                week: WeekKey::of(record.date),
            },
        }
    }
}

impl fmt::Display for AggregateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateScope::Global => write!(f, "global"),
            AggregateScope::Month { month } => write!(f, "{}", month),
            AggregateScope::Week { week } => write!(f, "{}", week),
            AggregateScope::Day { date } => write!(f, "{}", date),
            AggregateScope::Team { team_id } => write!(f, "{}", team_id),
            AggregateScope::Technician { technician_id } => write!(f, "{}", technician_id),
            AggregateScope::TeamMonth { team_id, month } => write!(f, "{}/{}", team_id, month),
            AggregateScope::TechnicianMonth {
                technician_id,
                month,
            } => write!(f, "{}/{}", technician_id, month),
            AggregateScope::TechnicianWeek {
                technician_id,
                week,
            } => write!(f, "{}/{}", technician_id, week),
        }
    }
}

// --- Aggregates ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub scope: AggregateScope,
    pub sum_hours_worked: Decimal,
    pub sum_hours_billable: Decimal,
    pub ratio: f64,
    pub record_count: usize,
}

impl Aggregate {
    pub fn from_totals(scope: AggregateScope, totals: HoursTotals) -> Self {
        Self {
            scope,
            sum_hours_worked: totals.hours_worked,
            sum_hours_billable: totals.hours_billable,
            ratio: totals.ratio(),
            record_count: totals.record_count,
        }
    }

    pub fn totals(&self) -> HoursTotals {
        HoursTotals {
            hours_worked: self.sum_hours_worked,
            hours_billable: self.sum_hours_billable,
            record_count: self.record_count,
        }
    }

    /// Recombines two aggregates of disjoint record sets. The scope of `self`
    /// is kept; the ratio is recomputed from the merged sums.
    pub fn merge(&self, other: &Aggregate) -> Aggregate {
        Aggregate::from_totals(self.scope.clone(), self.totals().merge(other.totals()))
    }
}

pub fn aggregate_global(records: &[PunchRecord]) -> Aggregate {
    Aggregate::from_totals(AggregateScope::Global, records.iter().collect())
}

/// Sum/sum aggregation per scope of `grouping`, ordered by scope.
/// `Grouping::Global` always yields exactly one aggregate, even when empty.
pub fn aggregate(records: &[PunchRecord], grouping: Grouping) -> Vec<Aggregate> {
    if grouping == Grouping::Global {
        return vec![aggregate_global(records)];
    }

    let mut by_scope: BTreeMap<AggregateScope, HoursTotals> = BTreeMap::new();
    for record in records {
        by_scope
            .entry(AggregateScope::for_record(grouping, record))
            .or_default()
            .add(record);
    }
    debug!(
        "Aggregated {} records into {} {:?} scopes",
        records.len(),
        by_scope.len(),
        grouping
    );

    by_scope
        .into_iter()
        .map(|(scope, totals)| Aggregate::from_totals(scope, totals))
        .collect()
}

fn compare_for_ranking(a: &Aggregate, b: &Aggregate) -> Ordering {
    b.ratio
        .total_cmp(&a.ratio)
        .then_with(|| b.sum_hours_worked.cmp(&a.sum_hours_worked))
        .then_with(|| a.scope.cmp(&b.scope))
}

/// Ratio descending, then more worked hours first, then entity id.
pub fn rank(mut aggregates: Vec<Aggregate>) -> Vec<Aggregate> {
    aggregates.sort_by(compare_for_ranking);
    aggregates
}

pub fn top_technicians(records: &[PunchRecord], limit: usize) -> Vec<Aggregate> {
    let mut ranked = rank(aggregate(records, Grouping::Technician));
    ranked.truncate(limit);
    ranked
}

pub fn records_in_period(records: &[PunchRecord], period: Option<&ReportingPeriod>) -> Vec<PunchRecord> {
    match period {
        Some(period) => records
            .iter()
            .filter(|record| period.contains(record.date))
            .cloned()
            .collect(),
        None => records.to_vec(),
    }
}

/// Aggregates the records dated within `[reference - months, reference]`.
/// Used with 12 months for rolling R-12 productivity.
pub fn rolling_window(
    records: &[PunchRecord],
    reference: NaiveDate,
    months: u32,
    grouping: Grouping,
) -> Result<Vec<Aggregate>, PeriodError> {
    let start = reference
        .checked_sub_months(Months::new(months))
        .ok_or(PeriodError::DateOverflow)?;
    let window = ReportingPeriod::new(start, reference)?;
    debug!("Rolling window of {} months: {}", months, window);
    Ok(aggregate(&records_in_period(records, Some(&window)), grouping))
}

pub fn monthly_series(records: &[PunchRecord]) -> MonthlySeries {
    aggregate(records, Grouping::Month)
        .into_iter()
        .filter_map(|agg| match agg.scope {
            AggregateScope::Month { month } => Some((month, agg.ratio)),
            _ => None,
        })
        .collect()
}

pub fn team_monthly_series(records: &[PunchRecord]) -> BTreeMap<TeamId, MonthlySeries> {
    let mut series: BTreeMap<TeamId, MonthlySeries> = BTreeMap::new();
    for agg in aggregate(records, Grouping::TeamMonth) {
        if let AggregateScope::TeamMonth { team_id, month } = agg.scope {
            series.entry(team_id).or_default().insert(month, agg.ratio);
        }
    }
    series
}

pub fn distinct_teams(records: &[PunchRecord]) -> Vec<TeamId> {
    let teams: HashSet<&str> = records.iter().map(|r| r.team_id.as_str()).collect();
    let mut teams: Vec<TeamId> = teams.into_iter().map(String::from).collect();
    teams.sort();
    teams
}
