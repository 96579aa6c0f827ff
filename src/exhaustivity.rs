// src/exhaustivity.rs
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::period::{MonthKey, ReportingPeriod};
use crate::records::{PunchRecord, TeamId, TechnicianId};

// --- Day Status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayStatus {
    Conforme,
    Incomplet,
    NonConforme,
    #[serde(rename = "WeekendOK")]
    WeekendOk,
    TravailWeekend,
    Surpointage,
}

impl DayStatus {
    pub const ALL: [DayStatus; 6] = [
        DayStatus::Conforme,
        DayStatus::Incomplet,
        DayStatus::NonConforme,
        DayStatus::WeekendOk,
        DayStatus::TravailWeekend,
        DayStatus::Surpointage,
    ];

    /// Label shown on the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            DayStatus::Conforme => "Conforme",
            DayStatus::Incomplet => "Incomplet",
            DayStatus::NonConforme => "Non conforme",
            DayStatus::WeekendOk => "Weekend OK",
            DayStatus::TravailWeekend => "Travail weekend",
            DayStatus::Surpointage => "Surpointage",
        }
    }

    pub fn is_anomaly(&self) -> bool {
        !matches!(self, DayStatus::Conforme | DayStatus::WeekendOk)
    }

    /// Statuses that can only occur on a day with a non-zero baseline.
    pub fn is_working_day(&self) -> bool {
        matches!(
            self,
            DayStatus::Conforme | DayStatus::Incomplet | DayStatus::NonConforme | DayStatus::Surpointage
        )
    }

    /// 0 is the most severe. Conforming statuses sort last.
    pub fn severity(&self) -> u8 {
        match self {
            DayStatus::NonConforme => 0,
            DayStatus::Incomplet => 1,
            DayStatus::Surpointage => 2,
            DayStatus::TravailWeekend => 3,
            DayStatus::Conforme | DayStatus::WeekendOk => 4,
        }
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for DayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        DayStatus::ALL
            .into_iter()
            .find(|status| {
                let label: String = status
                    .label()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect();
                label.to_ascii_lowercase() == wanted
            })
            .ok_or_else(|| format!("Unknown day status '{}'", s))
    }
}

// --- Expected Hours ---

/// Daily baseline a technician is expected to punch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectedHours {
    weekday_hours: Decimal,
    tolerance: Decimal,
    rest_days: BTreeSet<NaiveDate>,
}

impl Default for ExpectedHours {
    fn default() -> Self {
        Self {
            weekday_hours: dec!(8),
            tolerance: Decimal::ZERO,
            rest_days: BTreeSet::new(),
        }
    }
}

impl ExpectedHours {
    pub fn new(weekday_hours: Decimal, tolerance: Decimal) -> Result<Self, ConfigError> {
        if weekday_hours <= Decimal::ZERO {
            return Err(ConfigError::InvalidExpectedHours {
                hours: weekday_hours,
            });
        }
        if tolerance < Decimal::ZERO {
            return Err(ConfigError::InvalidTolerance { tolerance });
        }
        Ok(Self {
            weekday_hours,
            tolerance,
            rest_days: BTreeSet::new(),
        })
    }

    /// Adds public holidays or other non-working weekdays.
    pub fn with_rest_days(mut self, days: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.rest_days.extend(days);
        self
    }

    pub fn weekday_hours(&self) -> Decimal {
        self.weekday_hours
    }

    pub fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    pub fn is_rest_day(&self, date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun) || self.rest_days.contains(&date)
    }

    pub fn expected_for(&self, date: NaiveDate) -> Decimal {
        if self.is_rest_day(date) {
            Decimal::ZERO
        } else {
            self.weekday_hours
        }
    }
}

/// Status of one technician-day. Every input maps to exactly one status.
pub fn classify_day(date: NaiveDate, hours_worked: Decimal, expected: &ExpectedHours) -> DayStatus {
    if expected.is_rest_day(date) {
        return if hours_worked.is_zero() {
            DayStatus::WeekendOk
        } else {
            DayStatus::TravailWeekend
        };
    }

    let baseline = expected.weekday_hours;
    if hours_worked.is_zero() {
        DayStatus::NonConforme
    } else if (hours_worked - baseline).abs() <= expected.tolerance {
        DayStatus::Conforme
    } else if hours_worked < baseline {
        DayStatus::Incomplet
    } else {
        DayStatus::Surpointage
    }
}

// --- Matrix ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExhaustivityCell {
    pub date: NaiveDate,
    pub hours_worked: Decimal,
    pub expected_hours: Decimal,
    pub status: DayStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicianRow {
    pub technician_id: TechnicianId,
    pub team_id: TeamId,
    pub cells: Vec<ExhaustivityCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExhaustivityMatrix {
    pub period: ReportingPeriod,
    pub team_filter: Option<TeamId>,
    pub days: Vec<NaiveDate>,
    /// Ordered by team, then technician.
    pub rows: Vec<TechnicianRow>,
}

/// Builds the technician x day matrix of `period`.
///
/// The roster is every technician of `records` (of `team_filter` when set),
/// not only those who punched inside the period, so a technician with no
/// entry at all shows up as a row of non-conforming days. Without a team
/// filter a technician is listed once, under the team of their latest record,
/// and each cell holds their total hours of the day across teams.
pub fn build_matrix(
    records: &[PunchRecord],
    period: &ReportingPeriod,
    team_filter: Option<&str>,
    expected: &ExpectedHours,
) -> ExhaustivityMatrix {
    let in_scope = |record: &&PunchRecord| team_filter.map_or(true, |team| record.team_id == team);

    // Latest (date, team) seen per technician decides the displayed team.
    let mut roster: BTreeMap<&str, (NaiveDate, &str)> = BTreeMap::new();
    let mut hours: BTreeMap<(&str, NaiveDate), Decimal> = BTreeMap::new();
    for record in records.iter().filter(in_scope) {
        let latest = roster
            .entry(record.technician_id.as_str())
            .or_insert((record.date, record.team_id.as_str()));
        if (record.date, record.team_id.as_str()) > *latest {
            *latest = (record.date, record.team_id.as_str());
        }
        if period.contains(record.date) {
            let day = hours
                .entry((record.technician_id.as_str(), record.date))
                .or_insert(Decimal::ZERO);
            *day = day.saturating_add(record.hours_worked);
        }
    }

    let days: Vec<NaiveDate> = period.days().collect();
    let mut rows: Vec<TechnicianRow> = roster
        .into_iter()
        .map(|(technician_id, (_, team_id))| {
            let cells = days
                .iter()
                .map(|&date| {
                    let worked = hours
                        .get(&(technician_id, date))
                        .copied()
                        .unwrap_or(Decimal::ZERO);
                    ExhaustivityCell {
                        date,
                        hours_worked: worked,
                        expected_hours: expected.expected_for(date),
                        status: classify_day(date, worked, expected),
                    }
                })
                .collect();
            TechnicianRow {
                technician_id: technician_id.to_string(),
                team_id: team_id.to_string(),
                cells,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.team_id
            .cmp(&b.team_id)
            .then_with(|| a.technician_id.cmp(&b.technician_id))
    });

    info!(
        "Built exhaustivity matrix for {} ({} technicians x {} days, team filter: {:?})",
        period,
        rows.len(),
        days.len(),
        team_filter
    );

    ExhaustivityMatrix {
        period: *period,
        team_filter: team_filter.map(String::from),
        days,
        rows,
    }
}

// --- Summaries ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExhaustivitySummary {
    pub working_days: usize,
    pub conforme: usize,
    pub incomplet: usize,
    pub non_conforme: usize,
    pub surpointage: usize,
    pub weekend_ok: usize,
    pub travail_weekend: usize,
    /// Conforming working days over working days, in percent.
    pub completion_rate_pct: f64,
}

impl ExhaustivitySummary {
    fn from_cells<'a>(cells: impl IntoIterator<Item = &'a ExhaustivityCell>) -> Self {
        let mut summary = ExhaustivitySummary::default();
        for cell in cells {
            if cell.status.is_working_day() {
                summary.working_days += 1;
            }
            match cell.status {
                DayStatus::Conforme => summary.conforme += 1,
                DayStatus::Incomplet => summary.incomplet += 1,
                DayStatus::NonConforme => summary.non_conforme += 1,
                DayStatus::Surpointage => summary.surpointage += 1,
                DayStatus::WeekendOk => summary.weekend_ok += 1,
                DayStatus::TravailWeekend => summary.travail_weekend += 1,
            }
        }
        summary.completion_rate_pct = if summary.working_days == 0 {
            0.0
        } else {
            summary.conforme as f64 * 100.0 / summary.working_days as f64
        };
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMonthSummary {
    pub team_id: TeamId,
    pub month: MonthKey,
    #[serde(flatten)]
    pub summary: ExhaustivitySummary,
}

// --- Anomalies ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnomalyFilter {
    pub team_id: Option<TeamId>,
    /// Empty means every anomalous status.
    pub statuses: Vec<DayStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub date: NaiveDate,
    pub technician_id: TechnicianId,
    pub team_id: TeamId,
    pub status: DayStatus,
    pub hours_worked: Decimal,
    pub expected_hours: Decimal,
}

impl ExhaustivityMatrix {
    pub fn cells(&self) -> impl Iterator<Item = (&TechnicianRow, &ExhaustivityCell)> {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter().map(move |cell| (row, cell)))
    }

    pub fn summary(&self) -> ExhaustivitySummary {
        ExhaustivitySummary::from_cells(self.cells().map(|(_, cell)| cell))
    }

    pub fn summary_by_technician(&self) -> BTreeMap<TechnicianId, ExhaustivitySummary> {
        self.rows
            .iter()
            .map(|row| {
                (
                    row.technician_id.clone(),
                    ExhaustivitySummary::from_cells(&row.cells),
                )
            })
            .collect()
    }

    pub fn summary_by_team(&self) -> BTreeMap<TeamId, ExhaustivitySummary> {
        let mut by_team: BTreeMap<&str, Vec<&ExhaustivityCell>> = BTreeMap::new();
        for (row, cell) in self.cells() {
            by_team.entry(row.team_id.as_str()).or_default().push(cell);
        }
        by_team
            .into_iter()
            .map(|(team, cells)| (team.to_string(), ExhaustivitySummary::from_cells(cells)))
            .collect()
    }

    /// Completion per team and calendar month, ordered by team then month.
    pub fn summary_by_team_month(&self) -> Vec<TeamMonthSummary> {
        let mut by_team_month: BTreeMap<(&str, MonthKey), Vec<&ExhaustivityCell>> =
            BTreeMap::new();
        for (row, cell) in self.cells() {
            by_team_month
                .entry((row.team_id.as_str(), MonthKey::of(cell.date)))
                .or_default()
                .push(cell);
        }
        by_team_month
            .into_iter()
            .map(|((team, month), cells)| TeamMonthSummary {
                team_id: team.to_string(),
                month,
                summary: ExhaustivitySummary::from_cells(cells),
            })
            .collect()
    }

    /// Non-conforming cells, most severe first, then by date, team and technician.
    pub fn anomalies(&self, filter: &AnomalyFilter) -> Vec<Anomaly> {
        let mut anomalies: Vec<Anomaly> = self
            .cells()
            .filter(|(row, cell)| {
                cell.status.is_anomaly()
                    && filter.team_id.as_ref().map_or(true, |team| &row.team_id == team)
                    && (filter.statuses.is_empty() || filter.statuses.contains(&cell.status))
            })
            .map(|(row, cell)| Anomaly {
                date: cell.date,
                technician_id: row.technician_id.clone(),
                team_id: row.team_id.clone(),
                status: cell.status,
                hours_worked: cell.hours_worked,
                expected_hours: cell.expected_hours,
            })
            .collect();

        anomalies.sort_by(|a, b| {
            a.status
                .severity()
                .cmp(&b.status.severity())
                .then_with(|| a.date.cmp(&b.date))
                .then_with(|| a.team_id.cmp(&b.team_id))
                .then_with(|| a.technician_id.cmp(&b.technician_id))
        });
        debug!("Found {} anomalies in {}", anomalies.len(), self.period);
        anomalies
    }
}
