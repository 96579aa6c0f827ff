// src/records.rs
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

// --- Core Data Structures ---

pub type TechnicianId = String;
pub type TeamId = String;

/// Team assigned to rows that arrive without one.
pub const UNASSIGNED_TEAM: &str = "unassigned";

/// Upper bound for the hours of a single row: a month of continuous work.
pub const MAX_HOURS_PER_ROW: Decimal = dec!(744);

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// A punch row as delivered by the record store. Everything is optional and
/// textual; `normalize_rows` decides what survives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPunchRow {
    #[serde(alias = "Saisie heures - Date", alias = "jour")]
    pub date: Option<String>,
    #[serde(alias = "Salarié - Nom", alias = "technicien")]
    pub technician_id: Option<String>,
    #[serde(alias = "Salarié - Equipe(Nom)", alias = "equipe")]
    pub team_id: Option<String>,
    #[serde(alias = "Hr_travaillée", alias = "heures_total")]
    pub hours_worked: Option<String>,
    #[serde(alias = "Facturable", alias = "facturable")]
    pub hours_billable: Option<String>,
}

impl RawPunchRow {
    pub fn new(date: &str, technician_id: &str, team_id: &str, worked: f64, billable: f64) -> Self {
        Self {
            date: Some(date.to_string()),
            technician_id: Some(technician_id.to_string()),
            team_id: Some(team_id.to_string()),
            hours_worked: Some(worked.to_string()),
            hours_billable: Some(billable.to_string()),
        }
    }
}

/// One canonical punch per (date, technician, team).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PunchRecord {
    pub date: NaiveDate,
    pub technician_id: TechnicianId,
    pub team_id: TeamId,
    pub hours_worked: Decimal,
    pub hours_billable: Decimal,
}

// --- Rejections ---

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowRejection {
    #[error("Row has no date")]
    MissingDate,
    #[error("Unparsable date '{value}'")]
    UnparsableDate { value: String },
    #[error("Row has no technician")]
    MissingTechnician,
    #[error("Unparsable number '{value}' in field {field}")]
    UnparsableNumber { field: &'static str, value: String },
    #[error("Negative hours '{value}' in field {field}")]
    NegativeHours { field: &'static str, value: String },
    #[error("Implausible hours '{value}' in field {field}")]
    ImplausibleHours { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub row_index: usize,
    pub reason: RowRejection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub total_rows: usize,
    pub kept_records: usize,
    /// Rows folded into a key that another row already opened.
    pub merged_rows: usize,
    pub dropped_rows: usize,
    pub rejections: Vec<RejectedRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedRecords {
    pub records: Vec<PunchRecord>,
    pub report: NormalizationReport,
}

// --- Parsing Helpers ---

/// Parses the date formats seen in timesheet exports. Time parts are ignored.
pub fn parse_punch_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Missing, empty and NaN cells count as zero hours.
pub fn parse_hours(raw: Option<&str>, field: &'static str) -> Result<Decimal, RowRejection> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(Decimal::ZERO);
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
        return Ok(Decimal::ZERO);
    }
    let normalized = raw.replace(',', ".");
    let hours = Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|_| RowRejection::UnparsableNumber {
            field,
            value: raw.to_string(),
        })?;
    if hours < dec!(0) {
        return Err(RowRejection::NegativeHours {
            field,
            value: raw.to_string(),
        });
    }
    if hours > MAX_HOURS_PER_ROW {
        return Err(RowRejection::ImplausibleHours {
            field,
            value: raw.to_string(),
        });
    }
    Ok(hours.normalize())
}

fn clean_id(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
}

struct CanonicalRow {
    date: NaiveDate,
    technician_id: TechnicianId,
    team_id: TeamId,
    hours_worked: Decimal,
    hours_billable: Decimal,
}

fn canonicalize(row: &RawPunchRow) -> Result<CanonicalRow, RowRejection> {
    let raw_date = row
        .date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or(RowRejection::MissingDate)?;
    let date = parse_punch_date(raw_date).ok_or_else(|| RowRejection::UnparsableDate {
        value: raw_date.to_string(),
    })?;
    let technician_id =
        clean_id(row.technician_id.as_deref()).ok_or(RowRejection::MissingTechnician)?;
    let team_id =
        clean_id(row.team_id.as_deref()).unwrap_or_else(|| UNASSIGNED_TEAM.to_string());
    let hours_worked = parse_hours(row.hours_worked.as_deref(), "hours_worked")?;
    let hours_billable = parse_hours(row.hours_billable.as_deref(), "hours_billable")?;

    Ok(CanonicalRow {
        date,
        technician_id,
        team_id,
        hours_worked,
        hours_billable,
    })
}

// --- Normalization ---

type RowKey = (NaiveDate, TechnicianId, TeamId);

/// Adds a row to the sums of its key. A row whose hours would overflow the
/// running sums is rejected and leaves them untouched.
fn merge_into(
    by_key: &mut BTreeMap<RowKey, (Decimal, Decimal)>,
    canonical: CanonicalRow,
) -> Result<(), RowRejection> {
    let sums = by_key
        .entry((canonical.date, canonical.technician_id, canonical.team_id))
        .or_insert((Decimal::ZERO, Decimal::ZERO));
    let worked = sums.0.checked_add(canonical.hours_worked).ok_or_else(|| {
        RowRejection::ImplausibleHours {
            field: "hours_worked",
            value: canonical.hours_worked.to_string(),
        }
    })?;
    let billable = sums.1.checked_add(canonical.hours_billable).ok_or_else(|| {
        RowRejection::ImplausibleHours {
            field: "hours_billable",
            value: canonical.hours_billable.to_string(),
        }
    })?;
    *sums = (worked, billable);
    Ok(())
}

/// Collapses raw rows into one `PunchRecord` per (date, technician, team).
///
/// Hours of rows sharing a key are summed here, before any ratio exists, so
/// that every downstream ratio is a ratio of sums. Malformed rows are dropped
/// and reported; nothing in here fails.
pub fn normalize_rows(rows: &[RawPunchRow]) -> NormalizedRecords {
    let mut report = NormalizationReport {
        total_rows: rows.len(),
        ..Default::default()
    };
    let mut by_key: BTreeMap<RowKey, (Decimal, Decimal)> = BTreeMap::new();
    let mut accepted_rows = 0usize;

    for (row_index, row) in rows.iter().enumerate() {
        match canonicalize(row).and_then(|canonical| merge_into(&mut by_key, canonical)) {
            Ok(()) => accepted_rows += 1,
            Err(reason) => {
                debug!("Dropping row {}: {}", row_index, reason);
                report.rejections.push(RejectedRow { row_index, reason });
            }
        }
    }

    let records: Vec<PunchRecord> = by_key
        .into_iter()
        .map(
            |((date, technician_id, team_id), (hours_worked, hours_billable))| PunchRecord {
                date,
                technician_id,
                team_id,
                hours_worked,
                hours_billable,
            },
        )
        .collect();

    report.kept_records = records.len();
    report.merged_rows = accepted_rows - records.len();
    report.dropped_rows = report.rejections.len();

    if report.dropped_rows > 0 {
        warn!(
            "Normalization dropped {} of {} rows as malformed",
            report.dropped_rows, report.total_rows
        );
    }
    info!(
        "Normalized {} rows into {} records ({} merged, {} dropped)",
        report.total_rows, report.kept_records, report.merged_rows, report.dropped_rows
    );

    NormalizedRecords { records, report }
}

#[cfg(test)]
mod records_tests {
    use super::*;

    impl RawPunchRow {
        fn hours_worked(mut self, raw: Option<&str>) -> Self {
            self.hours_worked = raw.map(String::from);
            self
        }

        fn hours_billable(mut self, raw: Option<&str>) -> Self {
            self.hours_billable = raw.map(String::from);
            self
        }
    }

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    #[test]
    fn duplicate_keys_are_summed_into_one_record() {
        let rows = vec![
            RawPunchRow::new("2025-01-06", "T1", "Atelier", 4.0, 4.0),
            RawPunchRow::new("2025-01-06", "T1", "Atelier", 4.0, 2.5),
            RawPunchRow::new("2025-01-06", "T2", "Atelier", 8.0, 6.0),
        ];

        let normalized = normalize_rows(&rows);

        assert_eq!(normalized.records.len(), 2);
        let t1 = &normalized.records[0];
        assert_eq!(t1.technician_id, "T1");
        assert_eq!(t1.hours_worked, dec!(8));
        assert_eq!(t1.hours_billable, dec!(6.5));
        assert_eq!(normalized.report.merged_rows, 1);
        assert_eq!(normalized.report.dropped_rows, 0);
    }

    #[test]
    fn same_technician_in_two_teams_stays_split() {
        let rows = vec![
            RawPunchRow::new("2025-01-06", "T1", "Atelier", 4.0, 4.0),
            RawPunchRow::new("2025-01-06", "T1", "Terrain", 4.0, 1.0),
        ];
        let normalized = normalize_rows(&rows);
        assert_eq!(normalized.records.len(), 2);
        assert_eq!(normalized.report.merged_rows, 0);
    }

    #[test]
    fn missing_and_nan_hours_default_to_zero() {
        let rows = vec![
            RawPunchRow::new("2025-01-06", "T1", "Atelier", 0.0, 0.0)
                .hours_worked(None)
                .hours_billable(Some("NaN")),
            RawPunchRow::new("2025-01-07", "T1", "Atelier", 0.0, 0.0)
                .hours_worked(Some(""))
                .hours_billable(Some("7,5")),
        ];

        let normalized = normalize_rows(&rows);

        assert_eq!(normalized.report.dropped_rows, 0);
        assert_eq!(normalized.records[0].hours_worked, Decimal::ZERO);
        assert_eq!(normalized.records[0].hours_billable, Decimal::ZERO);
        assert_eq!(normalized.records[1].hours_billable, dec!(7.5));
    }

    #[test]
    fn malformed_rows_are_dropped_and_counted() {
        let rows = vec![
            RawPunchRow::new("not-a-date", "T1", "Atelier", 8.0, 8.0),
            RawPunchRow::new("2025-01-06", "", "Atelier", 8.0, 8.0),
            RawPunchRow::new("2025-01-06", "T1", "Atelier", 0.0, 0.0).hours_worked(Some("eight")),
            RawPunchRow::new("2025-01-06", "T1", "Atelier", -1.0, 0.0),
            RawPunchRow {
                date: None,
                ..RawPunchRow::new("2025-01-06", "T1", "Atelier", 8.0, 8.0)
            },
            RawPunchRow::new("2025-01-07", "T1", "Atelier", 8.0, 8.0),
        ];

        let normalized = normalize_rows(&rows);

        assert_eq!(normalized.report.total_rows, 6);
        assert_eq!(normalized.report.dropped_rows, 5);
        assert_eq!(normalized.report.kept_records, 1);
        assert_eq!(
            normalized.report.rejections[0].reason,
            RowRejection::UnparsableDate {
                value: "not-a-date".to_string()
            }
        );
        assert_eq!(
            normalized.report.rejections[1].reason,
            RowRejection::MissingTechnician
        );
        assert!(matches!(
            normalized.report.rejections[2].reason,
            RowRejection::UnparsableNumber {
                field: "hours_worked",
                ..
            }
        ));
        assert!(matches!(
            normalized.report.rejections[3].reason,
            RowRejection::NegativeHours { .. }
        ));
        assert_eq!(
            normalized.report.rejections[4].reason,
            RowRejection::MissingDate
        );
    }

    #[test]
    fn huge_hours_are_rejected_instead_of_overflowing() {
        let huge = Some("79228162514264337593543950335");
        let rows = vec![
            RawPunchRow::new("2025-01-06", "T1", "X", 0.0, 0.0).hours_worked(huge),
            RawPunchRow::new("2025-01-06", "T1", "X", 0.0, 0.0).hours_worked(huge),
            RawPunchRow::new("2025-01-07", "T1", "X", 0.0, 0.0).hours_billable(huge),
            RawPunchRow::new("2025-01-08", "T1", "X", 8.0, 6.0),
        ];

        let normalized = normalize_rows(&rows);

        assert_eq!(normalized.report.dropped_rows, 3);
        assert_eq!(normalized.report.kept_records, 1);
        assert_eq!(normalized.records[0].date, d("2025-01-08"));
        assert!(normalized.report.rejections.iter().all(|r| matches!(
            r.reason,
            RowRejection::ImplausibleHours { .. }
        )));
    }

    #[test]
    fn hours_bound_is_inclusive() {
        assert_eq!(
            parse_hours(Some("744"), "hours_worked"),
            Ok(MAX_HOURS_PER_ROW)
        );
        assert_eq!(
            parse_hours(Some("744,5"), "hours_worked"),
            Err(RowRejection::ImplausibleHours {
                field: "hours_worked",
                value: "744,5".to_string()
            })
        );
    }

    #[test]
    fn missing_team_maps_to_unassigned() {
        let rows = vec![RawPunchRow {
            team_id: None,
            ..RawPunchRow::new("2025-01-06", "T1", "", 8.0, 8.0)
        }];
        let normalized = normalize_rows(&rows);
        assert_eq!(normalized.records[0].team_id, UNASSIGNED_TEAM);
    }

    #[test]
    fn accepts_export_date_formats() {
        assert_eq!(parse_punch_date("2025-01-06"), Some(d("2025-01-06")));
        assert_eq!(parse_punch_date("06/01/2025"), Some(d("2025-01-06")));
        assert_eq!(parse_punch_date("2025-01-06 00:00:00"), Some(d("2025-01-06")));
        assert_eq!(parse_punch_date("2025-01-06T13:45:00"), Some(d("2025-01-06")));
        assert_eq!(parse_punch_date("2025-13-06"), None);
    }

    #[test]
    fn records_come_out_in_date_then_technician_order() {
        let rows = vec![
            RawPunchRow::new("2025-01-07", "A", "X", 1.0, 1.0),
            RawPunchRow::new("2025-01-06", "B", "X", 1.0, 1.0),
            RawPunchRow::new("2025-01-06", "A", "X", 1.0, 1.0),
        ];
        let normalized = normalize_rows(&rows);
        let keys: Vec<(NaiveDate, &str)> = normalized
            .records
            .iter()
            .map(|r| (r.date, r.technician_id.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (d("2025-01-06"), "A"),
                (d("2025-01-06"), "B"),
                (d("2025-01-07"), "A"),
            ]
        );
    }
}
