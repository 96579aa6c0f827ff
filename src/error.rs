// src/error.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

// --- Configuration Errors ---

/// Raised when a scorecard definition or an hour baseline is built from bad
/// values. This is the only error the analytics raise on their own; dirty
/// input data is always recovered locally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Scorecard definition contains no categories or no KPIs")]
    EmptyScorecard,
    #[error("Duplicate category id '{category_id}'")]
    DuplicateCategory { category_id: String },
    #[error("Duplicate KPI id '{kpi_id}'")]
    DuplicateKpi { kpi_id: String },
    #[error("KPI '{kpi_id}' refers to unknown category '{category_id}'")]
    UnknownCategory { kpi_id: String, category_id: String },
    #[error("Weight of '{id}' must be a finite, non-negative number (got {weight})")]
    InvalidWeight { id: String, weight: f64 },
    #[error("Threshold '{threshold}' of KPI '{kpi_id}' is not a finite number")]
    NonFiniteThreshold { kpi_id: String, threshold: &'static str },
    #[error(
        "Thresholds of KPI '{kpi_id}' are out of order for a {direction} KPI (emerging {emerging}, advanced {advanced}, excellent {excellent})"
    )]
    ThresholdOrder {
        kpi_id: String,
        direction: &'static str,
        emerging: f64,
        advanced: f64,
        excellent: f64,
    },
    #[error("KPI weights of category '{category_id}' sum to {kpi_total}, expected {declared}")]
    CategoryWeightMismatch {
        category_id: String,
        declared: f64,
        kpi_total: f64,
    },
    #[error("Category weights sum to {total}, expected {expected}")]
    TotalWeightMismatch { total: f64, expected: f64 },
    #[error("Expected daily hours must be positive (got {hours})")]
    InvalidExpectedHours { hours: Decimal },
    #[error("Hour tolerance must not be negative (got {tolerance})")]
    InvalidTolerance { tolerance: Decimal },
    #[error("Scorecard configuration is not valid JSON: {0}")]
    Parse(String),
}

// --- Period Errors ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Period end {end} is before its start {start}")]
    Inverted { start: NaiveDate, end: NaiveDate },
    #[error("Invalid year/month combination: {year}/{month}")]
    InvalidMonth { year: i32, month: u32 },
    #[error("Invalid quarter {quarter} (must be 1-4)")]
    InvalidQuarter { quarter: u32 },
    #[error("Invalid year/week combination: {year}/{week}")]
    InvalidWeek { year: i32, week: u32 },
    #[error("Cannot parse '{value}' as a month (expected YYYY-MM)")]
    UnparsableMonth { value: String },
    #[error("System Error: Date calculation overflow occurred")]
    DateOverflow,
}

// --- Collaborator Errors ---

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
    #[error("Record store returned inconsistent data: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Period error: {0}")]
    Period(#[from] PeriodError),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
