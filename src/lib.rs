// src/lib.rs
//! Productivity, time-punch exhaustivity and SEP scorecard analytics behind
//! the operations dashboard.

pub mod aggregation;
pub mod config;
pub mod correlation;
pub mod error;
pub mod exhaustivity;
pub mod import;
pub mod period;
pub mod records;
pub mod scorecard;
pub mod sep_catalogue;
pub mod service;
pub mod store;

mod aggregation_tests;

pub use aggregation::{Aggregate, AggregateScope, Grouping};
pub use config::AppConfig;
pub use correlation::DriverTeam;
pub use error::{ConfigError, ImportError, PeriodError, ServiceError, StoreError};
pub use exhaustivity::{DayStatus, ExhaustivityMatrix, ExpectedHours};
pub use period::{MonthKey, ReportingPeriod};
pub use records::{NormalizedRecords, PunchRecord, RawPunchRow};
pub use scorecard::{KpiObservation, Level, ScorecardDefinition, ScorecardResult};
pub use service::{AnalyticsService, AnalyticsSettings, ProductivityResult};
pub use store::{InMemoryObservationStore, InMemoryRecordStore, ObservationStore, RecordStore};
