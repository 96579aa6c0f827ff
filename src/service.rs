// src/service.rs
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregation::{
    aggregate, aggregate_global, distinct_teams, monthly_series, records_in_period, rolling_window,
    team_monthly_series, top_technicians, Aggregate, Grouping,
};
use crate::correlation::{find_driver_team, team_correlations, DriverTeam};
use crate::error::ServiceError;
use crate::exhaustivity::{
    build_matrix, Anomaly, AnomalyFilter, DayStatus, ExhaustivityMatrix, ExpectedHours,
};
use crate::period::ReportingPeriod;
use crate::records::{normalize_rows, NormalizationReport, NormalizedRecords, TeamId, TechnicianId};
use crate::scorecard::{compute_scorecard, KpiObservation, ScorecardDefinition, ScorecardResult};
use crate::store::{ObservationStore, RecordStore};

// --- Settings ---

/// Tunables handed to the service explicitly rather than read from globals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSettings {
    pub expected_hours: ExpectedHours,
    pub top_technicians: usize,
    pub rolling_months: u32,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            expected_hours: ExpectedHours::default(),
            top_technicians: 10,
            rolling_months: 12,
        }
    }
}

// --- Results ---

/// One aggregate for `Grouping::Global`, a list for every other grouping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProductivityResult {
    Single(Aggregate),
    Grouped(Vec<Aggregate>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductivityReport {
    pub period: Option<ReportingPeriod>,
    pub grouping: Grouping,
    pub productivity: ProductivityResult,
    pub normalization: NormalizationReport,
}

/// Every dashboard panel, computed from a single snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub period: Option<ReportingPeriod>,
    pub global: Aggregate,
    pub monthly: Vec<Aggregate>,
    pub by_team: Vec<Aggregate>,
    pub top_technicians: Vec<Aggregate>,
    pub driver_team: Option<DriverTeam>,
    pub team_correlations: Vec<DriverTeam>,
    pub normalization: NormalizationReport,
}

// --- Service ---

/// Entry point of the analytics. Every operation loads exactly one snapshot
/// from its store and recomputes from it; nothing is cached between calls.
pub struct AnalyticsService {
    records: Arc<dyn RecordStore>,
    observations: Arc<dyn ObservationStore>,
    scorecard: Arc<ScorecardDefinition>,
    settings: AnalyticsSettings,
}

impl AnalyticsService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        observations: Arc<dyn ObservationStore>,
        scorecard: Arc<ScorecardDefinition>,
        settings: AnalyticsSettings,
    ) -> Self {
        Self {
            records,
            observations,
            scorecard,
            settings,
        }
    }

    async fn snapshot(&self, period: Option<&ReportingPeriod>) -> Result<NormalizedRecords, ServiceError> {
        let rows = self.records.load_records(period).await?;
        let mut normalized = normalize_rows(&rows);
        // Stores may hand back more than asked for.
        if period.is_some() {
            normalized.records = records_in_period(&normalized.records, period);
        }
        debug!(
            "Snapshot for {:?}: {} records",
            period.map(|p| p.to_string()),
            normalized.records.len()
        );
        Ok(normalized)
    }

    pub async fn get_productivity(
        &self,
        period: Option<&ReportingPeriod>,
        grouping: Grouping,
    ) -> Result<ProductivityReport, ServiceError> {
        let snapshot = self.snapshot(period).await?;
        let productivity = match grouping {
            Grouping::Global => ProductivityResult::Single(aggregate_global(&snapshot.records)),
            other => ProductivityResult::Grouped(aggregate(&snapshot.records, other)),
        };
        Ok(ProductivityReport {
            period: period.copied(),
            grouping,
            productivity,
            normalization: snapshot.report,
        })
    }

    pub async fn get_top_technicians(
        &self,
        period: Option<&ReportingPeriod>,
        limit: Option<usize>,
    ) -> Result<Vec<Aggregate>, ServiceError> {
        let snapshot = self.snapshot(period).await?;
        Ok(top_technicians(
            &snapshot.records,
            limit.unwrap_or(self.settings.top_technicians),
        ))
    }

    /// Productivity over the configured number of months up to `reference`.
    pub async fn get_rolling_productivity(
        &self,
        reference: NaiveDate,
        grouping: Grouping,
    ) -> Result<Vec<Aggregate>, ServiceError> {
        let snapshot = self.snapshot(None).await?;
        Ok(rolling_window(
            &snapshot.records,
            reference,
            self.settings.rolling_months,
            grouping,
        )?)
    }

    pub async fn get_exhaustivity_matrix(
        &self,
        period: &ReportingPeriod,
        team_filter: Option<&str>,
    ) -> Result<ExhaustivityMatrix, ServiceError> {
        // The roster comes from the whole dataset, not only the period.
        let snapshot = self.snapshot(None).await?;
        Ok(build_matrix(
            &snapshot.records,
            period,
            team_filter,
            &self.settings.expected_hours,
        ))
    }

    pub async fn get_exhaustivity_anomalies(
        &self,
        period: &ReportingPeriod,
        team_filter: Option<&str>,
        statuses: &[DayStatus],
    ) -> Result<Vec<Anomaly>, ServiceError> {
        let matrix = self.get_exhaustivity_matrix(period, team_filter).await?;
        Ok(matrix.anomalies(&AnomalyFilter {
            team_id: team_filter.map(String::from),
            statuses: statuses.to_vec(),
        }))
    }

    pub async fn get_driver_team(
        &self,
        period: Option<&ReportingPeriod>,
    ) -> Result<Option<DriverTeam>, ServiceError> {
        let snapshot = self.snapshot(period).await?;
        Ok(find_driver_team(
            &monthly_series(&snapshot.records),
            &team_monthly_series(&snapshot.records),
        ))
    }

    pub fn compute_scorecard(&self, observations: &[KpiObservation]) -> ScorecardResult {
        compute_scorecard(&self.scorecard, observations)
    }

    pub async fn scorecard_for_period(
        &self,
        period: &ReportingPeriod,
    ) -> Result<ScorecardResult, ServiceError> {
        let observations = self.observations.load_kpi_observations(period).await?;
        info!(
            "Scoring {} observations for {}",
            observations.len(),
            period
        );
        Ok(self.compute_scorecard(&observations))
    }

    pub async fn get_dashboard(
        &self,
        period: Option<&ReportingPeriod>,
    ) -> Result<DashboardSnapshot, ServiceError> {
        let snapshot = self.snapshot(period).await?;
        let records = &snapshot.records;

        let global_series = monthly_series(records);
        let team_series = team_monthly_series(records);

        Ok(DashboardSnapshot {
            period: period.copied(),
            global: aggregate_global(records),
            monthly: aggregate(records, Grouping::Month),
            by_team: aggregate(records, Grouping::Team),
            top_technicians: top_technicians(records, self.settings.top_technicians),
            driver_team: find_driver_team(&global_series, &team_series),
            team_correlations: team_correlations(&global_series, &team_series),
            normalization: snapshot.report,
        })
    }

    pub async fn list_teams(&self) -> Result<Vec<TeamId>, ServiceError> {
        let snapshot = self.snapshot(None).await?;
        Ok(distinct_teams(&snapshot.records))
    }

    pub async fn list_technicians(
        &self,
        team_filter: Option<&str>,
    ) -> Result<Vec<TechnicianId>, ServiceError> {
        let snapshot = self.snapshot(None).await?;
        let technicians: BTreeSet<TechnicianId> = snapshot
            .records
            .into_iter()
            .filter(|r| team_filter.map_or(true, |team| r.team_id == team))
            .map(|r| r.technician_id)
            .collect();
        Ok(technicians.into_iter().collect())
    }
}
