// src/store.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::period::ReportingPeriod;
use crate::records::{parse_punch_date, RawPunchRow};
use crate::scorecard::KpiObservation;

//=============================================================================
// Collaborator Traits
//=============================================================================

/// Source of raw punch rows. One call returns one consistent snapshot.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows dated inside `period`, or every row when `None`. Rows whose date
    /// cannot be read are passed through so normalization can report them.
    async fn load_records(
        &self,
        period: Option<&ReportingPeriod>,
    ) -> Result<Vec<RawPunchRow>, StoreError>;
}

/// Source of KPI observations for the scorecard.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Observations dated inside `period`, oldest first.
    async fn load_kpi_observations(
        &self,
        period: &ReportingPeriod,
    ) -> Result<Vec<KpiObservation>, StoreError>;
}

//=============================================================================
// In-Memory Stores
//=============================================================================

/// Row store backed by a lock-guarded vector. Writers swap or extend the
/// rows under the write lock, so a reader sees an upload entirely or not at all.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    rows: Arc<RwLock<Vec<RawPunchRow>>>,
}

impl InMemoryRecordStore {
    pub fn new(rows: Vec<RawPunchRow>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows)),
        }
    }

    /// Replaces the whole dataset, as a full re-upload does.
    pub async fn replace_rows(&self, rows: Vec<RawPunchRow>) {
        let mut guard = self.rows.write().await;
        info!("Replacing {} stored rows with {}", guard.len(), rows.len());
        *guard = rows;
    }

    pub async fn append_rows(&self, rows: Vec<RawPunchRow>) {
        let mut guard = self.rows.write().await;
        info!("Appending {} rows to {} stored rows", rows.len(), guard.len());
        guard.extend(rows);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn row_in_period(row: &RawPunchRow, period: &ReportingPeriod) -> bool {
    match row.date.as_deref().and_then(parse_punch_date) {
        Some(date) => period.contains(date),
        None => true,
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn load_records(
        &self,
        period: Option<&ReportingPeriod>,
    ) -> Result<Vec<RawPunchRow>, StoreError> {
        let guard = self.rows.read().await;
        let rows: Vec<RawPunchRow> = match period {
            Some(period) => guard
                .iter()
                .filter(|row| row_in_period(row, period))
                .cloned()
                .collect(),
            None => guard.clone(),
        };
        debug!("Loaded {} of {} stored rows", rows.len(), guard.len());
        Ok(rows)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryObservationStore {
    observations: Arc<RwLock<Vec<(NaiveDate, KpiObservation)>>>,
}

impl InMemoryObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, date: NaiveDate, observation: KpiObservation) {
        self.observations.write().await.push((date, observation));
    }

    pub async fn record_all(&self, observations: impl IntoIterator<Item = (NaiveDate, KpiObservation)>) {
        let mut guard = self.observations.write().await;
        guard.extend(observations);
    }
}

#[async_trait]
impl ObservationStore for InMemoryObservationStore {
    async fn load_kpi_observations(
        &self,
        period: &ReportingPeriod,
    ) -> Result<Vec<KpiObservation>, StoreError> {
        let guard = self.observations.read().await;
        let mut dated: Vec<&(NaiveDate, KpiObservation)> = guard
            .iter()
            .filter(|(date, _)| period.contains(*date))
            .collect();
        // Stable sort keeps insertion order among observations of the same day.
        dated.sort_by_key(|(date, _)| *date);
        debug!("Loaded {} KPI observations for {}", dated.len(), period);
        Ok(dated.into_iter().map(|(_, obs)| obs.clone()).collect())
    }
}
