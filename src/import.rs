// src/import.rs
//! Readers filling the in-memory stores from files for the command line.

use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::io::Read;
use tracing::{info, warn};

use crate::error::ImportError;
use crate::records::RawPunchRow;
use crate::scorecard::KpiObservation;

#[derive(Debug, Clone, Default)]
pub struct CsvImport {
    pub rows: Vec<RawPunchRow>,
    /// Lines the CSV layer itself could not turn into a row.
    pub unreadable_rows: usize,
}

/// Reads a punch export. Both the export headers and the database column
/// names are accepted; row-level validation is left to normalization.
pub fn read_punch_csv<R: Read>(reader: R, delimiter: u8) -> Result<CsvImport, ImportError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_reader(reader);

    let mut import = CsvImport::default();
    for (line, result) in rdr.deserialize::<RawPunchRow>().enumerate() {
        match result {
            Ok(row) => import.rows.push(row),
            Err(e) => {
                warn!("Skipping unreadable CSV record {}: {}", line + 1, e);
                import.unreadable_rows += 1;
            }
        }
    }
    info!(
        "Read {} punch rows from CSV ({} unreadable)",
        import.rows.len(),
        import.unreadable_rows
    );
    Ok(import)
}

#[derive(Debug, Deserialize)]
struct ObservationEntry {
    date: NaiveDate,
    kpi_id: String,
    value: f64,
}

/// Reads `[{"date": "YYYY-MM-DD", "kpi_id": ..., "value": ...}, ...]`.
pub fn read_observations_json<R: Read>(
    reader: R,
) -> Result<Vec<(NaiveDate, KpiObservation)>, ImportError> {
    let entries: Vec<ObservationEntry> = serde_json::from_reader(reader)?;
    info!("Read {} KPI observations", entries.len());
    Ok(entries
        .into_iter()
        .map(|entry| (entry.date, KpiObservation::new(entry.kpi_id, entry.value)))
        .collect())
}
