use std::io::Write;

use serde::Serialize;

use crate::db::Database;
use crate::error::StoreError;
use crate::models::MeasurementRecord;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write CSV: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct CsvRow<'a> {
    date: String,
    weight_kg: Option<f64>,
    bmi: Option<f64>,
    body_fat_pct: Option<f64>,
    body_water_pct: Option<f64>,
    bone_mass_kg: Option<f64>,
    muscle_mass_kg: Option<f64>,
    visceral_fat: Option<f64>,
    metabolic_age: Option<i64>,
    physique_rating: Option<&'a str>,
    source_type: Option<&'a str>,
    measured_at: Option<String>,
    source: &'a str,
    fetched_at: String,
}

impl<'a> From<&'a MeasurementRecord> for CsvRow<'a> {
    fn from(r: &'a MeasurementRecord) -> Self {
        CsvRow {
            date: r.date.format("%Y-%m-%d").to_string(),
            weight_kg: r.weight_kg,
            bmi: r.bmi,
            body_fat_pct: r.body_fat_pct,
            body_water_pct: r.body_water_pct,
            bone_mass_kg: r.bone_mass_kg,
            muscle_mass_kg: r.muscle_mass_kg,
            visceral_fat: r.visceral_fat,
            metabolic_age: r.metabolic_age,
            physique_rating: r.physique_rating.as_deref(),
            source_type: r.source_type.as_deref(),
            measured_at: r.measured_at.map(|t| t.to_rfc3339()),
            source: &r.source,
            fetched_at: r.fetched_at.to_rfc3339(),
        }
    }
}

/// Write every stored measurement as CSV, oldest first. Returns the row count.
pub fn write_csv<W: Write>(db: &Database, writer: W) -> Result<usize, ExportError> {
    let records = db.all_ascending()?;
    let mut wtr = csv::Writer::from_writer(writer);
    for record in &records {
        wtr.serialize(CsvRow::from(record))?;
    }
    wtr.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MeasurementStore;
    use chrono::{DateTime, NaiveDate};

    #[test]
    fn test_write_csv() {
        let db = Database::open_in_memory().unwrap();
        let fetched_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        for (day, kg) in [(2, 70.3), (1, 70.1)] {
            let date = NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
            db.upsert(&MeasurementRecord::with_weight(date, kg, fetched_at))
                .unwrap();
        }

        let mut out = Vec::new();
        let n = write_csv(&db, &mut out).unwrap();
        assert_eq!(n, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date,weight_kg,bmi,"));
        assert!(lines[1].starts_with("2025-03-01,70.1,,"));
        assert!(lines[2].starts_with("2025-03-02,70.3,,"));
        assert!(lines[2].ends_with(",garmin,2023-11-14T22:13:20+00:00"));
    }

    #[test]
    fn test_write_csv_empty_store_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let mut out = Vec::new();
        assert_eq!(write_csv(&db, &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }
}
