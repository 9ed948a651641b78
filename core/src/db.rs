use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StoreError;
use crate::models::MeasurementRecord;

/// Write access the orchestrator needs from a store.
pub trait MeasurementStore {
    /// Insert the row for `record.date`, or replace it if one exists.
    fn upsert(&self, record: &MeasurementRecord) -> Result<(), StoreError>;
    fn exists(&self, date: NaiveDate) -> Result<bool, StoreError>;
}

pub struct Database {
    conn: Connection,
}

const COLUMNS: &str = "date, weight_kg, bmi, body_fat_pct, body_water_pct, bone_mass_kg,
     muscle_mass_kg, visceral_fat, metabolic_age, physique_rating, source_type,
     measured_at, source, fetched_at";

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let db = Database { conn };
        db.init_schema()?;
        tracing::debug!(path = %path.display(), "opened measurement store");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".to_string(),
            source,
        })?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Release the handle, reporting any error SQLite raises while closing.
    /// Dropping a `Database` also closes it, just without the error.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Write(e))
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS weight_measurements (
                    date TEXT PRIMARY KEY NOT NULL,
                    weight_kg REAL,
                    bmi REAL,
                    body_fat_pct REAL,
                    body_water_pct REAL,
                    bone_mass_kg REAL,
                    muscle_mass_kg REAL,
                    visceral_fat REAL,
                    metabolic_age INTEGER,
                    physique_rating TEXT,
                    source_type TEXT,
                    measured_at TEXT,
                    source TEXT NOT NULL,
                    fetched_at TEXT NOT NULL
                );",
            )
            .map_err(StoreError::Write)
    }

    // --- Row mapping helpers ---

    fn record_from_row(row: &rusqlite::Row) -> rusqlite::Result<MeasurementRecord> {
        let date_str: String = row.get(0)?;
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        let measured_at: Option<String> = row.get(11)?;
        let measured_at = measured_at
            .map(|s| parse_timestamp(11, &s))
            .transpose()?;
        let fetched_at: String = row.get(13)?;
        Ok(MeasurementRecord {
            date,
            weight_kg: row.get(1)?,
            bmi: row.get(2)?,
            body_fat_pct: row.get(3)?,
            body_water_pct: row.get(4)?,
            bone_mass_kg: row.get(5)?,
            muscle_mass_kg: row.get(6)?,
            visceral_fat: row.get(7)?,
            metabolic_age: row.get(8)?,
            physique_rating: row.get(9)?,
            source_type: row.get(10)?,
            measured_at,
            source: row.get(12)?,
            fetched_at: parse_timestamp(13, &fetched_at)?,
        })
    }

    // --- Measurements ---

    pub fn get(&self, date: NaiveDate) -> Result<Option<MeasurementRecord>, StoreError> {
        let date_str = date.format("%Y-%m-%d").to_string();
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM weight_measurements WHERE date = ?1"),
                params![date_str],
                Self::record_from_row,
            )
            .optional()
            .map_err(read_error)
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM weight_measurements", [], |row| {
                row.get(0)
            })
            .map_err(StoreError::Read)
    }

    /// Most recent rows first, optionally limited to `limit` rows.
    pub fn history(&self, limit: Option<i64>) -> Result<Vec<MeasurementRecord>, StoreError> {
        let query = match limit {
            Some(n) => format!(
                "SELECT {COLUMNS} FROM weight_measurements ORDER BY date DESC LIMIT {n}"
            ),
            None => format!("SELECT {COLUMNS} FROM weight_measurements ORDER BY date DESC"),
        };
        self.query_records(&query)
    }

    pub fn all_ascending(&self) -> Result<Vec<MeasurementRecord>, StoreError> {
        self.query_records(&format!(
            "SELECT {COLUMNS} FROM weight_measurements ORDER BY date ASC"
        ))
    }

    fn query_records(&self, query: &str) -> Result<Vec<MeasurementRecord>, StoreError> {
        let mut stmt = self.conn.prepare(query).map_err(StoreError::Read)?;
        let rows = stmt
            .query_map([], Self::record_from_row)
            .map_err(StoreError::Read)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_error)?;
        Ok(rows)
    }
}

impl MeasurementStore for Database {
    fn upsert(&self, record: &MeasurementRecord) -> Result<(), StoreError> {
        let date_str = record.date.format("%Y-%m-%d").to_string();
        self.conn
            .execute(
                &format!(
                    "INSERT INTO weight_measurements ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                     ON CONFLICT(date) DO UPDATE SET
                        weight_kg = excluded.weight_kg,
                        bmi = excluded.bmi,
                        body_fat_pct = excluded.body_fat_pct,
                        body_water_pct = excluded.body_water_pct,
                        bone_mass_kg = excluded.bone_mass_kg,
                        muscle_mass_kg = excluded.muscle_mass_kg,
                        visceral_fat = excluded.visceral_fat,
                        metabolic_age = excluded.metabolic_age,
                        physique_rating = excluded.physique_rating,
                        source_type = excluded.source_type,
                        measured_at = excluded.measured_at,
                        source = excluded.source,
                        fetched_at = excluded.fetched_at"
                ),
                params![
                    date_str,
                    record.weight_kg,
                    record.bmi,
                    record.body_fat_pct,
                    record.body_water_pct,
                    record.bone_mass_kg,
                    record.muscle_mass_kg,
                    record.visceral_fat,
                    record.metabolic_age,
                    record.physique_rating,
                    record.source_type,
                    record.measured_at.map(|t| t.to_rfc3339()),
                    record.source,
                    record.fetched_at.to_rfc3339(),
                ],
            )
            .map_err(StoreError::Write)?;
        Ok(())
    }

    fn exists(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let date_str = date.format("%Y-%m-%d").to_string();
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM weight_measurements WHERE date = ?1)",
                params![date_str],
                |row| row.get(0),
            )
            .map_err(StoreError::Read)
    }
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn read_error(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(_, _, inner) => {
            StoreError::Corrupt(inner.to_string())
        }
        other => StoreError::Read(other),
    }
}
