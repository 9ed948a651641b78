use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Tag written into the `source` column for rows pulled from Garmin Connect.
pub const SOURCE_GARMIN: &str = "garmin";

/// One stored measurement. At most one exists per `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub date: NaiveDate,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub body_fat_pct: Option<f64>,
    pub body_water_pct: Option<f64>,
    pub bone_mass_kg: Option<f64>,
    pub muscle_mass_kg: Option<f64>,
    pub visceral_fat: Option<f64>,
    pub metabolic_age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physique_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    pub measured_at: Option<DateTime<Utc>>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl MeasurementRecord {
    /// A record carrying only a weight, the remaining metrics left empty.
    #[must_use]
    pub fn with_weight(date: NaiveDate, weight_kg: f64, fetched_at: DateTime<Utc>) -> Self {
        Self {
            date,
            weight_kg: Some(weight_kg),
            bmi: None,
            body_fat_pct: None,
            body_water_pct: None,
            bone_mass_kg: None,
            muscle_mass_kg: None,
            visceral_fat: None,
            metabolic_age: None,
            physique_rating: None,
            source_type: None,
            measured_at: None,
            source: SOURCE_GARMIN.to_string(),
            fetched_at,
        }
    }
}

/// Units a source may report masses in. Everything is stored in kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MassUnit {
    Grams,
    Kilograms,
    Pounds,
}

const KG_PER_LB: f64 = 0.453_592_37;

impl MassUnit {
    /// Parse a unit name. Unknown names return `None` so callers can fail closed.
    #[must_use]
    pub fn parse(unit: &str) -> Option<Self> {
        match unit.trim().to_lowercase().as_str() {
            "g" | "gram" | "grams" => Some(Self::Grams),
            "kg" | "kilogram" | "kilograms" => Some(Self::Kilograms),
            "lb" | "lbs" | "pound" | "pounds" => Some(Self::Pounds),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_kg(self, value: f64) -> f64 {
        match self {
            Self::Grams => value / 1000.0,
            Self::Kilograms => value,
            Self::Pounds => value * KG_PER_LB,
        }
    }
}

/// Result of a single sync pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub fetched: usize,
    pub synced: usize,
    pub skipped: usize,
    /// Rows in the store after the pass, when the pass owned the store.
    pub total_rows: Option<i64>,
}

impl SyncReport {
    /// One-line status shown after each pass.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!("{} records synced", self.synced);
        if self.skipped > 0 {
            line.push_str(&format!(", {} skipped", self.skipped));
        }
        line.push_str(&format!(
            " ({} to {})",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        ));
        line
    }
}
