use chrono::{DateTime, Local, NaiveDate, Utc};
use serde_json::Value;

use crate::error::MalformedRecordError;
use crate::models::{MassUnit, MeasurementRecord, SOURCE_GARMIN};
use crate::source::RawMeasurement;

/// Turn a raw payload into a [`MeasurementRecord`].
///
/// The calendar date is required (`calendarDate`, or the epoch-millisecond
/// `date` mapped to the local day). Every metric is optional, but a metric that
/// is present must be numeric or a numeric string. Masses are converted to kg
/// from `raw.mass_unit`; an unknown unit rejects the record.
pub fn normalize(
    raw: &RawMeasurement,
    fetched_at: DateTime<Utc>,
) -> Result<MeasurementRecord, MalformedRecordError> {
    let body = raw
        .body
        .as_object()
        .ok_or_else(|| MalformedRecordError::new("payload", "is not a JSON object"))?;

    let unit = MassUnit::parse(&raw.mass_unit).ok_or_else(|| {
        MalformedRecordError::new("unit", format!("'{}' is not a recognized unit", raw.mass_unit))
    })?;

    let measured_at = match body.get("date") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let millis = v
                .as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
                .ok_or_else(|| MalformedRecordError::new("date", "is not an epoch timestamp"))?;
            Some(
                DateTime::from_timestamp_millis(millis)
                    .ok_or_else(|| MalformedRecordError::new("date", "is out of range"))?,
            )
        }
    };

    let date = match body.get("calendarDate") {
        None | Some(Value::Null) => measured_at
            .map(|ts| ts.with_timezone(&Local).date_naive())
            .ok_or_else(|| MalformedRecordError::new("calendarDate", "is missing"))?,
        Some(Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            MalformedRecordError::new("calendarDate", format!("'{s}' is not a YYYY-MM-DD date"))
        })?,
        Some(_) => return Err(MalformedRecordError::new("calendarDate", "is not a string")),
    };

    let mass = |field: &'static str| {
        number(body.get(field), field).map(|v| v.map(|m| unit.to_kg(m)))
    };

    Ok(MeasurementRecord {
        date,
        weight_kg: mass("weight")?,
        bmi: number(body.get("bmi"), "bmi")?,
        body_fat_pct: number(body.get("bodyFat"), "bodyFat")?,
        body_water_pct: number(body.get("bodyWater"), "bodyWater")?,
        bone_mass_kg: mass("boneMass")?,
        muscle_mass_kg: mass("muscleMass")?,
        visceral_fat: number(body.get("visceralFat"), "visceralFat")?,
        metabolic_age: number(body.get("metabolicAge"), "metabolicAge")?.map(|v| v.round() as i64),
        physique_rating: text(body.get("physiqueRating"), "physiqueRating")?,
        source_type: text(body.get("sourceType"), "sourceType")?,
        measured_at,
        source: SOURCE_GARMIN.to_string(),
        fetched_at,
    })
}

fn number(value: Option<&Value>, field: &'static str) -> Result<Option<f64>, MalformedRecordError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| MalformedRecordError::new(field, "is not a finite number")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| MalformedRecordError::new(field, format!("'{s}' is not numeric"))),
        Some(_) => Err(MalformedRecordError::new(field, "is not numeric")),
    }
}

// Garmin sends physiqueRating as a number on some scales and a label on others.
fn text(value: Option<&Value>, field: &'static str) -> Result<Option<String>, MalformedRecordError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(MalformedRecordError::new(field, "is not text")),
    }
}
