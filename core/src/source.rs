use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;

/// One measurement as the remote service returned it.
///
/// `body` is left as raw JSON so the normalizer can tell a missing field from one
/// of the wrong type. `mass_unit` names the unit the service reports masses in.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurement {
    pub body: Value,
    pub mass_unit: String,
}

impl RawMeasurement {
    pub fn new(body: Value, mass_unit: impl Into<String>) -> Self {
        Self {
            body,
            mass_unit: mass_unit.into(),
        }
    }
}

/// Date-ranged access to a fitness service.
///
/// The CLI implements this with reqwest against Garmin Connect; tests use
/// in-memory fakes. Calls are blocking, the orchestrator is single-threaded.
pub trait MeasurementSource {
    /// Fetch every measurement recorded in `[start, end]`, both ends inclusive.
    /// Dates without data are simply absent from the result.
    fn fetch_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawMeasurement>, SourceError>;
}

impl<S: MeasurementSource + ?Sized> MeasurementSource for Box<S> {
    fn fetch_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawMeasurement>, SourceError> {
        (**self).fetch_range(start, end)
    }
}

/// Garmin reports every mass (weight, bone and muscle mass) in grams.
pub const GARMIN_MASS_UNIT: &str = "g";

/// Body of the Garmin weight-service date-range response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRangeResponse {
    #[serde(default)]
    pub date_weight_list: Vec<Value>,
}

impl WeightRangeResponse {
    #[must_use]
    pub fn into_measurements(self) -> Vec<RawMeasurement> {
        self.date_weight_list
            .into_iter()
            .map(|body| RawMeasurement::new(body, GARMIN_MASS_UNIT))
            .collect()
    }
}
