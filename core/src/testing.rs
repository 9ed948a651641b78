//! In-memory fakes shared by the sync and schedule tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::json;

use crate::db::{Database, MeasurementStore};
use crate::error::{SourceError, StoreError};
use crate::models::MeasurementRecord;
use crate::schedule::{Clock, Sleeper};
use crate::source::{MeasurementSource, RawMeasurement};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// A kilogram weigh-in payload for `date`.
pub fn weigh_in(date: NaiveDate, weight_kg: f64) -> RawMeasurement {
    RawMeasurement::new(
        json!({
            "calendarDate": date.format("%Y-%m-%d").to_string(),
            "weight": weight_kg,
        }),
        "kg",
    )
}

pub fn weigh_in_at(date: NaiveDate, weight_kg: f64, epoch_millis: i64) -> RawMeasurement {
    RawMeasurement::new(
        json!({
            "date": epoch_millis,
            "calendarDate": date.format("%Y-%m-%d").to_string(),
            "weight": weight_kg,
        }),
        "kg",
    )
}

/// Serves payloads by `calendarDate`; queued failures are returned first.
pub struct FakeSource {
    data: Vec<RawMeasurement>,
    failures: VecDeque<SourceError>,
    calls: Vec<(NaiveDate, NaiveDate)>,
}

impl FakeSource {
    pub fn with_data(data: Vec<RawMeasurement>) -> Self {
        Self {
            data,
            failures: VecDeque::new(),
            calls: Vec::new(),
        }
    }

    pub fn replace_data(&mut self, data: Vec<RawMeasurement>) {
        self.data = data;
    }

    pub fn fail_next(&mut self, err: SourceError) {
        self.failures.push_back(err);
    }

    pub fn calls(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.calls.clone()
    }
}

impl MeasurementSource for FakeSource {
    fn fetch_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawMeasurement>, SourceError> {
        self.calls.push((start, end));
        if let Some(err) = self.failures.pop_front() {
            return Err(err);
        }
        Ok(self
            .data
            .iter()
            .filter(|raw| {
                raw.body["calendarDate"]
                    .as_str()
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                    .is_none_or(|date| date >= start && date <= end)
            })
            .cloned()
            .collect())
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Rc<Cell<NaiveDateTime>>,
}

impl FakeClock {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap();
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FakeClock {
    fn local_now(&self) -> NaiveDateTime {
        self.now.get()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.now.get().and_utc()
    }
}

/// Records every sleep and moves the shared clock forward instead of blocking.
pub struct RecordingSleeper {
    clock: FakeClock,
    slept: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            clock,
            slept: RefCell::new(Vec::new()),
        }
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
        self.clock.advance(duration);
    }
}

/// Wraps a real store and fails the `fail_on`-th write (1-based).
pub struct FailingStore {
    inner: Database,
    fail_on: usize,
    writes: Cell<usize>,
}

impl FailingStore {
    pub fn new(inner: Database, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            writes: Cell::new(0),
        }
    }

    pub fn into_inner(self) -> Database {
        self.inner
    }
}

impl MeasurementStore for FailingStore {
    fn upsert(&self, record: &MeasurementRecord) -> Result<(), StoreError> {
        let n = self.writes.get() + 1;
        self.writes.set(n);
        if n == self.fail_on {
            return Err(StoreError::Write(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
                Some("database or disk is full".to_string()),
            )));
        }
        self.inner.upsert(record)
    }

    fn exists(&self, date: NaiveDate) -> Result<bool, StoreError> {
        self.inner.exists(date)
    }
}
