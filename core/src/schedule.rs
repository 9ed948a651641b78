use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Days, Local, NaiveDateTime, NaiveTime, Utc};

use crate::error::SyncError;
use crate::models::SyncReport;
use crate::source::MeasurementSource;
use crate::sync::{SyncMode, SyncService};

/// Source of the current time, injected so the scheduler can be driven in tests.
pub trait Clock {
    /// Local wall-clock time.
    fn local_now(&self) -> NaiveDateTime;
    fn utc_now(&self) -> DateTime<Utc>;
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Daily trigger for the `schedule` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Local time of day each pass starts.
    pub at: NaiveTime,
    /// Days re-fetched on each pass; one for the interval plus slack for
    /// measurements that reach the service late.
    pub lookback_days: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            at: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            lookback_days: 3,
        }
    }
}

/// First occurrence of `at` strictly after `now`.
#[must_use]
pub fn next_trigger(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        now.date()
            .checked_add_days(Days::new(1))
            .map_or(NaiveDateTime::MAX, |d| d.and_time(at))
    }
}

impl<S: MeasurementSource, C: Clock, Z: Sleeper> SyncService<S, C, Z> {
    /// Sleep until the next trigger, then run one lookback pass.
    pub fn run_scheduled_pass(
        &mut self,
        schedule: &Schedule,
        db_path: &Path,
    ) -> Result<SyncReport, SyncError> {
        let now = self.clock.local_now();
        let next = next_trigger(now, schedule.at);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next = %next, wait_secs = wait.as_secs(), "waiting for next scheduled sync");
        self.sleeper.sleep(wait);

        let result = self.run_pass(
            SyncMode::Recent {
                days: schedule.lookback_days,
            },
            db_path,
        );
        if let Err(e) = &result {
            tracing::error!(error = %e, "scheduled sync pass aborted, will retry at next trigger");
        }
        result
    }

    /// Run passes forever. A failed pass is reported to `on_pass` and the loop
    /// carries on; only process termination stops it.
    pub fn run_schedule<F>(&mut self, schedule: &Schedule, db_path: &Path, mut on_pass: F) -> !
    where
        F: FnMut(&Result<SyncReport, SyncError>),
    {
        tracing::info!(at = %schedule.at, lookback_days = schedule.lookback_days, "scheduler started");
        loop {
            let result = self.run_scheduled_pass(schedule, db_path);
            on_pass(&result);
        }
    }
}
