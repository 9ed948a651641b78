use std::path::Path;
use std::time::Duration;

use chrono::{Days, NaiveDate};

use crate::db::{Database, MeasurementStore};
use crate::error::{SourceError, SyncError};
use crate::models::{MeasurementRecord, SyncReport};
use crate::normalize::normalize;
use crate::schedule::{Clock, Sleeper};
use crate::source::{MeasurementSource, RawMeasurement};

/// Which date range a pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// `[today - days, today]`.
    Recent { days: u32 },
    /// Everything the service still has, walking back from today.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per fetch call, the first one included.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub retry: RetryPolicy,
    /// Width of each request in `All` mode.
    pub chunk_days: u32,
    /// `All` mode stops after this many consecutive days without data,
    /// counted once the first measurement has been seen.
    pub empty_stop_days: u32,
    /// `All` mode never requests anything before this date.
    pub earliest_supported: NaiveDate,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chunk_days: 30,
            empty_stop_days: 60,
            earliest_supported: NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date"),
        }
    }
}

/// Drives fetch → normalize → upsert for one pass at a time.
pub struct SyncService<S, C, Z> {
    pub(crate) source: S,
    pub(crate) clock: C,
    pub(crate) sleeper: Z,
    pub(crate) settings: SyncSettings,
}

/// `[today - days, today]`, both ends inclusive, never starting before `floor`.
#[must_use]
pub fn recent_range(today: NaiveDate, days: u32, floor: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today
        .checked_sub_days(Days::new(u64::from(days)))
        .map_or(floor, |start| start.max(floor));
    (start, today)
}

impl<S: MeasurementSource, C: Clock, Z: Sleeper> SyncService<S, C, Z> {
    pub fn new(source: S, clock: C, sleeper: Z, settings: SyncSettings) -> Self {
        Self {
            source,
            clock,
            sleeper,
            settings,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Open the store at `db_path`, run one pass, and close it again.
    /// The handle is released on every path, including a failed pass.
    pub fn run_pass(&mut self, mode: SyncMode, db_path: &Path) -> Result<SyncReport, SyncError> {
        let db = Database::open(db_path)?;
        let result = self.sync(mode, &db).and_then(|mut report| {
            let total = db.count()?;
            tracing::info!(total, "rows in store");
            report.total_rows = Some(total);
            Ok(report)
        });
        match result {
            Ok(report) => {
                db.close()?;
                Ok(report)
            }
            Err(e) => {
                if let Err(close_err) = db.close() {
                    tracing::warn!(error = %close_err, "failed to close store after aborted pass");
                }
                Err(e)
            }
        }
    }

    /// Run one pass against an already open store.
    pub fn sync<T: MeasurementStore>(
        &mut self,
        mode: SyncMode,
        store: &T,
    ) -> Result<SyncReport, SyncError> {
        let today = self.clock.local_now().date();
        let (start, end, raw) = match mode {
            SyncMode::Recent { days } => {
                let (start, end) = recent_range(today, days, self.settings.earliest_supported);
                tracing::info!(%start, %end, "fetching measurements");
                let raw = self.fetch_with_retry(start, end)?;
                (start, end, raw)
            }
            SyncMode::All => {
                let (start, raw) = self.collect_history(today)?;
                (start, today, raw)
            }
        };

        let fetched = raw.len();
        let (synced, skipped) = self.apply(&raw, store)?;
        let report = SyncReport {
            start,
            end,
            fetched,
            synced,
            skipped,
            total_rows: None,
        };
        tracing::info!(fetched, synced, skipped, "sync pass complete");
        Ok(report)
    }

    fn fetch_with_retry(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawMeasurement>, SyncError> {
        let max_attempts = self.settings.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.source.fetch_range(start, end) {
                Ok(raw) => {
                    tracing::debug!(%start, %end, count = raw.len(), "fetched range");
                    return Ok(raw);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(attempt, max_attempts, error = %e, "transient fetch failure, retrying");
                    self.sleeper.sleep(self.settings.retry.backoff);
                }
                Err(SourceError::TransientNetwork(msg)) => {
                    return Err(SyncError::RetriesExhausted {
                        attempts: attempt,
                        last: msg,
                    });
                }
                Err(SourceError::Authentication(msg)) => return Err(SyncError::Authentication(msg)),
                Err(SourceError::RemoteService(msg)) => return Err(SyncError::RemoteService(msg)),
            }
        }
    }

    /// Walk back from `today` in chunks until the service runs dry, returning the
    /// earliest date requested and every payload found.
    fn collect_history(
        &mut self,
        today: NaiveDate,
    ) -> Result<(NaiveDate, Vec<RawMeasurement>), SyncError> {
        let floor = self.settings.earliest_supported;
        let span = Days::new(u64::from(self.settings.chunk_days.max(1) - 1));
        let stop_after = i64::from(self.settings.empty_stop_days);

        let mut chunks: Vec<Vec<RawMeasurement>> = Vec::new();
        let mut end = today;
        let mut earliest = today;
        let mut empty_days: i64 = 0;
        let mut seen_data = false;

        while end >= floor {
            let start = end.checked_sub_days(span).unwrap_or(floor).max(floor);
            tracing::info!(%start, %end, "fetching history chunk");
            let raw = self.fetch_with_retry(start, end)?;
            earliest = start;

            if raw.is_empty() {
                if seen_data {
                    empty_days += (end - start).num_days() + 1;
                }
            } else {
                seen_data = true;
                empty_days = 0;
                chunks.push(raw);
            }

            if seen_data && empty_days >= stop_after {
                tracing::debug!(%start, empty_days, "no older data, stopping history walk");
                break;
            }
            match start.pred_opt() {
                Some(prev) => end = prev,
                None => break,
            }
        }

        chunks.reverse();
        Ok((earliest, chunks.into_iter().flatten().collect()))
    }

    /// Normalize, order by date, and upsert. Malformed payloads are skipped;
    /// a store failure aborts with every earlier date already committed.
    fn apply<T: MeasurementStore>(
        &self,
        raw: &[RawMeasurement],
        store: &T,
    ) -> Result<(usize, usize), SyncError> {
        let fetched_at = self.clock.utc_now();
        let mut skipped = 0;
        let mut records: Vec<MeasurementRecord> = Vec::with_capacity(raw.len());
        for payload in raw {
            match normalize(payload, fetched_at) {
                Ok(rec) => records.push(rec),
                Err(e) => {
                    tracing::warn!(error = %e, payload = %payload.body, "skipping malformed measurement");
                    skipped += 1;
                }
            }
        }

        // Several weigh-ins on one day collapse to the latest one.
        records.sort_by(|a, b| a.date.cmp(&b.date).then(a.measured_at.cmp(&b.measured_at)));
        records.reverse();
        records.dedup_by_key(|r| r.date);
        records.reverse();

        for (i, rec) in records.iter().enumerate() {
            if let Err(e) = store.upsert(rec) {
                tracing::error!(date = %rec.date, committed = i, error = %e, "store write failed, aborting pass");
                return Err(e.into());
            }
            tracing::debug!(date = %rec.date, weight_kg = ?rec.weight_kg, "stored measurement");
        }
        Ok((records.len(), skipped))
    }
}
