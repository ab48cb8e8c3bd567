//! Per-registry refresh workers.
//!
//! Each registry gets one independent worker task driving the
//! download, parse, load cycle. Workers share nothing but the store
//! handle: a failure, slow download, or parse error in one registry never
//! blocks or delays another registry's loop or the read path.
//!
//! The cycle decision is a pure function of (now, last-success) so the
//! staleness rules are unit-testable without sleeping.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn, Instrument};

use ipdex_core::observability::refresh_span;
use ipdex_core::registry::RegistryDescriptor;
use ipdex_core::{RangeStore, Result};

use crate::fetch::ReportFetcher;
use crate::parse::parse_report;

/// Format of the persisted last-update option value (UTC).
const OPTION_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Last-update fallback when the option was never written: far enough in
/// the past to force an immediate refresh on first run.
fn first_run_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1971, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Timing knobs of the refresh loop.
#[derive(Debug, Clone, Copy)]
pub struct RefreshSchedule {
    /// A registry is stale once its last success is older than this.
    pub refresh_interval: Duration,
    /// Fixed pause before retrying a failed cycle. No exponential growth,
    /// no retry cap.
    pub retry_pause: Duration,
    /// Time of day (UTC) of the scheduled daily refresh instant.
    pub daily_refresh_at: NaiveTime,
    /// Safety margin added to staleness sleeps so a wake-up lands past the
    /// threshold rather than just short of it.
    pub safety_margin: Duration,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(24 * 60 * 60),
            retry_pause: Duration::from_secs(30 * 60),
            daily_refresh_at: NaiveTime::from_hms_opt(4, 0, 5).unwrap_or_default(),
            safety_margin: Duration::from_secs(5),
        }
    }
}

/// What a worker should do when it wakes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDecision {
    /// Run a full download, parse, load cycle now.
    Refresh,
    /// Not stale yet; sleep this long and re-evaluate.
    Sleep(Duration),
}

impl RefreshSchedule {
    /// Decides between refreshing and sleeping off the remaining freshness.
    #[must_use]
    pub fn decide(&self, now: DateTime<Utc>, last_success: DateTime<Utc>) -> CycleDecision {
        let age = (now - last_success).to_std().unwrap_or(Duration::ZERO);
        if age >= self.refresh_interval {
            CycleDecision::Refresh
        } else {
            CycleDecision::Sleep(self.refresh_interval - age + self.safety_margin)
        }
    }

    /// Returns the next daily refresh instant strictly after `now`.
    #[must_use]
    pub fn next_daily_instant(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.daily_refresh_at).and_utc();
        if today > now {
            today
        } else {
            today + chrono::Duration::days(1)
        }
    }
}

/// One registry's refresh loop.
pub struct RegistryWorker {
    descriptor: &'static RegistryDescriptor,
    store: Arc<dyn RangeStore>,
    fetcher: Arc<dyn ReportFetcher>,
    schedule: RefreshSchedule,
    shutdown: watch::Receiver<bool>,
}

impl RegistryWorker {
    /// Creates a worker for `descriptor`.
    #[must_use]
    pub fn new(
        descriptor: &'static RegistryDescriptor,
        store: Arc<dyn RangeStore>,
        fetcher: Arc<dyn ReportFetcher>,
        schedule: RefreshSchedule,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            descriptor,
            store,
            fetcher,
            schedule,
            shutdown,
        }
    }

    /// Runs the loop until shutdown is signalled or a fatal storage state
    /// is found. Never panics; non-fatal cycle errors are logged and
    /// retried after the fixed pause.
    pub async fn run(mut self) {
        info!(registry = self.descriptor.tag, "worker started");
        loop {
            let pause = match self.tick().await {
                Ok(pause) => pause,
                Err(err) if err.is_fatal() => {
                    error!(
                        registry = self.descriptor.tag,
                        error = %err,
                        "unrecoverable storage state; worker stopping"
                    );
                    return;
                }
                Err(err) => {
                    warn!(
                        registry = self.descriptor.tag,
                        error = %err,
                        retry_after_secs = self.schedule.retry_pause.as_secs(),
                        "refresh cycle failed"
                    );
                    self.schedule.retry_pause
                }
            };
            if self.sleep_or_shutdown(pause).await {
                info!(registry = self.descriptor.tag, "worker stopped");
                return;
            }
        }
    }

    /// One wake-up: decide, maybe refresh, and return how long to sleep.
    async fn tick(&self) -> Result<Duration> {
        let now = Utc::now();
        match self.schedule.decide(now, self.last_success().await?) {
            CycleDecision::Sleep(pause) => {
                info!(
                    registry = self.descriptor.tag,
                    sleep_secs = pause.as_secs(),
                    "not stale yet"
                );
                Ok(pause)
            }
            CycleDecision::Refresh => {
                let loaded = self
                    .refresh_once()
                    .instrument(refresh_span(self.descriptor.tag))
                    .await?;
                let finished = Utc::now();
                self.store
                    .set_option(
                        &self.descriptor.last_update_key(),
                        &finished.format(OPTION_DATETIME_FORMAT).to_string(),
                    )
                    .await?;
                info!(registry = self.descriptor.tag, records = loaded, "refresh succeeded");

                let next = self.schedule.next_daily_instant(finished);
                Ok((next - finished).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }

    /// Reads the registry's last successful update from the option store.
    async fn last_success(&self) -> Result<DateTime<Utc>> {
        let key = self.descriptor.last_update_key();
        match self.store.get_option(&key).await? {
            None => Ok(first_run_epoch()),
            Some(value) => chrono::NaiveDateTime::parse_from_str(&value, OPTION_DATETIME_FORMAT)
                .map(|naive| naive.and_utc())
                .map_err(|_| {
                    ipdex_core::Error::InvalidInput(format!(
                        "option {key} holds an unparseable timestamp: {value}"
                    ))
                }),
        }
    }

    /// Runs one download, parse, load cycle and returns the record count.
    ///
    /// Any stage error aborts the cycle; the loader's transaction guarantees
    /// no partial write.
    pub async fn refresh_once(&self) -> Result<usize> {
        info!(registry = self.descriptor.tag, url = %self.descriptor.report_url(), "downloading");
        let body = self.fetcher.fetch(self.descriptor).await?;
        let text = std::str::from_utf8(&body)
            .map_err(|_| ipdex_core::Error::malformed_record("report body is not valid utf-8"))?;

        let records = parse_report(text).collect::<Result<Vec<_>>>()?;
        let count = records.len();

        let active = self.store.resolve_active_table().await?;
        self.store
            .load_snapshot(active.other(), self.descriptor.id, records)
            .await?;
        Ok(count)
    }

    /// Sleeps for `pause`, racing the shutdown signal. Returns true when
    /// the worker should stop.
    async fn sleep_or_shutdown(&mut self, pause: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(pause) => false,
            // A dropped sender means the runtime is tearing down: stop too.
            changed = self.shutdown.changed() => changed.is_err() || *self.shutdown.borrow(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hour_old_success_is_not_stale() {
        let schedule = RefreshSchedule::default();
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).single().expect("ts");
        let last = now - chrono::Duration::hours(1);

        let CycleDecision::Sleep(pause) = schedule.decide(now, last) else {
            panic!("must not re-download one hour after a success");
        };
        // 23 hours remain plus the safety margin.
        assert_eq!(pause, Duration::from_secs(23 * 60 * 60 + 5));
    }

    #[test]
    fn twenty_five_hour_old_success_is_stale() {
        let schedule = RefreshSchedule::default();
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).single().expect("ts");
        let last = now - chrono::Duration::hours(25);
        assert_eq!(schedule.decide(now, last), CycleDecision::Refresh);
    }

    #[test]
    fn exactly_at_the_interval_is_stale() {
        let schedule = RefreshSchedule::default();
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).single().expect("ts");
        let last = now - chrono::Duration::hours(24);
        assert_eq!(schedule.decide(now, last), CycleDecision::Refresh);
    }

    #[test]
    fn first_run_epoch_forces_a_refresh() {
        let schedule = RefreshSchedule::default();
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).single().expect("ts");
        assert_eq!(schedule.decide(now, first_run_epoch()), CycleDecision::Refresh);
    }

    #[test]
    fn next_daily_instant_is_strictly_after_now() {
        let schedule = RefreshSchedule::default();

        let before = Utc.with_ymd_and_hms(2026, 8, 6, 1, 0, 0).single().expect("ts");
        let next = schedule.next_daily_instant(before);
        assert_eq!(
            next,
            Utc.with_ymd_and_hms(2026, 8, 6, 4, 0, 5).single().expect("ts")
        );

        let after = Utc.with_ymd_and_hms(2026, 8, 6, 5, 0, 0).single().expect("ts");
        let next = schedule.next_daily_instant(after);
        assert_eq!(
            next,
            Utc.with_ymd_and_hms(2026, 8, 7, 4, 0, 5).single().expect("ts")
        );
    }

    #[test]
    fn option_timestamps_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 6, 4, 0, 5).single().expect("ts");
        let formatted = ts.format(OPTION_DATETIME_FORMAT).to_string();
        assert_eq!(formatted, "2026-08-06 04:00:05");
        let parsed = chrono::NaiveDateTime::parse_from_str(&formatted, OPTION_DATETIME_FORMAT)
            .expect("round trip")
            .and_utc();
        assert_eq!(parsed, ts);
    }
}
