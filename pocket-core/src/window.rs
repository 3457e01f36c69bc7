//! Fetch window: the inclusive lower bound (Unix seconds) of articles to request.
//! Weeks start on Sunday and all bucketing happens in UTC.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

use crate::config::SyncOptions;
use crate::error::SyncError;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant, for deterministic runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&instant.date_naive().and_time(NaiveTime::MIN))
}

pub fn start_of_week(instant: DateTime<Utc>) -> DateTime<Utc> {
    let back = i64::from(instant.weekday().num_days_from_sunday());
    start_of_day(instant) - Duration::days(back)
}

pub fn fetch_window_start(options: &SyncOptions, now: DateTime<Utc>) -> Result<i64, SyncError> {
    let start = if options.current_week_only() {
        // nightly incremental runs: current and previous week only
        now.checked_sub_signed(Duration::weeks(1))
            .map(start_of_week)
    } else {
        let weeks = options.weeks_of_history.ok_or_else(|| {
            SyncError::configuration("weeksOfHistory must be set to compute a fetch window")
        })?;
        start_of_week(now).checked_sub_signed(Duration::weeks(i64::from(weeks)))
    };

    start
        .map(|instant| instant.timestamp())
        .ok_or_else(|| SyncError::configuration("fetch window start is out of range"))
}

/// Seconds at the start of the UTC day containing `seconds`, or 0 for an unusable timestamp.
pub fn day_bucket(seconds: Option<i64>) -> i64 {
    bucket(seconds, start_of_day)
}

/// Seconds at the start of the week containing `seconds`, or 0 for an unusable timestamp.
pub fn week_bucket(seconds: Option<i64>) -> i64 {
    bucket(seconds, start_of_week)
}

fn bucket(seconds: Option<i64>, truncate: fn(DateTime<Utc>) -> DateTime<Utc>) -> i64 {
    seconds
        .filter(|s| *s > 0)
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|instant| truncate(instant).timestamp())
        .unwrap_or(0)
}
