// Trigger time windows
//
// Passes run on an interval, so each trigger matches entities whose relevant
// timestamp falls in [T - W, T]. With W at least the polling interval, a
// condition that becomes true between two passes is seen by one of them.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Default window width, matching a 15-minute polling interval
pub const DEFAULT_WINDOW_MINUTES: i64 = 15;

/// Window width for the client-inactive trigger
pub const INACTIVE_WINDOW_MINUTES: i64 = 60;

/// Inclusive time window `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TriggerWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TriggerWindow {
    /// Window of the given width ending at the target instant
    pub fn ending_at(target: DateTime<Utc>, width: Duration) -> Self {
        Self {
            start: target - width,
            end: target,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Calendar dates whose `hour:00` UTC falls inside the window.
    ///
    /// Day-level triggers (birthdays, anniversaries, holidays) anchor on a
    /// send hour, so at most one pass per day sees each date.
    pub fn anchored_dates(&self, hour: u32) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut day = self.start.date_naive();
        let last = self.end.date_naive();

        while day <= last {
            if let Some(anchor) = anchor_instant(day, hour) {
                if self.contains(anchor) {
                    dates.push(day);
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        dates
    }
}

/// `date` at `hour:00` UTC
pub fn anchor_instant(date: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    Utc.from_local_datetime(&date.and_time(time)).single()
}

/// Month/day pairs whose anniversaries fall on `date`.
///
/// Feb 29 anniversaries are observed on Feb 28 in non-leap years.
pub fn month_days_observed_on(date: NaiveDate) -> Vec<(u32, u32)> {
    let mut pairs = vec![(date.month(), date.day())];
    let is_leap = NaiveDate::from_ymd_opt(date.year(), 2, 29).is_some();
    if date.month() == 2 && date.day() == 28 && !is_leap {
        pairs.push((2, 29));
    }
    pairs
}
