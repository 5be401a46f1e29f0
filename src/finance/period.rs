// Summary periods
//
// Periods are half-open [start, end). Query dates may be plain ISO dates or
// RFC 3339 timestamps; a plain end date includes that whole day.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::finance::error::FinanceError;

/// Query parameters for the finance summary
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct SummaryQuery {
    /// Inclusive start, `YYYY-MM-DD` or RFC 3339
    pub start_date: Option<String>,
    /// Inclusive end date (`YYYY-MM-DD`) or exclusive end instant (RFC 3339)
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, FinanceError> {
        if start > end {
            return Err(FinanceError::InvalidRange(format!(
                "start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    /// Period of the same length ending where this one starts.
    ///
    /// Fails when that start would fall before the earliest representable date.
    pub fn previous(&self) -> Result<Period, FinanceError> {
        let start = self.start.checked_sub_signed(self.length()).ok_or_else(|| {
            FinanceError::InvalidRange(format!(
                "no comparison period before {}",
                self.start.to_rfc3339()
            ))
        })?;
        Ok(Period {
            start,
            end: self.start,
        })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// From the first of `now`'s month up to `now`
    pub fn month_to_date(now: DateTime<Utc>) -> Period {
        Period {
            start: month_start(now.year(), now.month()),
            end: now,
        }
    }

    /// The whole calendar month before `now`'s month
    pub fn previous_month(now: DateTime<Utc>) -> Period {
        let (year, month) = if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        };
        Period {
            start: month_start(year, month),
            end: month_start(now.year(), now.month()),
        }
    }
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
    midnight(date)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

fn parse_bound(field: &'static str, raw: &str, bound: Bound) -> Result<DateTime<Utc>, FinanceError> {
    let raw = raw.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }

    let invalid = || FinanceError::InvalidDate {
        field,
        value: raw.to_string(),
    };

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?;
    match bound {
        Bound::Start => Ok(midnight(date)),
        Bound::End => date.succ_opt().map(midnight).ok_or_else(invalid),
    }
}

/// Resolve the requested period; `None` means all time.
///
/// A start without an end runs to `now`; an end without a start is rejected.
pub fn resolve(query: &SummaryQuery, now: DateTime<Utc>) -> Result<Option<Period>, FinanceError> {
    let start = non_blank(&query.start_date);
    let end = non_blank(&query.end_date);

    match (start, end) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(FinanceError::InvalidRange(
            "end_date requires start_date".to_string(),
        )),
        (Some(start), end) => {
            let start = parse_bound("start_date", start, Bound::Start)?;
            let end = match end {
                Some(end) => parse_bound("end_date", end, Bound::End)?,
                None => now,
            };
            Period::new(start, end).map(Some)
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn query(start: Option<&str>, end: Option<&str>) -> SummaryQuery {
        SummaryQuery {
            start_date: start.map(str::to_string),
            end_date: end.map(str::to_string),
        }
    }

    #[test]
    fn test_no_dates_is_all_time() {
        let now = at("2026-03-10T12:00:00Z");
        assert_eq!(resolve(&query(None, None), now).unwrap(), None);
        assert_eq!(resolve(&query(Some(""), Some(" ")), now).unwrap(), None);
    }

    #[test]
    fn test_date_end_is_inclusive() {
        let period = resolve(&query(Some("2026-03-01"), Some("2026-03-31")), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(period.start, at("2026-03-01T00:00:00Z"));
        assert_eq!(period.end, at("2026-04-01T00:00:00Z"));
        assert!(period.contains(at("2026-03-31T23:59:59Z")));
        assert!(!period.contains(at("2026-04-01T00:00:00Z")));
    }

    #[test]
    fn test_timestamps_are_taken_as_is() {
        let period = resolve(
            &query(Some("2026-03-01T08:00:00+02:00"), Some("2026-03-02T00:00:00Z")),
            Utc::now(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(period.start, at("2026-03-01T06:00:00Z"));
        assert_eq!(period.end, at("2026-03-02T00:00:00Z"));
    }

    #[test]
    fn test_start_only_runs_to_now() {
        let now = at("2026-03-10T12:00:00Z");
        let period = resolve(&query(Some("2026-03-01"), None), now).unwrap().unwrap();
        assert_eq!(period.end, now);
    }

    #[test]
    fn test_invalid_ranges() {
        let now = at("2026-03-10T12:00:00Z");
        assert!(matches!(
            resolve(&query(None, Some("2026-03-01")), now),
            Err(FinanceError::InvalidRange(_))
        ));
        assert!(matches!(
            resolve(&query(Some("2026-03-05"), Some("2026-03-01")), now),
            Err(FinanceError::InvalidRange(_))
        ));
        assert!(matches!(
            resolve(&query(Some("03/01/2026"), None), now),
            Err(FinanceError::InvalidDate { field: "start_date", .. })
        ));
        assert!(matches!(
            resolve(&query(Some("2026-04-01"), None), now),
            Err(FinanceError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_previous_period_has_same_length() {
        let period = Period::new(at("2026-03-01T00:00:00Z"), at("2026-03-11T00:00:00Z")).unwrap();
        let previous = period.previous().unwrap();
        assert_eq!(previous.start, at("2026-02-19T00:00:00Z"));
        assert_eq!(previous.end, period.start);
        assert_eq!(previous.length(), period.length());
    }

    #[test]
    fn test_previous_period_before_earliest_date_is_invalid() {
        let earliest = midnight(NaiveDate::MIN);
        let period = Period::new(earliest, earliest + Duration::days(10)).unwrap();
        assert!(matches!(period.previous(), Err(FinanceError::InvalidRange(_))));
    }

    #[test]
    fn test_huge_range_has_no_previous_period() {
        let start = midnight(NaiveDate::from_ymd_opt(-200_000, 1, 1).unwrap());
        let end = midnight(NaiveDate::from_ymd_opt(200_000, 1, 1).unwrap());
        let period = Period::new(start, end).unwrap();
        assert!(matches!(period.previous(), Err(FinanceError::InvalidRange(_))));
    }

    #[test]
    fn test_calendar_month_periods() {
        let now = at("2026-01-15T10:30:00Z");
        assert_eq!(Period::month_to_date(now).start, at("2026-01-01T00:00:00Z"));

        let previous = Period::previous_month(now);
        assert_eq!(previous.start, at("2025-12-01T00:00:00Z"));
        assert_eq!(previous.end, at("2026-01-01T00:00:00Z"));
    }
}
