use std::fmt;

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use thiserror::Error;

/// Fixed timestamp layout used throughout the event log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Seconds in one hour.
pub const SECONDS_PER_HOUR: f64 = 60.0 * 60.0;

/// Seconds in one (8760-hour) year.
pub const SECONDS_PER_YEAR: f64 = SECONDS_PER_HOUR * 8760.0;

/// Errors raised while converting timestamps.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("invalid timestamp {raw:?}: expected YYYY-MM-DD HH:MM:SS")]
    InvalidFormat { raw: String },

    #[error("epoch {epoch} is outside the representable calendar range")]
    OutOfRange { epoch: i64 },
}

/// A point in time held both as calendar components and as absolute
/// Unix epoch seconds. Timestamps are interpreted as UTC, so the two
/// representations are exact inverses of each other.
///
/// Ordering and equality follow the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    epoch: i64,
    calendar: Calendar,
}

/// Calendar decomposition of a [`Timestamp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Calendar {
    pub year: i32,
    /// 1..=12.
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Calendar {
    /// Calendar quarter (1..=4) containing this month.
    pub fn quarter(&self) -> u32 {
        quarter_of_month(self.month)
    }
}

impl Timestamp {
    /// Parse a `YYYY-MM-DD HH:MM:SS` string.
    pub fn parse(raw: &str) -> Result<Self, TimeError> {
        let naive = NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).map_err(|_| {
            TimeError::InvalidFormat {
                raw: raw.to_string(),
            }
        })?;
        Ok(Self::from_naive(naive))
    }

    /// Build a timestamp from absolute epoch seconds.
    pub fn from_epoch(epoch: i64) -> Result<Self, TimeError> {
        let dt = DateTime::from_timestamp(epoch, 0).ok_or(TimeError::OutOfRange { epoch })?;
        Ok(Self::from_naive(dt.naive_utc()))
    }

    fn from_naive(naive: NaiveDateTime) -> Self {
        Self {
            epoch: naive.and_utc().timestamp(),
            calendar: Calendar {
                year: naive.year(),
                month: naive.month(),
                day: naive.day(),
                hour: naive.hour(),
                minute: naive.minute(),
                second: naive.second(),
            },
        }
    }

    /// Absolute Unix epoch seconds.
    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    /// Calendar components.
    pub fn calendar(&self) -> Calendar {
        self.calendar
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.calendar;
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            c.year, c.month, c.day, c.hour, c.minute, c.second
        )
    }
}

/// Quarter (1..=4) for a month (1..=12).
pub fn quarter_of_month(month: u32) -> u32 {
    (month.saturating_sub(1) / 3) + 1
}

/// Convert seconds to hours, keeping +inf as +inf.
pub fn seconds_to_hours(seconds: f64) -> f64 {
    seconds / SECONDS_PER_HOUR
}

/// Convert seconds to 8760-hour years.
pub fn seconds_to_years(seconds: f64) -> f64 {
    seconds / SECONDS_PER_YEAR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_calendar_components() {
        let ts = Timestamp::parse("2016-01-01 03:49:00").expect("valid timestamp");
        let c = ts.calendar();
        assert_eq!(c.year, 2016);
        assert_eq!(c.month, 1);
        assert_eq!(c.day, 1);
        assert_eq!(c.hour, 3);
        assert_eq!(c.minute, 49);
        assert_eq!(c.second, 0);
        assert_eq!(ts.epoch(), 1_451_620_140);
    }

    #[test]
    fn test_parse_unix_origin() {
        let epoch = |raw: &str| Timestamp::parse(raw).map(|ts| ts.epoch());
        assert_eq!(epoch("1970-01-01 00:00:00"), Ok(0));
        assert_eq!(epoch("1970-01-01 00:01:40"), Ok(100));
    }

    #[test]
    fn test_parse_rejects_other_layouts() {
        assert!(Timestamp::parse("").is_err());
        assert!(Timestamp::parse("2016/01/01 03:49:00").is_err());
        assert!(Timestamp::parse("2016-01-01T03:49:00").is_err());
        assert!(Timestamp::parse("2016-13-01 03:49:00").is_err());
    }

    #[test]
    fn test_from_epoch_inverts_parse() {
        let ts = Timestamp::parse("2018-07-15 12:30:45").expect("valid timestamp");
        let back = Timestamp::from_epoch(ts.epoch()).expect("in range");
        assert_eq!(back, ts);
        assert_eq!(back.to_string(), "2018-07-15 12:30:45");
    }

    #[test]
    fn test_quarter_of_month() {
        let quarters: Vec<u32> = (1..=12).map(quarter_of_month).collect();
        assert_eq!(quarters, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    fn test_ordering_follows_epoch() {
        let a = Timestamp::parse("2015-12-31 23:59:59").expect("valid");
        let b = Timestamp::parse("2016-01-01 00:00:00").expect("valid");
        assert!(a < b);
        assert_eq!(b.epoch() - a.epoch(), 1);
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(seconds_to_hours(7200.0), 2.0);
        assert_eq!(seconds_to_years(SECONDS_PER_YEAR * 1.5), 1.5);
        assert!(seconds_to_hours(f64::INFINITY).is_infinite());
    }
}
