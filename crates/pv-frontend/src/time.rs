//! Time scales
//!
//! The drivers never do calendar arithmetic themselves. They ask a
//! [`TimeSystem`] to parse user input, to split an epoch into day and
//! seconds-of-day, and to name the calendar date of a day. Epochs are
//! seconds from 2000-01-01 00:00:00 on whatever scale the implementation
//! chooses; the ephemeris is expected to use the same scale.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::error::{DriverError, DriverResult};

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Unix timestamp of 2000-01-01 00:00:00
const UNIX_AT_EPOCH: i64 = 946_684_800;

/// Formats accepted for date and time input, tried in order
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%j %H:%M:%S%.f",
    "%Y %b %d %H:%M:%S%.f",
];

/// Conversion between text, calendar days and epoch seconds
pub trait TimeSystem {
    /// Parse a date/time string into epoch seconds
    fn parse(&self, text: &str) -> DriverResult<f64>;

    /// Day number (0 = 2000-01-01) and seconds into that day
    fn day_sec(&self, time: f64) -> (i64, f64);

    /// Epoch seconds at `sec` seconds into `day`
    fn time_of(&self, day: i64, sec: f64) -> f64;

    /// Calendar year, month and day of month of `day`
    fn ymd(&self, day: i64) -> DriverResult<(i32, u32, u32)>;

    /// Year and day of year (1-based) of `day`
    fn year_day(&self, day: i64) -> DriverResult<(i32, u32)>;
}

/// Days of exactly 86400 seconds with no leap seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformTime;

impl UniformTime {
    fn epoch() -> NaiveDate {
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
    }

    fn date(day: i64) -> DriverResult<NaiveDate> {
        i32::try_from(day + i64::from(Self::epoch().num_days_from_ce()))
            .ok()
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .ok_or_else(|| DriverError::Parse(format!("day {day} is outside the calendar")))
    }

    fn seconds(dt: NaiveDateTime) -> f64 {
        let utc = dt.and_utc();
        (utc.timestamp() - UNIX_AT_EPOCH) as f64 + f64::from(utc.timestamp_subsec_nanos()) * 1.0e-9
    }
}

impl TimeSystem for UniformTime {
    fn parse(&self, text: &str) -> DriverResult<f64> {
        let text = text.trim();
        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(Self::seconds(dt));
            }
        }
        for format in ["%Y-%m-%d", "%Y-%j"] {
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                return Ok(Self::seconds(date.and_hms_opt(0, 0, 0).unwrap_or_default()));
            }
        }
        Err(DriverError::Parse(format!("unrecognized date/time \"{text}\"")))
    }

    fn day_sec(&self, time: f64) -> (i64, f64) {
        let day = (time / SECONDS_PER_DAY).floor();
        (day as i64, time - day * SECONDS_PER_DAY)
    }

    fn time_of(&self, day: i64, sec: f64) -> f64 {
        day as f64 * SECONDS_PER_DAY + sec
    }

    fn ymd(&self, day: i64) -> DriverResult<(i32, u32, u32)> {
        let date = Self::date(day)?;
        Ok((date.year(), date.month(), date.day()))
    }

    fn year_day(&self, day: i64) -> DriverResult<(i32, u32)> {
        let date = Self::date(day)?;
        Ok((date.year(), date.ordinal()))
    }
}

/// Local wall-clock time in the form used by document footers,
/// e.g. `Wed Jun 30 21:49:08 1993`
pub fn generated_stamp() -> String {
    chrono::Local::now().format("%a %b %d %H:%M:%S %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_formats_agree() {
        let ts = UniformTime;
        let a = ts.parse("2000-01-02 12:00:00").unwrap();
        let b = ts.parse("2000-01-02T12:00").unwrap();
        let c = ts.parse("2000-002 12:00:00").unwrap();
        assert_relative_eq!(a, 1.5 * SECONDS_PER_DAY);
        assert_relative_eq!(a, b);
        assert_relative_eq!(a, c);
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let t = UniformTime.parse("2000-01-01 00:00:01.25").unwrap();
        assert_relative_eq!(t, 1.25, epsilon = 1e-9);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            UniformTime.parse("next tuesday"),
            Err(DriverError::Parse(_))
        ));
    }

    #[test]
    fn test_day_sec_before_epoch() {
        let (day, sec) = UniformTime.day_sec(-3600.0);
        assert_eq!(day, -1);
        assert_relative_eq!(sec, SECONDS_PER_DAY - 3600.0);
        assert_relative_eq!(UniformTime.time_of(day, sec), -3600.0);
    }

    #[test]
    fn test_calendar_dates() {
        let ts = UniformTime;
        assert_eq!(ts.ymd(0).unwrap(), (2000, 1, 1));
        // 2000 is a leap year.
        assert_eq!(ts.ymd(59).unwrap(), (2000, 2, 29));
        assert_eq!(ts.ymd(366).unwrap(), (2001, 1, 1));
        assert_eq!(ts.year_day(365).unwrap(), (2000, 366));
    }

    #[test]
    fn test_generated_stamp_shape() {
        let stamp = generated_stamp();
        assert_eq!(stamp.len(), 24, "stamp \"{stamp}\" has the fixed width");
    }
}
