//! ISO 8601 date helpers for simulation time origins.
//!
//! Simulation times are seconds relative to a reference date; ingested files
//! and hosts express that date as `YYYY-MM-DDThh:mm:ssZ`. Dates are handled
//! as `(year, day-of-year, seconds-of-day)` triples, proleptic Gregorian, UTC.

use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86400.0;

/// A UTC instant decomposed into year, 1-based day of year, and seconds of day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsoDate {
    pub year: i32,
    pub day_of_year: u32,
    pub seconds: f64,
}

#[must_use]
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_per_month(year: i32) -> [u32; 12] {
    let february = if is_leap_year(year) { 29 } else { 28 };
    [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
}

impl IsoDate {
    /// Parse `YYYY-MM-DDThh:mm:ssZ` (exactly 20 characters).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDate`] for any other length, a non-numeric
    /// field, or a month/day outside the calendar.
    pub fn parse(date: &str) -> Result<Self> {
        let invalid = || DataError::InvalidDate(date.to_string());
        if date.len() != 20 || !date.is_ascii() {
            return Err(invalid());
        }
        let field = |range: std::ops::Range<usize>| -> Result<u32> {
            date[range].parse::<u32>().map_err(|_| invalid())
        };
        let year = date[0..4].parse::<i32>().map_err(|_| invalid())?;
        let month = field(5..7)?;
        let day = field(8..10)?;
        let (hours, minutes, seconds) = (field(11..13)?, field(14..16)?, field(17..19)?);

        let months = days_per_month(year);
        if !(1..=12).contains(&month) || day == 0 || day > months[month as usize - 1] {
            return Err(invalid());
        }
        let day_of_year = day + months[..month as usize - 1].iter().sum::<u32>();
        Ok(Self {
            year,
            day_of_year,
            seconds: f64::from(hours * 3600 + minutes * 60 + seconds),
        })
    }

    /// Days from 1970-01-01 to the start of this date's day.
    fn days_from_epoch(&self) -> i64 {
        let y = i64::from(self.year);
        let leaps = (y - 1).div_euclid(4) - 1969 / 4 - (y - 1).div_euclid(100) + 1969 / 100
            + (y - 1).div_euclid(400)
            - 1969 / 400;
        (y - 1970) * 365 + leaps + i64::from(self.day_of_year) - 1
    }

    /// Seconds since the Unix epoch.
    #[must_use]
    pub fn epoch_seconds(&self) -> f64 {
        self.days_from_epoch() as f64 * SECONDS_PER_DAY + self.seconds
    }

    /// Signed seconds from `self` to `later`.
    #[must_use]
    pub fn seconds_until(&self, later: &IsoDate) -> f64 {
        later.epoch_seconds() - self.epoch_seconds()
    }

    /// Date `offset` seconds after this one, normalized across days and years.
    #[must_use]
    pub fn shifted(&self, offset: f64) -> Self {
        let total = self.epoch_seconds() + offset;
        let days = (total / SECONDS_PER_DAY).floor();
        let seconds = total - days * SECONDS_PER_DAY;
        let mut remaining = days as i64;
        let mut year = 1970;
        loop {
            let length = if is_leap_year(year) { 366 } else { 365 };
            if remaining < 0 {
                year -= 1;
                remaining += if is_leap_year(year) { 366 } else { 365 };
            } else if remaining >= length {
                remaining -= length;
                year += 1;
            } else {
                break;
            }
        }
        Self {
            year,
            day_of_year: remaining as u32 + 1,
            seconds,
        }
    }

    /// Render as `YYYY-MM-DDThh:mm:ssZ`, seconds truncated.
    #[must_use]
    pub fn format(&self) -> String {
        let normalized = self.shifted(0.0);
        let mut day = normalized.day_of_year;
        let mut month = 1;
        for length in days_per_month(normalized.year) {
            if day <= length {
                break;
            }
            day -= length;
            month += 1;
        }
        let secs = normalized.seconds as u32;
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            normalized.year,
            month,
            day,
            secs / 3600,
            secs % 3600 / 60,
            secs % 60
        )
    }
}

/// Format `(seconds-of-day, year, day-of-year)` as an ISO date string.
#[must_use]
pub fn format_iso_date(seconds: f64, year: i32, day_of_year: u32) -> String {
    IsoDate {
        year,
        day_of_year,
        seconds,
    }
    .format()
}

/// Signed seconds between two `(seconds, year, day-of-year)` triples.
#[must_use]
pub fn seconds_between(t1: f64, y1: i32, yday1: u32, t2: f64, y2: i32, yday2: u32) -> f64 {
    let first = IsoDate {
        year: y1,
        day_of_year: yday1,
        seconds: t1,
    };
    let second = IsoDate {
        year: y2,
        day_of_year: yday2,
        seconds: t2,
    };
    first.seconds_until(&second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decomposes() {
        let date = IsoDate::parse("2013-03-01T01:01:30Z").unwrap();
        assert_eq!(date.year, 2013);
        assert_eq!(date.day_of_year, 31 + 28 + 1);
        assert_eq!(date.seconds, 3690.0);

        let leap = IsoDate::parse("2012-03-01T00:00:00Z").unwrap();
        assert_eq!(leap.day_of_year, 61);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(IsoDate::parse("2013-03-01").is_err());
        assert!(IsoDate::parse("2013-13-01T00:00:00Z").is_err());
        assert!(IsoDate::parse("2013-02-29T00:00:00Z").is_err());
        assert!(IsoDate::parse("2013-0a-01T00:00:00Z").is_err());
    }

    #[test]
    fn test_epoch_reference() {
        assert_eq!(IsoDate::parse("1970-01-01T00:00:00Z").unwrap().epoch_seconds(), 0.0);
        assert_eq!(
            IsoDate::parse("2000-01-01T00:00:00Z").unwrap().epoch_seconds(),
            946_684_800.0
        );
        assert_eq!(
            IsoDate::parse("1969-12-31T00:00:00Z").unwrap().epoch_seconds(),
            -86_400.0
        );
    }

    #[test]
    fn test_seconds_between_across_leap_year() {
        // 2012 is a leap year: 366 days from 2012-01-01 to 2013-01-01.
        let secs = seconds_between(0.0, 2012, 1, 0.0, 2013, 1);
        assert_eq!(secs, 366.0 * 86400.0);
        assert_eq!(seconds_between(10.0, 2013, 1, 0.0, 2013, 1), -10.0);
    }

    #[test]
    fn test_format_normalizes_overflowing_seconds() {
        assert_eq!(format_iso_date(3690.0, 2013, 60), "2013-03-01T01:01:30Z");
        assert_eq!(format_iso_date(86400.0 + 5.0, 2012, 366), "2013-01-01T00:00:05Z");
        let date = IsoDate::parse("2016-12-31T23:59:59Z").unwrap();
        assert_eq!(date.format(), "2016-12-31T23:59:59Z");
    }
}
