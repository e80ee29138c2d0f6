//! # Timestamps: Precision-Carrying Points in Time
//!
//! An Ion timestamp remembers how precisely it was written (`2007T` is a
//! year, `2007-02-23T12:14Z` a minute) and whether its offset is known.
//! `-00:00` means "local time at an unknown offset"; date-only timestamps
//! always have an unknown offset.
//!
//! Equivalence compares the written form (precision, local fields, fraction
//! digits, offset). Ordering for range checks compares instants, treating an
//! unknown offset as UTC.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::ParseError;

/// The coarsest unit present in a timestamp's written form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimestampPrecision {
    /// `YYYYT`
    Year,
    /// `YYYY-MMT`
    Month,
    /// `YYYY-MM-DD`
    Day,
    /// `YYYY-MM-DDThh:mm<offset>`
    Minute,
    /// `YYYY-MM-DDThh:mm:ss[.fff]<offset>`
    Second,
}

/// Components of a timestamp prior to calendar validation.
#[derive(Debug, Clone, Default)]
pub struct TimestampParts {
    /// Four-digit year.
    pub year: i32,
    /// Month, present from month precision on.
    pub month: Option<u32>,
    /// Day, present from day precision on.
    pub day: Option<u32>,
    /// Hour and minute, present from minute precision on.
    pub hour_minute: Option<(u32, u32)>,
    /// Whole seconds, present from second precision on.
    pub second: Option<u32>,
    /// Fractional-second digits, without the leading `.`.
    pub fraction: String,
    /// Offset in minutes east of UTC; `None` is the unknown offset.
    pub offset_minutes: Option<i32>,
}

/// A validated Ion timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timestamp {
    precision: TimestampPrecision,
    local: NaiveDateTime,
    fraction: String,
    offset_minutes: Option<i32>,
}

impl Timestamp {
    /// Validate the parts against the calendar and build a timestamp.
    pub fn from_parts(parts: TimestampParts) -> Result<Self, ParseError> {
        let invalid = |reason: String| ParseError::InvalidTimestamp { reason };

        let precision = match (parts.month, parts.day, parts.hour_minute, parts.second) {
            (None, None, None, None) => TimestampPrecision::Year,
            (Some(_), None, None, None) => TimestampPrecision::Month,
            (Some(_), Some(_), None, None) => TimestampPrecision::Day,
            (Some(_), Some(_), Some(_), None) => TimestampPrecision::Minute,
            (Some(_), Some(_), Some(_), Some(_)) => TimestampPrecision::Second,
            _ => return Err(invalid("components are not contiguous".into())),
        };
        if !parts.fraction.is_empty() && precision != TimestampPrecision::Second {
            return Err(invalid("fractional seconds require second precision".into()));
        }
        if !(1..=9999).contains(&parts.year) {
            return Err(invalid(format!("year {} out of range", parts.year)));
        }

        let month = parts.month.unwrap_or(1);
        let day = parts.day.unwrap_or(1);
        let date = NaiveDate::from_ymd_opt(parts.year, month, day)
            .ok_or_else(|| invalid(format!("{:04}-{month:02}-{day:02} is not a date", parts.year)))?;

        let (hour, minute) = parts.hour_minute.unwrap_or((0, 0));
        let second = parts.second.unwrap_or(0);
        let nanos = fraction_nanos(&parts.fraction);
        let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
            .ok_or_else(|| invalid(format!("{hour:02}:{minute:02}:{second:02} is not a time")))?;

        let offset_minutes = if precision >= TimestampPrecision::Minute {
            parts.offset_minutes
        } else {
            None
        };
        if let Some(offset) = offset_minutes {
            if offset.abs() >= 24 * 60 {
                return Err(invalid(format!("offset {offset} minutes out of range")));
            }
        }

        Ok(Self {
            precision,
            local: NaiveDateTime::new(date, time),
            fraction: parts.fraction,
            offset_minutes,
        })
    }

    /// The written precision.
    pub fn precision(&self) -> TimestampPrecision {
        self.precision
    }

    /// Number of fractional-second digits written.
    pub fn fraction_digits(&self) -> usize {
        self.fraction.len()
    }

    /// Offset in minutes east of UTC, or `None` when unknown.
    pub fn offset_minutes(&self) -> Option<i32> {
        self.offset_minutes
    }

    /// Local date and time as written.
    pub fn local(&self) -> NaiveDateTime {
        self.local
    }

    /// The instant this timestamp denotes; unknown offsets count as UTC.
    pub fn instant(&self) -> DateTime<Utc> {
        let shifted = self.local - chrono::Duration::minutes(i64::from(self.offset_minutes.unwrap_or(0)));
        Utc.from_utc_datetime(&shifted)
    }
}

/// First nine fraction digits as nanoseconds.
fn fraction_nanos(fraction: &str) -> u32 {
    let mut digits: String = fraction.chars().take(9).collect();
    while digits.len() < 9 {
        digits.push('0');
    }
    digits.parse().unwrap_or(0)
}

/// Render an offset in Ion form (`Z`, `-00:00`, `+hh:mm`).
pub fn format_offset(offset_minutes: Option<i32>) -> String {
    match offset_minutes {
        None => "-00:00".to_string(),
        Some(0) => "Z".to_string(),
        Some(m) => {
            let sign = if m < 0 { '-' } else { '+' };
            let m = m.abs();
            format!("{sign}{:02}:{:02}", m / 60, m % 60)
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.local.date();
        let time = self.local.time();
        match self.precision {
            TimestampPrecision::Year => write!(f, "{:04}T", date.year()),
            TimestampPrecision::Month => write!(f, "{:04}-{:02}T", date.year(), date.month()),
            TimestampPrecision::Day => write!(f, "{}", date.format("%Y-%m-%d")),
            TimestampPrecision::Minute => write!(
                f,
                "{}T{}{}",
                date.format("%Y-%m-%d"),
                time.format("%H:%M"),
                format_offset(self.offset_minutes)
            ),
            TimestampPrecision::Second => {
                write!(f, "{}T{}", date.format("%Y-%m-%d"), time.format("%H:%M:%S"))?;
                if !self.fraction.is_empty() {
                    write!(f, ".{}", self.fraction)?;
                }
                f.write_str(&format_offset(self.offset_minutes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(year: i32, month: u32, day: u32) -> TimestampParts {
        TimestampParts {
            year,
            month: Some(month),
            day: Some(day),
            ..TimestampParts::default()
        }
    }

    #[test]
    fn test_year_precision_renders_with_t() {
        let ts = Timestamp::from_parts(TimestampParts {
            year: 2007,
            ..TimestampParts::default()
        })
        .unwrap();
        assert_eq!(ts.precision(), TimestampPrecision::Year);
        assert_eq!(ts.to_string(), "2007T");
        assert_eq!(ts.offset_minutes(), None);
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert!(Timestamp::from_parts(day(2023, 2, 29)).is_err());
        assert!(Timestamp::from_parts(day(2024, 2, 29)).is_ok());
        assert!(Timestamp::from_parts(day(2024, 13, 1)).is_err());
    }

    #[test]
    fn test_fraction_and_offset_render() {
        let ts = Timestamp::from_parts(TimestampParts {
            hour_minute: Some((12, 14)),
            second: Some(33),
            fraction: "079".into(),
            offset_minutes: Some(-8 * 60),
            ..day(2007, 2, 23)
        })
        .unwrap();
        assert_eq!(ts.to_string(), "2007-02-23T12:14:33.079-08:00");
        assert_eq!(ts.fraction_digits(), 3);
    }

    #[test]
    fn test_instant_accounts_for_offset() {
        let east = Timestamp::from_parts(TimestampParts {
            hour_minute: Some((10, 0)),
            offset_minutes: Some(120),
            ..day(2020, 1, 1)
        })
        .unwrap();
        let utc = Timestamp::from_parts(TimestampParts {
            hour_minute: Some((8, 0)),
            offset_minutes: Some(0),
            ..day(2020, 1, 1)
        })
        .unwrap();
        assert_ne!(east, utc);
        assert_eq!(east.instant(), utc.instant());
    }

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(None), "-00:00");
        assert_eq!(format_offset(Some(0)), "Z");
        assert_eq!(format_offset(Some(330)), "+05:30");
        assert_eq!(format_offset(Some(-90)), "-01:30");
    }
}
