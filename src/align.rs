//! Time-of-day alignment keys shared by the synthetic series and the API snapshots.
//!
//! Both sources reduce their timestamps to a UTC wall-clock time with the
//! calendar date discarded. Synthetic rows carry local times in a fixed-offset
//! zone (no daylight-saving rule); API snapshots carry UTC instants that are
//! floored to the minute before the date is dropped.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc};

use crate::error::{ReconcileError, Result};

/// Canonical textual form of a [`TimeOfDayKey`].
pub const KEY_FORMAT: &str = "%H:%M:%S%.6f";

/// Date-time layouts accepted for local synthetic timestamps and zone-less API timestamps.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

/// ISO-8601 layouts with a zone designator that RFC 3339 does not cover:
/// basic `+hhmm` offsets and minute precision.
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M%#z",
];

/// A UTC wall-clock time with no date, used as the join key.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use ems_reconcile::align::TimeOfDayKey;
///
/// let key = TimeOfDayKey::new(NaiveTime::from_hms_opt(9, 36, 0).unwrap());
/// assert_eq!(key.to_string(), "09:36:00.000000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDayKey(NaiveTime);

impl TimeOfDayKey {
    pub fn new(time: NaiveTime) -> Self {
        Self(time)
    }

    /// Drops the calendar date of a UTC instant.
    pub fn from_utc(instant: DateTime<Utc>) -> Self {
        Self(instant.time())
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// Fractional minutes since midnight, used as the chart x coordinate.
    pub fn minutes_since_midnight(&self) -> f64 {
        let secs = f64::from(self.0.num_seconds_from_midnight());
        let nanos = f64::from(self.0.nanosecond() % 1_000_000_000);
        (secs + nanos / 1e9) / 60.0
    }

    /// Parses a key written by [`fmt::Display`] (seconds fraction optional).
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimestamp` if the string is not `HH:MM:SS[.ffffff]`.
    pub fn parse(s: &str) -> Result<Self> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
            .map(Self)
            .map_err(|e| ReconcileError::InvalidTimestamp {
                value: s.to_string(),
                message: e.to_string(),
            })
    }
}

impl fmt::Display for TimeOfDayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(KEY_FORMAT))
    }
}

/// Builds the fixed-offset zone for a whole-hour UTC offset.
///
/// # Errors
///
/// Returns `Config` if the offset is outside ±23 hours.
pub fn fixed_offset(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ReconcileError::Config(format!("UTC offset {hours}h is out of range")))
}

/// Parses a local timestamp in `zone` and converts it to UTC.
///
/// An explicit zone designator in the string is ignored: the wall-clock
/// reading is always interpreted in `zone`.
///
/// # Errors
///
/// Returns `InvalidTimestamp` if no accepted layout matches.
pub fn parse_local(s: &str, zone: FixedOffset) -> Result<DateTime<Utc>> {
    let s = s.trim();
    let naive = match parse_zoned(s) {
        Some(dt) => dt.naive_local(),
        None => parse_naive(s)?,
    };
    let local = naive
        .and_local_timezone(zone)
        .single()
        .ok_or_else(|| ReconcileError::InvalidTimestamp {
            value: s.to_string(),
            message: format!("not representable in {zone}"),
        })?;
    Ok(local.with_timezone(&Utc))
}

/// Parses an API-reported ISO-8601 timestamp; a missing zone designator means UTC.
///
/// # Errors
///
/// Returns `InvalidTimestamp` if the string is not a recognizable ISO-8601 date-time.
pub fn parse_reported(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Some(dt) = parse_zoned(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_naive(s).map(|naive| naive.and_utc())
}

fn parse_zoned(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok().or_else(|| {
        ZONED_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    })
}

fn parse_naive(s: &str) -> Result<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| ReconcileError::InvalidTimestamp {
            value: s.to_string(),
            message: "unrecognized date-time layout".to_string(),
        })
}

/// Zeroes the seconds and sub-second part of an instant.
pub fn floor_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    let secs = i64::from(instant.second());
    let nanos = i64::from(instant.nanosecond() % 1_000_000_000);
    instant - TimeDelta::seconds(secs) - TimeDelta::nanoseconds(nanos)
}

/// Time-of-day key for a synthetic input timestamp.
///
/// # Errors
///
/// Returns `InvalidTimestamp` if the timestamp cannot be parsed.
pub fn synthetic_key(s: &str, zone: FixedOffset) -> Result<TimeOfDayKey> {
    parse_local(s, zone).map(TimeOfDayKey::from_utc)
}
