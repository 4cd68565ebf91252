//! Calendar timestamps with exact RFC 3339 round-tripping.
//!
//! The server speaks RFC 3339 in Zulu time at one-second resolution
//! (`2014-08-30T21:12:50Z`). `DateTime` stores exactly that much precision so
//! that `parse(format(t)) == t` always holds.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, SubsecRound, Utc};
use thiserror::Error;

/// Wire format for timestamps.
const RFC3339_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Years the four-digit wire format can represent.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

/// Error returned when a string is not a valid RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid RFC 3339 timestamp: {0:?}")]
pub struct DateTimeParseError(pub String);

/// A UTC timestamp with one-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(chrono::DateTime<Utc>);

impl DateTime {
    /// The current time, truncated to whole seconds.
    pub fn now() -> Self {
        Self(Utc::now().trunc_subsecs(0))
    }

    /// Parse an RFC 3339 timestamp.
    ///
    /// Any offset is accepted and normalised to UTC. Fractional seconds are
    /// dropped. The UTC year must stay within `0000..=9999`.
    pub fn from_rfc3339(s: &str) -> Result<Self, DateTimeParseError> {
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .and_then(|dt| Self::in_range(dt.with_timezone(&Utc).trunc_subsecs(0)))
            .ok_or_else(|| DateTimeParseError(s.to_string()))
    }

    /// Build a timestamp from seconds since the Unix epoch.
    pub fn from_timestamp(secs: i64) -> Option<Self> {
        chrono::DateTime::from_timestamp(secs, 0).and_then(Self::in_range)
    }

    fn in_range(dt: chrono::DateTime<Utc>) -> Option<Self> {
        YEAR_RANGE.contains(&dt.year()).then_some(Self(dt))
    }

    /// Seconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }

    /// Render as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn to_rfc3339(&self) -> String {
        self.0.format(RFC3339_FORMAT).to_string()
    }

    /// Compact `dd/HH:MM` rendering used in dispatch tables.
    pub fn to_short_string(&self) -> String {
        self.0.format("%d/%H:%M").to_string()
    }

    /// `YYYY-MM-DD HH:MM` rendering.
    pub fn to_medium_string(&self) -> String {
        self.0.format("%Y-%m-%d %H:%M").to_string()
    }

    /// Long rendering, e.g. `Saturday, August 30, 2014 21:12:50 UTC`.
    pub fn to_long_string(&self) -> String {
        self.0.format("%A, %B %-d, %Y %H:%M:%S UTC").to_string()
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl FromStr for DateTime {
    type Err = DateTimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_rfc3339(s)
    }
}
