//! Core identifier and time types for the export scheduler.
//!
//! Jobs and schedule entries are owned by the config store and keyed by
//! integer ids; the newtypes here keep them from being mixed up. `Weekday`
//! and `TimeOfDay` together form the binding key of the trigger table.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(i64);

/// Unique identifier for a schedule entry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleId(i64);

impl JobId {
    /// Create a new JobId from a store key.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the underlying integer value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

impl ScheduleId {
    /// Create a new ScheduleId from a store key.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the underlying integer value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ScheduleId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a weekday or time-of-day string cannot be parsed.
#[derive(Debug, Error)]
pub enum TimeParseError {
    /// Unrecognized weekday name.
    #[error("unrecognized weekday: {0}")]
    UnknownWeekday(String),

    /// Time-of-day string is not HH:MM.
    #[error("invalid time of day (expected HH:MM): {0}")]
    InvalidTimeOfDay(String),
}

/// Day of the week a trigger binds to.
///
/// Parses the full English name or the 3-letter abbreviation used by the
/// weekday lookup table, case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Short name as stored in the weekday lookup table.
    pub fn short_name(&self) -> &'static str {
        match self {
            Weekday::Monday => "Mon",
            Weekday::Tuesday => "Tue",
            Weekday::Wednesday => "Wed",
            Weekday::Thursday => "Thu",
            Weekday::Friday => "Fri",
            Weekday::Saturday => "Sat",
            Weekday::Sunday => "Sun",
        }
    }

    /// ISO day number (Monday = 1, Sunday = 7).
    pub fn day_number(&self) -> u8 {
        match self {
            Weekday::Monday => 1,
            Weekday::Tuesday => 2,
            Weekday::Wednesday => 3,
            Weekday::Thursday => 4,
            Weekday::Friday => 5,
            Weekday::Saturday => 6,
            Weekday::Sunday => 7,
        }
    }
}

impl FromStr for Weekday {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mon" | "monday" => Ok(Weekday::Monday),
            "tue" | "tuesday" => Ok(Weekday::Tuesday),
            "wed" | "wednesday" => Ok(Weekday::Wednesday),
            "thu" | "thursday" => Ok(Weekday::Thursday),
            "fri" | "friday" => Ok(Weekday::Friday),
            "sat" | "saturday" => Ok(Weekday::Saturday),
            "sun" | "sunday" => Ok(Weekday::Sunday),
            _ => Err(TimeParseError::UnknownWeekday(s.to_string())),
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl From<Weekday> for chrono::Weekday {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Monday => chrono::Weekday::Mon,
            Weekday::Tuesday => chrono::Weekday::Tue,
            Weekday::Wednesday => chrono::Weekday::Wed,
            Weekday::Thursday => chrono::Weekday::Thu,
            Weekday::Friday => chrono::Weekday::Fri,
            Weekday::Saturday => chrono::Weekday::Sat,
            Weekday::Sunday => chrono::Weekday::Sun,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// A wall-clock time with minute resolution ("HH:MM").
///
/// Seconds are always zero; two triggers at the same minute compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Build from hour and minute. Returns None if out of range.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Truncate a full time to minute resolution.
    pub fn from_time(time: NaiveTime) -> Self {
        Self(NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time))
    }

    /// The underlying time value.
    pub fn as_time(&self) -> NaiveTime {
        self.0
    }

    /// Add whole minutes, returning None on day overflow.
    ///
    /// Slot expansion must stop at the end of the window, never wrap to the
    /// next day, so overflow is surfaced instead of wrapped.
    pub fn checked_add_minutes(&self, minutes: u32) -> Option<Self> {
        let total = (self.0.hour() * 60 + self.0.minute()).checked_add(minutes)?;
        if total >= 24 * 60 {
            return None;
        }
        Self::from_hm(total / 60, total % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| TimeParseError::InvalidTimeOfDay(s.to_string()))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}
