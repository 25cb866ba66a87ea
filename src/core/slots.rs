//! Time-slot expansion for schedule entries.
//!
//! A schedule entry carries a start time, an optional end time, and an
//! optional repeat interval in minutes. Expansion turns that row into the
//! concrete list of times of day the job fires on its weekday.

use std::str::FromStr;
use thiserror::Error;

use crate::core::types::TimeOfDay;

/// Errors produced while expanding a schedule entry into time slots.
#[derive(Debug, Error)]
pub enum SlotError {
    /// A time string could not be parsed as HH:MM.
    #[error("invalid time '{0}' (expected HH:MM)")]
    InvalidTime(String),

    /// An end time was given without a repeat interval.
    #[error("end time given without a repeat interval")]
    MissingInterval,

    /// The repeat interval is not a positive whole number of minutes.
    #[error("invalid repeat interval '{0}' (expected positive minutes)")]
    InvalidInterval(String),

    /// The window is inverted (start after end).
    #[error("start time {start} is after end time {end}")]
    InvertedWindow { start: TimeOfDay, end: TimeOfDay },
}

/// Expand a (start, end?, interval?) triple into an ordered list of slots.
///
/// With no end time the result is the single start slot. With an end time,
/// slots step from start by the interval and include every time that is
/// still <= end; nothing past the end is ever produced. An end time without
/// a usable interval is a malformed entry and fails outright, it does not
/// default to anything.
pub fn expand_slots(
    start: &str,
    end: Option<&str>,
    interval_minutes: Option<&str>,
) -> Result<Vec<TimeOfDay>, SlotError> {
    let start = TimeOfDay::from_str(start).map_err(|_| SlotError::InvalidTime(start.to_string()))?;

    let Some(end) = end else {
        return Ok(vec![start]);
    };
    let end = TimeOfDay::from_str(end).map_err(|_| SlotError::InvalidTime(end.to_string()))?;

    if start > end {
        return Err(SlotError::InvertedWindow { start, end });
    }

    let interval = interval_minutes
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SlotError::MissingInterval)?;
    let step: u32 = interval
        .parse()
        .ok()
        .filter(|m| *m > 0)
        .ok_or_else(|| SlotError::InvalidInterval(interval.to_string()))?;

    let mut slots = Vec::new();
    let mut current = start;
    loop {
        slots.push(current);
        match current.checked_add_minutes(step) {
            Some(next) if next <= end => current = next,
            _ => break,
        }
    }

    Ok(slots)
}
