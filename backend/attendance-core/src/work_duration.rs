// src/work_duration.rs
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::error::{AttendanceError, Result};

// --- Constants ---

/// Minimum length of a work session.
pub const REQUIRED_SESSION_MINUTES: i64 = 180;
/// A session ending at or after this hour covers evening self-study and is
/// always sufficient.
pub const EVENING_STUDY_HOUR: u32 = 20;
/// Shortfall at which a short session becomes severely late.
pub const SEVERE_DEFICIT_MINUTES: i64 = 30;

lazy_static! {
    static ref CLOCK_TIME_RE: Regex =
        Regex::new(r"^(\d{1,2}):(\d{2})(?::\d{2})?$").expect("clock time pattern is valid");
}

/// Wall-clock time of a punch, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Parses `H:MM`, `HH:MM` or `HH:MM:SS`. Seconds are dropped.
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = || AttendanceError::MalformedTimestamp {
            input: text.to_string(),
        };
        let caps = CLOCK_TIME_RE.captures(text.trim()).ok_or_else(malformed)?;
        let hour = caps[1].parse::<u32>().map_err(|_| malformed())?;
        let minute = caps[2].parse::<u32>().map_err(|_| malformed())?;
        Self::new(hour, minute).ok_or_else(malformed)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// How far short of [`REQUIRED_SESSION_MINUTES`] an insufficient session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeficitBand {
    Late,
    SeverelyLate,
}

/// Minutes between clock-in and clock-out.
///
/// The minute component borrows an hour when the clock-out minute is smaller
/// than the clock-in minute, the same way a shift length is worked out by
/// hand.
pub fn elapsed_between(clock_in: ClockTime, clock_out: ClockTime) -> i64 {
    let (mut out_hour, mut out_minute) = (clock_out.hour as i64, clock_out.minute as i64);
    let (in_hour, in_minute) = (clock_in.hour as i64, clock_in.minute as i64);
    if out_minute < in_minute {
        out_minute += 60;
        out_hour -= 1;
    }
    (out_hour - in_hour) * 60 + out_minute - in_minute
}

fn parse_optional(text: Option<&str>) -> Option<ClockTime> {
    text.and_then(|t| ClockTime::parse(t).ok())
}

/// Elapsed minutes for a raw pair of timestamps; `None` when either side is
/// absent or unreadable.
pub fn elapsed_minutes(clock_in: Option<&str>, clock_out: Option<&str>) -> Option<i64> {
    Some(elapsed_between(
        parse_optional(clock_in)?,
        parse_optional(clock_out)?,
    ))
}

pub fn is_sufficient_between(clock_in: ClockTime, clock_out: ClockTime) -> bool {
    elapsed_between(clock_in, clock_out) >= REQUIRED_SESSION_MINUTES
        || clock_out.hour >= EVENING_STUDY_HOUR
}

/// Whether a session is long enough. Absent or unreadable timestamps are
/// never sufficient.
pub fn is_sufficient(clock_in: Option<&str>, clock_out: Option<&str>) -> bool {
    match (parse_optional(clock_in), parse_optional(clock_out)) {
        (Some(start), Some(end)) => is_sufficient_between(start, end),
        _ => false,
    }
}

/// Bands an insufficient session. A non-positive deficit cannot follow a
/// failed sufficiency check and is treated as plain lateness.
pub fn deficit_band(elapsed: i64) -> DeficitBand {
    if REQUIRED_SESSION_MINUTES - elapsed >= SEVERE_DEFICIT_MINUTES {
        DeficitBand::SeverelyLate
    } else {
        DeficitBand::Late
    }
}
