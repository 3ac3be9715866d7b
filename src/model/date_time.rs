//! Timestamps and the `date_time` parameter value.

use std::fmt;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Accepted layouts for the local part of a timestamp, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A point in time, either naive or carrying a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timestamp {
    Naive(NaiveDateTime),
    Offset(chrono::DateTime<FixedOffset>),
}

impl Timestamp {
    /// Parse ISO-like text: `2019-01-31`, `2019-01-31T12:00`, `2019-01-31 12:00:00.5`,
    /// optionally followed by `Z` or `±HH:MM`.
    pub fn parse(text: &str) -> Result<Self> {
        let bad = || Error::ParameterValueFormat(format!("Could not parse datetime from \"{text}\""));
        let trimmed = text.trim();
        let (local, offset) = split_offset(trimmed);
        let naive = parse_naive(local).ok_or_else(bad)?;
        match offset {
            None => Ok(Timestamp::Naive(naive)),
            Some(offset) => {
                let offset = parse_offset(offset).ok_or_else(bad)?;
                let aware = naive.and_local_timezone(offset).single().ok_or_else(bad)?;
                Ok(Timestamp::Offset(aware))
            }
        }
    }

    /// The wall-clock time for naive stamps, UTC for offset stamps.
    pub fn naive_utc(&self) -> NaiveDateTime {
        match self {
            Timestamp::Naive(stamp) => *stamp,
            Timestamp::Offset(stamp) => stamp.naive_utc(),
        }
    }

    /// ISO 8601 text with a `T` separator, plus `±HH:MM` for offset stamps.
    pub fn to_iso_string(&self) -> String {
        match self {
            Timestamp::Naive(stamp) => format_naive(stamp, 'T'),
            Timestamp::Offset(stamp) => {
                format!("{}{}", format_naive(&stamp.naive_local(), 'T'), stamp.format("%:z"))
            }
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso_string())
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(stamp: NaiveDateTime) -> Self { Timestamp::Naive(stamp) }
}

impl From<chrono::DateTime<FixedOffset>> for Timestamp {
    fn from(stamp: chrono::DateTime<FixedOffset>) -> Self { Timestamp::Offset(stamp) }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Timestamp::parse(text)
    }
}

/// `YYYY-MM-DD<sep>HH:MM:SS`, with a fraction only when non-zero.
///
/// The fraction has six digits unless the stamp carries sub-microsecond
/// precision, in which case it has nine.
pub fn format_naive(stamp: &NaiveDateTime, separator: char) -> String {
    let nanos = stamp.nanosecond() % 1_000_000_000;
    let fraction = match nanos {
        0 => "",
        n if n % 1_000 == 0 => "%.6f",
        _ => "%.9f",
    };
    stamp.format(&format!("%Y-%m-%d{separator}%H:%M:%S{fraction}")).to_string()
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Split a trailing `Z` / `+HH:MM` / `-HH:MM` off the time part.
fn split_offset(text: &str) -> (&str, Option<&str>) {
    if let Some(local) = text.strip_suffix('Z') {
        return (local, Some("+00:00"));
    }
    let Some(time_start) = text.find(['T', ' ']) else {
        return (text, None);
    };
    match text[time_start..].rfind(['+', '-']) {
        Some(pos) => {
            let (local, offset) = text.split_at(time_start + pos);
            (local, Some(offset))
        }
        None => (text, None),
    }
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let (sign, digits) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    FixedOffset::east_opt(sign * (hours * 3_600 + minutes * 60))
}

// ============================================================================
// DateTime value
// ============================================================================

/// A single timestamp parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateTime {
    value: Timestamp,
}

impl DateTime {
    pub fn new(value: impl Into<Timestamp>) -> Self {
        Self { value: value.into() }
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self { value: Timestamp::parse(text)? })
    }

    pub fn value(&self) -> &Timestamp {
        &self.value
    }
}

impl FromStr for DateTime {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        DateTime::parse(text)
    }
}
