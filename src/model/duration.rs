//! Calendar durations: parsing and formatting of `"3h"`, `"1 month"` style steps.

use std::fmt;
use std::str::FromStr;

use chrono::{Months, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Error, Result};

/// Unit of a single duration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl TimeUnit {
    /// Single-letter abbreviation used in the database format.
    pub fn abbreviation(self) -> &'static str {
        match self {
            TimeUnit::Second => "s",
            TimeUnit::Minute => "m",
            TimeUnit::Hour => "h",
            TimeUnit::Day => "D",
            TimeUnit::Month => "M",
            TimeUnit::Year => "Y",
        }
    }

    /// Accepts the abbreviation or the full word, singular or plural.
    ///
    /// Abbreviations are case-sensitive: `m` is minutes, `M` is months.
    pub fn from_token(token: &str) -> Option<Self> {
        let unit = match token {
            "s" | "second" | "seconds" => TimeUnit::Second,
            "m" | "minute" | "minutes" => TimeUnit::Minute,
            "h" | "hour" | "hours" => TimeUnit::Hour,
            "D" | "day" | "days" => TimeUnit::Day,
            "M" | "month" | "months" => TimeUnit::Month,
            "Y" | "year" | "years" => TimeUnit::Year,
            _ => return None,
        };
        Some(unit)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

// ============================================================================
// RelativeDelta
// ============================================================================

/// A calendar-aware time step.
///
/// Fields are kept normalized: seconds and minutes carry over at 60, hours at
/// 24 and months at 12, keeping the sign of the carried amount. Days never
/// carry into months since month length varies. Two deltas describing the same
/// step therefore compare equal (`60m == 1h`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativeDelta {
    years: i64,
    months: i64,
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
}

impl RelativeDelta {
    /// A delta of `count` steps of `unit`.
    ///
    /// Each carry lands in a field that is still zero, so this cannot overflow.
    pub fn new(count: i64, unit: TimeUnit) -> Self {
        match unit {
            TimeUnit::Second => Self { seconds: count % 60, ..Self::new(count / 60, TimeUnit::Minute) },
            TimeUnit::Minute => Self { minutes: count % 60, ..Self::new(count / 60, TimeUnit::Hour) },
            TimeUnit::Hour => Self { hours: count % 24, ..Self::new(count / 24, TimeUnit::Day) },
            TimeUnit::Day => Self { days: count, ..Self::default() },
            TimeUnit::Month => Self { months: count % 12, years: count / 12, ..Self::default() },
            TimeUnit::Year => Self { years: count, ..Self::default() },
        }
    }

    /// Build from raw fields, carrying as needed.
    pub fn from_parts(years: i64, months: i64, days: i64, hours: i64, minutes: i64, seconds: i64) -> Result<Self> {
        Self { years, months, days, hours, minutes, seconds }.normalized().ok_or_else(overflow)
    }

    pub fn seconds(count: i64) -> Self { Self::new(count, TimeUnit::Second) }
    pub fn minutes(count: i64) -> Self { Self::new(count, TimeUnit::Minute) }
    pub fn hours(count: i64) -> Self { Self::new(count, TimeUnit::Hour) }
    pub fn days(count: i64) -> Self { Self::new(count, TimeUnit::Day) }
    pub fn months(count: i64) -> Self { Self::new(count, TimeUnit::Month) }
    pub fn years(count: i64) -> Self { Self::new(count, TimeUnit::Year) }

    pub fn get(&self, unit: TimeUnit) -> i64 {
        match unit {
            TimeUnit::Second => self.seconds,
            TimeUnit::Minute => self.minutes,
            TimeUnit::Hour => self.hours,
            TimeUnit::Day => self.days,
            TimeUnit::Month => self.months,
            TimeUnit::Year => self.years,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    fn normalized(mut self) -> Option<Self> {
        carry(&mut self.seconds, &mut self.minutes, 60)?;
        carry(&mut self.minutes, &mut self.hours, 60)?;
        carry(&mut self.hours, &mut self.days, 24)?;
        carry(&mut self.months, &mut self.years, 12)?;
        Some(self)
    }

    /// Field-wise sum, `None` on overflow.
    pub fn checked_add(self, other: RelativeDelta) -> Option<RelativeDelta> {
        RelativeDelta {
            years: self.years.checked_add(other.years)?,
            months: self.months.checked_add(other.months)?,
            days: self.days.checked_add(other.days)?,
            hours: self.hours.checked_add(other.hours)?,
            minutes: self.minutes.checked_add(other.minutes)?,
            seconds: self.seconds.checked_add(other.seconds)?,
        }
        .normalized()
    }

    /// Every field scaled by `factor`, `None` on overflow.
    pub fn checked_mul(self, factor: i64) -> Option<RelativeDelta> {
        RelativeDelta {
            years: self.years.checked_mul(factor)?,
            months: self.months.checked_mul(factor)?,
            days: self.days.checked_mul(factor)?,
            hours: self.hours.checked_mul(factor)?,
            minutes: self.minutes.checked_mul(factor)?,
            seconds: self.seconds.checked_mul(factor)?,
        }
        .normalized()
    }

    /// Sum of `steps`, `None` on overflow.
    pub fn checked_sum<'a>(steps: impl IntoIterator<Item = &'a RelativeDelta>) -> Option<RelativeDelta> {
        steps.into_iter().try_fold(RelativeDelta::default(), |total, step| total.checked_add(*step))
    }

    /// Shift `stamp` by this delta.
    ///
    /// Years and months go first, clamping the day to the end of the target
    /// month (`Jan 31 + 1M = Feb 28`), then days and clock units.
    /// Returns `None` when the result is out of range.
    pub fn add_to(&self, stamp: NaiveDateTime) -> Option<NaiveDateTime> {
        let months = self.years.checked_mul(12)?.checked_add(self.months)?;
        let span = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
        let shifted = if months >= 0 { stamp.checked_add_months(span)? } else { stamp.checked_sub_months(span)? };
        let clock_seconds = self.days.checked_mul(86_400)?
            .checked_add(self.hours.checked_mul(3_600)?)?
            .checked_add(self.minutes.checked_mul(60)?)?
            .checked_add(self.seconds)?;
        shifted.checked_add_signed(TimeDelta::try_seconds(clock_seconds)?)
    }
}

fn overflow() -> Error {
    Error::ParameterValueFormat("Duration is out of range".into())
}

/// Moves whole multiples of `limit` from `low` into `high`, sign-preserving.
fn carry(low: &mut i64, high: &mut i64, limit: i64) -> Option<()> {
    *high = high.checked_add(*low / limit)?;
    *low %= limit;
    Some(())
}

impl FromStr for RelativeDelta {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        parse_duration(text)
    }
}

// ============================================================================
// Parse / format
// ============================================================================

/// Parse `<int><optional whitespace><unit>`, e.g. `"7h"`, `"-2 days"`, `"1 month"`.
pub fn parse_duration(text: &str) -> Result<RelativeDelta> {
    let bad = || Error::ParameterValueFormat(format!("Could not parse duration \"{text}\""));
    let trimmed = text.trim();
    let digits_start = usize::from(trimmed.starts_with(['+', '-']));
    let unit_start = trimmed[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(trimmed.len(), |i| i + digits_start);
    if unit_start == digits_start {
        return Err(bad());
    }
    let count: i64 = trimmed[..unit_start].parse().map_err(|_| bad())?;
    let unit = TimeUnit::from_token(trimmed[unit_start..].trim_start()).ok_or_else(bad)?;
    Ok(RelativeDelta::new(count, unit))
}

/// Format a delta as a single-unit string.
///
/// The smallest non-zero unit wins and larger clock units fold into it
/// (`1D 2h` becomes `"26h"`, `1Y 3M` becomes `"15M"`). Calendar units cannot
/// fold into clock units, so a delta mixing both is rejected, as is zero.
pub fn format_duration(delta: &RelativeDelta) -> Result<String> {
    let RelativeDelta { years, months, days, hours, minutes, seconds } = *delta;
    let calendar = years != 0 || months != 0;
    // Folds `larger` units of `factor` each into `count`.
    let fold = |count: i64, larger: i64, factor: i64| {
        larger.checked_mul(factor).and_then(|larger| larger.checked_add(count)).ok_or_else(overflow)
    };
    let (count, unit) = if seconds != 0 {
        (fold(fold(fold(seconds, minutes, 60)?, hours, 3_600)?, days, 86_400)?, TimeUnit::Second)
    } else if minutes != 0 {
        (fold(fold(minutes, hours, 60)?, days, 1_440)?, TimeUnit::Minute)
    } else if hours != 0 {
        (fold(hours, days, 24)?, TimeUnit::Hour)
    } else if days != 0 {
        (days, TimeUnit::Day)
    } else if months != 0 {
        return Ok(format!("{}{}", fold(months, years, 12)?, TimeUnit::Month));
    } else if years != 0 {
        return Ok(format!("{years}{}", TimeUnit::Year));
    } else {
        return Err(Error::ParameterValueFormat("Zero duration cannot be formatted".into()));
    };
    if calendar {
        return Err(Error::ParameterValueFormat(format!(
            "Duration {delta:?} mixes calendar and clock units"
        )));
    }
    Ok(format!("{count}{unit}"))
}

// ============================================================================
// Duration value
// ============================================================================

/// A duration parameter value: one or more non-zero steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    steps: SmallVec<[RelativeDelta; 1]>,
}

impl Duration {
    pub fn new(steps: impl IntoIterator<Item = RelativeDelta>) -> Result<Self> {
        let steps: SmallVec<[RelativeDelta; 1]> = steps.into_iter().collect();
        if steps.is_empty() {
            return Err(Error::ParameterValueFormat("Duration must have at least one step".into()));
        }
        if steps.iter().any(RelativeDelta::is_zero) {
            return Err(Error::ParameterValueFormat("Duration steps must be non-zero".into()));
        }
        Ok(Self { steps })
    }

    /// Parse a single duration string.
    pub fn parse(text: &str) -> Result<Self> {
        Self::new([parse_duration(text)?])
    }

    /// A plain number is a count of minutes.
    pub fn from_minutes(count: i64) -> Result<Self> {
        Self::new([RelativeDelta::minutes(count)])
    }

    pub fn steps(&self) -> &[RelativeDelta] {
        &self.steps
    }

    /// True for the common single-step case.
    pub fn is_single(&self) -> bool {
        self.steps.len() == 1
    }
}

impl FromStr for Duration {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Duration::parse(text)
    }
}
