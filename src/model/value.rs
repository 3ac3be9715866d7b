//! The closed set of parameter value variants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{
    DateTime, Duration, Map, TimePattern, TimeSeriesFixedResolution, TimeSeriesVariableResolution,
};
use crate::{Error, Result};

/// A value keyed by an index domain rather than a single scalar.
pub trait IndexedValue {
    type Item;

    fn values(&self) -> &[Self::Item];

    fn len(&self) -> usize {
        self.values().len()
    }

    fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

/// Discriminator written to the `"type"` field of structured values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    DateTime,
    Duration,
    TimePattern,
    TimeSeries,
    Map,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::DateTime => "date_time",
            ValueType::Duration => "duration",
            ValueType::TimePattern => "time_pattern",
            ValueType::TimeSeries => "time_series",
            ValueType::Map => "map",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        match text {
            "date_time" => Ok(ValueType::DateTime),
            "duration" => Ok(ValueType::Duration),
            "time_pattern" => Ok(ValueType::TimePattern),
            "time_series" => Ok(ValueType::TimeSeries),
            "map" => Ok(ValueType::Map),
            other => Err(Error::ParameterValueFormat(format!("Unknown parameter value type \"{other}\""))),
        }
    }
}

/// A decoded parameter value.
///
/// Plain JSON scalars stay scalars (`Null`, `Bool`, `Float`, `String`); every
/// structured variant round-trips through [`crate::codec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParameterValue {
    Null,
    Bool(bool),
    Float(f64),
    String(String),
    DateTime(DateTime),
    Duration(Duration),
    TimePattern(TimePattern),
    TimeSeriesFixedResolution(TimeSeriesFixedResolution),
    TimeSeriesVariableResolution(TimeSeriesVariableResolution),
    Map(Map),
}

// ============================================================================
// Type checking
// ============================================================================

impl ParameterValue {
    /// The `"type"` tag for structured values, `None` for plain scalars.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            ParameterValue::Null
            | ParameterValue::Bool(_)
            | ParameterValue::Float(_)
            | ParameterValue::String(_) => None,
            ParameterValue::DateTime(_) => Some(ValueType::DateTime),
            ParameterValue::Duration(_) => Some(ValueType::Duration),
            ParameterValue::TimePattern(_) => Some(ValueType::TimePattern),
            ParameterValue::TimeSeriesFixedResolution(_)
            | ParameterValue::TimeSeriesVariableResolution(_) => Some(ValueType::TimeSeries),
            ParameterValue::Map(_) => Some(ValueType::Map),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::Null => "null",
            ParameterValue::Bool(_) => "bool",
            ParameterValue::Float(_) => "float",
            ParameterValue::String(_) => "str",
            other => other.value_type().map_or("null", ValueType::as_str),
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, ParameterValue::Null) }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            ParameterValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for ParameterValue { fn from(v: bool) -> Self { ParameterValue::Bool(v) } }
impl From<f64> for ParameterValue { fn from(v: f64) -> Self { ParameterValue::Float(v) } }
impl From<i32> for ParameterValue { fn from(v: i32) -> Self { ParameterValue::Float(f64::from(v)) } }
impl From<String> for ParameterValue { fn from(v: String) -> Self { ParameterValue::String(v) } }
impl From<&str> for ParameterValue { fn from(v: &str) -> Self { ParameterValue::String(v.to_owned()) } }
impl From<DateTime> for ParameterValue { fn from(v: DateTime) -> Self { ParameterValue::DateTime(v) } }
impl From<Duration> for ParameterValue { fn from(v: Duration) -> Self { ParameterValue::Duration(v) } }
impl From<TimePattern> for ParameterValue { fn from(v: TimePattern) -> Self { ParameterValue::TimePattern(v) } }
impl From<TimeSeriesFixedResolution> for ParameterValue {
    fn from(v: TimeSeriesFixedResolution) -> Self { ParameterValue::TimeSeriesFixedResolution(v) }
}
impl From<TimeSeriesVariableResolution> for ParameterValue {
    fn from(v: TimeSeriesVariableResolution) -> Self { ParameterValue::TimeSeriesVariableResolution(v) }
}
impl From<Map> for ParameterValue { fn from(v: Map) -> Self { ParameterValue::Map(v) } }
impl<T: Into<ParameterValue>> From<Option<T>> for ParameterValue {
    fn from(v: Option<T>) -> Self { v.map_or(ParameterValue::Null, Into::into) }
}
