use chrono::NaiveDateTime;
use serde_json::{Map as JsonObject, Value as JsonValue};

use super::{format_error, TIME_SERIES_DEFAULT_RESOLUTION, TIME_SERIES_DEFAULT_START};
use crate::model::{
    parse_duration, DateTime, Duration, IndexType, Map, MapIndex, ParameterValue, RelativeDelta,
    TimePattern, TimeSeriesFixedResolution, TimeSeriesVariableResolution, Timestamp, ValueType,
};
use crate::Result;

/// Decode an already parsed JSON document.
pub fn decode_json(json: &JsonValue) -> Result<ParameterValue> {
    match json {
        JsonValue::Null => Ok(ParameterValue::Null),
        JsonValue::Bool(b) => Ok(ParameterValue::Bool(*b)),
        JsonValue::Number(n) => n
            .as_f64()
            .map(ParameterValue::Float)
            .ok_or_else(|| format_error(format!("Could not convert \"{n}\" to a float"))),
        JsonValue::String(s) => Ok(ParameterValue::String(s.clone())),
        JsonValue::Array(_) => Err(format_error("Arrays are not valid parameter values")),
        JsonValue::Object(object) => decode_object(object),
    }
}

fn decode_object(object: &JsonObject<String, JsonValue>) -> Result<ParameterValue> {
    let value_type = match field(object, "type")? {
        JsonValue::String(tag) => tag.parse::<ValueType>()?,
        other => return Err(format_error(format!("Unknown parameter value type \"{other}\""))),
    };
    match value_type {
        ValueType::DateTime => datetime_from_json(field(object, "data")?).map(ParameterValue::DateTime),
        ValueType::Duration => duration_from_json(field(object, "data")?).map(ParameterValue::Duration),
        ValueType::TimePattern => time_pattern_from_json(object).map(ParameterValue::TimePattern),
        ValueType::TimeSeries => time_series_from_json(object),
        ValueType::Map => map_from_json(object).map(ParameterValue::Map),
    }
}

fn field<'a>(object: &'a JsonObject<String, JsonValue>, key: &str) -> Result<&'a JsonValue> {
    object
        .get(key)
        .ok_or_else(|| format_error(format!("\"{key}\" is missing in the parameter value description")))
}

fn float_from_json(value: &JsonValue, what: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| format_error(format!("Could not decode {what} \"{value}\"")))
}

// ============================================================================
// Leaves
// ============================================================================

fn datetime_from_json(data: &JsonValue) -> Result<DateTime> {
    match data {
        JsonValue::String(text) => DateTime::parse(text),
        other => Err(format_error(format!("Could not parse datetime from \"{other}\""))),
    }
}

/// A duration step: a duration string or a whole number of minutes.
fn step_from_json(item: &JsonValue) -> Result<RelativeDelta> {
    match item {
        JsonValue::String(text) => parse_duration(text),
        JsonValue::Number(n) => n
            .as_i64()
            .map(RelativeDelta::minutes)
            .ok_or_else(|| format_error(format!("Could not parse duration \"{n}\""))),
        _ => Err(format_error("Duration value is of unsupported type")),
    }
}

fn steps_from_json(data: &JsonValue) -> Result<Duration> {
    match data {
        JsonValue::Array(items) => Duration::new(items.iter().map(step_from_json).collect::<Result<Vec<_>>>()?),
        single => Duration::new([step_from_json(single)?]),
    }
}

fn duration_from_json(data: &JsonValue) -> Result<Duration> {
    steps_from_json(data)
}

fn stamp_from_json(stamp: &JsonValue) -> Result<NaiveDateTime> {
    let bad = || format_error(format!("Could not decode time stamp \"{}\"", display_plain(stamp)));
    match stamp {
        JsonValue::String(text) => Timestamp::parse(text).map(|t| t.naive_utc()).map_err(|_| bad()),
        _ => Err(bad()),
    }
}

/// Strings without their JSON quotes, everything else as JSON.
fn display_plain(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Indexed values
// ============================================================================

fn time_pattern_from_json(object: &JsonObject<String, JsonValue>) -> Result<TimePattern> {
    let JsonValue::Object(data) = field(object, "data")? else {
        return Err(format_error("Time pattern data must be an object"));
    };
    let mut patterns = Vec::with_capacity(data.len());
    let mut values = Vec::with_capacity(data.len());
    for (pattern, value) in data {
        patterns.push(pattern.clone());
        values.push(float_from_json(value, "time pattern value")?);
    }
    TimePattern::new(patterns, values)
}

fn time_series_from_json(object: &JsonObject<String, JsonValue>) -> Result<ParameterValue> {
    match field(object, "data")? {
        JsonValue::Object(data) => series_from_dictionary(object, data).map(Into::into),
        JsonValue::Array(items) if matches!(items.first(), Some(JsonValue::Array(_))) => {
            series_from_two_columns(object, items).map(Into::into)
        }
        JsonValue::Array(items) => series_from_single_column(object, items).map(Into::into),
        _ => Err(format_error("Unrecognized time series format")),
    }
}

fn series_index(object: &JsonObject<String, JsonValue>) -> Result<Option<&JsonObject<String, JsonValue>>> {
    match object.get("index") {
        None => Ok(None),
        Some(JsonValue::Object(index)) => Ok(Some(index)),
        Some(other) => Err(format_error(format!("Could not decode time series index \"{other}\""))),
    }
}

/// Read a boolean flag from a series index, falling back to `default` when absent.
fn series_flag(index: Option<&JsonObject<String, JsonValue>>, key: &str, default: bool) -> Result<bool> {
    match index.and_then(|index| index.get(key)) {
        None => Ok(default),
        Some(JsonValue::Bool(flag)) => Ok(*flag),
        Some(other) => Err(format_error(format!("Could not decode {key} value \"{other}\""))),
    }
}

fn series_from_dictionary(
    object: &JsonObject<String, JsonValue>,
    data: &JsonObject<String, JsonValue>,
) -> Result<TimeSeriesVariableResolution> {
    let mut stamps = Vec::with_capacity(data.len());
    let mut values = Vec::with_capacity(data.len());
    for (stamp, value) in data {
        let stamp = Timestamp::parse(stamp)
            .map_err(|_| format_error(format!("Could not decode time stamp \"{stamp}\"")))?;
        stamps.push(stamp.naive_utc());
        values.push(float_from_json(value, "time series value")?);
    }
    let index = series_index(object)?;
    TimeSeriesVariableResolution::new(
        stamps,
        values,
        series_flag(index, "ignore_year", false)?,
        series_flag(index, "repeat", false)?,
    )
}

fn series_from_two_columns(
    object: &JsonObject<String, JsonValue>,
    items: &[JsonValue],
) -> Result<TimeSeriesVariableResolution> {
    let mut stamps = Vec::with_capacity(items.len());
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        let [stamp, value] = item.as_array().map(Vec::as_slice).unwrap_or_default() else {
            return Err(format_error("Invalid value in time series array"));
        };
        stamps.push(stamp_from_json(stamp)?);
        values.push(float_from_json(value, "time series value")?);
    }
    let index = series_index(object)?;
    TimeSeriesVariableResolution::new(
        stamps,
        values,
        series_flag(index, "ignore_year", false)?,
        series_flag(index, "repeat", false)?,
    )
}

fn series_from_single_column(
    object: &JsonObject<String, JsonValue>,
    items: &[JsonValue],
) -> Result<TimeSeriesFixedResolution> {
    let index = series_index(object)?;
    let start_given = index.is_some_and(|index| index.contains_key("start"));
    let start = match index.and_then(|index| index.get("start")) {
        None => TIME_SERIES_DEFAULT_START,
        Some(JsonValue::String(text)) => text.as_str(),
        Some(other) => return Err(format_error(format!("Could not decode start value \"{other}\""))),
    };
    let start = Timestamp::parse(start)
        .map_err(|_| format_error(format!("Could not decode start value \"{start}\"")))?
        .naive_utc();
    let resolution = match index.and_then(|index| index.get("resolution")) {
        None => Duration::parse(TIME_SERIES_DEFAULT_RESOLUTION)?,
        Some(resolution) => steps_from_json(resolution)?,
    };
    let values = items
        .iter()
        .map(|value| float_from_json(value, "time series value"))
        .collect::<Result<Vec<_>>>()?;
    TimeSeriesFixedResolution::new(
        start,
        resolution,
        values,
        series_flag(index, "ignore_year", !start_given)?,
        series_flag(index, "repeat", !start_given)?,
    )
}

// ============================================================================
// Maps
// ============================================================================

fn map_from_json(object: &JsonObject<String, JsonValue>) -> Result<Map> {
    let index_type = match field(object, "index_type")? {
        JsonValue::String(tag) => tag.parse::<IndexType>()?,
        other => return Err(format_error(format!("Unknown map index type \"{other}\""))),
    };
    let mut indexes = Vec::new();
    let mut values = Vec::new();
    match field(object, "data")? {
        JsonValue::Object(data) if index_type == IndexType::Str => {
            for (index, value) in data {
                indexes.push(MapIndex::Str(index.clone()));
                values.push(decode_json(value)?);
            }
        }
        JsonValue::Object(_) => {
            return Err(format_error(format!(
                "Map data must be a list of [index, value] pairs for index type \"{index_type}\""
            )));
        }
        JsonValue::Array(items) => {
            for item in items {
                let [index, value] = item.as_array().map(Vec::as_slice).unwrap_or_default() else {
                    return Err(format_error("Invalid value in map data"));
                };
                indexes.push(map_index_from_json(index_type, index)?);
                values.push(decode_json(value)?);
            }
        }
        _ => return Err(format_error("Unrecognized map format")),
    }
    Map::with_index_type(index_type, indexes, values)
}

fn map_index_from_json(index_type: IndexType, index: &JsonValue) -> Result<MapIndex> {
    let bad = || format_error(format!("Could not decode map index \"{index}\" as {index_type}"));
    match (index_type, index) {
        (IndexType::Str, JsonValue::String(text)) => Ok(MapIndex::Str(text.clone())),
        (IndexType::Float, JsonValue::Number(n)) => n.as_f64().map(MapIndex::Float).ok_or_else(bad),
        (IndexType::DateTime, JsonValue::String(text)) => {
            Timestamp::parse(text).map(MapIndex::DateTime).map_err(|_| bad())
        }
        (IndexType::Duration, JsonValue::String(_) | JsonValue::Number(_)) => {
            step_from_json(index).map(MapIndex::Duration)
        }
        _ => Err(bad()),
    }
}
