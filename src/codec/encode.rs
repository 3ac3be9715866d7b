use serde_json::{json, Map as JsonObject, Number, Value as JsonValue};

use super::{format_error, DatabaseValue};
use crate::model::date_time::format_naive;
use crate::model::{
    format_duration, DateTime, Duration, IndexedValue, Map, MapIndex, ParameterValue, TimePattern,
    TimeSeriesFixedResolution, TimeSeriesVariableResolution, ValueType,
};
use crate::Result;

fn float_to_json(value: f64) -> Result<JsonValue> {
    Number::from_f64(value)
        .map(JsonValue::Number)
        .ok_or_else(|| format_error(format!("Failed to convert \"{value}\" to a float")))
}

fn floats_to_json(values: &[f64]) -> Result<Vec<JsonValue>> {
    values.iter().copied().map(float_to_json).collect()
}

/// A single step as a string, several as a list.
fn steps_to_json(duration: &Duration) -> Result<JsonValue> {
    let mut steps = duration
        .steps()
        .iter()
        .map(|step| format_duration(step).map(JsonValue::String))
        .collect::<Result<Vec<_>>>()?;
    if duration.is_single() {
        Ok(steps.remove(0))
    } else {
        Ok(JsonValue::Array(steps))
    }
}

// ============================================================================
// Scalars
// ============================================================================

impl DatabaseValue for f64 {
    fn to_json(&self) -> Result<JsonValue> { float_to_json(*self) }
}

impl DatabaseValue for bool {
    fn to_json(&self) -> Result<JsonValue> { Ok(JsonValue::Bool(*self)) }
}

impl DatabaseValue for str {
    fn to_json(&self) -> Result<JsonValue> { Ok(JsonValue::String(self.to_owned())) }
}

impl DatabaseValue for String {
    fn to_json(&self) -> Result<JsonValue> { self.as_str().to_json() }
}

// ============================================================================
// Structured values
// ============================================================================

impl DatabaseValue for DateTime {
    fn to_json(&self) -> Result<JsonValue> {
        Ok(json!({"type": ValueType::DateTime.as_str(), "data": self.value().to_iso_string()}))
    }
}

impl DatabaseValue for Duration {
    fn to_json(&self) -> Result<JsonValue> {
        Ok(json!({"type": ValueType::Duration.as_str(), "data": steps_to_json(self)?}))
    }
}

impl DatabaseValue for TimePattern {
    fn to_json(&self) -> Result<JsonValue> {
        let mut data = JsonObject::new();
        for (pattern, value) in self.iter() {
            data.insert(pattern.to_owned(), float_to_json(value)?);
        }
        Ok(json!({"type": ValueType::TimePattern.as_str(), "data": data}))
    }
}

impl DatabaseValue for TimeSeriesFixedResolution {
    /// Both flags are written even when false.
    fn to_json(&self) -> Result<JsonValue> {
        Ok(json!({
            "type": ValueType::TimeSeries.as_str(),
            "index": {
                "start": format_naive(&self.start(), ' '),
                "resolution": steps_to_json(self.resolution())?,
                "ignore_year": self.ignore_year(),
                "repeat": self.repeat(),
            },
            "data": floats_to_json(self.values())?,
        }))
    }
}

impl DatabaseValue for TimeSeriesVariableResolution {
    /// Flags are written only when true; decoding defaults them to false.
    fn to_json(&self) -> Result<JsonValue> {
        let mut data = JsonObject::new();
        for (stamp, value) in self.indexes().iter().zip(self.values()) {
            data.insert(format_naive(stamp, 'T'), float_to_json(*value)?);
        }
        let mut document = json!({"type": ValueType::TimeSeries.as_str(), "data": data});
        let mut index = JsonObject::new();
        if self.ignore_year() {
            index.insert("ignore_year".into(), JsonValue::Bool(true));
        }
        if self.repeat() {
            index.insert("repeat".into(), JsonValue::Bool(true));
        }
        if !index.is_empty() {
            document["index"] = JsonValue::Object(index);
        }
        Ok(document)
    }
}

fn map_index_to_json(index: &MapIndex) -> Result<JsonValue> {
    match index {
        MapIndex::Str(text) => Ok(JsonValue::String(text.clone())),
        MapIndex::Float(value) => float_to_json(*value),
        MapIndex::DateTime(stamp) => Ok(JsonValue::String(stamp.to_iso_string())),
        MapIndex::Duration(step) => format_duration(step).map(JsonValue::String),
    }
}

impl DatabaseValue for Map {
    /// Always the pair-list form; nested maps stay JSON objects.
    fn to_json(&self) -> Result<JsonValue> {
        let data = self
            .iter()
            .map(|(index, value)| -> Result<JsonValue> {
                Ok(json!([map_index_to_json(index)?, value.to_json()?]))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(json!({"type": ValueType::Map.as_str(), "index_type": self.index_type().as_str(), "data": data}))
    }
}

impl DatabaseValue for ParameterValue {
    fn to_json(&self) -> Result<JsonValue> {
        match self {
            ParameterValue::Null => Ok(JsonValue::Null),
            ParameterValue::Bool(b) => b.to_json(),
            ParameterValue::Float(f) => f.to_json(),
            ParameterValue::String(s) => s.to_json(),
            ParameterValue::DateTime(v) => v.to_json(),
            ParameterValue::Duration(v) => v.to_json(),
            ParameterValue::TimePattern(v) => v.to_json(),
            ParameterValue::TimeSeriesFixedResolution(v) => v.to_json(),
            ParameterValue::TimeSeriesVariableResolution(v) => v.to_json(),
            ParameterValue::Map(v) => v.to_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_database, to_database};
    use crate::model::{IndexType, RelativeDelta};
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_datetime_encoding() {
        let stamp = DateTime::parse("2019-06-01 22:15").unwrap();
        assert_eq!(to_database(&stamp).unwrap(), r#"{"type":"date_time","data":"2019-06-01T22:15:00"}"#);
    }

    #[test]
    fn test_duration_encoding() {
        assert_eq!(
            to_database(&Duration::parse("1 day").unwrap()).unwrap(),
            r#"{"type":"duration","data":"1D"}"#
        );
        let multi = Duration::new([RelativeDelta::hours(1), RelativeDelta::from_parts(0, 0, 1, 2, 0, 0).unwrap()]).unwrap();
        assert_eq!(to_database(&multi).unwrap(), r#"{"type":"duration","data":["1h","26h"]}"#);
    }

    #[test]
    fn test_fixed_series_always_writes_flags() {
        let series = TimeSeriesFixedResolution::new(
            date(2007, 6, 1),
            Duration::parse("1h").unwrap(),
            vec![1.0, 2.5],
            false,
            false,
        )
        .unwrap();
        assert_eq!(
            to_database(&series).unwrap(),
            r#"{"type":"time_series","index":{"start":"2007-06-01 00:00:00","resolution":"1h","ignore_year":false,"repeat":false},"data":[1.0,2.5]}"#
        );
    }

    #[test]
    fn test_variable_series_writes_only_true_flags() {
        let mut series =
            TimeSeriesVariableResolution::new(vec![date(2019, 1, 1), date(2019, 1, 3)], vec![4.0, 5.0], false, false)
                .unwrap();
        assert_eq!(
            to_database(&series).unwrap(),
            r#"{"type":"time_series","data":{"2019-01-01T00:00:00":4.0,"2019-01-03T00:00:00":5.0}}"#
        );
        series.set_repeat(true);
        assert_eq!(
            to_database(&series).unwrap(),
            r#"{"type":"time_series","data":{"2019-01-01T00:00:00":4.0,"2019-01-03T00:00:00":5.0},"index":{"repeat":true}}"#
        );
    }

    #[test]
    fn test_map_uses_pair_list_and_nested_objects() {
        let inner = Map::new(vec!["a".into()], vec![(-2.3).into()]).unwrap();
        let outer = Map::new(vec!["A".into()], vec![ParameterValue::Map(inner)]).unwrap();
        assert_eq!(
            to_database(&outer).unwrap(),
            r#"{"type":"map","index_type":"str","data":[["A",{"type":"map","index_type":"str","data":[["a",-2.3]]}]]}"#
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = to_database(&f64::NAN).unwrap_err();
        assert_eq!(err.to_string(), "Parameter value format error: Failed to convert \"NaN\" to a float");
        let pattern = TimePattern::new(vec!["D1".into()], vec![f64::INFINITY]).unwrap();
        assert!(to_database(&pattern).is_err());
    }

    #[test]
    fn test_fixed_series_round_trip() {
        let series = TimeSeriesFixedResolution::new(
            date(2019, 1, 31),
            Duration::new([RelativeDelta::days(1), RelativeDelta::months(1)]).unwrap(),
            vec![1.0, 2.0, 3.0, 4.0],
            true,
            false,
        )
        .unwrap();
        let decoded = from_database(to_database(&series).unwrap()).unwrap();
        assert_eq!(decoded, ParameterValue::TimeSeriesFixedResolution(series));
    }

    #[test]
    fn test_float_indexed_map_round_trip() {
        let map = Map::with_index_type(
            IndexType::Float,
            vec![0.5.into(), 1.5.into()],
            vec![Duration::parse("2h").unwrap().into(), ParameterValue::Null],
        )
        .unwrap();
        let value = ParameterValue::Map(map);
        assert_eq!(from_database(to_database(&value).unwrap()).unwrap(), value);
    }
}
