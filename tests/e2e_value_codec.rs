//! End-to-end tests for the parameter value codec.
//!
//! Each test builds values through the public model, stores them through a
//! `DatabaseMapping` and reads them back decoded.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use pretty_assertions::assert_eq;
use proptest::collection::{btree_map, vec as prop_vec};
use proptest::prelude::*;
use spinedb::{
    from_database, to_database, DatabaseMapping, DateTime, Duration, Error, IndexType, IndexedValue, Map, MapIndex,
    ParameterValue, RelativeDelta, TimePattern, TimeSeriesFixedResolution, TimeSeriesVariableResolution, TimeUnit,
    Timestamp,
};

fn stamp(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
}

fn sample_values() -> Vec<ParameterValue> {
    let fixed = TimeSeriesFixedResolution::new(
        stamp(2007, 6, 1, 0),
        Duration::parse("1h").unwrap(),
        vec![1.0, 2.5, -3.0],
        false,
        true,
    )
    .unwrap();
    let variable = TimeSeriesVariableResolution::new(
        vec![stamp(2019, 1, 1, 0), stamp(2019, 1, 1, 6), stamp(2019, 1, 3, 0)],
        vec![4.0, 4.5, 5.0],
        false,
        false,
    )
    .unwrap();
    let pattern = TimePattern::new(vec!["M1-4,M9-12".into(), "M5-8".into()], vec![300.0, 221.5]).unwrap();
    let inner = Map::new(vec![MapIndex::from(1.0), MapIndex::from(2.0)], vec![ParameterValue::from(-2.3), "x".into()])
        .unwrap();
    let nested = Map::new(vec!["A".into(), "B".into()], vec![inner.into(), ParameterValue::from(variable.clone())])
        .unwrap();
    vec![
        ParameterValue::Null,
        ParameterValue::from(true),
        ParameterValue::from(23.0),
        ParameterValue::from("coal"),
        DateTime::parse("2019-06-01T22:15:00").unwrap().into(),
        Duration::new([RelativeDelta::days(1), RelativeDelta::months(2)]).unwrap().into(),
        pattern.into(),
        fixed.into(),
        variable.into(),
        nested.into(),
    ]
}

// ============================================================================
// 1. Every variant survives storage unchanged
// ============================================================================

#[test]
fn test_values_round_trip_through_mapping() {
    let mut db_map = DatabaseMapping::open_memory();
    let class = db_map.add_entity_class("unit", &[]).unwrap();
    let values = sample_values();
    for (i, value) in values.iter().enumerate() {
        let entity = db_map.add_entity(class, &format!("u{i}"), &[]).unwrap();
        let definition = db_map.add_parameter_definition(class, &format!("p{i}"), None).unwrap();
        db_map.add_parameter_value(definition, entity, 1, value).unwrap();
    }

    let stored: Vec<ParameterValue> = db_map.parameter_values().unwrap().into_iter().map(|r| r.value).collect();
    assert_eq!(stored, values);
}

#[test]
fn test_decode_encode_is_identity() {
    for value in sample_values() {
        let encoded = to_database(&value).unwrap();
        assert_eq!(from_database(&encoded).unwrap(), value, "{encoded}");
    }
}

// ============================================================================
// 2. Stored text is the documented JSON
// ============================================================================

#[test]
fn test_plain_values_are_bare_json() {
    assert_eq!(to_database(&ParameterValue::from(2.0)).unwrap(), "2.0");
    assert_eq!(to_database(&ParameterValue::from("text")).unwrap(), "\"text\"");
    assert_eq!(to_database(&ParameterValue::Null).unwrap(), "null");
    assert_eq!(from_database("5").unwrap(), ParameterValue::Float(5.0));
}

#[test]
fn test_map_always_uses_pair_list() {
    let map = Map::new(vec!["a".into()], vec![ParameterValue::from(1.0)]).unwrap();
    assert_eq!(to_database(&map).unwrap(), r#"{"type":"map","index_type":"str","data":[["a",1.0]]}"#);
}

// ============================================================================
// 3. Decoding rules
// ============================================================================

#[test]
fn test_fixed_series_cyclic_resolution() {
    let raw = r#"{"type": "time_series",
                  "index": {"start": "2019-01-31", "resolution": ["1 day", "1M"]},
                  "data": [1, 2, 3, 4]}"#;
    let ParameterValue::TimeSeriesFixedResolution(series) = from_database(raw).unwrap() else {
        panic!("expected a fixed resolution series");
    };
    assert_eq!(
        series.indexes().unwrap(),
        vec![stamp(2019, 1, 31, 0), stamp(2019, 2, 1, 0), stamp(2019, 3, 1, 0), stamp(2019, 3, 2, 0)]
    );
    assert!(!series.ignore_year());
    assert!(!series.repeat());
}

#[test]
fn test_fixed_series_without_start_repeats() {
    let raw = r#"{"type": "time_series", "data": [7, 8]}"#;
    let ParameterValue::TimeSeriesFixedResolution(series) = from_database(raw).unwrap() else {
        panic!("expected a fixed resolution series");
    };
    assert!(series.ignore_year());
    assert!(series.repeat());
    assert_eq!(series.values(), &[7.0, 8.0]);
    assert_eq!(series.start(), stamp(1, 1, 1, 0));
}

#[test]
fn test_nested_map_detection() {
    let inner = Map::new(vec!["a".into()], vec![ParameterValue::from(-2.3)]).unwrap();
    assert!(!inner.is_nested());
    let outer = Map::new(vec!["A".into()], vec![inner.into()]).unwrap();
    assert!(outer.is_nested());
    assert_eq!(outer.index_type(), IndexType::Str);
}

#[test]
fn test_format_errors() {
    let errors = [
        (r#"{"type": "bogus", "data": 1}"#, "Unknown parameter value type \"bogus\""),
        ("{not json", "Could not decode the value"),
        (r#"{"type": "time_pattern", "data": {}}"#, "Empty time pattern not allowed"),
    ];
    for (raw, expected) in errors {
        match from_database(raw) {
            Err(Error::ParameterValueFormat(message)) => assert!(message.starts_with(expected), "{message}"),
            other => panic!("{raw}: unexpected {other:?}"),
        }
    }
}

#[test]
fn test_non_finite_floats_rejected() {
    assert!(matches!(to_database(&ParameterValue::from(f64::NAN)), Err(Error::ParameterValueFormat(_))));
}

// ============================================================================
// 4. Range and precision edges
// ============================================================================

#[test]
fn test_extreme_minute_count_round_trips() {
    let value = from_database(r#"{"type":"duration","data":-9223372036854775808}"#).unwrap();
    assert_eq!(value, ParameterValue::from(Duration::from_minutes(i64::MIN).unwrap()));
    let encoded = to_database(&value).unwrap();
    assert_eq!(encoded, r#"{"type":"duration","data":"-9223372036854775808m"}"#);
    assert_eq!(from_database(&encoded).unwrap(), value);
}

#[test]
fn test_overflowing_resolution_cycle_is_an_error() {
    let raw = r#"{"type": "time_series",
                  "index": {"start": "2020-01-01", "resolution": ["9223372036854775807D", "9223372036854775807D"]},
                  "data": [1, 2, 3, 4]}"#;
    let ParameterValue::TimeSeriesFixedResolution(series) = from_database(raw).unwrap() else {
        panic!("expected a fixed resolution series");
    };
    assert!(matches!(series.indexes(), Err(Error::ParameterValueFormat(_))));
}

#[test]
fn test_sub_microsecond_stamps_round_trip() {
    let base = stamp(2020, 1, 1, 0);
    let value: ParameterValue = DateTime::new(base + TimeDelta::nanoseconds(500)).into();
    let encoded = to_database(&value).unwrap();
    assert_eq!(encoded, r#"{"type":"date_time","data":"2020-01-01T00:00:00.000000500"}"#);
    assert_eq!(from_database(&encoded).unwrap(), value);

    let series: ParameterValue = TimeSeriesFixedResolution::new(
        base + TimeDelta::nanoseconds(1_500),
        Duration::parse("1h").unwrap(),
        vec![1.0, 2.0],
        false,
        false,
    )
    .unwrap()
    .into();
    assert_eq!(from_database(to_database(&series).unwrap()).unwrap(), series);
}

#[test]
fn test_colliding_keys_are_rejected_before_encoding() {
    let base = stamp(2020, 1, 1, 0);
    let err = TimeSeriesVariableResolution::new(vec![base, base, base], vec![1.0, 2.0, 3.0], false, false)
        .unwrap_err();
    assert!(matches!(err, Error::ParameterValueFormat(_)));
    let err = TimePattern::new(vec!["D1".into(), "D1".into()], vec![1.0, 2.0]).unwrap_err();
    assert!(matches!(err, Error::ParameterValueFormat(_)));
}

// ============================================================================
// 5. Generated values survive encode then decode
// ============================================================================

const UNITS: [TimeUnit; 6] =
    [TimeUnit::Second, TimeUnit::Minute, TimeUnit::Hour, TimeUnit::Day, TimeUnit::Month, TimeUnit::Year];

fn finite_float() -> impl Strategy<Value = f64> {
    prop_oneof![-1.0e6..1.0e6f64, proptest::num::f64::NORMAL, Just(0.0)]
}

fn any_stamp() -> impl Strategy<Value = NaiveDateTime> {
    (1i32..=9999, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60, 0u32..1_000_000_000).prop_map(
        |(year, month, day, hour, minute, second, nano)| {
            NaiveDate::from_ymd_opt(year, month, day).unwrap().and_hms_nano_opt(hour, minute, second, nano).unwrap()
        },
    )
}

fn any_timestamp() -> impl Strategy<Value = Timestamp> {
    prop_oneof![
        any_stamp().prop_map(Timestamp::Naive),
        (any_stamp(), -14 * 60..=14 * 60i32).prop_map(|(local, minutes)| {
            let offset = FixedOffset::east_opt(minutes * 60).unwrap();
            Timestamp::Offset(local.and_local_timezone(offset).single().unwrap())
        }),
    ]
}

fn any_step() -> impl Strategy<Value = RelativeDelta> {
    let count = prop_oneof![-100_000i64..0, 1i64..100_000, Just(i64::MIN), Just(i64::MAX)];
    (count, 0usize..UNITS.len()).prop_map(|(count, unit)| RelativeDelta::new(count, UNITS[unit]))
}

fn any_duration() -> impl Strategy<Value = Duration> {
    prop_vec(any_step(), 1..4).prop_map(|steps| Duration::new(steps).unwrap())
}

fn any_time_pattern() -> impl Strategy<Value = TimePattern> {
    btree_map("[DHMWY][1-9]{1,2}(-[1-9]{1,2})?", finite_float(), 1..5).prop_map(|data| {
        let (patterns, values) = data.into_iter().unzip();
        TimePattern::new(patterns, values).unwrap()
    })
}

fn any_fixed_series() -> impl Strategy<Value = TimeSeriesFixedResolution> {
    (any_stamp(), any_duration(), prop_vec(finite_float(), 2..8), any::<bool>(), any::<bool>()).prop_map(
        |(start, resolution, values, ignore_year, repeat)| {
            TimeSeriesFixedResolution::new(start, resolution, values, ignore_year, repeat).unwrap()
        },
    )
}

fn any_variable_series() -> impl Strategy<Value = TimeSeriesVariableResolution> {
    (btree_map(any_stamp(), finite_float(), 2..6), any::<bool>(), any::<bool>()).prop_map(
        |(data, ignore_year, repeat)| {
            let (stamps, values) = data.into_iter().unzip();
            TimeSeriesVariableResolution::new(stamps, values, ignore_year, repeat).unwrap()
        },
    )
}

fn map_index(index_type: IndexType) -> BoxedStrategy<MapIndex> {
    match index_type {
        IndexType::Str => "[a-z]{1,6}".prop_map(MapIndex::from).boxed(),
        IndexType::Float => finite_float().prop_map(MapIndex::from).boxed(),
        IndexType::DateTime => any_timestamp().prop_map(MapIndex::from).boxed(),
        IndexType::Duration => any_step().prop_map(MapIndex::from).boxed(),
    }
}

fn leaf_value() -> impl Strategy<Value = ParameterValue> {
    prop_oneof![
        Just(ParameterValue::Null),
        any::<bool>().prop_map(ParameterValue::from),
        finite_float().prop_map(ParameterValue::from),
        "[a-zA-Z0-9 _.-]{0,12}".prop_map(ParameterValue::from),
        any_timestamp().prop_map(|stamp| ParameterValue::from(DateTime::new(stamp))),
        any_duration().prop_map(ParameterValue::from),
        any_time_pattern().prop_map(ParameterValue::from),
        any_fixed_series().prop_map(ParameterValue::from),
        any_variable_series().prop_map(ParameterValue::from),
    ]
}

fn any_value() -> impl Strategy<Value = ParameterValue> {
    leaf_value().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            Just(IndexType::Str),
            Just(IndexType::Float),
            Just(IndexType::DateTime),
            Just(IndexType::Duration),
        ]
        .prop_flat_map(move |index_type| (Just(index_type), prop_vec((map_index(index_type), inner.clone()), 0..4)))
        .prop_map(|(index_type, pairs)| {
            let (indexes, values) = pairs.into_iter().unzip();
            ParameterValue::from(Map::with_index_type(index_type, indexes, values).unwrap())
        })
    })
}

proptest! {
    #[test]
    fn prop_encode_then_decode_is_identity(value in any_value()) {
        let encoded = to_database(&value).unwrap();
        prop_assert_eq!(from_database(&encoded).unwrap(), value, "{}", encoded);
    }

    #[test]
    fn prop_encoding_is_stable(value in any_value()) {
        let encoded = to_database(&value).unwrap();
        let reencoded = to_database(&from_database(&encoded).unwrap()).unwrap();
        prop_assert_eq!(reencoded, encoded);
    }
}
