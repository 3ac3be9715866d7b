//! Ordered, typed-index maps; values may nest further maps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::date_time::Timestamp;
use super::duration::RelativeDelta;
use super::value::{IndexedValue, ParameterValue};
use crate::{Error, Result};

/// Declared type of every index in a [`Map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    Str,
    Float,
    DateTime,
    Duration,
}

impl IndexType {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexType::Str => "str",
            IndexType::Float => "float",
            IndexType::DateTime => "date_time",
            IndexType::Duration => "duration",
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        match text {
            "str" => Ok(IndexType::Str),
            "float" => Ok(IndexType::Float),
            "date_time" => Ok(IndexType::DateTime),
            "duration" => Ok(IndexType::Duration),
            other => Err(Error::ParameterValueFormat(format!("Unknown map index type \"{other}\""))),
        }
    }
}

/// A single map key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapIndex {
    Str(String),
    Float(f64),
    DateTime(Timestamp),
    Duration(RelativeDelta),
}

impl MapIndex {
    pub fn index_type(&self) -> IndexType {
        match self {
            MapIndex::Str(_) => IndexType::Str,
            MapIndex::Float(_) => IndexType::Float,
            MapIndex::DateTime(_) => IndexType::DateTime,
            MapIndex::Duration(_) => IndexType::Duration,
        }
    }
}

impl From<&str> for MapIndex { fn from(v: &str) -> Self { MapIndex::Str(v.to_owned()) } }
impl From<String> for MapIndex { fn from(v: String) -> Self { MapIndex::Str(v) } }
impl From<f64> for MapIndex { fn from(v: f64) -> Self { MapIndex::Float(v) } }
impl From<Timestamp> for MapIndex { fn from(v: Timestamp) -> Self { MapIndex::DateTime(v) } }
impl From<RelativeDelta> for MapIndex { fn from(v: RelativeDelta) -> Self { MapIndex::Duration(v) } }

/// Ordered `(index, value)` pairs with a homogeneous index type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    index_type: IndexType,
    indexes: Vec<MapIndex>,
    values: Vec<ParameterValue>,
}

impl Map {
    /// Build a map, inferring the index type from the first index.
    pub fn new(indexes: Vec<MapIndex>, values: Vec<ParameterValue>) -> Result<Self> {
        let index_type = indexes
            .first()
            .map(MapIndex::index_type)
            .ok_or_else(|| Error::ParameterValueFormat("Cannot infer index type of an empty map".into()))?;
        Self::with_index_type(index_type, indexes, values)
    }

    pub fn with_index_type(index_type: IndexType, indexes: Vec<MapIndex>, values: Vec<ParameterValue>) -> Result<Self> {
        if indexes.len() != values.len() {
            return Err(Error::ParameterValueFormat(
                "Length of values does not match length of indexes".into(),
            ));
        }
        if let Some(stray) = indexes.iter().find(|index| index.index_type() != index_type) {
            return Err(Error::ParameterValueFormat(format!(
                "Map index of type \"{}\" in a map with index type \"{index_type}\"",
                stray.index_type()
            )));
        }
        Ok(Self { index_type, indexes, values })
    }

    pub fn index_type(&self) -> IndexType { self.index_type }
    pub fn indexes(&self) -> &[MapIndex] { &self.indexes }

    /// True when any value is itself a map.
    pub fn is_nested(&self) -> bool {
        self.values.iter().any(|value| matches!(value, ParameterValue::Map(_)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapIndex, &ParameterValue)> {
        self.indexes.iter().zip(self.values.iter())
    }

    pub fn get(&self, index: &MapIndex) -> Option<&ParameterValue> {
        self.iter().find_map(|(key, value)| (key == index).then_some(value))
    }
}

impl IndexedValue for Map {
    type Item = ParameterValue;

    fn values(&self) -> &[ParameterValue] {
        &self.values
    }
}
