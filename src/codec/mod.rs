//! # Parameter Value Codec
//!
//! Converts between the JSON text stored in a `value` column and
//! [`ParameterValue`]. Every structured value is an object tagged by
//! `"type"`; plain JSON scalars are stored as they are.
//!
//! ```text
//! date_time:   {"type":"date_time","data":"2019-06-01T22:15:00"}
//! duration:    {"type":"duration","data":"3h" | ["3h", 60, ...] | 60}
//! time_series: {"type":"time_series","index":{...},"data":[1.0, 2.0]}
//! map:         {"type":"map","index_type":"str","data":[["a", 1.0]]}
//! ```

mod decode;
mod encode;

use crate::model::ParameterValue;
use crate::{Error, Result};

pub use decode::decode_json;

/// Start of a fixed resolution series whose index omits `start`.
pub const TIME_SERIES_DEFAULT_START: &str = "0001-01-01T00:00:00";
/// Resolution of a fixed resolution series whose index omits `resolution`.
pub const TIME_SERIES_DEFAULT_RESOLUTION: &str = "1h";

/// Capability shared by every value that can be written to the database.
pub trait DatabaseValue {
    /// The JSON document for this value.
    fn to_json(&self) -> Result<serde_json::Value>;

    /// The column text for this value.
    fn to_database(&self) -> Result<String> {
        let json = self.to_json()?;
        serde_json::to_string(&json).map_err(|e| format_error(e.to_string()))
    }
}

/// Decode a raw column value.
pub fn from_database(raw: impl AsRef<[u8]>) -> Result<ParameterValue> {
    let json: serde_json::Value =
        serde_json::from_slice(raw.as_ref()).map_err(|_| format_error("Could not decode the value"))?;
    decode_json(&json)
}

/// Encode a value for a `value` column.
pub fn to_database<V: DatabaseValue + ?Sized>(value: &V) -> Result<String> {
    value.to_database()
}

pub(crate) fn format_error(message: impl Into<String>) -> Error {
    Error::ParameterValueFormat(message.into())
}
