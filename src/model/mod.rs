//! # Parameter Value Model
//!
//! Plain DTOs for every kind of parameter value a Spine database can hold.
//! These types cross every boundary: codec ↔ mapping ↔ filters ↔ user.
//!
//! Design rule: NO storage types, NO JSON here. Encoding lives in `codec`.
//! This module is pure data without I/O.

pub mod duration;
pub mod date_time;
pub mod time_pattern;
pub mod time_series;
pub mod map;
pub mod value;

pub use duration::{format_duration, parse_duration, Duration, RelativeDelta, TimeUnit};
pub use date_time::{DateTime, Timestamp};
pub use time_pattern::TimePattern;
pub use time_series::{TimeSeriesFixedResolution, TimeSeriesVariableResolution};
pub use map::{IndexType, Map, MapIndex};
pub use value::{IndexedValue, ParameterValue, ValueType};
