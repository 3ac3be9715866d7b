//! # spinedb-rs: Spine database access layer
//!
//! Typed access to Spine-style entity/parameter databases: entity classes,
//! entities, parameter definitions and values, alternatives and scenarios.
//!
//! ## Design Principles
//!
//! 1. **Closed value model**: every parameter value is a `ParameterValue` variant,
//!    encoded to and decoded from the database column by `codec`
//! 2. **Views are plans**: `planner::Subquery` describes a virtual view; nothing
//!    touches storage until `execution::execute` walks it
//! 3. **Filters wrap, never mutate**: a filter snapshots the current views and
//!    installs replacement subquery makers on a `DatabaseMapping`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spinedb::{DatabaseMapping, ParameterValue};
//! use spinedb::filters::scenario::apply_scenario_filter_to_subqueries;
//!
//! # fn example() -> spinedb::Result<()> {
//! let mut db_map = DatabaseMapping::open_memory();
//! let alternative = db_map.add_alternative("high_demand", None)?;
//! let scenario = db_map.add_scenario("stress_test", None, true)?;
//! db_map.add_scenario_alternative(scenario, alternative, 1)?;
//!
//! let class = db_map.add_entity_class("node", &[])?;
//! let node = db_map.add_entity(class, "Helsinki", &[])?;
//! let demand = db_map.add_parameter_definition(class, "demand", None)?;
//! db_map.add_parameter_value(demand, node, alternative, &ParameterValue::from(23.0))?;
//!
//! apply_scenario_filter_to_subqueries(&mut db_map, "stress_test")?;
//! for record in db_map.parameter_values()? {
//!     println!("{} {} = {:?}", record.entity_name, record.parameter_name, record.value);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod codec;
pub mod planner;
pub mod execution;
pub mod storage;
pub mod mapping;
pub mod filters;

// ============================================================================
// Re-exports: Model (the value DTOs)
// ============================================================================

pub use model::{
    DateTime, Duration, IndexedValue, Map, MapIndex, IndexType, ParameterValue,
    RelativeDelta, TimePattern, TimeSeriesFixedResolution, TimeSeriesVariableResolution,
    TimeUnit, Timestamp, ValueType,
};

// ============================================================================
// Re-exports: Codec
// ============================================================================

pub use codec::{from_database, to_database, DatabaseValue};

// ============================================================================
// Re-exports: Storage, planning and execution
// ============================================================================

pub use storage::{BackendConfig, Cell, MemoryBackend, Row, StorageBackend, Table};
pub use planner::{Expr, Predicate, SortKey, Subquery};
pub use execution::QueryResult;

// ============================================================================
// Re-exports: Mapping and filters
// ============================================================================

pub use mapping::{
    DatabaseMapping, ImportAlternative, ParameterValueRecord, ScenarioRecord, SubqueryMaker, ViewSource,
};
pub use filters::{FilterConfig, FilterSource};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A parameter value or duration could not be encoded or decoded.
    #[error("Parameter value format error: {0}")]
    ParameterValueFormat(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    /// Shorthand tag or filter type missing from the registry.
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Invalid filter configuration: {0}")]
    InvalidFilterConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
