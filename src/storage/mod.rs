//! # Storage Backend Trait
//!
//! The contract between the database mapping and whatever holds the tables.
//! Backends only store and hand back rows; views, joins and filtering are
//! planned in `planner` and evaluated in `execution`.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory for testing/embedding |

pub mod memory;
pub mod row;

use std::fmt;

use crate::{Error, Result};

pub use memory::MemoryBackend;
pub use row::{Cell, FromCell, Row};

// ============================================================================
// Backend Configuration
// ============================================================================

/// Configuration for connecting to a storage backend.
#[derive(Debug, Clone, Default)]
pub enum BackendConfig {
    /// In-memory (no persistence)
    #[default]
    Memory,
}

// ============================================================================
// Catalog
// ============================================================================

/// The tables of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Alternative,
    Scenario,
    ScenarioAlternative,
    EntityClass,
    Entity,
    ParameterDefinition,
    ParameterValue,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Alternative,
        Table::Scenario,
        Table::ScenarioAlternative,
        Table::EntityClass,
        Table::Entity,
        Table::ParameterDefinition,
        Table::ParameterValue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Alternative => "alternative",
            Table::Scenario => "scenario",
            Table::ScenarioAlternative => "scenario_alternative",
            Table::EntityClass => "entity_class",
            Table::Entity => "entity",
            Table::ParameterDefinition => "parameter_definition",
            Table::ParameterValue => "parameter_value",
        }
    }

    /// Column names in storage order; `id` always comes first.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Alternative => &["id", "name", "description"],
            Table::Scenario => &["id", "name", "description", "active"],
            Table::ScenarioAlternative => &["id", "scenario_id", "alternative_id", "rank"],
            Table::EntityClass => &["id", "name", "description", "dimension_id_list"],
            Table::Entity => &["id", "class_id", "name", "description", "element_id_list"],
            Table::ParameterDefinition => &["id", "entity_class_id", "name", "default_value"],
            Table::ParameterValue => &["id", "parameter_definition_id", "entity_id", "alternative_id", "value"],
        }
    }

    pub(crate) fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The storage contract.
///
/// Rows handed to `insert` carry every column except `id`, which the backend
/// assigns. Missing columns are stored as `NULL`.
pub trait StorageBackend: Send + Sync + 'static {
    /// All rows of a table in id order.
    fn scan(&self, table: Table) -> Result<Vec<Row>>;

    /// Store a row and return its new id.
    fn insert(&self, table: Table, row: Row) -> Result<i64>;

    /// Replace non-id cells of an existing row.
    fn update(&self, table: Table, id: i64, changes: Row) -> Result<()>;

    /// A single row by id.
    ///
    /// Default: scan the table.
    fn get(&self, table: Table, id: i64) -> Result<Option<Row>> {
        Ok(self.scan(table)?.into_iter().find(|row| row.id().ok() == Some(id)))
    }

    fn row_count(&self, table: Table) -> Result<usize> {
        Ok(self.scan(table)?.len())
    }

    /// Shut down the backend, flushing any pending writes.
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Fail with `StorageError` when a row names a column the table lacks.
pub(crate) fn check_columns(table: Table, row: &Row) -> Result<()> {
    let columns = table.columns();
    match row.columns().find(|column| !columns.contains(column)) {
        Some(unknown) => Err(Error::StorageError(format!("Table '{table}' has no column '{unknown}'"))),
        None => Ok(()),
    }
}
