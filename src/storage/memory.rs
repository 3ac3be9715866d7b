//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`.
//! It keeps one id-ordered row vector per table behind a RwLock.
//!
//! ## Limitations
//!
//! - **No transactions**: every insert is applied immediately.
//! - **No constraints**: uniqueness and references are checked by
//!   `DatabaseMapping`, not here.
//! - **No indexes**: lookups by id are a binary search, everything else scans.
//!
//! Use this backend for:
//! - Testing the codec, the filters and the execution engine
//! - Embedding the mapping in applications that don't need persistence

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::trace;

use super::{check_columns, Cell, Row, StorageBackend, Table};
use crate::{Error, Result};

/// Name and description of the alternative every database starts with.
pub const BASE_ALTERNATIVE: (&str, &str) = ("Base", "Base alternative");

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory table storage.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: RwLock<HashMap<Table, Vec<Row>>>,
    next_ids: [AtomicI64; Table::ALL.len()],
}

impl MemoryBackend {
    /// An empty database holding only the `Base` alternative.
    pub fn new() -> Self {
        let backend = Self::empty();
        let (name, description) = BASE_ALTERNATIVE;
        backend.inner.tables.write().entry(Table::Alternative).or_default().push(
            Row::new().with("id", 1_i64).with("name", name).with("description", description),
        );
        backend.inner.next_ids[Table::Alternative.position()].store(2, Ordering::Relaxed);
        backend
    }

    /// A database without any rows.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                tables: RwLock::new(Table::ALL.iter().map(|table| (*table, Vec::new())).collect()),
                next_ids: std::array::from_fn(|_| AtomicI64::new(1)),
            }),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.inner.tables.read();
        let mut debug = f.debug_struct("MemoryBackend");
        for table in Table::ALL {
            debug.field(table.name(), &tables.get(&table).map_or(0, Vec::len));
        }
        debug.finish()
    }
}

/// Lay out `row` in schema order, filling missing columns with NULL.
fn schema_row(table: Table, id: i64, row: &Row) -> Row {
    table
        .columns()
        .iter()
        .map(|column| {
            let cell = match *column {
                "id" => Cell::Int(id),
                other => row.cell(other).cloned().unwrap_or(Cell::Null),
            };
            (column.to_string(), cell)
        })
        .collect()
}

// ============================================================================
// StorageBackend impl
// ============================================================================

impl StorageBackend for MemoryBackend {
    fn scan(&self, table: Table) -> Result<Vec<Row>> {
        Ok(self.inner.tables.read().get(&table).cloned().unwrap_or_default())
    }

    fn insert(&self, table: Table, row: Row) -> Result<i64> {
        check_columns(table, &row)?;
        if row.cell("id").is_some() {
            return Err(Error::StorageError(format!("Column 'id' of '{table}' is assigned by the backend")));
        }
        let mut tables = self.inner.tables.write();
        let id = self.inner.next_ids[table.position()].fetch_add(1, Ordering::Relaxed);
        tables.entry(table).or_default().push(schema_row(table, id, &row));
        trace!(%table, id, "inserted row");
        Ok(id)
    }

    fn update(&self, table: Table, id: i64, changes: Row) -> Result<()> {
        check_columns(table, &changes)?;
        let mut tables = self.inner.tables.write();
        let rows = tables.entry(table).or_default();
        let position = rows
            .binary_search_by_key(&id, |row| row.id().unwrap_or_default())
            .map_err(|_| Error::NotFound(format!("{table} id {id}")))?;
        for (column, cell) in changes {
            if column != "id" {
                rows[position].set(column, cell);
            }
        }
        Ok(())
    }

    fn get(&self, table: Table, id: i64) -> Result<Option<Row>> {
        let tables = self.inner.tables.read();
        let Some(rows) = tables.get(&table) else { return Ok(None) };
        Ok(rows
            .binary_search_by_key(&id, |row| row.id().unwrap_or_default())
            .ok()
            .map(|position| rows[position].clone()))
    }

    fn row_count(&self, table: Table) -> Result<usize> {
        Ok(self.inner.tables.read().get(&table).map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_alternative_seeded() {
        let db = MemoryBackend::new();
        let rows = db.scan(Table::Alternative).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id().unwrap(), 1);
        assert_eq!(rows[0].get::<String>("name").unwrap(), "Base");
        assert_eq!(db.row_count(Table::Scenario).unwrap(), 0);
    }

    #[test]
    fn test_insert_and_get_row() {
        let db = MemoryBackend::new();
        let id = db.insert(Table::Alternative, Row::new().with("name", "low")).unwrap();
        assert_eq!(id, 2);

        let row = db.get(Table::Alternative, id).unwrap().unwrap();
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name", "description"]);
        assert_eq!(row.cell("description"), Some(&Cell::Null));
        assert!(db.get(Table::Alternative, 99).unwrap().is_none());
    }

    #[test]
    fn test_ids_are_per_table() {
        let db = MemoryBackend::empty();
        let scenario = db.insert(Table::Scenario, Row::new().with("name", "s")).unwrap();
        let alternative = db.insert(Table::Alternative, Row::new().with("name", "a")).unwrap();
        assert_eq!((scenario, alternative), (1, 1));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let db = MemoryBackend::new();
        let err = db.insert(Table::Scenario, Row::new().with("name", "s").with("colour", "red")).unwrap_err();
        assert!(matches!(err, Error::StorageError(_)));
        assert!(db.insert(Table::Scenario, Row::new().with("id", 5_i64)).is_err());
    }

    #[test]
    fn test_update_row() {
        let db = MemoryBackend::new();
        let id = db.insert(Table::Scenario, Row::new().with("name", "s").with("active", false)).unwrap();
        db.update(Table::Scenario, id, Row::new().with("active", true)).unwrap();
        let row = db.get(Table::Scenario, id).unwrap().unwrap();
        assert!(row.get::<bool>("active").unwrap());
        assert!(matches!(db.update(Table::Scenario, 42, Row::new()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_clones_share_tables() {
        let db = MemoryBackend::new();
        let other = db.clone();
        other.insert(Table::EntityClass, Row::new().with("name", "node")).unwrap();
        assert_eq!(db.row_count(Table::EntityClass).unwrap(), 1);
    }
}
