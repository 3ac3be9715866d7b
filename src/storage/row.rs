//! Cells and rows exchanged between storage, execution and the mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Cell {
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "NULL",
            Cell::Bool(_) => "BOOLEAN",
            Cell::Int(_) => "INTEGER",
            Cell::Text(_) => "TEXT",
            Cell::Bytes(_) => "BLOB",
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Cell::Null) }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Cell { fn from(v: bool) -> Self { Cell::Bool(v) } }
impl From<i64> for Cell { fn from(v: i64) -> Self { Cell::Int(v) } }
impl From<String> for Cell { fn from(v: String) -> Self { Cell::Text(v) } }
impl From<&str> for Cell { fn from(v: &str) -> Self { Cell::Text(v.to_owned()) } }
impl From<Vec<u8>> for Cell { fn from(v: Vec<u8>) -> Self { Cell::Bytes(v) } }
impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self { v.map_or(Cell::Null, Into::into) }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Cell::Bytes(b) => write!(f, "<blob[{}]>", b.len()),
        }
    }
}

// ============================================================================
// Row
// ============================================================================

/// An ordered set of named cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    entries: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, column: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.set(column, cell);
        self
    }

    /// Insert or replace a cell, keeping the column position of an existing one.
    pub fn set(&mut self, column: impl Into<String>, cell: impl Into<Cell>) {
        let column = column.into();
        let cell = cell.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = cell,
            None => self.entries.push((column, cell)),
        }
    }

    pub fn cell(&self, column: &str) -> Option<&Cell> {
        self.entries.iter().find_map(|(name, cell)| (name == column).then_some(cell))
    }

    /// Get a typed value from the row.
    pub fn get<T: FromCell>(&self, column: &str) -> Result<T> {
        let cell = self.cell(column).ok_or_else(|| Error::NotFound(format!("Column '{column}'")))?;
        T::from_cell(cell)
    }

    /// The `id` column every stored row carries.
    pub fn id(&self) -> Result<i64> {
        self.get("id")
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.entries.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl FromIterator<(String, Cell)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Cell)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, cell) in iter {
            row.set(column, cell);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Cell);
    type IntoIter = std::vec::IntoIter<(String, Cell)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ============================================================================
// FromCell
// ============================================================================

/// Convert from Cell to concrete types.
pub trait FromCell: Sized {
    fn from_cell(cell: &Cell) -> Result<Self>;
}

fn type_error(expected: &str, cell: &Cell) -> Error {
    Error::TypeError { expected: expected.into(), got: cell.type_name().into() }
}

impl FromCell for Cell {
    fn from_cell(cell: &Cell) -> Result<Self> { Ok(cell.clone()) }
}

impl FromCell for i64 {
    fn from_cell(cell: &Cell) -> Result<Self> {
        cell.as_int().ok_or_else(|| type_error("INTEGER", cell))
    }
}

impl FromCell for bool {
    fn from_cell(cell: &Cell) -> Result<Self> {
        match cell {
            Cell::Bool(b) => Ok(*b),
            Cell::Int(i) => Ok(*i != 0),
            _ => Err(type_error("BOOLEAN", cell)),
        }
    }
}

impl FromCell for String {
    fn from_cell(cell: &Cell) -> Result<Self> {
        cell.as_text().map(str::to_owned).ok_or_else(|| type_error("TEXT", cell))
    }
}

impl FromCell for Vec<u8> {
    fn from_cell(cell: &Cell) -> Result<Self> {
        match cell {
            Cell::Bytes(b) => Ok(b.clone()),
            Cell::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(type_error("BLOB", cell)),
        }
    }
}

impl<T: FromCell> FromCell for Option<T> {
    fn from_cell(cell: &Cell) -> Result<Self> {
        match cell {
            Cell::Null => Ok(None),
            other => T::from_cell(other).map(Some),
        }
    }
}
