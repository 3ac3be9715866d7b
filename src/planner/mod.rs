//! Subquery plans: the virtual views a `DatabaseMapping` hands out.
//!
//! A plan is a tree of relational operators over catalog tables. Plans are
//! plain data; building one never touches storage. The execution engine
//! evaluates them against a `StorageBackend`.

use crate::storage::{Cell, Table};

/// Subquery plan node.
#[derive(Debug, Clone, PartialEq)]
pub enum Subquery {
    /// Every row of a table
    Scan { table: Table },
    /// Rows of `input` for which `predicate` holds
    Filter { input: Box<Subquery>, predicate: Predicate },
    /// Inner equi-join; `carry` lists `(right column, output name)` pairs appended to left rows
    Join {
        left: Box<Subquery>,
        right: Box<Subquery>,
        left_key: String,
        right_key: String,
        carry: Vec<(String, String)>,
    },
    /// `ROW_NUMBER() OVER (PARTITION BY .. ORDER BY ..) AS label`
    RowNumber {
        input: Box<Subquery>,
        partition_by: Vec<String>,
        order_by: Vec<SortKey>,
        label: String,
    },
    /// Computed columns
    Project { input: Box<Subquery>, items: Vec<(Expr, String)> },
}

impl Subquery {
    pub fn scan(table: Table) -> Self {
        Subquery::Scan { table }
    }

    pub fn filter(self, predicate: Predicate) -> Self {
        Subquery::Filter { input: Box::new(self), predicate }
    }

    pub fn join(self, right: Subquery, left_key: &str, right_key: &str, carry: &[(&str, &str)]) -> Self {
        Subquery::Join {
            left: Box::new(self),
            right: Box::new(right),
            left_key: left_key.into(),
            right_key: right_key.into(),
            carry: carry.iter().map(|(from, to)| (from.to_string(), to.to_string())).collect(),
        }
    }

    pub fn row_number(self, partition_by: &[&str], order_by: Vec<SortKey>, label: &str) -> Self {
        Subquery::RowNumber {
            input: Box::new(self),
            partition_by: partition_by.iter().map(|c| c.to_string()).collect(),
            order_by,
            label: label.into(),
        }
    }

    pub fn project(self, items: Vec<(Expr, String)>) -> Self {
        Subquery::Project { input: Box::new(self), items }
    }

    /// Project onto existing columns, keeping their names.
    pub fn select<S: AsRef<str>>(self, columns: &[S]) -> Self {
        let items = columns
            .iter()
            .map(|c| (Expr::column(c.as_ref()), c.as_ref().to_string()))
            .collect();
        self.project(items)
    }

    /// Output column names.
    pub fn columns(&self) -> Vec<String> {
        match self {
            Subquery::Scan { table } => table.columns().iter().map(|c| c.to_string()).collect(),
            Subquery::Filter { input, .. } => input.columns(),
            Subquery::Join { left, carry, .. } => {
                let mut columns = left.columns();
                columns.extend(carry.iter().map(|(_, name)| name.clone()));
                columns
            }
            Subquery::RowNumber { input, label, .. } => {
                let mut columns = input.columns();
                columns.push(label.clone());
                columns
            }
            Subquery::Project { items, .. } => items.iter().map(|(_, name)| name.clone()).collect(),
        }
    }
}

// ============================================================================
// Predicates and expressions
// ============================================================================

/// Row predicate with SQL NULL semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { column: String, value: Cell },
    In { column: String, values: Vec<Cell> },
    ColumnsEq { left: String, right: String },
    IsNull { column: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(column: &str, value: impl Into<Cell>) -> Self {
        Predicate::Eq { column: column.into(), value: value.into() }
    }

    pub fn is_in<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Cell>,
    {
        Predicate::In { column: column.into(), values: values.into_iter().map(Into::into).collect() }
    }

    pub fn columns_eq(left: &str, right: &str) -> Self {
        Predicate::ColumnsEq { left: left.into(), right: right.into() }
    }

    pub fn is_null(column: &str) -> Self {
        Predicate::IsNull { column: column.into() }
    }

    pub fn and(predicates: Vec<Predicate>) -> Self { Predicate::And(predicates) }
    pub fn or(predicates: Vec<Predicate>) -> Self { Predicate::Or(predicates) }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self { Predicate::Not(Box::new(predicate)) }

    /// Columns the predicate reads.
    pub fn referenced_columns(&self) -> Vec<&str> {
        match self {
            Predicate::Eq { column, .. } | Predicate::In { column, .. } | Predicate::IsNull { column } => {
                vec![column.as_str()]
            }
            Predicate::ColumnsEq { left, right } => vec![left.as_str(), right.as_str()],
            Predicate::And(ps) | Predicate::Or(ps) => ps.iter().flat_map(Predicate::referenced_columns).collect(),
            Predicate::Not(p) => p.referenced_columns(),
        }
    }
}

/// Scalar expression evaluated per row.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Cell),
    /// First branch whose predicate holds wins; `otherwise` when none does.
    Case { branches: Vec<(Predicate, Expr)>, otherwise: Box<Expr> },
}

impl Expr {
    pub fn column(name: &str) -> Self { Expr::Column(name.into()) }
    pub fn literal(value: impl Into<Cell>) -> Self { Expr::Literal(value.into()) }

    pub fn case(branches: Vec<(Predicate, Expr)>, otherwise: Expr) -> Self {
        Expr::Case { branches, otherwise: Box::new(otherwise) }
    }

    pub fn referenced_columns(&self) -> Vec<&str> {
        match self {
            Expr::Column(name) => vec![name.as_str()],
            Expr::Literal(_) => Vec::new(),
            Expr::Case { branches, otherwise } => branches
                .iter()
                .flat_map(|(p, e)| p.referenced_columns().into_iter().chain(e.referenced_columns()))
                .chain(otherwise.referenced_columns())
                .collect(),
        }
    }
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column: &str) -> Self { Self { column: column.into(), descending: false } }
    pub fn desc(column: &str) -> Self { Self { column: column.into(), descending: true } }
}
