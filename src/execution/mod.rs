//! Query execution engine.
//!
//! Evaluates subquery plans against a StorageBackend. Plans are checked for
//! unknown columns before any row is read.

use std::cmp::Ordering;

use hashbrown::{HashMap, HashSet};
use tracing::trace;

use crate::planner::{Expr, Predicate, SortKey, Subquery};
use crate::storage::{Cell, FromCell, Row, StorageBackend};
use crate::{Error, Result};

/// Query execution result.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub stats: ExecutionStats,
}

/// Execution statistics.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    pub rows_scanned: u64,
    pub rows_returned: u64,
}

impl QueryResult {
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    /// One typed value per row.
    pub fn column_values<T: FromCell>(&self, column: &str) -> Result<Vec<T>> {
        self.rows.iter().map(|row| row.get(column)).collect()
    }

    /// The only row, if there is exactly one.
    pub fn single(&self) -> Option<&Row> {
        match self.rows.as_slice() {
            [row] => Some(row),
            _ => None,
        }
    }
}

/// Execute a subquery plan against a storage backend.
pub fn execute<B: StorageBackend + ?Sized>(backend: &B, plan: &Subquery) -> Result<QueryResult> {
    validate(plan)?;
    let mut stats = ExecutionStats::default();
    let rows = evaluate(backend, plan, &mut stats)?;
    stats.rows_returned = rows.len() as u64;
    trace!(scanned = stats.rows_scanned, returned = stats.rows_returned, "executed subquery");
    Ok(QueryResult { columns: plan.columns(), rows, stats })
}

// ============================================================================
// Validation
// ============================================================================

fn require<'a>(available: &[String], wanted: impl IntoIterator<Item = &'a str>, context: &str) -> Result<()> {
    for column in wanted {
        if !available.iter().any(|c| c == column) {
            return Err(Error::ExecutionError(format!("Unknown column '{column}' in {context}")));
        }
    }
    Ok(())
}

fn require_fresh(available: &[String], name: &str, context: &str) -> Result<()> {
    if available.iter().any(|c| c == name) {
        return Err(Error::ExecutionError(format!("Duplicate column '{name}' in {context}")));
    }
    Ok(())
}

fn validate(plan: &Subquery) -> Result<()> {
    match plan {
        Subquery::Scan { .. } => Ok(()),
        Subquery::Filter { input, predicate } => {
            validate(input)?;
            require(&input.columns(), predicate.referenced_columns(), "filter")
        }
        Subquery::Join { left, right, left_key, right_key, carry } => {
            validate(left)?;
            validate(right)?;
            let left_columns = left.columns();
            require(&left_columns, [left_key.as_str()], "join key")?;
            require(
                &right.columns(),
                std::iter::once(right_key.as_str()).chain(carry.iter().map(|(from, _)| from.as_str())),
                "join",
            )?;
            let mut output = left_columns;
            for (_, name) in carry {
                require_fresh(&output, name, "join")?;
                output.push(name.clone());
            }
            Ok(())
        }
        Subquery::RowNumber { input, partition_by, order_by, label } => {
            validate(input)?;
            let columns = input.columns();
            require(
                &columns,
                partition_by.iter().map(String::as_str).chain(order_by.iter().map(|k| k.column.as_str())),
                "row number",
            )?;
            require_fresh(&columns, label, "row number")
        }
        Subquery::Project { input, items } => {
            validate(input)?;
            let columns = input.columns();
            let mut names: Vec<String> = Vec::with_capacity(items.len());
            for (expr, name) in items {
                require(&columns, expr.referenced_columns(), "projection")?;
                require_fresh(&names, name, "projection")?;
                names.push(name.clone());
            }
            Ok(())
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

fn evaluate<B: StorageBackend + ?Sized>(backend: &B, plan: &Subquery, stats: &mut ExecutionStats) -> Result<Vec<Row>> {
    match plan {
        Subquery::Scan { table } => {
            let rows = backend.scan(*table)?;
            stats.rows_scanned += rows.len() as u64;
            Ok(rows)
        }
        Subquery::Filter { input, predicate } => {
            let compiled = Compiled::new(predicate);
            let mut rows = evaluate(backend, input, stats)?;
            rows.retain(|row| compiled.test(row) == Some(true));
            Ok(rows)
        }
        Subquery::Join { left, right, left_key, right_key, carry } => {
            let right_rows = evaluate(backend, right, stats)?;
            let mut lookup: HashMap<&Cell, Vec<&Row>> = HashMap::new();
            for row in &right_rows {
                match row.cell(right_key) {
                    Some(Cell::Null) | None => {}
                    Some(key) => lookup.entry(key).or_default().push(row),
                }
            }
            let mut output = Vec::new();
            for row in evaluate(backend, left, stats)? {
                let Some(matches) = row.cell(left_key).and_then(|key| lookup.get(key)) else {
                    continue;
                };
                for matched in matches {
                    let mut joined = row.clone();
                    for (from, to) in carry {
                        joined.set(to.clone(), matched.cell(from).cloned().unwrap_or(Cell::Null));
                    }
                    output.push(joined);
                }
            }
            Ok(output)
        }
        Subquery::RowNumber { input, partition_by, order_by, label } => {
            let mut rows = evaluate(backend, input, stats)?;
            let mut partitions: HashMap<Vec<Cell>, Vec<usize>> = HashMap::new();
            for (position, row) in rows.iter().enumerate() {
                let key = partition_by.iter().map(|c| cell_of(row, c)).collect();
                partitions.entry(key).or_default().push(position);
            }
            let mut numbers = vec![0_i64; rows.len()];
            for members in partitions.values_mut() {
                members.sort_by(|a, b| compare_rows(&rows[*a], &rows[*b], order_by));
                for (rank, position) in members.iter().enumerate() {
                    numbers[*position] = rank as i64 + 1;
                }
            }
            for (row, number) in rows.iter_mut().zip(numbers) {
                row.set(label.clone(), number);
            }
            Ok(rows)
        }
        Subquery::Project { input, items } => {
            let compiled: Vec<(CompiledExpr<'_>, &str)> =
                items.iter().map(|(expr, name)| (CompiledExpr::new(expr), name.as_str())).collect();
            Ok(evaluate(backend, input, stats)?
                .iter()
                .map(|row| compiled.iter().map(|(expr, name)| (name.to_string(), expr.eval(row))).collect::<Row>())
                .collect())
        }
    }
}

fn cell_of(row: &Row, column: &str) -> Cell {
    row.cell(column).cloned().unwrap_or(Cell::Null)
}

/// Stable ordering by sort keys; NULL sorts first ascending, last descending.
fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = cell_of(a, &key.column).cmp(&cell_of(b, &key.column));
        let ordering = if key.descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// A predicate with membership sets built once per filter.
enum Compiled<'p> {
    Eq(&'p str, &'p Cell),
    In(&'p str, HashSet<&'p Cell>),
    ColumnsEq(&'p str, &'p str),
    IsNull(&'p str),
    And(Vec<Compiled<'p>>),
    Or(Vec<Compiled<'p>>),
    Not(Box<Compiled<'p>>),
}

impl<'p> Compiled<'p> {
    fn new(predicate: &'p Predicate) -> Self {
        match predicate {
            Predicate::Eq { column, value } => Compiled::Eq(column, value),
            Predicate::In { column, values } => Compiled::In(column, values.iter().collect()),
            Predicate::ColumnsEq { left, right } => Compiled::ColumnsEq(left, right),
            Predicate::IsNull { column } => Compiled::IsNull(column),
            Predicate::And(ps) => Compiled::And(ps.iter().map(Compiled::new).collect()),
            Predicate::Or(ps) => Compiled::Or(ps.iter().map(Compiled::new).collect()),
            Predicate::Not(p) => Compiled::Not(Box::new(Compiled::new(p))),
        }
    }

    /// Three-valued test: `None` is SQL UNKNOWN.
    fn test(&self, row: &Row) -> Option<bool> {
        let non_null = |column: &str| row.cell(column).filter(|cell| !cell.is_null());
        match self {
            Compiled::Eq(column, value) => {
                if value.is_null() {
                    return None;
                }
                non_null(*column).map(|cell| cell == *value)
            }
            Compiled::In(column, values) => non_null(*column).map(|cell| values.contains(cell)),
            Compiled::ColumnsEq(left, right) => Some(non_null(*left)? == non_null(*right)?),
            Compiled::IsNull(column) => Some(non_null(*column).is_none()),
            Compiled::And(ps) => ps.iter().try_fold(Some(true), |acc, p| match p.test(row) {
                Some(false) => Err(Some(false)),
                None => Ok(None),
                Some(true) => Ok(acc),
            }).unwrap_or_else(|short| short),
            Compiled::Or(ps) => ps.iter().try_fold(Some(false), |acc, p| match p.test(row) {
                Some(true) => Err(Some(true)),
                None => Ok(None),
                Some(false) => Ok(acc),
            }).unwrap_or_else(|short| short),
            Compiled::Not(p) => p.test(row).map(|b| !b),
        }
    }
}

enum CompiledExpr<'p> {
    Column(&'p str),
    Literal(&'p Cell),
    Case(Vec<(Compiled<'p>, CompiledExpr<'p>)>, Box<CompiledExpr<'p>>),
}

impl<'p> CompiledExpr<'p> {
    fn new(expr: &'p Expr) -> Self {
        match expr {
            Expr::Column(name) => CompiledExpr::Column(name),
            Expr::Literal(value) => CompiledExpr::Literal(value),
            Expr::Case { branches, otherwise } => CompiledExpr::Case(
                branches.iter().map(|(p, e)| (Compiled::new(p), CompiledExpr::new(e))).collect(),
                Box::new(CompiledExpr::new(otherwise)),
            ),
        }
    }

    fn eval(&self, row: &Row) -> Cell {
        match self {
            CompiledExpr::Column(name) => cell_of(row, name),
            CompiledExpr::Literal(value) => (*value).clone(),
            CompiledExpr::Case(branches, otherwise) => branches
                .iter()
                .find(|(predicate, _)| predicate.test(row) == Some(true))
                .map_or_else(|| otherwise.eval(row), |(_, expr)| expr.eval(row)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBackend, Table};
    use pretty_assertions::assert_eq;

    fn backend_with_values() -> MemoryBackend {
        let db = MemoryBackend::new();
        for (definition, entity, alternative) in [(1_i64, 1_i64, 1_i64), (1, 1, 2), (1, 2, 2), (2, 1, 1)] {
            db.insert(
                Table::ParameterValue,
                Row::new()
                    .with("parameter_definition_id", definition)
                    .with("entity_id", entity)
                    .with("alternative_id", alternative)
                    .with("value", b"1.0".to_vec()),
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn test_filter_with_membership() {
        let db = backend_with_values();
        let plan = Subquery::scan(Table::ParameterValue).filter(Predicate::is_in("alternative_id", [2_i64]));
        let result = execute(&db, &plan).unwrap();
        assert_eq!(result.column_values::<i64>("id").unwrap(), vec![2, 3]);
        assert_eq!(result.stats.rows_scanned, 4);
    }

    #[test]
    fn test_null_never_matches() {
        let db = MemoryBackend::new();
        db.insert(Table::Alternative, Row::new().with("name", "x")).unwrap();
        let not_described = Subquery::scan(Table::Alternative)
            .filter(Predicate::not(Predicate::eq("description", "Base alternative")));
        assert_eq!(execute(&db, &not_described).unwrap().len(), 0);
        let undescribed = Subquery::scan(Table::Alternative).filter(Predicate::is_null("description"));
        assert_eq!(execute(&db, &undescribed).unwrap().column_values::<String>("name").unwrap(), vec!["x"]);
    }

    #[test]
    fn test_join_carries_columns_and_keeps_left_order() {
        let db = backend_with_values();
        db.insert(Table::Alternative, Row::new().with("name", "high")).unwrap();
        let plan = Subquery::scan(Table::ParameterValue).join(
            Subquery::scan(Table::Alternative),
            "alternative_id",
            "id",
            &[("name", "alternative_name")],
        );
        let result = execute(&db, &plan).unwrap();
        assert_eq!(
            result.column_values::<String>("alternative_name").unwrap(),
            vec!["Base", "high", "high", "Base"]
        );
    }

    #[test]
    fn test_row_number_per_partition() {
        let db = backend_with_values();
        let plan = Subquery::scan(Table::ParameterValue).row_number(
            &["parameter_definition_id", "entity_id"],
            vec![SortKey::desc("alternative_id")],
            "n",
        );
        let result = execute(&db, &plan).unwrap();
        assert_eq!(result.column_values::<i64>("n").unwrap(), vec![2, 1, 1, 1]);
    }

    #[test]
    fn test_project_case() {
        let db = MemoryBackend::new();
        db.insert(Table::EntityClass, Row::new().with("name", "unit")).unwrap();
        db.insert(Table::EntityClass, Row::new().with("name", "node")).unwrap();
        let plan = Subquery::scan(Table::EntityClass).project(vec![
            (Expr::column("id"), "id".into()),
            (
                Expr::case(vec![(Predicate::eq("id", 1_i64), Expr::literal("plant"))], Expr::column("name")),
                "name".into(),
            ),
        ]);
        let result = execute(&db, &plan).unwrap();
        assert_eq!(result.columns, vec!["id", "name"]);
        assert_eq!(result.column_values::<String>("name").unwrap(), vec!["plant", "node"]);
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let db = MemoryBackend::new();
        let plan = Subquery::scan(Table::Scenario).filter(Predicate::eq("rank", 1_i64));
        assert!(matches!(execute(&db, &plan), Err(Error::ExecutionError(_))));
        let plan = Subquery::scan(Table::Scenario).row_number(&[], vec![], "name");
        assert!(matches!(execute(&db, &plan), Err(Error::ExecutionError(_))));
    }
}
