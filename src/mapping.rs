//! # Database mapping
//!
//! `DatabaseMapping` wraps a storage backend and hands out one virtual view
//! per catalog table. Each view comes from a named slot: by default the slot
//! scans the table, and filters replace it with a [`SubqueryMaker`] that wraps
//! a snapshot of the view that was current when the filter was installed.
//!
//! Writes always go to the base tables; constraint checks never see filters.

use hashbrown::HashMap;
use tracing::debug;

use crate::codec::{from_database, to_database};
use crate::execution::{self, QueryResult};
use crate::model::ParameterValue;
use crate::planner::{Predicate, Subquery};
use crate::storage::{BackendConfig, Cell, MemoryBackend, Row, StorageBackend, Table};
use crate::{Error, Result};

// ============================================================================
// Subquery slots
// ============================================================================

/// Read access to the views of a mapping.
pub trait ViewSource {
    /// The current view of `table`.
    fn subquery(&self, table: Table) -> Subquery;
}

/// Builds the view for one slot.
///
/// A maker must not ask `views` for its own table; wrap a snapshot instead.
pub trait SubqueryMaker: Send + Sync {
    fn make(&self, views: &dyn ViewSource) -> Subquery;
}

impl<F> SubqueryMaker for F
where
    F: Fn(&dyn ViewSource) -> Subquery + Send + Sync,
{
    fn make(&self, views: &dyn ViewSource) -> Subquery {
        self(views)
    }
}

/// How the alternative used for imports is named and placed in scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportAlternative {
    pub name: String,
    /// Scenarios that get the alternative appended with the next free rank.
    pub scenarios: Vec<String>,
}

impl Default for ImportAlternative {
    fn default() -> Self {
        Self { name: "Base".into(), scenarios: Vec::new() }
    }
}

// ============================================================================
// Records
// ============================================================================

/// A decoded row of the parameter value view with its names resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValueRecord {
    pub id: i64,
    pub entity_class_name: String,
    pub entity_name: String,
    pub parameter_name: String,
    pub alternative_name: String,
    pub value: ParameterValue,
}

/// A scenario with its alternatives in rank order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioRecord {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub alternatives: Vec<String>,
}

// ============================================================================
// DatabaseMapping
// ============================================================================

/// The primary entry point: a storage backend plus its view slots.
pub struct DatabaseMapping<B: StorageBackend = MemoryBackend> {
    backend: B,
    makers: HashMap<Table, Box<dyn SubqueryMaker>>,
    import_alternative: ImportAlternative,
    import_alternative_id: Option<i64>,
}

impl<B: StorageBackend> std::fmt::Debug for DatabaseMapping<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut overridden: Vec<_> = self.makers.keys().map(|t| t.name()).collect();
        overridden.sort_unstable();
        f.debug_struct("DatabaseMapping")
            .field("overridden", &overridden)
            .field("import_alternative", &self.import_alternative)
            .finish_non_exhaustive()
    }
}

/// In-memory mapping for testing and embedding.
impl DatabaseMapping<MemoryBackend> {
    pub fn open(config: &BackendConfig) -> Result<Self> {
        match config {
            BackendConfig::Memory => Ok(Self::open_memory()),
        }
    }

    pub fn open_memory() -> Self {
        Self::with_backend(MemoryBackend::new())
    }
}

impl<B: StorageBackend> ViewSource for DatabaseMapping<B> {
    fn subquery(&self, table: Table) -> Subquery {
        match self.makers.get(&table) {
            Some(maker) => maker.make(self),
            None => Subquery::scan(table),
        }
    }
}

impl<B: StorageBackend> DatabaseMapping<B> {
    /// Create a mapping over the given backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            makers: HashMap::new(),
            import_alternative: ImportAlternative::default(),
            import_alternative_id: None,
        }
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn alternative_sq(&self) -> Subquery { self.subquery(Table::Alternative) }
    pub fn scenario_sq(&self) -> Subquery { self.subquery(Table::Scenario) }
    pub fn scenario_alternative_sq(&self) -> Subquery { self.subquery(Table::ScenarioAlternative) }
    pub fn entity_class_sq(&self) -> Subquery { self.subquery(Table::EntityClass) }
    pub fn entity_sq(&self) -> Subquery { self.subquery(Table::Entity) }
    pub fn parameter_definition_sq(&self) -> Subquery { self.subquery(Table::ParameterDefinition) }
    pub fn parameter_value_sq(&self) -> Subquery { self.subquery(Table::ParameterValue) }

    /// Replace the view maker of `table`.
    pub fn override_subquery_maker(&mut self, table: Table, maker: impl SubqueryMaker + 'static) {
        debug!(%table, "overriding subquery maker");
        self.makers.insert(table, Box::new(maker));
    }

    /// Go back to scanning the base table.
    pub fn restore_subquery_maker(&mut self, table: Table) {
        if self.makers.remove(&table).is_some() {
            debug!(%table, "restored subquery maker");
        }
    }

    /// Restore every slot.
    pub fn restore_all_subquery_makers(&mut self) {
        self.makers.clear();
    }

    pub fn is_overridden(&self, table: Table) -> bool {
        self.makers.contains_key(&table)
    }

    pub fn override_alternative_sq_maker(&mut self, maker: impl SubqueryMaker + 'static) {
        self.override_subquery_maker(Table::Alternative, maker);
    }

    pub fn override_scenario_sq_maker(&mut self, maker: impl SubqueryMaker + 'static) {
        self.override_subquery_maker(Table::Scenario, maker);
    }

    pub fn override_scenario_alternative_sq_maker(&mut self, maker: impl SubqueryMaker + 'static) {
        self.override_subquery_maker(Table::ScenarioAlternative, maker);
    }

    pub fn override_entity_class_sq_maker(&mut self, maker: impl SubqueryMaker + 'static) {
        self.override_subquery_maker(Table::EntityClass, maker);
    }

    pub fn override_parameter_value_sq_maker(&mut self, maker: impl SubqueryMaker + 'static) {
        self.override_subquery_maker(Table::ParameterValue, maker);
    }

    /// Run a plan.
    pub fn query(&self, plan: &Subquery) -> Result<QueryResult> {
        execution::execute(&self.backend, plan)
    }

    /// Rows of the current view of `table`.
    pub fn query_view(&self, table: Table) -> Result<QueryResult> {
        self.query(&self.subquery(table))
    }

    // ========================================================================
    // Base table helpers
    // ========================================================================

    fn base_row(&self, table: Table, id: i64) -> Result<Row> {
        self.backend
            .get(table, id)?
            .ok_or_else(|| Error::ConstraintViolation(format!("No {table} with id {id}")))
    }

    fn base_rows_where(&self, table: Table, predicate: Predicate) -> Result<Vec<Row>> {
        Ok(self.query(&Subquery::scan(table).filter(predicate))?.rows)
    }

    fn ensure_absent(&self, table: Table, predicate: Predicate, what: impl FnOnce() -> String) -> Result<()> {
        if self.base_rows_where(table, predicate)?.is_empty() {
            Ok(())
        } else {
            Err(Error::ConstraintViolation(what()))
        }
    }

    fn id_by_name(&self, table: Table, name: &str) -> Result<Option<i64>> {
        self.base_rows_where(table, Predicate::eq("name", name))?
            .first()
            .map(Row::id)
            .transpose()
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    pub fn add_alternative(&mut self, name: &str, description: Option<&str>) -> Result<i64> {
        self.ensure_absent(Table::Alternative, Predicate::eq("name", name), || {
            format!("There can't be more than one alternative called '{name}'")
        })?;
        self.backend.insert(
            Table::Alternative,
            Row::new().with("name", name).with("description", description),
        )
    }

    pub fn add_scenario(&mut self, name: &str, description: Option<&str>, active: bool) -> Result<i64> {
        self.ensure_absent(Table::Scenario, Predicate::eq("name", name), || {
            format!("There can't be more than one scenario called '{name}'")
        })?;
        self.backend.insert(
            Table::Scenario,
            Row::new().with("name", name).with("description", description).with("active", active),
        )
    }

    pub fn add_scenario_alternative(&mut self, scenario_id: i64, alternative_id: i64, rank: i64) -> Result<i64> {
        self.base_row(Table::Scenario, scenario_id)?;
        self.base_row(Table::Alternative, alternative_id)?;
        self.ensure_absent(
            Table::ScenarioAlternative,
            Predicate::and(vec![
                Predicate::eq("scenario_id", scenario_id),
                Predicate::eq("alternative_id", alternative_id),
            ]),
            || format!("Alternative {alternative_id} is already in scenario {scenario_id}"),
        )?;
        self.ensure_absent(
            Table::ScenarioAlternative,
            Predicate::and(vec![Predicate::eq("scenario_id", scenario_id), Predicate::eq("rank", rank)]),
            || format!("Rank {rank} is already taken in scenario {scenario_id}"),
        )?;
        self.backend.insert(
            Table::ScenarioAlternative,
            Row::new()
                .with("scenario_id", scenario_id)
                .with("alternative_id", alternative_id)
                .with("rank", rank),
        )
    }

    /// Add an object class (no dimensions) or a relationship class.
    pub fn add_entity_class(&mut self, name: &str, dimension_ids: &[i64]) -> Result<i64> {
        self.ensure_absent(Table::EntityClass, Predicate::eq("name", name), || {
            format!("There can't be more than one entity class called '{name}'")
        })?;
        for dimension_id in dimension_ids {
            let dimension = self.base_row(Table::EntityClass, *dimension_id)?;
            if !id_list(&dimension, "dimension_id_list")?.is_empty() {
                return Err(Error::ConstraintViolation(format!(
                    "Dimension {dimension_id} of '{name}' is not an object class"
                )));
            }
        }
        self.backend.insert(
            Table::EntityClass,
            Row::new().with("name", name).with("dimension_id_list", join_ids(dimension_ids)),
        )
    }

    /// Add an object (no elements) or a relationship of `class_id`.
    pub fn add_entity(&mut self, class_id: i64, name: &str, element_ids: &[i64]) -> Result<i64> {
        let class = self.base_row(Table::EntityClass, class_id)?;
        let dimensions = id_list(&class, "dimension_id_list")?;
        if dimensions.len() != element_ids.len() {
            return Err(Error::ConstraintViolation(format!(
                "Entity '{name}' has {} elements but its class has {} dimensions",
                element_ids.len(),
                dimensions.len()
            )));
        }
        for (dimension_id, element_id) in dimensions.iter().zip(element_ids) {
            let element = self.base_row(Table::Entity, *element_id)?;
            if element.get::<i64>("class_id")? != *dimension_id {
                return Err(Error::ConstraintViolation(format!(
                    "Element {element_id} of '{name}' does not belong to class {dimension_id}"
                )));
            }
        }
        self.ensure_absent(
            Table::Entity,
            Predicate::and(vec![Predicate::eq("class_id", class_id), Predicate::eq("name", name)]),
            || format!("There can't be more than one entity called '{name}' in class {class_id}"),
        )?;
        self.backend.insert(
            Table::Entity,
            Row::new()
                .with("class_id", class_id)
                .with("name", name)
                .with("element_id_list", join_ids(element_ids)),
        )
    }

    pub fn add_parameter_definition(
        &mut self,
        entity_class_id: i64,
        name: &str,
        default_value: Option<&ParameterValue>,
    ) -> Result<i64> {
        self.base_row(Table::EntityClass, entity_class_id)?;
        self.ensure_absent(
            Table::ParameterDefinition,
            Predicate::and(vec![Predicate::eq("entity_class_id", entity_class_id), Predicate::eq("name", name)]),
            || format!("There can't be more than one parameter called '{name}' in class {entity_class_id}"),
        )?;
        let default_value = default_value.map(to_database).transpose()?.map(String::into_bytes);
        self.backend.insert(
            Table::ParameterDefinition,
            Row::new()
                .with("entity_class_id", entity_class_id)
                .with("name", name)
                .with("default_value", default_value),
        )
    }

    pub fn add_parameter_value(
        &mut self,
        parameter_definition_id: i64,
        entity_id: i64,
        alternative_id: i64,
        value: &ParameterValue,
    ) -> Result<i64> {
        let definition = self.base_row(Table::ParameterDefinition, parameter_definition_id)?;
        let entity = self.base_row(Table::Entity, entity_id)?;
        self.base_row(Table::Alternative, alternative_id)?;
        if definition.get::<i64>("entity_class_id")? != entity.get::<i64>("class_id")? {
            return Err(Error::ConstraintViolation(format!(
                "Entity {entity_id} and parameter {parameter_definition_id} belong to different classes"
            )));
        }
        self.ensure_absent(
            Table::ParameterValue,
            Predicate::and(vec![
                Predicate::eq("parameter_definition_id", parameter_definition_id),
                Predicate::eq("entity_id", entity_id),
                Predicate::eq("alternative_id", alternative_id),
            ]),
            || {
                format!(
                    "Parameter {parameter_definition_id} of entity {entity_id} already has a value in alternative {alternative_id}"
                )
            },
        )?;
        self.backend.insert(
            Table::ParameterValue,
            Row::new()
                .with("parameter_definition_id", parameter_definition_id)
                .with("entity_id", entity_id)
                .with("alternative_id", alternative_id)
                .with("value", to_database(value)?.into_bytes()),
        )
    }

    // ========================================================================
    // Import alternative
    // ========================================================================

    pub fn import_alternative_name(&self) -> &str {
        &self.import_alternative.name
    }

    pub(crate) fn set_import_alternative(&mut self, import_alternative: ImportAlternative) {
        debug!(name = %import_alternative.name, "import alternative replaced");
        self.import_alternative = import_alternative;
        self.import_alternative_id = None;
    }

    /// Id of the alternative imports should write to, creating it on first use.
    ///
    /// The alternative and any missing scenarios are added; the alternative is
    /// appended to each listed scenario with rank one above its current maximum.
    pub fn create_import_alternative(&mut self) -> Result<i64> {
        if let Some(id) = self.import_alternative_id {
            return Ok(id);
        }
        let ImportAlternative { name, scenarios } = self.import_alternative.clone();
        let alternative_id = match self.id_by_name(Table::Alternative, &name)? {
            Some(id) => id,
            None => self.add_alternative(&name, None)?,
        };
        for scenario in &scenarios {
            let scenario_id = match self.id_by_name(Table::Scenario, scenario)? {
                Some(id) => id,
                None => self.add_scenario(scenario, None, false)?,
            };
            let members = self.base_rows_where(Table::ScenarioAlternative, Predicate::eq("scenario_id", scenario_id))?;
            let mut max_rank = 0;
            let mut present = false;
            for member in &members {
                max_rank = max_rank.max(member.get::<i64>("rank")?);
                present |= member.get::<i64>("alternative_id")? == alternative_id;
            }
            if !present {
                self.add_scenario_alternative(scenario_id, alternative_id, max_rank + 1)?;
            }
        }
        self.import_alternative_id = Some(alternative_id);
        Ok(alternative_id)
    }

    // ========================================================================
    // Reading through views
    // ========================================================================

    /// Every visible parameter value with names resolved and the value decoded.
    ///
    /// Values whose definition, entity, class or alternative is hidden by a
    /// view are left out.
    pub fn parameter_values(&self) -> Result<Vec<ParameterValueRecord>> {
        let plan = self
            .parameter_value_sq()
            .join(
                self.parameter_definition_sq(),
                "parameter_definition_id",
                "id",
                &[("name", "parameter_name"), ("entity_class_id", "entity_class_id")],
            )
            .join(self.entity_sq(), "entity_id", "id", &[("name", "entity_name")])
            .join(self.entity_class_sq(), "entity_class_id", "id", &[("name", "entity_class_name")])
            .join(self.alternative_sq(), "alternative_id", "id", &[("name", "alternative_name")]);
        self.query(&plan)?
            .rows
            .iter()
            .map(|row| {
                Ok(ParameterValueRecord {
                    id: row.id()?,
                    entity_class_name: row.get("entity_class_name")?,
                    entity_name: row.get("entity_name")?,
                    parameter_name: row.get("parameter_name")?,
                    alternative_name: row.get("alternative_name")?,
                    value: from_database(row.get::<Vec<u8>>("value")?)?,
                })
            })
            .collect()
    }

    /// Visible scenarios with their visible alternatives in rank order.
    pub fn scenarios(&self) -> Result<Vec<ScenarioRecord>> {
        let members = self
            .query(&self.scenario_alternative_sq().join(
                self.alternative_sq(),
                "alternative_id",
                "id",
                &[("name", "alternative_name")],
            ))?
            .rows;
        let mut ranked: HashMap<i64, Vec<(i64, String)>> = HashMap::new();
        for member in &members {
            ranked
                .entry(member.get("scenario_id")?)
                .or_default()
                .push((member.get("rank")?, member.get("alternative_name")?));
        }
        self.query(&self.scenario_sq())?
            .rows
            .iter()
            .map(|row| {
                let id = row.id()?;
                let mut alternatives = ranked.remove(&id).unwrap_or_default();
                alternatives.sort_by_key(|(rank, _)| *rank);
                Ok(ScenarioRecord {
                    id,
                    name: row.get("name")?,
                    active: row.get::<Option<bool>>("active")?.unwrap_or(false),
                    alternatives: alternatives.into_iter().map(|(_, name)| name).collect(),
                })
            })
            .collect()
    }

    /// Pop filter entries from a database URL, apply them in order and
    /// return the URL without them.
    pub fn apply_filters_from_url(&mut self, url: &str) -> Result<String> {
        let (sources, cleaned) = crate::filters::url::pop_filter_configs(url)?;
        for source in &sources {
            crate::filters::apply_filter_source(self, source)?;
        }
        Ok(cleaned)
    }
}

/// Comma separated ids, NULL when empty.
fn join_ids(ids: &[i64]) -> Cell {
    if ids.is_empty() {
        return Cell::Null;
    }
    Cell::Text(ids.iter().map(i64::to_string).collect::<Vec<_>>().join(","))
}

fn id_list(row: &Row, column: &str) -> Result<Vec<i64>> {
    let Some(text) = row.get::<Option<String>>(column)? else {
        return Ok(Vec::new());
    };
    text.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| Error::StorageError(format!("Malformed id list '{text}' in column '{column}'")))
        })
        .collect()
}
