//! Scenario filter.
//!
//! Restricts the alternative, scenario and scenario_alternative views to one
//! scenario, and reduces the parameter_value view to a single winner per
//! `(parameter_definition_id, entity_id)`: the value whose alternative has
//! the highest rank in the scenario.

use std::sync::Arc;

use tracing::debug;

use crate::mapping::{DatabaseMapping, ViewSource};
use crate::planner::{Predicate, SortKey, Subquery};
use crate::storage::{StorageBackend, Table};
use crate::{Error, Result};

use super::FilterConfig;

pub const SCENARIO_FILTER_TYPE: &str = "scenario_filter";
pub const SCENARIO_SHORTHAND_TAG: &str = "scenario";

const ROW_NUMBER_LABEL: &str = "max_rank_row_number";

/// A scenario given by name or by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioRef {
    Name(String),
    Id(i64),
}

impl From<&str> for ScenarioRef {
    fn from(name: &str) -> Self {
        ScenarioRef::Name(name.to_owned())
    }
}

impl From<String> for ScenarioRef {
    fn from(name: String) -> Self {
        ScenarioRef::Name(name)
    }
}

impl From<i64> for ScenarioRef {
    fn from(id: i64) -> Self {
        ScenarioRef::Id(id)
    }
}

/// Replace the parameter_value, alternative, scenario and scenario_alternative
/// views of `db_map` with scenario filtered ones.
///
/// Nothing is installed if the scenario cannot be resolved.
pub fn apply_scenario_filter_to_subqueries<B: StorageBackend>(
    db_map: &mut DatabaseMapping<B>,
    scenario: impl Into<ScenarioRef>,
) -> Result<()> {
    let state = Arc::new(ScenarioFilterState::new(db_map, scenario.into())?);
    debug!(
        scenario_id = state.scenario_id,
        alternative_ids = ?state.alternative_ids,
        "installing scenario filter"
    );

    let s = Arc::clone(&state);
    db_map.override_parameter_value_sq_maker(move |_: &dyn ViewSource| s.parameter_value_sq());
    let s = Arc::clone(&state);
    db_map.override_alternative_sq_maker(move |_: &dyn ViewSource| s.alternative_sq());
    let s = Arc::clone(&state);
    db_map.override_scenario_sq_maker(move |_: &dyn ViewSource| s.scenario_sq());
    db_map.override_scenario_alternative_sq_maker(move |_: &dyn ViewSource| state.scenario_alternative_sq());
    Ok(())
}

pub fn scenario_filter_config(scenario: &str) -> FilterConfig {
    FilterConfig::ScenarioFilter { scenario: scenario.to_owned() }
}

/// The scenario name of a scenario filter config, `None` for other filters.
pub fn scenario_name_from_config(config: &FilterConfig) -> Option<&str> {
    match config {
        FilterConfig::ScenarioFilter { scenario } => Some(scenario),
        _ => None,
    }
}

pub fn scenario_filter_config_to_shorthand(config: &FilterConfig) -> Result<String> {
    match config {
        FilterConfig::ScenarioFilter { scenario } => Ok(format!("{SCENARIO_SHORTHAND_TAG}:{scenario}")),
        other => Err(Error::InvalidFilterConfig(format!("Expected a scenario filter, got {}", other.filter_type()))),
    }
}

/// Parse `scenario:<name>`; the name may contain colons.
pub fn scenario_filter_shorthand_to_config(shorthand: &str) -> Result<FilterConfig> {
    match shorthand.split_once(':') {
        Some((_, scenario)) => Ok(scenario_filter_config(scenario)),
        None => Err(Error::InvalidFilterConfig(format!("Malformed scenario filter shorthand '{shorthand}'"))),
    }
}

// ============================================================================
// State
// ============================================================================

/// Resolved ids plus the views that were current before the filter.
struct ScenarioFilterState {
    original_parameter_value_sq: Subquery,
    original_alternative_sq: Subquery,
    original_scenario_sq: Subquery,
    original_scenario_alternative_sq: Subquery,
    scenario_id: i64,
    scenario_alternative_ids: Vec<i64>,
    alternative_ids: Vec<i64>,
}

impl ScenarioFilterState {
    fn new<B: StorageBackend>(db_map: &DatabaseMapping<B>, scenario: ScenarioRef) -> Result<Self> {
        let original_parameter_value_sq = db_map.subquery(Table::ParameterValue);
        let original_alternative_sq = db_map.subquery(Table::Alternative);
        let original_scenario_sq = db_map.subquery(Table::Scenario);
        let original_scenario_alternative_sq = db_map.subquery(Table::ScenarioAlternative);

        let scenario_id = Self::scenario_id(db_map, &original_scenario_sq, scenario)?;
        let members = db_map
            .query(&original_scenario_alternative_sq.clone().filter(Predicate::eq("scenario_id", scenario_id)))?;
        let scenario_alternative_ids = members.column_values::<i64>("id")?;
        let alternative_ids = members.column_values::<i64>("alternative_id")?;

        Ok(Self {
            original_parameter_value_sq,
            original_alternative_sq,
            original_scenario_sq,
            original_scenario_alternative_sq,
            scenario_id,
            scenario_alternative_ids,
            alternative_ids,
        })
    }

    fn scenario_id<B: StorageBackend>(
        db_map: &DatabaseMapping<B>,
        scenario_sq: &Subquery,
        scenario: ScenarioRef,
    ) -> Result<i64> {
        match scenario {
            ScenarioRef::Name(name) => {
                let found = db_map.query(&scenario_sq.clone().filter(Predicate::eq("name", name.as_str())))?;
                match found.single() {
                    Some(row) => row.id(),
                    None => Err(Error::NotFound(format!("Scenario '{name}' not found"))),
                }
            }
            ScenarioRef::Id(id) => {
                let found = db_map.query(&scenario_sq.clone().filter(Predicate::eq("id", id)))?;
                if found.is_empty() {
                    return Err(Error::NotFound(format!("Scenario id {id} not found")));
                }
                Ok(id)
            }
        }
    }

    /// Highest ranked value per definition and entity among the scenario's alternatives.
    fn parameter_value_sq(&self) -> Subquery {
        let columns = self.original_parameter_value_sq.columns();
        let members = self
            .original_scenario_alternative_sq
            .clone()
            .filter(Predicate::eq("scenario_id", self.scenario_id));
        self.original_parameter_value_sq
            .clone()
            .join(members, "alternative_id", "alternative_id", &[("rank", "rank")])
            .row_number(&["parameter_definition_id", "entity_id"], vec![SortKey::desc("rank")], ROW_NUMBER_LABEL)
            .filter(Predicate::eq(ROW_NUMBER_LABEL, 1_i64))
            .select(&columns)
    }

    fn alternative_sq(&self) -> Subquery {
        self.original_alternative_sq.clone().filter(Predicate::is_in("id", self.alternative_ids.iter().copied()))
    }

    fn scenario_sq(&self) -> Subquery {
        self.original_scenario_sq.clone().filter(Predicate::eq("id", self.scenario_id))
    }

    fn scenario_alternative_sq(&self) -> Subquery {
        self.original_scenario_alternative_sq
            .clone()
            .filter(Predicate::is_in("id", self.scenario_alternative_ids.iter().copied()))
    }
}
