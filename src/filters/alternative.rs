//! Alternative filter.
//!
//! Keeps only the listed alternatives visible, together with their
//! parameter values, their scenario memberships and the scenarios that
//! still have at least one member.

use std::sync::Arc;

use tracing::debug;

use crate::mapping::{DatabaseMapping, ViewSource};
use crate::planner::{Predicate, Subquery};
use crate::storage::{StorageBackend, Table};
use crate::{Error, Result};

use super::FilterConfig;

pub const ALTERNATIVE_FILTER_TYPE: &str = "alternative_filter";
pub const ALTERNATIVE_SHORTHAND_TAG: &str = "alternatives";

/// Restrict the views of `db_map` to the named alternatives.
pub fn apply_alternative_filter_to_subqueries<B: StorageBackend, S: AsRef<str>>(
    db_map: &mut DatabaseMapping<B>,
    alternatives: &[S],
) -> Result<()> {
    let state = Arc::new(AlternativeFilterState::new(db_map, alternatives)?);
    debug!(
        alternative_ids = ?state.alternative_ids,
        scenario_ids = ?state.scenario_ids,
        "installing alternative filter"
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

pub fn alternative_filter_config<S: AsRef<str>>(alternatives: &[S]) -> FilterConfig {
    FilterConfig::AlternativeFilter { alternatives: alternatives.iter().map(|a| a.as_ref().to_owned()).collect() }
}

/// `alternatives:'a':'b'`; names are quoted so they may contain colons.
pub fn alternative_filter_config_to_shorthand(config: &FilterConfig) -> Result<String> {
    let FilterConfig::AlternativeFilter { alternatives } = config else {
        return Err(Error::InvalidFilterConfig(format!(
            "Expected an alternative filter, got {}",
            config.filter_type()
        )));
    };
    if let Some(name) = alternatives.iter().find(|name| name.contains('\'')) {
        return Err(Error::InvalidFilterConfig(format!("Alternative name {name} cannot be quoted")));
    }
    let quoted: Vec<String> = alternatives.iter().map(|name| format!("'{name}'")).collect();
    Ok(format!("{ALTERNATIVE_SHORTHAND_TAG}:{}", quoted.join(":")))
}

pub fn alternative_filter_shorthand_to_config(shorthand: &str) -> Result<FilterConfig> {
    let malformed = || Error::InvalidFilterConfig(format!("Malformed alternative filter shorthand '{shorthand}'"));
    let (_, mut rest) = shorthand.split_once(':').ok_or_else(malformed)?;
    let mut alternatives = Vec::new();
    while !rest.is_empty() {
        let quoted = rest.strip_prefix('\'').ok_or_else(malformed)?;
        let (name, tail) = quoted.split_once('\'').ok_or_else(malformed)?;
        alternatives.push(name.to_owned());
        rest = match tail.strip_prefix(':') {
            Some(next) if !next.is_empty() => next,
            Some(_) => return Err(malformed()),
            None if tail.is_empty() => tail,
            None => return Err(malformed()),
        };
    }
    Ok(FilterConfig::AlternativeFilter { alternatives })
}

// ============================================================================
// State
// ============================================================================

struct AlternativeFilterState {
    original_parameter_value_sq: Subquery,
    original_alternative_sq: Subquery,
    original_scenario_sq: Subquery,
    original_scenario_alternative_sq: Subquery,
    alternative_ids: Vec<i64>,
    scenario_ids: Vec<i64>,
}

impl AlternativeFilterState {
    fn new<B: StorageBackend, S: AsRef<str>>(db_map: &DatabaseMapping<B>, alternatives: &[S]) -> Result<Self> {
        let original_parameter_value_sq = db_map.subquery(Table::ParameterValue);
        let original_alternative_sq = db_map.subquery(Table::Alternative);
        let original_scenario_sq = db_map.subquery(Table::Scenario);
        let original_scenario_alternative_sq = db_map.subquery(Table::ScenarioAlternative);

        let visible = db_map.query(&original_alternative_sq)?;
        let mut alternative_ids = Vec::with_capacity(alternatives.len());
        for name in alternatives {
            let name = name.as_ref();
            let mut found = None;
            for row in &visible.rows {
                if row.get::<String>("name")? == name {
                    found = Some(row.id()?);
                    break;
                }
            }
            match found {
                Some(id) => alternative_ids.push(id),
                None => return Err(Error::NotFound(format!("Alternative '{name}' not found"))),
            }
        }

        let members = db_map.query(
            &original_scenario_alternative_sq
                .clone()
                .filter(Predicate::is_in("alternative_id", alternative_ids.iter().copied())),
        )?;
        let mut scenario_ids = members.column_values::<i64>("scenario_id")?;
        scenario_ids.sort_unstable();
        scenario_ids.dedup();

        Ok(Self {
            original_parameter_value_sq,
            original_alternative_sq,
            original_scenario_sq,
            original_scenario_alternative_sq,
            alternative_ids,
            scenario_ids,
        })
    }

    fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.alternative_ids.iter().copied()
    }

    fn parameter_value_sq(&self) -> Subquery {
        self.original_parameter_value_sq.clone().filter(Predicate::is_in("alternative_id", self.ids()))
    }

    fn alternative_sq(&self) -> Subquery {
        self.original_alternative_sq.clone().filter(Predicate::is_in("id", self.ids()))
    }

    fn scenario_sq(&self) -> Subquery {
        self.original_scenario_sq.clone().filter(Predicate::is_in("id", self.scenario_ids.iter().copied()))
    }

    fn scenario_alternative_sq(&self) -> Subquery {
        self.original_scenario_alternative_sq.clone().filter(Predicate::is_in("alternative_id", self.ids()))
    }
}
