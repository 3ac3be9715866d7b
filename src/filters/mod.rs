//! # Filters
//!
//! A filter rewrites some views of a [`DatabaseMapping`] by installing
//! subquery makers, or replaces how the import alternative is created.
//! Filters are described by a [`FilterConfig`], which can travel inside a
//! database URL either as a `cfg:` shorthand or as a path to a JSON file.
//!
//! | Filter | Module | Views touched |
//! |--------|--------|---------------|
//! | `scenario_filter` | [`scenario`] | parameter_value, alternative, scenario, scenario_alternative |
//! | `alternative_filter` | [`alternative`] | parameter_value, alternative, scenario, scenario_alternative |
//! | `entity_class_renamer` | [`renamer`] | entity_class |
//! | `execution_filter` | [`execution`] | none (import alternative) |

pub mod alternative;
pub mod execution;
pub mod renamer;
pub mod scenario;
pub mod shorthand;
pub mod url;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mapping::DatabaseMapping;
use crate::storage::StorageBackend;
use crate::{Error, Result};

pub use execution::ExecutionDescriptor;
pub use scenario::ScenarioRef;
pub use shorthand::ShorthandRegistry;

// ============================================================================
// Configuration
// ============================================================================

/// A filter configuration, serialized as a JSON object tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    ScenarioFilter { scenario: String },
    AlternativeFilter { alternatives: Vec<String> },
    EntityClassRenamer { name_map: BTreeMap<String, String> },
    ExecutionFilter { execution: ExecutionDescriptor },
}

impl FilterConfig {
    /// The `"type"` tag.
    pub fn filter_type(&self) -> &'static str {
        match self {
            FilterConfig::ScenarioFilter { .. } => scenario::SCENARIO_FILTER_TYPE,
            FilterConfig::AlternativeFilter { .. } => alternative::ALTERNATIVE_FILTER_TYPE,
            FilterConfig::EntityClassRenamer { .. } => renamer::ENTITY_CLASS_RENAMER_TYPE,
            FilterConfig::ExecutionFilter { .. } => execution::EXECUTION_FILTER_TYPE,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidFilterConfig(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidFilterConfig(e.to_string()))
    }
}

/// A filter entry popped from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSource {
    Config(FilterConfig),
    /// Path to a JSON file holding one `FilterConfig`
    File(PathBuf),
}

impl From<FilterConfig> for FilterSource {
    fn from(config: FilterConfig) -> Self {
        FilterSource::Config(config)
    }
}

impl From<PathBuf> for FilterSource {
    fn from(path: PathBuf) -> Self {
        FilterSource::File(path)
    }
}

/// Read a filter configuration from a JSON file.
pub fn load_filter_config(path: impl AsRef<Path>) -> Result<FilterConfig> {
    let text = std::fs::read_to_string(path.as_ref())?;
    FilterConfig::from_json(&text)
}

// ============================================================================
// Application
// ============================================================================

/// Install the filter described by `config`.
pub fn apply_filter<B: StorageBackend>(db_map: &mut DatabaseMapping<B>, config: &FilterConfig) -> Result<()> {
    debug!(filter = config.filter_type(), "applying filter");
    match config {
        FilterConfig::ScenarioFilter { scenario } => {
            scenario::apply_scenario_filter_to_subqueries(db_map, scenario.as_str())
        }
        FilterConfig::AlternativeFilter { alternatives } => {
            alternative::apply_alternative_filter_to_subqueries(db_map, alternatives.as_slice())
        }
        FilterConfig::EntityClassRenamer { name_map } => {
            renamer::apply_renaming_to_entity_class_subquery(db_map, name_map)
        }
        FilterConfig::ExecutionFilter { execution } => {
            execution::apply_execution_filter(db_map, execution);
            Ok(())
        }
    }
}

/// Install a filter given inline or as a config file.
pub fn apply_filter_source<B: StorageBackend>(db_map: &mut DatabaseMapping<B>, source: &FilterSource) -> Result<()> {
    match source {
        FilterSource::Config(config) => apply_filter(db_map, config),
        FilterSource::File(path) => {
            let config = load_filter_config(path)?;
            apply_filter(db_map, &config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_config_json_is_tagged() {
        let config = scenario::scenario_filter_config("stress");
        assert_eq!(config.to_json().unwrap(), r#"{"type":"scenario_filter","scenario":"stress"}"#);
        assert_eq!(FilterConfig::from_json(&config.to_json().unwrap()).unwrap(), config);
    }

    #[test]
    fn test_unknown_type_is_invalid() {
        let err = FilterConfig::from_json(r#"{"type":"tool_filter","tool":"t"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidFilterConfig(_)));
    }

    #[test]
    fn test_load_filter_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"type": "alternative_filter", "alternatives": ["Base"]}}"#).unwrap();
        let config = load_filter_config(file.path()).unwrap();
        assert_eq!(config, FilterConfig::AlternativeFilter { alternatives: vec!["Base".into()] });
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_filter_config(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
