//! Execution filter.
//!
//! Gives each execution of a workflow item its own import alternative,
//! named after the scenarios, the item and the execution timestamp.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::mapping::{DatabaseMapping, ImportAlternative};
use crate::storage::StorageBackend;
use crate::{Error, Result};

use super::FilterConfig;

pub const EXECUTION_FILTER_TYPE: &str = "execution_filter";
pub const EXECUTION_SHORTHAND_TAG: &str = "execution";

/// Who executed, in which scenarios, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue")]
pub struct ExecutionDescriptor {
    pub execution_item: String,
    pub scenarios: Vec<String>,
    pub timestamp: String,
}

impl ExecutionDescriptor {
    /// `scen1_scen2__item@timestamp`, or `item@timestamp` without scenarios.
    pub fn import_alternative_name(&self) -> String {
        let separator = if self.scenarios.is_empty() { "" } else { "__" };
        format!("{}{separator}{}@{}", self.scenarios.join("_"), self.execution_item, self.timestamp)
    }
}

impl TryFrom<JsonValue> for ExecutionDescriptor {
    type Error = Error;

    fn try_from(value: JsonValue) -> Result<Self> {
        let field = |key: &str| {
            value
                .get(key)
                .ok_or_else(|| Error::InvalidFilterConfig(format!("Key '{key}' not found in execution filter descriptor.")))
        };
        let text = |key: &str| -> Result<String> {
            field(key)?
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| Error::InvalidFilterConfig(format!("Key '{key}' should contain a string.")))
        };
        let execution_item = text("execution_item")?;
        let scenarios = field("scenarios")?
            .as_array()
            .ok_or_else(|| Error::InvalidFilterConfig("Key 'scenarios' should contain a list.".into()))?
            .iter()
            .map(|scenario| {
                scenario
                    .as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| Error::InvalidFilterConfig(format!("Scenario {scenario} is not a string.")))
            })
            .collect::<Result<_>>()?;
        let timestamp = text("timestamp")?;
        Ok(Self { execution_item, scenarios, timestamp })
    }
}

/// Make `db_map` import into an alternative dedicated to this execution.
///
/// The alternative and scenarios are created lazily by
/// [`DatabaseMapping::create_import_alternative`].
pub fn apply_execution_filter<B: StorageBackend>(db_map: &mut DatabaseMapping<B>, execution: &ExecutionDescriptor) {
    db_map.set_import_alternative(ImportAlternative {
        name: execution.import_alternative_name(),
        scenarios: execution.scenarios.clone(),
    });
}

pub fn execution_filter_config(execution: ExecutionDescriptor) -> FilterConfig {
    FilterConfig::ExecutionFilter { execution }
}

/// The descriptor of an execution filter config, `None` for other filters.
pub fn execution_descriptor_from_config(config: &FilterConfig) -> Option<&ExecutionDescriptor> {
    match config {
        FilterConfig::ExecutionFilter { execution } => Some(execution),
        _ => None,
    }
}

/// `execution:<descriptor as JSON>`
pub fn execution_filter_config_to_shorthand(config: &FilterConfig) -> Result<String> {
    let Some(execution) = execution_descriptor_from_config(config) else {
        return Err(Error::InvalidFilterConfig(format!(
            "Expected an execution filter, got {}",
            config.filter_type()
        )));
    };
    let json = serde_json::to_string(execution).map_err(|e| Error::InvalidFilterConfig(e.to_string()))?;
    Ok(format!("{EXECUTION_SHORTHAND_TAG}:{json}"))
}

pub fn execution_filter_shorthand_to_config(shorthand: &str) -> Result<FilterConfig> {
    let (_, json) = shorthand
        .split_once(':')
        .ok_or_else(|| Error::InvalidFilterConfig(format!("Malformed execution filter shorthand '{shorthand}'")))?;
    let value: JsonValue = serde_json::from_str(json).map_err(|e| Error::InvalidFilterConfig(e.to_string()))?;
    Ok(execution_filter_config(ExecutionDescriptor::try_from(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Table;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn descriptor(scenarios: &[&str]) -> ExecutionDescriptor {
        ExecutionDescriptor {
            execution_item: "importer".into(),
            scenarios: scenarios.iter().map(|s| s.to_string()).collect(),
            timestamp: "2020-11-30T12:00:00".into(),
        }
    }

    #[test]
    fn test_import_alternative_name() {
        assert_eq!(descriptor(&[]).import_alternative_name(), "importer@2020-11-30T12:00:00");
        assert_eq!(descriptor(&["a", "b"]).import_alternative_name(), "a_b__importer@2020-11-30T12:00:00");
    }

    #[test]
    fn test_import_alternative_appended_to_scenarios() {
        let mut db_map = DatabaseMapping::open_memory();
        let existing = db_map.add_scenario("existing", None, true).unwrap();
        db_map.add_scenario_alternative(existing, 1, 3).unwrap();
        apply_execution_filter(&mut db_map, &descriptor(&["existing", "fresh"]));
        assert_eq!(db_map.import_alternative_name(), "existing_fresh__importer@2020-11-30T12:00:00");

        let id = db_map.create_import_alternative().unwrap();
        assert_eq!(db_map.create_import_alternative().unwrap(), id);

        let scenarios = db_map.scenarios().unwrap();
        let alternatives: Vec<_> = scenarios.iter().map(|s| (s.name.as_str(), s.alternatives.clone())).collect();
        let name = "existing_fresh__importer@2020-11-30T12:00:00".to_string();
        assert_eq!(
            alternatives,
            vec![("existing", vec!["Base".to_string(), name.clone()]), ("fresh", vec![name])]
        );
        let ranks = db_map.query_view(Table::ScenarioAlternative).unwrap().column_values::<i64>("rank").unwrap();
        assert_eq!(ranks, vec![3, 4, 1]);
    }

    #[test]
    fn test_descriptor_errors() {
        let err = ExecutionDescriptor::try_from(json!({"scenarios": [], "timestamp": "t"})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid filter configuration: Key 'execution_item' not found in execution filter descriptor."
        );
        let err = ExecutionDescriptor::try_from(json!({"execution_item": "i", "scenarios": "s", "timestamp": "t"}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid filter configuration: Key 'scenarios' should contain a list.");
    }

    #[test]
    fn test_shorthand() {
        let config = execution_filter_config(descriptor(&["s"]));
        let shorthand = execution_filter_config_to_shorthand(&config).unwrap();
        assert_eq!(
            shorthand,
            r#"execution:{"execution_item":"importer","scenarios":["s"],"timestamp":"2020-11-30T12:00:00"}"#
        );
        assert_eq!(execution_filter_shorthand_to_config(&shorthand).unwrap(), config);
    }

    #[test]
    fn test_config_deserializes_through_descriptor_checks() {
        let err = FilterConfig::from_json(r#"{"type":"execution_filter","execution":{"scenarios":[]}}"#).unwrap_err();
        assert!(err.to_string().contains("execution_item"));
    }
}
