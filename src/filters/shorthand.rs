//! Shorthand registry: compact `tag:value` forms of filter configs.

use hashbrown::HashMap;

use crate::{Error, Result};

use super::{alternative, execution, renamer, scenario, FilterConfig};

/// Tool filters select by feature/method tables this catalog does not carry.
pub const TOOL_FILTER_TYPE: &str = "tool_filter";
pub const TOOL_SHORTHAND_TAG: &str = "tool";

pub type ToShorthand = fn(&FilterConfig) -> Result<String>;
pub type FromShorthand = fn(&str) -> Result<FilterConfig>;

/// The conversions for one filter type.
#[derive(Debug, Clone, Copy)]
pub struct ShorthandCodec {
    pub filter_type: &'static str,
    pub tag: &'static str,
    pub to_shorthand: ToShorthand,
    /// Receives the whole shorthand, tag included.
    pub from_shorthand: FromShorthand,
}

/// Lookup tables from filter type and from tag to a codec.
///
/// Codecs map between shorthands and [`FilterConfig`], which is a closed
/// enum: registering a codec can re-tag or re-parse a known filter, but it
/// cannot introduce a new kind of filter.
#[derive(Debug, Clone)]
pub struct ShorthandRegistry {
    by_type: HashMap<&'static str, ShorthandCodec>,
    by_tag: HashMap<&'static str, ShorthandCodec>,
}

impl Default for ShorthandRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ShorthandCodec {
            filter_type: scenario::SCENARIO_FILTER_TYPE,
            tag: scenario::SCENARIO_SHORTHAND_TAG,
            to_shorthand: scenario::scenario_filter_config_to_shorthand,
            from_shorthand: scenario::scenario_filter_shorthand_to_config,
        });
        registry.register(ShorthandCodec {
            filter_type: alternative::ALTERNATIVE_FILTER_TYPE,
            tag: alternative::ALTERNATIVE_SHORTHAND_TAG,
            to_shorthand: alternative::alternative_filter_config_to_shorthand,
            from_shorthand: alternative::alternative_filter_shorthand_to_config,
        });
        registry.register(ShorthandCodec {
            filter_type: renamer::ENTITY_CLASS_RENAMER_TYPE,
            tag: renamer::ENTITY_CLASS_RENAMER_SHORTHAND_TAG,
            to_shorthand: renamer::entity_class_renamer_config_to_shorthand,
            from_shorthand: renamer::entity_class_renamer_shorthand_to_config,
        });
        registry.register(ShorthandCodec {
            filter_type: execution::EXECUTION_FILTER_TYPE,
            tag: execution::EXECUTION_SHORTHAND_TAG,
            to_shorthand: execution::execution_filter_config_to_shorthand,
            from_shorthand: execution::execution_filter_shorthand_to_config,
        });
        registry.register(ShorthandCodec {
            filter_type: TOOL_FILTER_TYPE,
            tag: TOOL_SHORTHAND_TAG,
            to_shorthand: |_| Err(tool_filter_unsupported()),
            from_shorthand: |_| Err(tool_filter_unsupported()),
        });
        registry
    }
}

fn tool_filter_unsupported() -> Error {
    Error::UnknownFilter(format!("'{TOOL_FILTER_TYPE}' is not supported: the database has no tool tables"))
}

impl ShorthandRegistry {
    /// A registry that knows no filters.
    pub fn empty() -> Self {
        Self { by_type: HashMap::new(), by_tag: HashMap::new() }
    }

    /// Add a codec, replacing any with the same type or tag.
    ///
    /// `filter_type` must name a [`FilterConfig`] variant for
    /// [`config_to_shorthand`](Self::config_to_shorthand) to ever reach it.
    pub fn register(&mut self, codec: ShorthandCodec) {
        if let Some(old) = self.by_type.insert(codec.filter_type, codec) {
            self.by_tag.remove(old.tag);
        }
        if let Some(old) = self.by_tag.insert(codec.tag, codec) {
            if old.filter_type != codec.filter_type {
                self.by_type.remove(old.filter_type);
            }
        }
    }

    pub fn config_to_shorthand(&self, config: &FilterConfig) -> Result<String> {
        let filter_type = config.filter_type();
        let codec = self
            .by_type
            .get(filter_type)
            .ok_or_else(|| Error::UnknownFilter(format!("No shorthand for filter type '{filter_type}'")))?;
        (codec.to_shorthand)(config)
    }

    /// Parse `tag:value`, dispatching on the text before the first colon.
    pub fn parse_shorthand(&self, shorthand: &str) -> Result<FilterConfig> {
        let tag = shorthand.split_once(':').map_or(shorthand, |(tag, _)| tag);
        let codec = self
            .by_tag
            .get(tag)
            .ok_or_else(|| Error::UnknownFilter(format!("Unknown shorthand tag '{tag}'")))?;
        (codec.from_shorthand)(shorthand)
    }
}
