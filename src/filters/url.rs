//! Filter entries embedded in database URLs.
//!
//! Each filter is one `spinedbfilter=<value>` query pair. A value starting
//! with `cfg:` is a shorthand config; anything else is a path to a JSON
//! config file. Other query pairs are left alone and keep their order.

use std::path::PathBuf;

use tracing::debug;
use url::Url;

use crate::{Error, Result};

use super::{FilterSource, ShorthandRegistry};

pub const FILTER_IDENTIFIER: &str = "spinedbfilter";
pub const SHORTHAND_TAG: &str = "cfg:";

/// Append a filter to the query of `url`.
pub fn append_filter_config(url: &str, source: impl Into<FilterSource>) -> Result<String> {
    append_filter_config_with(&ShorthandRegistry::default(), url, &source.into())
}

/// Remove every filter entry from `url` and parse them in order.
///
/// Returns the parsed entries and the URL without them. A URL without
/// filter entries comes back unchanged.
pub fn pop_filter_configs(url: &str) -> Result<(Vec<FilterSource>, String)> {
    pop_filter_configs_with(&ShorthandRegistry::default(), url)
}

/// Remove every filter entry from `url` without parsing them.
pub fn clear_filter_configs(url: &str) -> Result<String> {
    let mut parsed = Url::parse(url)?;
    let (filters, others) = split_query(&parsed);
    if filters.is_empty() {
        return Ok(url.to_owned());
    }
    set_pairs(&mut parsed, &others);
    Ok(parsed.into())
}

pub fn append_filter_config_with(registry: &ShorthandRegistry, url: &str, source: &FilterSource) -> Result<String> {
    let mut parsed = Url::parse(url)?;
    let value = match source {
        FilterSource::Config(config) => format!("{SHORTHAND_TAG}{}", registry.config_to_shorthand(config)?),
        FilterSource::File(path) => path
            .to_str()
            .ok_or_else(|| Error::InvalidFilterConfig(format!("Filter config path {} is not UTF-8", path.display())))?
            .to_owned(),
    };
    parsed.query_pairs_mut().append_pair(FILTER_IDENTIFIER, &value);
    Ok(parsed.into())
}

pub fn pop_filter_configs_with(registry: &ShorthandRegistry, url: &str) -> Result<(Vec<FilterSource>, String)> {
    let mut parsed = Url::parse(url)?;
    let (filters, others) = split_query(&parsed);
    if filters.is_empty() {
        return Ok((Vec::new(), url.to_owned()));
    }
    let sources = filters
        .iter()
        .map(|value| match value.strip_prefix(SHORTHAND_TAG) {
            Some(shorthand) => registry.parse_shorthand(shorthand).map(FilterSource::Config),
            None => Ok(FilterSource::File(PathBuf::from(value))),
        })
        .collect::<Result<Vec<_>>>()?;
    set_pairs(&mut parsed, &others);
    debug!(count = sources.len(), "popped filter configs from URL");
    Ok((sources, parsed.into()))
}

/// Filter values, and the remaining pairs.
fn split_query(url: &Url) -> (Vec<String>, Vec<(String, String)>) {
    let mut filters = Vec::new();
    let mut others = Vec::new();
    for (key, value) in url.query_pairs().into_owned() {
        if key == FILTER_IDENTIFIER {
            filters.push(value);
        } else {
            others.push((key, value));
        }
    }
    (filters, others)
}

fn set_pairs(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::scenario::scenario_filter_config;
    use pretty_assertions::assert_eq;

    const URL: &str = "sqlite:///home/user/db.sqlite";

    #[test]
    fn test_append_shorthand() {
        let url = append_filter_config(URL, scenario_filter_config("scen")).unwrap();
        assert_eq!(url, "sqlite:///home/user/db.sqlite?spinedbfilter=cfg%3Ascenario%3Ascen");
    }

    #[test]
    fn test_pop_keeps_other_pairs() {
        let url = format!("{URL}?echo=true");
        let url = append_filter_config(&url, PathBuf::from("/configs/filter.json")).unwrap();
        let url = append_filter_config(&url, scenario_filter_config("scen")).unwrap();
        let (sources, cleaned) = pop_filter_configs(&url).unwrap();
        assert_eq!(
            sources,
            vec![
                FilterSource::File(PathBuf::from("/configs/filter.json")),
                FilterSource::Config(scenario_filter_config("scen")),
            ]
        );
        assert_eq!(cleaned, format!("{URL}?echo=true"));
    }

    #[test]
    fn test_no_filters_leaves_url_alone() {
        let url = "mysql://user@host/db?charset=utf8";
        assert_eq!(pop_filter_configs(url).unwrap(), (Vec::new(), url.to_owned()));
        assert_eq!(clear_filter_configs(url).unwrap(), url);
    }

    #[test]
    fn test_clear() {
        let url = append_filter_config(URL, scenario_filter_config("scen")).unwrap();
        assert_eq!(clear_filter_configs(&url).unwrap(), URL);
    }

    #[test]
    fn test_unknown_shorthand_tag() {
        let err = pop_filter_configs(&format!("{URL}?spinedbfilter=cfg:bogus:t")).unwrap_err();
        assert!(matches!(err, Error::UnknownFilter(_)));
        let err = pop_filter_configs(&format!("{URL}?spinedbfilter=cfg:tool:t")).unwrap_err();
        assert!(matches!(err, Error::UnknownFilter(ref m) if m.contains("not supported")));
    }

    #[test]
    fn test_bad_url() {
        assert!(matches!(pop_filter_configs("not a url"), Err(Error::InvalidUrl(_))));
    }
}
