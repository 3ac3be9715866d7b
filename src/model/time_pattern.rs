use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use super::value::IndexedValue;
use crate::{Error, Result};

/// Values keyed by time pattern strings such as `"M1-4,M9-12"` or `"WD1-5"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePattern {
    indexes: Vec<String>,
    values: Vec<f64>,
}

impl TimePattern {
    pub fn new(indexes: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if indexes.len() != values.len() {
            return Err(Error::ParameterValueFormat(
                "Length of values does not match length of indexes".into(),
            ));
        }
        if indexes.is_empty() {
            return Err(Error::ParameterValueFormat("Empty time pattern not allowed".into()));
        }
        {
            let mut seen = HashSet::with_capacity(indexes.len());
            if let Some(pattern) = indexes.iter().find(|pattern| !seen.insert(pattern.as_str())) {
                return Err(Error::ParameterValueFormat(format!("Time pattern \"{pattern}\" appears more than once")));
            }
        }
        Ok(Self { indexes, values })
    }

    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.indexes.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}

impl IndexedValue for TimePattern {
    type Item = f64;

    fn values(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved() {
        let pattern = TimePattern::new(vec!["M1-4,M9-12".into(), "M5-8".into()], vec![300.0, 221.5]).unwrap();
        let pairs: Vec<_> = pattern.iter().collect();
        assert_eq!(pairs, vec![("M1-4,M9-12", 300.0), ("M5-8", 221.5)]);
    }

    #[test]
    fn test_empty_and_mismatch_rejected() {
        assert!(TimePattern::new(vec![], vec![]).is_err());
        assert!(TimePattern::new(vec!["D1".into()], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_duplicate_patterns_rejected() {
        let err = TimePattern::new(vec!["D1".into(), "D1".into()], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::ParameterValueFormat(ref m) if m == "Time pattern \"D1\" appears more than once"));
    }
}
