//! Fixed and variable resolution time series.

use chrono::NaiveDateTime;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use super::date_time::format_naive;
use super::duration::{Duration, RelativeDelta};
use super::value::IndexedValue;
use crate::{Error, Result};

fn check_length(values: &[f64]) -> Result<()> {
    if values.len() < 2 {
        return Err(Error::ParameterValueFormat(
            "Time series too short. Must have two or more values".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// Fixed resolution
// ============================================================================

/// A series whose stamps are generated from a start and a cyclic list of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesFixedResolution {
    start: NaiveDateTime,
    resolution: Duration,
    values: Vec<f64>,
    ignore_year: bool,
    repeat: bool,
}

impl TimeSeriesFixedResolution {
    pub fn new(
        start: NaiveDateTime,
        resolution: Duration,
        values: Vec<f64>,
        ignore_year: bool,
        repeat: bool,
    ) -> Result<Self> {
        check_length(&values)?;
        Ok(Self { start, resolution, values, ignore_year, repeat })
    }

    pub fn start(&self) -> NaiveDateTime { self.start }
    pub fn resolution(&self) -> &Duration { &self.resolution }
    pub fn ignore_year(&self) -> bool { self.ignore_year }
    pub fn repeat(&self) -> bool { self.repeat }

    pub fn set_ignore_year(&mut self, ignore_year: bool) { self.ignore_year = ignore_year; }
    pub fn set_repeat(&mut self, repeat: bool) { self.repeat = repeat; }

    /// Time stamps, one per value.
    ///
    /// The first stamp is `start`. Stamp `i` (for `i >= 1`) adds
    /// `cycle * sum(resolution) + sum(resolution[..=step])` to `start` where
    /// `cycle, step = divmod(i - 1, resolution.len())`. Offsets are always
    /// measured from `start`, so month clamping never accumulates.
    pub fn indexes(&self) -> Result<Vec<NaiveDateTime>> {
        let steps = self.resolution.steps();
        let out_of_range =
            |position: usize| Error::ParameterValueFormat(format!("Time stamp {position} of the series is out of range"));
        let full_cycle = RelativeDelta::checked_sum(steps);
        let mut stamps = Vec::with_capacity(self.values.len());
        stamps.push(self.start);
        for position in 1..self.values.len() {
            let (cycle, step) = ((position - 1) / steps.len(), (position - 1) % steps.len());
            let offset = i64::try_from(cycle)
                .ok()
                .zip(full_cycle)
                .and_then(|(cycle, full_cycle)| full_cycle.checked_mul(cycle))
                .zip(RelativeDelta::checked_sum(&steps[..=step]))
                .and_then(|(whole, partial)| whole.checked_add(partial));
            let stamp = offset
                .and_then(|offset| offset.add_to(self.start))
                .ok_or_else(|| out_of_range(position))?;
            stamps.push(stamp);
        }
        Ok(stamps)
    }
}

impl IndexedValue for TimeSeriesFixedResolution {
    type Item = f64;

    fn values(&self) -> &[f64] { &self.values }
}

// ============================================================================
// Variable resolution
// ============================================================================

/// A series with explicit stamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesVariableResolution {
    indexes: Vec<NaiveDateTime>,
    values: Vec<f64>,
    ignore_year: bool,
    repeat: bool,
}

impl TimeSeriesVariableResolution {
    pub fn new(indexes: Vec<NaiveDateTime>, values: Vec<f64>, ignore_year: bool, repeat: bool) -> Result<Self> {
        check_length(&values)?;
        if indexes.len() != values.len() {
            return Err(Error::ParameterValueFormat(
                "Length of values does not match length of indexes".into(),
            ));
        }
        let mut seen = HashSet::with_capacity(indexes.len());
        if let Some(stamp) = indexes.iter().find(|stamp| !seen.insert(**stamp)) {
            return Err(Error::ParameterValueFormat(format!(
                "Time stamp \"{}\" appears more than once",
                format_naive(stamp, 'T')
            )));
        }
        Ok(Self { indexes, values, ignore_year, repeat })
    }

    pub fn indexes(&self) -> &[NaiveDateTime] { &self.indexes }
    pub fn ignore_year(&self) -> bool { self.ignore_year }
    pub fn repeat(&self) -> bool { self.repeat }

    pub fn set_ignore_year(&mut self, ignore_year: bool) { self.ignore_year = ignore_year; }
    pub fn set_repeat(&mut self, repeat: bool) { self.repeat = repeat; }
}

impl IndexedValue for TimeSeriesVariableResolution {
    type Item = f64;

    fn values(&self) -> &[f64] { &self.values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_cyclic_resolution_indexes() {
        let resolution = Duration::new([RelativeDelta::days(1), RelativeDelta::months(1)]).unwrap();
        let series =
            TimeSeriesFixedResolution::new(date(2019, 1, 31), resolution, vec![1.0, 2.0, 3.0, 4.0], false, false)
                .unwrap();
        assert_eq!(
            series.indexes().unwrap(),
            vec![date(2019, 1, 31), date(2019, 2, 1), date(2019, 3, 1), date(2019, 3, 2)]
        );
    }

    #[test]
    fn test_month_resolution_does_not_drift() {
        let resolution = Duration::parse("1M").unwrap();
        let series =
            TimeSeriesFixedResolution::new(date(2020, 1, 31), resolution, vec![0.0; 4], false, false).unwrap();
        assert_eq!(
            series.indexes().unwrap(),
            vec![date(2020, 1, 31), date(2020, 2, 29), date(2020, 3, 31), date(2020, 4, 30)]
        );
    }

    #[test]
    fn test_too_short_rejected() {
        let resolution = Duration::parse("1h").unwrap();
        assert!(TimeSeriesFixedResolution::new(date(2020, 1, 1), resolution, vec![1.0], false, false).is_err());
        assert!(TimeSeriesVariableResolution::new(vec![date(2020, 1, 1)], vec![1.0], false, false).is_err());
    }

    #[test]
    fn test_variable_length_mismatch() {
        let err = TimeSeriesVariableResolution::new(
            vec![date(2020, 1, 1), date(2020, 1, 2), date(2020, 1, 3)],
            vec![1.0, 2.0],
            false,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_duplicate_stamps_rejected() {
        let stamp = date(2020, 1, 1);
        let err = TimeSeriesVariableResolution::new(vec![stamp, stamp, stamp], vec![1.0, 2.0, 3.0], false, false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter value format error: Time stamp \"2020-01-01T00:00:00\" appears more than once"
        );
    }

    #[test]
    fn test_flag_setters() {
        let mut series =
            TimeSeriesVariableResolution::new(vec![date(2020, 1, 1), date(2020, 1, 2)], vec![1.0, 2.0], false, false)
                .unwrap();
        series.set_ignore_year(true);
        series.set_repeat(true);
        assert!(series.ignore_year() && series.repeat());
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_overflowing_resolution_is_an_error() {
        let step = RelativeDelta::days(i64::MAX);
        let series = TimeSeriesFixedResolution::new(
            date(2020, 1, 1),
            Duration::new([step, step]).unwrap(),
            vec![1.0, 2.0, 3.0, 4.0],
            false,
            false,
        )
        .unwrap();
        let err = series.indexes().unwrap_err();
        assert!(matches!(err, Error::ParameterValueFormat(ref m) if m.contains("out of range")), "{err}");
    }

    #[test]
    fn test_out_of_range_year_steps_are_an_error() {
        let series = TimeSeriesFixedResolution::new(
            date(2020, 1, 1),
            Duration::new([RelativeDelta::years(i64::MAX / 2)]).unwrap(),
            vec![0.0; 4],
            false,
            false,
        )
        .unwrap();
        assert!(series.indexes().is_err());
    }

    proptest! {
        #[test]
        fn prop_hourly_indexes_are_evenly_spaced(hours in 1i64..48, count in 2usize..40) {
            let resolution = Duration::new([RelativeDelta::hours(hours)]).unwrap();
            let series = TimeSeriesFixedResolution::new(date(2000, 1, 1), resolution, vec![0.0; count], false, false).unwrap();
            let stamps = series.indexes().unwrap();
            prop_assert_eq!(stamps.len(), count);
            for pair in stamps.windows(2) {
                prop_assert_eq!((pair[1] - pair[0]).num_hours(), hours);
            }
        }
    }
}
