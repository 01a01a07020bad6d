//! Breach Window Detector.
//!
//! Classifies the latest oscillator value against `[min, max]` and finds where
//! the current breach began: one day after the most recent in-bounds value.
//! Only the uninterrupted run reaching the latest value counts; earlier
//! breaches in the lookback window are ignored.

use crate::indicators::OscillatorSeries;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min: f64,
    pub max: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min: 30.0,
            max: 70.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreachStatus {
    Below,
    Above,
    Within,
}

impl BreachStatus {
    pub fn is_breach(self) -> bool {
        self != BreachStatus::Within
    }
}

impl Thresholds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Strict comparison: a value equal to a bound is within.
    pub fn classify(&self, value: f64) -> BreachStatus {
        if value < self.min {
            BreachStatus::Below
        } else if value > self.max {
            BreachStatus::Above
        } else {
            BreachStatus::Within
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }
}

/// Latest oscillator reading and, when breaching, where the breach began.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreachWindow {
    pub date: NaiveDate,
    pub value: f64,
    pub status: BreachStatus,
    /// First date of the current breach. `None` when within bounds.
    pub since: Option<NaiveDate>,
}

impl BreachWindow {
    pub fn is_breach(&self) -> bool {
        self.status.is_breach()
    }
}

/// `None` when the oscillator has no defined value.
pub fn detect(oscillator: &OscillatorSeries, thresholds: &Thresholds) -> Option<BreachWindow> {
    let (date, value) = oscillator.latest_defined()?;
    let status = thresholds.classify(value);

    let since = status.is_breach().then(|| {
        oscillator
            .defined()
            .rev()
            .find(|&(_, v)| !thresholds.classify(v).is_breach())
            .map(|(in_bounds, _)| in_bounds + Duration::days(1))
            .or_else(|| oscillator.defined().next().map(|(d, _)| d))
            .unwrap_or(date)
    });

    Some(BreachWindow {
        date,
        value,
        status,
        since,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::DatedSeries;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn osc(values: &[(u32, f64)]) -> OscillatorSeries {
        DatedSeries::new(values.iter().map(|&(day, v)| (d(day), Some(v))).collect())
    }

    #[test]
    fn classify_is_strict() {
        let t = Thresholds::default();
        assert_eq!(t.classify(29.9), BreachStatus::Below);
        assert_eq!(t.classify(30.0), BreachStatus::Within);
        assert_eq!(t.classify(70.0), BreachStatus::Within);
        assert_eq!(t.classify(70.1), BreachStatus::Above);
    }

    #[test]
    fn breach_starts_after_last_in_bounds_value() {
        let window = detect(
            &osc(&[(5, 72.0), (6, 75.0), (7, 68.0), (8, 80.0), (9, 85.0)]),
            &Thresholds::new(30.0, 70.0),
        )
        .unwrap();
        assert_eq!(window.value, 85.0);
        assert_eq!(window.status, BreachStatus::Above);
        assert_eq!(window.since, Some(d(8)));
    }

    #[test]
    fn within_bounds_has_no_start() {
        let window = detect(&osc(&[(1, 80.0), (2, 50.0)]), &Thresholds::default()).unwrap();
        assert!(!window.is_breach());
        assert_eq!(window.since, None);
    }

    #[test]
    fn never_in_bounds_starts_at_first_value() {
        let window = detect(&osc(&[(3, 10.0), (4, 12.0), (5, 8.0)]), &Thresholds::default()).unwrap();
        assert_eq!(window.status, BreachStatus::Below);
        assert_eq!(window.since, Some(d(3)));
    }

    #[test]
    fn undefined_values_are_ignored() {
        let series = DatedSeries::new(vec![(d(1), None), (d(2), Some(50.0)), (d(3), Some(90.0))]);
        let window = detect(&series, &Thresholds::default()).unwrap();
        assert_eq!(window.since, Some(d(3)));
        assert!(detect(&DatedSeries::new(vec![(d(1), None)]), &Thresholds::default()).is_none());
    }

    #[test]
    fn thresholds_validity() {
        assert!(Thresholds::default().is_valid());
        assert!(!Thresholds::new(70.0, 30.0).is_valid());
        assert!(!Thresholds::new(f64::NAN, 30.0).is_valid());
    }
}
