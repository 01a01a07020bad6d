//! Indicator Engine.
//!
//! Everything here works on [`DatedSeries`]: one optional value per date,
//! `None` meaning "not defined yet" (start of history, indicator warm-up).
//! The closing-price view is built by [`closing_prices`]; the oscillator by
//! [`rsi`]. `sma` and `ema` are auxiliary averages for report annotations.

pub mod closing;
pub mod ema;
pub mod rsi;
pub mod sma;

pub use closing::{business_days, closing_prices};
pub use ema::ema;
pub use rsi::rsi;
pub use sma::sma;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("insufficient history: have {have} observations, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("indicator computation failed: {0}")]
    Computation(String),
}

/// Ascending date → optional value mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatedSeries {
    points: Vec<(NaiveDate, Option<f64>)>,
}

/// Business-day, forward-filled closing prices.
pub type ClosingPriceSeries = DatedSeries;

/// RSI values in `[0, 100]`, undefined during warm-up.
pub type OscillatorSeries = DatedSeries;

impl DatedSeries {
    /// Build from points in any order; later duplicates of a date are dropped.
    pub fn new(mut points: Vec<(NaiveDate, Option<f64>)>) -> Self {
        points.sort_by_key(|(d, _)| *d);
        points.dedup_by_key(|(d, _)| *d);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(NaiveDate, Option<f64>)] {
        &self.points
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.points.iter().copied()
    }

    /// Only the dates with a value, ascending.
    pub fn defined(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().filter_map(|&(d, v)| v.map(|v| (d, v)))
    }

    pub fn defined_count(&self) -> usize {
        self.points.iter().filter(|(_, v)| v.is_some()).count()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by(|(d, _)| d.cmp(&date))
            .ok()
            .and_then(|i| self.points[i].1)
    }

    /// Most recent defined value.
    pub fn latest_defined(&self) -> Option<(NaiveDate, f64)> {
        self.defined().next_back()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|(d, _)| *d)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(d, _)| *d)
    }
}

/// Consecutive-day series from plain values, for tests.
#[cfg(test)]
pub fn make_series(values: &[f64]) -> DatedSeries {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    DatedSeries::new(
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (base + chrono::Duration::days(i as i64), Some(v)))
            .collect(),
    )
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
