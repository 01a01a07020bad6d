//! Simple Moving Average (SMA).
//!
//! Rolling mean over the last `period` defined values.
//! Lookback: period - 1 (first valid value at index period-1).

use super::DatedSeries;

pub fn sma(closes: &DatedSeries, period: usize) -> DatedSeries {
    let observations: Vec<_> = closes.defined().collect();
    let n = observations.len();
    let mut result = vec![None; n];

    if period >= 1 && n >= period {
        let mut sum: f64 = observations[..period].iter().map(|(_, v)| v).sum();
        result[period - 1] = Some(sum / period as f64);

        // Roll the window forward
        for i in period..n {
            sum += observations[i].1 - observations[i - period].1;
            result[i] = Some(sum / period as f64);
        }
    }

    DatedSeries::new(
        observations
            .iter()
            .zip(result)
            .map(|(&(date, _), v)| (date, v))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_series, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let out = sma(&make_series(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]), 5);
        let v: Vec<_> = out.iter().map(|(_, v)| v).collect();

        assert_eq!(v.len(), 7);
        assert!(v[..4].iter().all(Option::is_none));
        assert_approx(v[4].unwrap(), 12.0, DEFAULT_EPSILON);
        assert_approx(v[5].unwrap(), 13.0, DEFAULT_EPSILON);
        assert_approx(v[6].unwrap(), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_too_few_values() {
        let out = sma(&make_series(&[10.0, 11.0]), 5);
        assert_eq!(out.defined_count(), 0);
    }
}
