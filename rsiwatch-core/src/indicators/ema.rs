//! Exponential Moving Average (EMA).
//!
//! Adjusted exponential weighting with `alpha = 2 / (period + 1)`: each value
//! is the weighted mean of every observation so far, weights `(1 - alpha)^k`
//! for the observation `k` steps back. No SMA seed; the first `period - 1`
//! points are undefined.

use super::DatedSeries;

pub fn ema(closes: &DatedSeries, period: usize) -> DatedSeries {
    let observations: Vec<_> = closes.defined().collect();
    let mut result = vec![None; observations.len()];

    if period >= 1 {
        let decay = 1.0 - 2.0 / (period as f64 + 1.0);
        let mut num = 0.0;
        let mut weight = 0.0;
        for (i, &(_, close)) in observations.iter().enumerate() {
            num = close + decay * num;
            weight = 1.0 + decay * weight;
            if i + 1 >= period {
                result[i] = Some(num / weight);
            }
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
    fn ema_period_1_equals_close() {
        let out = ema(&make_series(&[100.0, 200.0, 300.0]), 1);
        let v: Vec<f64> = out.defined().map(|(_, v)| v).collect();
        assert_eq!(v, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5: weights 1, 0.5, 0.25, ...
        let out = ema(&make_series(&[10.0, 11.0, 12.0, 13.0, 14.0]), 3);
        let v: Vec<_> = out.iter().map(|(_, v)| v).collect();
        assert_eq!(v[0], None);
        assert_eq!(v[1], None);
        assert_approx(v[2].unwrap(), 20.0 / 1.75, DEFAULT_EPSILON);
        assert_approx(v[3].unwrap(), 23.0 / 1.875, DEFAULT_EPSILON);
        assert_approx(v[4].unwrap(), 25.5 / 1.9375, DEFAULT_EPSILON);
    }

    #[test]
    fn early_observations_keep_their_weight() {
        // A jump before the first defined point still pulls the average
        let out = ema(&make_series(&[100.0, 0.0, 0.0, 0.0]), 4);
        let v = out.latest_defined().unwrap().1;
        assert_approx(v, 100.0 * 0.216 / 2.176, DEFAULT_EPSILON);
        assert!(ema(&make_series(&[1.0, 2.0]), 3).latest_defined().is_none());
    }

    #[test]
    fn constant_series_is_flat() {
        let out = ema(&make_series(&[7.5; 12]), 10);
        let v: Vec<f64> = out.defined().map(|(_, v)| v).collect();
        assert_eq!(v.len(), 3);
        for x in v {
            assert_approx(x, 7.5, DEFAULT_EPSILON);
        }
    }
}
