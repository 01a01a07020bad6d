//! Relative Strength Index (RSI).
//!
//! Gains and losses are smoothed with an adjusted exponential mean,
//! `alpha = 1 / (1 + period)` (centre of mass = period). The first smoothed
//! point is seeded with the simple mean of the first `period` gains / losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Edge cases: avg_loss == 0 → RSI = 100; avg_gain == 0 → RSI = 0; both → 50.

use super::{ClosingPriceSeries, IndicatorError, OscillatorSeries};

/// RSI over the defined closes of `closes`.
///
/// The output carries one point per defined input close; the first `period`
/// are undefined.
pub fn rsi(closes: &ClosingPriceSeries, period: usize) -> Result<OscillatorSeries, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::Computation("RSI period must be >= 1".into()));
    }

    let observations: Vec<_> = closes.defined().collect();
    let n = observations.len();
    if n < period + 1 {
        return Err(IndicatorError::InsufficientHistory {
            have: n,
            need: period + 1,
        });
    }

    if let Some((date, value)) = observations.iter().find(|(_, v)| !v.is_finite()) {
        return Err(IndicatorError::Computation(format!(
            "non-finite close {value} on {date}"
        )));
    }

    // Price changes; index 0 has none
    let changes: Vec<f64> = observations.windows(2).map(|w| w[1].1 - w[0].1).collect();
    let gain = |ch: f64| ch.max(0.0);
    let loss = |ch: f64| (-ch).max(0.0);

    // Seed: average gain and average loss over first `period` changes
    let seed_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
    let seed_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;

    let mut values = vec![None; n];
    values[period] = Some(compute_rsi(seed_gain, seed_loss));

    // Adjusted EWM: numerators and the shared weight sum decay together
    let decay = 1.0 - 1.0 / (1.0 + period as f64);
    let mut num_gain = seed_gain;
    let mut num_loss = seed_loss;
    let mut weight = 1.0;
    for i in (period + 1)..n {
        let ch = changes[i - 1];
        num_gain = gain(ch) + decay * num_gain;
        num_loss = loss(ch) + decay * num_loss;
        weight = 1.0 + decay * weight;

        let value = compute_rsi(num_gain / weight, num_loss / weight);
        if !value.is_finite() {
            return Err(IndicatorError::Computation(format!(
                "RSI diverged at {}",
                observations[i].0
            )));
        }
        values[i] = Some(value);
    }

    Ok(OscillatorSeries::new(
        observations
            .iter()
            .zip(values)
            .map(|(&(date, _), v)| (date, v))
            .collect(),
    ))
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
