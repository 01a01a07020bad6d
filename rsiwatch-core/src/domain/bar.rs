//! Bar: one dated price record for an instrument.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Daily bar for a single instrument.
///
/// Only `close` is mandatory. Providers differ in what else they deliver, so the
/// OHLV fields are optional and anything provider-specific (turnover, change,
/// adjusted close, ...) lives in `extra` under a snake_case name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, f64>,
}

impl Bar {
    /// A bar carrying only a closing price.
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
            extra: BTreeMap::new(),
        }
    }

    /// Builder-style setter for any named field.
    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        self.set_field(name, value);
        self
    }

    /// Set a field by name. Known OHLCV names map onto the typed fields,
    /// everything else goes into `extra`.
    pub fn set_field(&mut self, name: &str, value: f64) {
        match name {
            "close" => self.close = value,
            "open" => self.open = Some(value),
            "high" => self.high = Some(value),
            "low" => self.low = Some(value),
            "volume" => self.volume = Some(value),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            "close" => Some(self.close),
            "open" => self.open,
            "high" => self.high,
            "low" => self.low,
            "volume" => self.volume,
            other => self.extra.get(other).copied(),
        }
    }

    /// A bar without a usable closing price.
    pub fn is_void(&self) -> bool {
        !self.close.is_finite()
    }
}
