//! Quandl / Nasdaq Data Link dataset provider.
//!
//! The dataset API answers with a column-name header and row arrays, newest
//! row first. Column labels vary per database (`Close`, `Last`, `Settle`) and
//! many carry exchange-specific metrics such as `Traded Volume` or `Turnover`,
//! which end up in `Bar::extra` under snake_case names.

use super::circuit_breaker::CircuitBreaker;
use super::http::{field_name, HttpFetcher};
use super::provider::{DataError, DataProvider, ProviderId};
use crate::domain::{Bar, PriceSeries};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const BASE_URL: &str = "https://data.nasdaq.com/api/v3/datasets";

/// Labels accepted as the closing price, in order of preference.
const CLOSE_LABELS: [&str; 4] = ["close", "last", "settle", "value"];

#[derive(Debug, Deserialize)]
struct DatasetResponse {
    dataset_data: DatasetData,
}

#[derive(Debug, Deserialize)]
struct DatasetData {
    column_names: Vec<String>,
    data: Vec<Vec<Value>>,
}

pub struct QuandlProvider {
    http: HttpFetcher,
    api_key: Option<String>,
}

impl QuandlProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, api_key: Option<String>) -> Result<Self, DataError> {
        Ok(Self {
            http: HttpFetcher::new(ProviderId::Quandl, circuit_breaker)?,
            api_key,
        })
    }

    fn dataset_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let mut url = format!(
            "{BASE_URL}/{symbol}/data.json?start_date={}&end_date={}&order=desc",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        );
        if let Some(key) = &self.api_key {
            url.push_str("&api_key=");
            url.push_str(key);
        }
        url
    }
}

/// Parse a dataset `data.json` body into a canonical (ascending) series.
pub fn parse_dataset(symbol: &str, body: &str) -> Result<PriceSeries, DataError> {
    let resp: DatasetResponse = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("failed to parse dataset for {symbol}: {e}"))
    })?;

    let columns: Vec<String> = resp
        .dataset_data
        .column_names
        .iter()
        .map(|c| field_name(c))
        .collect();

    let date_idx = columns
        .iter()
        .position(|c| c == "date")
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("{symbol}: no Date column")))?;

    let close_idx = CLOSE_LABELS
        .iter()
        .find_map(|label| columns.iter().position(|c| c == label))
        .ok_or_else(|| {
            DataError::ResponseFormatChanged(format!(
                "{symbol}: no closing price column in {columns:?}"
            ))
        })?;

    let mut bars = Vec::with_capacity(resp.dataset_data.data.len());
    for row in &resp.dataset_data.data {
        let date = row
            .get(date_idx)
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("{symbol}: unparseable date in {row:?}"))
            })?;

        let Some(close) = row.get(close_idx).and_then(Value::as_f64) else {
            continue;
        };

        let mut bar = Bar::new(date, close);
        for (idx, name) in columns.iter().enumerate() {
            if idx == date_idx || idx == close_idx {
                continue;
            }
            if let Some(v) = row.get(idx).and_then(Value::as_f64) {
                bar.set_field(name, v);
            }
        }
        bars.push(bar);
    }

    Ok(PriceSeries::from_bars(bars))
}

impl DataProvider for QuandlProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Quandl
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        if self.api_key.is_none() {
            tracing::debug!(symbol, "querying quandl without an API key");
        }
        let url = self.dataset_url(symbol, start, end);
        let body = self.http.get_text(&url, symbol)?;
        parse_dataset(symbol, &body)
    }

    fn is_available(&self) -> bool {
        self.http.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    const FSE_BODY: &str = r#"{
        "dataset_data": {
            "limit": null,
            "transform": null,
            "column_names": ["Date", "Open", "High", "Low", "Close", "Change",
                             "Traded Volume", "Turnover", "Last Price of the Day",
                             "Daily Traded Units", "Daily Turnover"],
            "start_date": "2024-01-03",
            "end_date": "2024-01-05",
            "frequency": "daily",
            "data": [
                ["2024-01-05", 43.1, 43.9, 42.8, 43.5, null, 2914022.0, 126593843.0, null, null, null],
                ["2024-01-04", 42.7, 43.3, 42.5, 43.0, null, 2702331.0, 116193002.0, null, null, null],
                ["2024-01-03", 42.9, 43.0, 42.1, 42.6, null, 3011200.0, 128337510.0, null, null, null]
            ]
        }
    }"#;

    #[test]
    fn newest_first_rows_become_ascending() {
        let series = parse_dataset("FSE/BAS_X", FSE_BODY).unwrap();
        assert_eq!(series.len(), 3);
        assert!(series.is_well_ordered());
        assert_eq!(series.earliest_date(), Some(d(3)));
        assert_eq!(series.latest().unwrap().close, 43.5);
    }

    #[test]
    fn provider_specific_columns_land_in_extra() {
        let series = parse_dataset("FSE/BAS_X", FSE_BODY).unwrap();
        let bar = series.get(d(4)).unwrap();
        assert_eq!(bar.open, Some(42.7));
        assert_eq!(bar.field("traded_volume"), Some(2_702_331.0));
        assert_eq!(bar.field("turnover"), Some(116_193_002.0));
        assert_eq!(bar.field("change"), None);
    }

    #[test]
    fn falls_back_to_last_or_settle() {
        let body = r#"{"dataset_data":{"column_names":["Date","Settle"],
            "data":[["2024-01-02", 10.5],["2024-01-01", null]]}}"#;
        let series = parse_dataset("CHRIS/CME_CL1", body).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars()[0].close, 10.5);
    }

    #[test]
    fn missing_close_column_is_format_change() {
        let body = r#"{"dataset_data":{"column_names":["Date","Open"],"data":[]}}"#;
        assert!(matches!(
            parse_dataset("X/Y", body),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn empty_range_is_empty_series() {
        let body = r#"{"dataset_data":{"column_names":["Date","Close"],"data":[]}}"#;
        assert!(parse_dataset("X/Y", body).unwrap().is_empty());
    }
}
