//! Stooq daily CSV provider.
//!
//! `https://stooq.com/q/d/l/?s=<symbol>&d1=<YYYYMMDD>&d2=<YYYYMMDD>&i=d` answers
//! with `Date,Open,High,Low,Close,Volume` rows, oldest first, or the literal
//! body `No data` when the symbol is unknown.

use super::circuit_breaker::CircuitBreaker;
use super::http::{field_name, HttpFetcher};
use super::provider::{DataError, DataProvider, ProviderId};
use crate::domain::{Bar, PriceSeries};
use chrono::NaiveDate;
use std::sync::Arc;

pub struct StooqProvider {
    http: HttpFetcher,
}

impl StooqProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        Ok(Self {
            http: HttpFetcher::new(ProviderId::Stooq, circuit_breaker)?,
        })
    }

    fn csv_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "https://stooq.com/q/d/l/?s={symbol}&d1={}&d2={}&i=d",
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        )
    }
}

/// Parse a Stooq CSV body into a canonical series.
pub fn parse_csv(symbol: &str, body: &str) -> Result<PriceSeries, DataError> {
    let trimmed = body.trim();
    if trimmed.eq_ignore_ascii_case("no data") {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(trimmed.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DataError::ResponseFormatChanged(format!("{symbol}: bad CSV header: {e}")))?
        .iter()
        .map(field_name)
        .collect();

    let date_idx = headers.iter().position(|h| h == "date");
    let close_idx = headers.iter().position(|h| h == "close");
    let (Some(date_idx), Some(close_idx)) = (date_idx, close_idx) else {
        return Err(DataError::ResponseFormatChanged(format!(
            "{symbol}: expected Date and Close columns, got {headers:?}"
        )));
    };

    let mut bars = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            DataError::ResponseFormatChanged(format!("{symbol}: CSV row {}: {e}", line + 2))
        })?;

        let date = record
            .get(date_idx)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .ok_or_else(|| {
                DataError::ResponseFormatChanged(format!(
                    "{symbol}: unparseable date on row {}",
                    line + 2
                ))
            })?;

        let Some(close) = record.get(close_idx).and_then(|s| s.parse::<f64>().ok()) else {
            continue;
        };

        let mut bar = Bar::new(date, close);
        for (idx, name) in headers.iter().enumerate() {
            if idx == date_idx || idx == close_idx {
                continue;
            }
            if let Some(v) = record.get(idx).and_then(|s| s.parse::<f64>().ok()) {
                bar.set_field(name, v);
            }
        }
        bars.push(bar);
    }

    Ok(PriceSeries::from_bars(bars))
}

impl DataProvider for StooqProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Stooq
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let url = Self::csv_url(symbol, start, end);
        let body = self.http.get_text(&url, symbol)?;
        parse_csv(symbol, &body)
    }

    fn is_available(&self) -> bool {
        self.http.is_available()
    }
}
