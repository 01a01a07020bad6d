//! Yahoo Finance data provider.
//!
//! Fetches daily bars from Yahoo's v8 chart API. The response carries parallel
//! timestamp / quote arrays; the adjusted close, when present, is kept as the
//! `adj_close` auxiliary field. Bar dates are taken in the exchange's local
//! time (`meta.gmtoffset`), not UTC.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::circuit_breaker::CircuitBreaker;
use super::http::HttpFetcher;
use super::provider::{DataError, DataProvider, ProviderId};
use crate::domain::{Bar, PriceSeries};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooProvider {
    http: HttpFetcher,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        Ok(Self {
            http: HttpFetcher::new(ProviderId::Yahoo, circuit_breaker)?,
        })
    }

    /// Build the chart API URL for a symbol and date range.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp() + 86_399;
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }
}

/// Parse a chart API body into a canonical series.
///
/// Rows without a close are skipped (Yahoo emits them for holidays). An empty
/// timestamp list is a valid "no data in range" answer.
pub fn parse_chart(symbol: &str, body: &str) -> Result<PriceSeries, DataError> {
    let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
    })?;

    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => {
            DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
        }
        None => DataError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

    let Some(timestamps) = data.timestamp else {
        return Ok(PriceSeries::empty());
    };

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let at = |v: &[Option<f64>], i: usize| v.get(i).copied().flatten();
    let offset = data.meta.map_or(0, |m| m.gmtoffset);

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = ts
            .checked_add(offset)
            .and_then(|local| chrono::DateTime::from_timestamp(local, 0))
            .map(|dt| dt.date_naive())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

        let Some(close) = at(&quote.close, i) else {
            continue;
        };

        let mut bar = Bar::new(date, close);
        bar.open = at(&quote.open, i);
        bar.high = at(&quote.high, i);
        bar.low = at(&quote.low, i);
        bar.volume = at(&quote.volume, i);
        if let Some(adj) = adj_closes.as_deref().and_then(|v| at(v, i)) {
            bar.set_field("adj_close", adj);
        }
        bars.push(bar);
    }

    Ok(PriceSeries::from_bars(bars))
}

impl DataProvider for YahooProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let url = Self::chart_url(symbol, start, end);
        let body = self.http.get_text(&url, symbol)?;
        parse_chart(symbol, &body)
    }

    fn is_available(&self) -> bool {
        self.http.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{
                        "open":   [187.15, null, 182.15],
                        "high":   [188.44, null, 183.09],
                        "low":    [183.89, null, 180.88],
                        "close":  [185.64, null, 181.91],
                        "volume": [82488700, null, 71983600]
                    }],
                    "adjclose": [{ "adjclose": [184.94, null, 181.22] }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_parallel_arrays_and_skips_holes() {
        let series = parse_chart("AAPL", BODY).unwrap();
        assert_eq!(series.len(), 2);
        let first = &series.bars()[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(first.close, 185.64);
        assert_eq!(first.open, Some(187.15));
        assert_eq!(first.volume, Some(82_488_700.0));
        assert_eq!(first.field("adj_close"), Some(184.94));
        assert_eq!(
            series.latest_date(),
            Some(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap())
        );
    }

    #[test]
    fn dates_follow_exchange_local_time() {
        // ASX sessions open at 10:00 AEDT, 23:00 UTC on the previous day
        let body = r#"{"chart":{"result":[{
            "meta": {"gmtoffset": 39600, "exchangeTimezoneName": "Australia/Sydney"},
            "timestamp": [1704150000, 1704236400],
            "indicators": {"quote": [{"close": [7.5, 7.6]}]}
        }],"error":null}}"#;
        let series = parse_chart("BHP.AX", body).unwrap();
        let dates: Vec<NaiveDate> = series.bars().iter().map(|b| b.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            ]
        );
    }

    #[test]
    fn not_found_maps_to_symbol_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("NOPE", body).unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { ref symbol } if symbol == "NOPE"));
    }

    #[test]
    fn missing_timestamps_mean_no_rows() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse_chart("AAPL", body).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_format_change() {
        let err = parse_chart("AAPL", "<html>").unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn chart_url_spans_whole_end_day() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let url = YahooProvider::chart_url("SAP.DE", start, end);
        assert!(url.contains("chart/SAP.DE?"));
        assert!(url.contains("period1=1704067200"));
        assert!(url.contains("period2=1704239999"));
    }
}
