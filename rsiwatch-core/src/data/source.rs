//! The Remote Source Adapter: a fetch that never fails.
//!
//! Provider errors stop here. They are logged with the symbol and the provider
//! and turned into an empty series, which the synchronizer reads as "no new
//! data this run".

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider, ProviderId};
use super::quandl::QuandlProvider;
use super::stooq::StooqProvider;
use super::yahoo::YahooProvider;
use crate::domain::PriceSeries;
use chrono::NaiveDate;
use std::sync::Arc;

/// Source of price bars as seen by the synchronizer.
pub trait PriceSource: Send + Sync {
    /// Bars for `symbol` over `[start, end]`, ascending. Empty on any failure.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> PriceSeries;

    fn provider(&self) -> ProviderId;
}

/// Wraps one concrete provider behind the infallible [`PriceSource`] contract.
pub struct RemoteSource {
    provider: Box<dyn DataProvider>,
}

impl RemoteSource {
    pub fn new(provider: Box<dyn DataProvider>) -> Self {
        Self { provider }
    }

    /// Build the HTTP-backed source for a provider id.
    pub fn connect(id: ProviderId, api_key: Option<String>) -> Result<Self, DataError> {
        let breaker = Arc::new(CircuitBreaker::default_provider(id.as_str()));
        let provider: Box<dyn DataProvider> = match id {
            ProviderId::Quandl => Box::new(QuandlProvider::new(breaker, api_key)?),
            ProviderId::Stooq => Box::new(StooqProvider::new(breaker)?),
            ProviderId::Yahoo => Box::new(YahooProvider::new(breaker)?),
        };
        Ok(Self::new(provider))
    }
}

impl PriceSource for RemoteSource {
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        if start > end {
            tracing::debug!(symbol, %start, %end, "empty fetch window");
            return PriceSeries::empty();
        }

        match self.provider.fetch(symbol, start, end) {
            Ok(series) => {
                let series = PriceSeries::from_bars(series.into_bars());
                tracing::debug!(
                    symbol,
                    provider = self.provider.name(),
                    rows = series.len(),
                    %start,
                    %end,
                    "fetched"
                );
                series
            }
            Err(e) => {
                tracing::warn!(
                    symbol,
                    provider = self.provider.name(),
                    %start,
                    %end,
                    error = %e,
                    "fetch failed, treating as no new data"
                );
                PriceSeries::empty()
            }
        }
    }

    fn provider(&self) -> ProviderId {
        self.provider.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;

    struct Scripted {
        result: fn() -> Result<PriceSeries, DataError>,
    }

    impl DataProvider for Scripted {
        fn id(&self) -> ProviderId {
            ProviderId::Stooq
        }

        fn fetch(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<PriceSeries, DataError> {
            (self.result)()
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn errors_become_empty_series() {
        let source = RemoteSource::new(Box::new(Scripted {
            result: || Err(DataError::RateLimited { retry_after_secs: 5 }),
        }));
        assert!(source.fetch("sap.de", d(1), d(5)).is_empty());
        assert_eq!(source.provider(), ProviderId::Stooq);
    }

    #[test]
    fn descending_results_are_normalized() {
        let source = RemoteSource::new(Box::new(Scripted {
            result: || {
                Ok(PriceSeries::from_bars(vec![Bar::new(d(2), 2.0), Bar::new(d(3), 3.0)])
                    .to_descending())
            },
        }));
        let series = source.fetch("sap.de", d(1), d(5));
        assert_eq!(series.bars()[0].date, d(2));
        assert!(series.is_well_ordered());
    }

    #[test]
    fn inverted_window_skips_provider() {
        let source = RemoteSource::new(Box::new(Scripted {
            result: || panic!("provider must not be called"),
        }));
        assert!(source.fetch("sap.de", d(5), d(1)).is_empty());
    }
}
