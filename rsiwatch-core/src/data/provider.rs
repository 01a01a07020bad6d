//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over remote sources (Quandl, Stooq, Yahoo
//! Finance) so we can swap implementations and mock for tests. Providers are
//! fallible; [`super::source::RemoteSource`] turns their errors into empty
//! series for the synchronizer.

use crate::domain::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("data error: {0}")]
    Other(String),
}

/// The remote providers rsiwatch knows how to talk to.
///
/// Adding a provider means adding a variant here and a `DataProvider`
/// implementation; nothing dispatches on provider name strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Quandl / Nasdaq Data Link dataset API (JSON, newest first).
    Quandl,
    /// Stooq daily CSV download (oldest first).
    Stooq,
    /// Yahoo Finance v8 chart API (parallel arrays).
    Yahoo,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Quandl, ProviderId::Stooq, ProviderId::Yahoo];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Quandl => "quandl",
            ProviderId::Stooq => "stooq",
            ProviderId::Yahoo => "yahoo",
        }
    }

    /// Build the provider-namespaced symbol for a raw ticker code.
    ///
    /// Stooq symbols are lower-case by convention; the others keep the code
    /// as written in the instrument list.
    pub fn symbol_for(&self, code: &str, prefix: &str, suffix: &str) -> String {
        let code = code.trim();
        match self {
            ProviderId::Stooq => format!("{prefix}{code}{suffix}").to_lowercase(),
            ProviderId::Quandl | ProviderId::Yahoo => format!("{prefix}{code}{suffix}"),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DataError::Other(format!("unknown provider '{s}'")))
    }
}

/// Trait for data providers.
///
/// Implementations handle the specifics of fetching data from a particular
/// source and return bars in canonical (ascending) order. The cache layer sits
/// above this trait; providers don't know about the cache.
pub trait DataProvider: Send + Sync {
    /// Which provider this is.
    fn id(&self) -> ProviderId;

    fn name(&self) -> &'static str {
        self.id().as_str()
    }

    /// Fetch daily bars for a symbol over an inclusive date range.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<PriceSeries, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}
