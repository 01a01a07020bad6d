//! rsiwatch core: price cache synchronization, RSI and breach windows.
//!
//! This crate contains:
//! - Domain types (bars, ordered price series, cache entries, instruments)
//! - Remote providers behind a never-failing source adapter
//! - Cache stores (Parquet on disk, in-memory for tests)
//! - The incremental synchronizer
//! - The indicator engine (business-day closes, RSI, moving averages)
//! - The breach window detector

pub mod breach;
pub mod data;
pub mod domain;
pub mod indicators;

pub use breach::{detect, BreachStatus, BreachWindow, Thresholds};
pub use data::{CacheStore, DataError, PriceSource, ProviderId, SyncOutcome, Synchronizer};
pub use domain::{Bar, CacheEntry, FieldProjection, Instrument, PriceSeries, SeriesOrder};
pub use indicators::{ClosingPriceSeries, IndicatorError, OscillatorSeries};
