//! Remote providers, the cache store and the synchronizer that ties them together.

pub mod cache;
pub mod circuit_breaker;
pub mod http;
pub mod provider;
pub mod quandl;
pub mod schema;
pub mod source;
pub mod stooq;
pub mod store;
pub mod sync;
pub mod yahoo;

pub use cache::{CacheMeta, CacheStatus, ParquetStore};
pub use circuit_breaker::CircuitBreaker;
pub use provider::{DataError, DataProvider, ProviderId};
pub use source::{PriceSource, RemoteSource};
pub use store::{cache_key, CacheStore, MemoryStore};
pub use sync::{Persisted, SyncAction, SyncOutcome, Synchronizer};
