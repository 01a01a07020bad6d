//! Cache Store contract and the in-memory implementation.
//!
//! One store instance belongs to one evaluation worker. Stores are keyed by a
//! filesystem-safe transform of the symbol, see [`cache_key`].

use super::provider::DataError;
use crate::domain::CacheEntry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Persisted per-symbol series.
///
/// `write` replaces the whole entry. `read` returns `Ok(None)` for a symbol
/// that has never been written.
pub trait CacheStore: Send {
    fn read(&self, symbol: &str) -> Result<Option<CacheEntry>, DataError>;

    fn write(&self, symbol: &str, entry: &CacheEntry) -> Result<(), DataError>;

    /// Human-readable store name (group) for logs.
    fn name(&self) -> &str;
}

/// Filesystem-safe key for a provider-namespaced symbol.
///
/// Path separators are removed: `FSE/BAS_X` → `FSEBAS_X`.
pub fn cache_key(symbol: &str) -> String {
    symbol
        .trim()
        .chars()
        .filter(|c| *c != '/' && *c != '\\')
        .collect()
}

/// Volatile store for tests and dry runs. Counts writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    entries: Mutex<HashMap<String, CacheEntry>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Pre-populate an entry without counting it as a write.
    pub fn with_entry(self, symbol: &str, entry: CacheEntry) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key(symbol), entry);
        self
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of an entry.
    pub fn get(&self, symbol: &str) -> Option<CacheEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key(symbol))
            .cloned()
    }
}

impl CacheStore for MemoryStore {
    fn read(&self, symbol: &str) -> Result<Option<CacheEntry>, DataError> {
        Ok(self.get(symbol))
    }

    fn write(&self, symbol: &str, entry: &CacheEntry) -> Result<(), DataError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key(symbol), entry.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
