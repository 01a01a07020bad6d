//! Incremental cache synchronizer.
//!
//! Reconciles the cached series for one symbol with the remote source:
//! an unseen symbol is seeded from a full-range fetch, a stale one gets only
//! its missing tail (with an overlap so late corrections replace preliminary
//! values), and an up-to-date one is returned without touching the network or
//! the store.

use super::source::PriceSource;
use super::store::CacheStore;
use crate::domain::{CacheEntry, FieldProjection, PriceSeries};
use chrono::{Duration, NaiveDate};

/// What the synchronizer did to obtain the returned series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// No usable cache entry; the full range was fetched.
    Seeded,
    /// Cache already reaches the desired end; nothing fetched.
    UpToDate,
    /// Gap fetched and merged into the cached series.
    Extended,
    /// Gap fetch returned nothing the cache did not already hold.
    NothingNew,
    /// No cache and the remote returned nothing.
    Unavailable,
}

/// Whether the store was updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    Written(usize),
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    /// Ascending series covering what is known for the symbol.
    pub series: PriceSeries,
    pub action: SyncAction,
    pub persisted: Persisted,
}

/// Synchronizer bound to one store and one source.
pub struct Synchronizer<'a> {
    store: &'a dyn CacheStore,
    source: &'a dyn PriceSource,
    projection: FieldProjection,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        store: &'a dyn CacheStore,
        source: &'a dyn PriceSource,
        projection: FieldProjection,
    ) -> Self {
        Self {
            store,
            source,
            projection,
        }
    }

    /// Bring `symbol` up to `end`, seeding the cache from `start` if needed.
    pub fn synchronize(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> SyncOutcome {
        let Some(cached) = self.read_cached(symbol) else {
            return self.seed(symbol, start, end);
        };

        let cached = cached.to_descending();
        let Some(last_cached) = cached.latest_date() else {
            return self.seed(symbol, start, end);
        };

        let gap = (end - last_cached).num_days();
        if gap <= 1 {
            tracing::debug!(symbol, %last_cached, %end, gap, "cache up to date");
            return SyncOutcome {
                series: cached.to_ascending(),
                action: SyncAction::UpToDate,
                persisted: Persisted::Skipped,
            };
        }

        // Clamp to the requested start when the overlap runs off the calendar
        let fetch_start = last_cached
            .checked_sub_signed(Duration::days(gap - 1))
            .unwrap_or(start.min(last_cached));
        let fresh = self.source.fetch(symbol, fetch_start, end).to_ascending();
        if fresh.is_empty() {
            tracing::debug!(symbol, %fetch_start, %end, "gap fetch returned no rows");
            return SyncOutcome {
                series: cached.to_ascending(),
                action: SyncAction::NothingNew,
                persisted: Persisted::Skipped,
            };
        }

        let fetched = fresh.len();
        let before = CacheEntry::project(&cached, &self.projection);
        let merged = cached.merge_preferring(fresh);
        let entry = CacheEntry::project(&merged, &self.projection);
        if entry == before {
            tracing::debug!(symbol, %fetch_start, %end, fetched, "gap fetch matched the cache");
            return SyncOutcome {
                series: merged,
                action: SyncAction::NothingNew,
                persisted: Persisted::Skipped,
            };
        }

        tracing::debug!(
            symbol,
            %fetch_start,
            %end,
            fetched,
            rows = merged.len(),
            "gap merged"
        );
        let persisted = self.persist(symbol, entry);
        SyncOutcome {
            series: merged,
            action: SyncAction::Extended,
            persisted,
        }
    }

    /// Cached series, or `None` for absent, empty or unreadable entries.
    fn read_cached(&self, symbol: &str) -> Option<PriceSeries> {
        match self.store.read(symbol) {
            Ok(Some(entry)) if !entry.is_empty() => Some(entry.into_series()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    symbol,
                    store = self.store.name(),
                    error = %e,
                    "cache unreadable, reseeding"
                );
                None
            }
        }
    }

    fn seed(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> SyncOutcome {
        let series = self.source.fetch(symbol, start, end).to_ascending();
        if series.is_empty() {
            return SyncOutcome {
                series,
                action: SyncAction::Unavailable,
                persisted: Persisted::Skipped,
            };
        }
        tracing::debug!(symbol, %start, %end, rows = series.len(), "seeding cache");
        let persisted = self.persist(symbol, CacheEntry::project(&series, &self.projection));
        SyncOutcome {
            series,
            action: SyncAction::Seeded,
            persisted,
        }
    }

    fn persist(&self, symbol: &str, entry: CacheEntry) -> Persisted {
        match self.store.write(symbol, &entry) {
            Ok(()) => Persisted::Written(entry.len()),
            Err(e) => {
                tracing::warn!(
                    symbol,
                    store = self.store.name(),
                    error = %e,
                    "cache write failed"
                );
                Persisted::Failed(e.to_string())
            }
        }
    }
}
