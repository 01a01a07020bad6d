//! Synchronizer scenarios against an in-memory store and a recording source.

use chrono::NaiveDate;
use rsiwatch_core::data::{
    MemoryStore, ParquetStore, Persisted, PriceSource, ProviderId, SyncAction, Synchronizer,
};
use rsiwatch_core::{Bar, CacheEntry, CacheStore, FieldProjection, PriceSeries};
use std::sync::Mutex;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

/// Serves a fixed series clipped to the requested window and records calls.
struct RecordingSource {
    remote: PriceSeries,
    calls: Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

impl RecordingSource {
    fn new(bars: Vec<Bar>) -> Self {
        Self {
            remote: PriceSeries::from_bars(bars),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PriceSource for RecordingSource {
    fn fetch(&self, _symbol: &str, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        self.calls.lock().unwrap().push((start, end));
        let bars = self
            .remote
            .bars()
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect();
        // Return newest-first, as some providers do
        PriceSeries::from_bars(bars).to_descending()
    }

    fn provider(&self) -> ProviderId {
        ProviderId::Quandl
    }
}

fn cached_through(last_day: u32) -> CacheEntry {
    CacheEntry {
        bars: (1..=last_day).map(|day| Bar::new(d(day), f64::from(day))).collect(),
    }
}

#[test]
fn no_gap_means_no_fetch_and_no_write() {
    let store = MemoryStore::new("quandl").with_entry("FSE/BAS_X", cached_through(10));
    let source = RecordingSource::new(vec![Bar::new(d(10), 999.0)]);
    let sync = Synchronizer::new(&store, &source, FieldProjection::default());

    let out = sync.synchronize("FSE/BAS_X", d(1), d(10));

    assert_eq!(out.action, SyncAction::UpToDate);
    assert_eq!(out.persisted, Persisted::Skipped);
    assert!(source.calls().is_empty());
    assert_eq!(store.write_count(), 0);
    assert_eq!(out.series, cached_through(10).into_series());
}

#[test]
fn one_day_gap_is_still_up_to_date() {
    let store = MemoryStore::new("quandl").with_entry("FSE/BAS_X", cached_through(9));
    let source = RecordingSource::new(vec![Bar::new(d(10), 10.0)]);
    let sync = Synchronizer::new(&store, &source, FieldProjection::default());

    let out = sync.synchronize("FSE/BAS_X", d(1), d(10));
    assert_eq!(out.action, SyncAction::UpToDate);
    assert!(source.calls().is_empty());
}

#[test]
fn gap_fetch_starts_gap_minus_one_days_back_and_merges() {
    let store = MemoryStore::new("quandl").with_entry("FSE/BAS_X", cached_through(5));
    // Remote revises Jan 4 and has four new days
    let source = RecordingSource::new(vec![
        Bar::new(d(4), 40.0),
        Bar::new(d(6), 6.0),
        Bar::new(d(7), 7.0),
        Bar::new(d(8), 8.0),
        Bar::new(d(9), 9.0),
    ]);
    let sync = Synchronizer::new(&store, &source, FieldProjection::default());

    let out = sync.synchronize("FSE/BAS_X", d(1), d(10));

    assert_eq!(source.calls(), vec![(d(1), d(10))]);
    assert_eq!(out.action, SyncAction::Extended);
    assert_eq!(out.persisted, Persisted::Written(9));
    assert_eq!(store.write_count(), 1);

    let dates: Vec<NaiveDate> = out.series.bars().iter().map(|b| b.date).collect();
    assert_eq!(dates, (1..=9).map(d).collect::<Vec<_>>());
    assert!(out.series.is_well_ordered());
    assert_eq!(out.series.get(d(4)).unwrap().close, 40.0);
    assert_eq!(out.series.get(d(2)).unwrap().close, 2.0);

    assert_eq!(store.get("FSE/BAS_X").unwrap().bars.len(), 9);
}

#[test]
fn empty_gap_fetch_keeps_cache_without_writing() {
    let store = MemoryStore::new("stooq").with_entry("sap.de", cached_through(5));
    let source = RecordingSource::new(Vec::new());
    let sync = Synchronizer::new(&store, &source, FieldProjection::default());

    let out = sync.synchronize("sap.de", d(1), d(8));

    assert_eq!(out.action, SyncAction::NothingNew);
    assert_eq!(source.calls().len(), 1);
    assert_eq!(store.write_count(), 0);
    assert_eq!(out.series.len(), 5);
}

#[test]
fn seeding_persists_exactly_the_projected_series() {
    let store = MemoryStore::new("yahoo");
    let bars: Vec<Bar> = (2..=5)
        .map(|day| {
            Bar::new(d(day), f64::from(day))
                .with_field("adj_close", f64::from(day) - 0.5)
                .with_field("turnover", 1e6)
                .with_field("open", 1.0)
        })
        .collect();
    let source = RecordingSource::new(bars);
    let projection = FieldProjection::default();
    let sync = Synchronizer::new(&store, &source, projection.clone());

    let out = sync.synchronize("SAP.DE", d(1), d(5));
    assert_eq!(out.action, SyncAction::Seeded);
    assert_eq!(store.write_count(), 1);
    assert_eq!(
        store.get("SAP.DE").unwrap(),
        CacheEntry::project(&out.series, &projection)
    );

    // Second call with the same range and no remote changes: no writes
    let again = sync.synchronize("SAP.DE", d(1), d(5));
    assert_eq!(again.action, SyncAction::UpToDate);
    assert_eq!(store.write_count(), 1);
}

#[test]
fn parquet_store_survives_a_full_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = ParquetStore::open(dir.path(), "quandl").unwrap();
    let source = RecordingSource::new(
        (1..=12)
            .map(|day| Bar::new(d(day), 100.0 + f64::from(day)).with_field("turnover", 5.0))
            .collect(),
    );
    let sync = Synchronizer::new(&store, &source, FieldProjection::default());

    let seeded = sync.synchronize("FSE/BAS_X", d(1), d(5));
    assert_eq!(seeded.persisted, Persisted::Written(5));

    let extended = sync.synchronize("FSE/BAS_X", d(1), d(12));
    assert_eq!(extended.action, SyncAction::Extended);

    let stored = store.read("FSE/BAS_X").unwrap().unwrap();
    assert_eq!(stored.len(), 12);
    assert!(stored.bars.iter().all(|b| b.extra.is_empty()));
    assert_eq!(store.meta("FSE/BAS_X").unwrap().end_date, d(12));
}
