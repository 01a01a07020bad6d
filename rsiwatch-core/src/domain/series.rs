//! Ordered price series and their persisted projection.
//!
//! A `PriceSeries` always knows which direction it is stored in. Dates are
//! strictly monotonic in that direction. Canonical order is ascending; the
//! descending view exists only so callers can ask for it explicitly and flip
//! back with [`PriceSeries::to_ascending`].

use super::bar::Bar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Direction in which a series' bars are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeriesOrder {
    #[default]
    Ascending,
    Descending,
}

/// Date-keyed bars for one instrument.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceSeries {
    bars: Vec<Bar>,
    order: SeriesOrder,
}

impl PriceSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a series from bars in any order.
    ///
    /// Sorts ascending and drops repeated dates, keeping the first occurrence.
    pub fn from_bars(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self {
            bars,
            order: SeriesOrder::Ascending,
        }
    }

    pub fn order(&self) -> SeriesOrder {
        self.order
    }

    /// Bars in the series' current storage order.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Re-orient to ascending dates.
    pub fn to_ascending(mut self) -> Self {
        if self.order == SeriesOrder::Descending {
            self.bars.reverse();
            self.order = SeriesOrder::Ascending;
        }
        self
    }

    /// Re-orient to descending dates (most recent first).
    pub fn to_descending(mut self) -> Self {
        if self.order == SeriesOrder::Ascending {
            self.bars.reverse();
            self.order = SeriesOrder::Descending;
        }
        self
    }

    /// Most recent bar, whatever the storage order.
    pub fn latest(&self) -> Option<&Bar> {
        match self.order {
            SeriesOrder::Ascending => self.bars.last(),
            SeriesOrder::Descending => self.bars.first(),
        }
    }

    /// Oldest bar, whatever the storage order.
    pub fn earliest(&self) -> Option<&Bar> {
        match self.order {
            SeriesOrder::Ascending => self.bars.first(),
            SeriesOrder::Descending => self.bars.last(),
        }
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.latest().map(|b| b.date)
    }

    pub fn earliest_date(&self) -> Option<NaiveDate> {
        self.earliest().map(|b| b.date)
    }

    /// Bar on an exact date.
    pub fn get(&self, date: NaiveDate) -> Option<&Bar> {
        let idx = match self.order {
            SeriesOrder::Ascending => self.bars.binary_search_by(|b| b.date.cmp(&date)),
            SeriesOrder::Descending => self.bars.binary_search_by(|b| date.cmp(&b.date)),
        };
        idx.ok().map(|i| &self.bars[i])
    }

    /// True when dates strictly increase (ascending) or strictly decrease
    /// (descending) along storage order.
    pub fn is_well_ordered(&self) -> bool {
        self.bars.windows(2).all(|w| match self.order {
            SeriesOrder::Ascending => w[0].date < w[1].date,
            SeriesOrder::Descending => w[0].date > w[1].date,
        })
    }

    /// Union of two series keyed by date. Where both have a bar for the same
    /// date, the bar from `fresh` wins. The result is ascending regardless of
    /// either input's order.
    pub fn merge_preferring(self, fresh: PriceSeries) -> PriceSeries {
        let mut by_date: BTreeMap<NaiveDate, Bar> = self
            .bars
            .into_iter()
            .map(|b| (b.date, b))
            .collect();
        for bar in fresh.bars {
            by_date.insert(bar.date, bar);
        }
        PriceSeries {
            bars: by_date.into_values().collect(),
            order: SeriesOrder::Ascending,
        }
    }
}

/// The set of fields that survive into the cache.
///
/// `close` is always retained. Anything not listed is dropped before a write,
/// which keeps the stored schema identical across providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProjection {
    retained: BTreeSet<String>,
}

impl FieldProjection {
    pub fn new<I, S>(retained: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let retained = retained
            .into_iter()
            .map(Into::into)
            .filter(|name| name != "close" && name != "date")
            .collect();
        Self { retained }
    }

    pub fn close_only() -> Self {
        Self {
            retained: BTreeSet::new(),
        }
    }

    pub fn retains(&self, field: &str) -> bool {
        field == "close" || self.retained.contains(field)
    }

    /// Auxiliary (non-close) fields, in stable order.
    pub fn auxiliary(&self) -> impl Iterator<Item = &str> {
        self.retained.iter().map(String::as_str)
    }

    pub fn project(&self, bar: &Bar) -> Bar {
        let mut out = Bar::new(bar.date, bar.close);
        for name in &self.retained {
            if let Some(value) = bar.field(name) {
                out.set_field(name, value);
            }
        }
        out
    }
}

impl Default for FieldProjection {
    fn default() -> Self {
        Self::new(["adj_close"])
    }
}

/// Persisted form of a series: ascending, field-projected bars.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheEntry {
    pub bars: Vec<Bar>,
}

impl CacheEntry {
    pub fn project(series: &PriceSeries, projection: &FieldProjection) -> Self {
        let mut bars: Vec<Bar> = series.bars().iter().map(|b| projection.project(b)).collect();
        if series.order() == SeriesOrder::Descending {
            bars.reverse();
        }
        Self { bars }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn into_series(self) -> PriceSeries {
        PriceSeries::from_bars(self.bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(days: &[(u32, f64)]) -> PriceSeries {
        PriceSeries::from_bars(days.iter().map(|&(day, c)| Bar::new(d(day), c)).collect())
    }

    #[test]
    fn from_bars_sorts_and_dedupes() {
        let s = PriceSeries::from_bars(vec![
            Bar::new(d(3), 3.0),
            Bar::new(d(1), 1.0),
            Bar::new(d(3), 99.0),
            Bar::new(d(2), 2.0),
        ]);
        assert_eq!(s.len(), 3);
        assert!(s.is_well_ordered());
        assert_eq!(s.get(d(3)).unwrap().close, 3.0);
    }

    #[test]
    fn descending_view_flips_back() {
        let s = series(&[(1, 1.0), (2, 2.0), (3, 3.0)]).to_descending();
        assert_eq!(s.order(), SeriesOrder::Descending);
        assert_eq!(s.bars()[0].date, d(3));
        assert_eq!(s.latest_date(), Some(d(3)));
        assert_eq!(s.earliest_date(), Some(d(1)));
        assert!(s.is_well_ordered());
        assert_eq!(s.get(d(2)).unwrap().close, 2.0);

        let s = s.to_ascending();
        assert_eq!(s.bars()[0].date, d(1));
        assert!(s.is_well_ordered());
    }

    #[test]
    fn merge_prefers_fresh_on_overlap() {
        let cached = series(&[(1, 1.0), (2, 2.0), (3, 3.0)]).to_descending();
        let fresh = series(&[(3, 30.0), (4, 4.0)]);
        let merged = cached.merge_preferring(fresh);

        assert_eq!(merged.order(), SeriesOrder::Ascending);
        assert_eq!(merged.len(), 4);
        assert!(merged.is_well_ordered());
        assert_eq!(merged.get(d(3)).unwrap().close, 30.0);
        assert_eq!(merged.get(d(1)).unwrap().close, 1.0);
    }

    #[test]
    fn projection_keeps_close_and_retained_only() {
        let bar = Bar::new(d(1), 10.0)
            .with_field("open", 9.0)
            .with_field("turnover", 5.0)
            .with_field("adj_close", 9.5);
        let projected = FieldProjection::default().project(&bar);
        assert_eq!(projected.close, 10.0);
        assert_eq!(projected.open, None);
        assert_eq!(projected.field("turnover"), None);
        assert_eq!(projected.field("adj_close"), Some(9.5));

        let close_only = FieldProjection::close_only().project(&bar);
        assert!(close_only.extra.is_empty());
    }

    #[test]
    fn projection_ignores_close_and_date_names() {
        let p = FieldProjection::new(["close", "date", "volume"]);
        assert_eq!(p.auxiliary().collect::<Vec<_>>(), vec!["volume"]);
        assert!(p.retains("close"));
    }

    #[test]
    fn cache_entry_is_always_ascending() {
        let s = series(&[(1, 1.0), (2, 2.0)]).to_descending();
        let entry = CacheEntry::project(&s, &FieldProjection::close_only());
        assert_eq!(entry.bars[0].date, d(1));
        assert_eq!(entry.into_series().latest_date(), Some(d(2)));
    }
}
