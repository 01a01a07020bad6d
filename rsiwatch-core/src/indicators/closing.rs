//! Business-day closing prices.
//!
//! The view is as-of: each business day in the window takes the last known
//! close on or before it, including closes from before the window start.
//! Days before the first known close stay undefined.

use super::ClosingPriceSeries;
use crate::domain::{Bar, PriceSeries, SeriesOrder};
use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Monday–Friday dates in `[from, to]`.
pub fn business_days(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

/// Closing prices on every business day of `[today − window_days, today]`.
///
/// A window reaching past the earliest representable date yields an empty series.
pub fn closing_prices(series: &PriceSeries, window_days: u32, today: NaiveDate) -> ClosingPriceSeries {
    let Some(from) = today.checked_sub_signed(Duration::days(i64::from(window_days))) else {
        return ClosingPriceSeries::default();
    };
    let days = business_days(from, today);

    let mut ordered: Vec<&Bar> = series.bars().iter().filter(|b| !b.is_void()).collect();
    if series.order() == SeriesOrder::Descending {
        ordered.reverse();
    }
    let mut bars = ordered.into_iter().peekable();

    let mut last_close = None;
    let points = days
        .into_iter()
        .map(|day| {
            while let Some(bar) = bars.next_if(|b| b.date <= day) {
                last_close = Some(bar.close);
            }
            (day, last_close)
        })
        .collect();

    ClosingPriceSeries::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn business_days_skip_weekends() {
        // 2024-01-05 is a Friday
        let days = business_days(d(5), d(9));
        assert_eq!(days, vec![d(5), d(8), d(9)]);
        assert!(business_days(d(9), d(5)).is_empty());
    }

    #[test]
    fn gaps_are_forward_filled() {
        let series = PriceSeries::from_bars(vec![
            Bar::new(d(2), 10.0),
            Bar::new(d(4), 12.0),
            Bar::new(d(6), 99.0), // Saturday
        ]);
        let closes = closing_prices(&series, 8, d(9));
        // Jan 1..=9 business days: 1,2,3,4,5,8,9
        assert_eq!(closes.len(), 7);
        assert_eq!(closes.get(d(1)), None);
        assert_eq!(closes.get(d(3)), Some(10.0));
        assert_eq!(closes.get(d(5)), Some(12.0));
        assert_eq!(closes.get(d(8)), Some(99.0));
        assert_eq!(closes.get(d(9)), Some(99.0));
    }

    #[test]
    fn history_before_window_seeds_the_fill() {
        let series = PriceSeries::from_bars(vec![Bar::new(d(1), 5.0)]).to_descending();
        let closes = closing_prices(&series, 2, d(10));
        assert_eq!(closes.first_date(), Some(d(8)));
        assert!(closes.iter().all(|(_, v)| v == Some(5.0)));
    }

    #[test]
    fn oversized_window_is_empty_not_a_panic() {
        let series = PriceSeries::from_bars(vec![Bar::new(d(2), 10.0)]);
        assert!(closing_prices(&series, u32::MAX, d(10)).is_empty());
        assert!(closing_prices(&PriceSeries::empty(), 5, NaiveDate::MIN).is_empty());
    }

    #[test]
    fn void_bars_do_not_break_the_fill() {
        let series = PriceSeries::from_bars(vec![Bar::new(d(2), 10.0), Bar::new(d(3), f64::NAN)]);
        let closes = closing_prices(&series, 1, d(3));
        assert_eq!(closes.get(d(3)), Some(10.0));
    }
}
