//! Domain types for rsiwatch

pub mod bar;
pub mod instrument;
pub mod series;

pub use bar::Bar;
pub use instrument::Instrument;
pub use series::{CacheEntry, FieldProjection, PriceSeries, SeriesOrder};
