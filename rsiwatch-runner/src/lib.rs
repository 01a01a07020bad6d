//! rsiwatch runner: evaluation passes over configured instrument lists.
//!
//! This crate builds on `rsiwatch-core` to provide:
//! - TOML configuration (thresholds, evaluation window, cache, sources, report)
//! - Instrument list loading
//! - The parallel evaluation pass, one worker per source
//! - Breach notifications and notifiers
//! - The tab-delimited run history

pub mod config;
pub mod evaluate;
pub mod history;
pub mod report;
pub mod universe;

pub use config::{
    CacheConfig, ConfigError, EvaluationConfig, MonitorConfig, ReportConfig, SourceConfig,
    ThresholdConfig, MAX_LOOKBACK_DAYS,
};
pub use evaluate::{
    evaluate_source, run_pass, Backend, InstrumentEvaluation, LiveBackend, PassReport, RunError,
    SourceReport,
};
pub use history::{HistoryError, HistoryRow, RunHistory};
pub use report::{compose, LogNotifier, Notification, Notifier, NotifyError, OutboxNotifier};
pub use universe::{load_instruments, UniverseError};
