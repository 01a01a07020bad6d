//! The evaluation pass.
//!
//! One worker per configured source runs on a dedicated rayon pool. Each
//! worker opens its own cache store and remote source, walks its instrument
//! list sequentially (sync, closing prices, RSI, breach detection) and hands
//! back a [`SourceReport`]. Reports are merged only after every worker has
//! finished.
//!
//! Per-instrument problems (no data, too little history, a failed cache
//! write) are diagnostics on the instrument's evaluation and never abort the
//! pass. Failing to initialize a worker's cache store is the only fatal
//! error.

use crate::config::{EvaluationConfig, MonitorConfig, SourceConfig};
use crate::universe::load_instruments;
use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use rsiwatch_core::data::{ParquetStore, Persisted, RemoteSource, SyncAction};
use rsiwatch_core::indicators::{closing_prices, ema, rsi, sma};
use rsiwatch_core::{
    detect, BreachStatus, BreachWindow, CacheStore, DataError, Instrument, PriceSource,
    ProviderId, Synchronizer,
};
use thiserror::Error;

/// Period of the moving averages shown next to the RSI.
pub const TREND_PERIOD: usize = 10;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot open cache store for group '{group}': {source}")]
    StoreInit { group: String, source: DataError },
    #[error("cannot build worker pool: {0}")]
    Pool(String),
}

/// Builds the collaborators of one source worker.
pub trait Backend: Sync {
    fn source(&self, source: &SourceConfig) -> Result<Box<dyn PriceSource>, DataError>;
    fn store(&self, config: &MonitorConfig, source: &SourceConfig)
        -> Result<Box<dyn CacheStore>, DataError>;
}

/// HTTP providers and the on-disk Parquet cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveBackend;

impl Backend for LiveBackend {
    fn source(&self, source: &SourceConfig) -> Result<Box<dyn PriceSource>, DataError> {
        let remote = RemoteSource::connect(source.provider, source.api_key())?;
        Ok(Box::new(remote))
    }

    fn store(
        &self,
        config: &MonitorConfig,
        source: &SourceConfig,
    ) -> Result<Box<dyn CacheStore>, DataError> {
        let store = ParquetStore::open(&config.cache.dir, source.group())?;
        Ok(Box::new(store))
    }
}

/// Result for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentEvaluation {
    pub instrument: Instrument,
    pub action: SyncAction,
    pub persisted: Persisted,
    /// Latest RSI reading and breach state; `None` when RSI is undefined.
    pub window: Option<BreachWindow>,
    pub sma: Option<f64>,
    pub ema: Option<f64>,
    /// Why `window` is missing, or what went wrong around it.
    pub note: Option<String>,
}

impl InstrumentEvaluation {
    pub fn is_breach(&self) -> bool {
        self.window.is_some_and(|w| w.is_breach())
    }

    pub fn status(&self) -> Option<BreachStatus> {
        self.window.map(|w| w.status)
    }
}

/// Everything one worker produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub group: String,
    pub provider: ProviderId,
    pub evaluations: Vec<InstrumentEvaluation>,
    /// Set when the worker could not evaluate anything.
    pub error: Option<String>,
}

impl SourceReport {
    fn failed(source: &SourceConfig, error: String) -> Self {
        Self {
            group: source.group().to_string(),
            provider: source.provider,
            evaluations: Vec::new(),
            error: Some(error),
        }
    }
}

/// Merged result of a full pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub today: NaiveDate,
    pub sources: Vec<SourceReport>,
}

impl PassReport {
    pub fn evaluations(&self) -> impl Iterator<Item = &InstrumentEvaluation> {
        self.sources.iter().flat_map(|s| s.evaluations.iter())
    }

    /// Breaching instruments, in source then list order.
    pub fn breaching(&self) -> Vec<&InstrumentEvaluation> {
        self.evaluations().filter(|e| e.is_breach()).collect()
    }

    pub fn count(&self, status: BreachStatus) -> usize {
        self.evaluations()
            .filter(|e| e.status() == Some(status))
            .count()
    }

    pub fn total(&self) -> usize {
        self.evaluations().count()
    }
}

/// Run every source in parallel and merge the reports.
pub fn run_pass(
    config: &MonitorConfig,
    backend: &dyn Backend,
    today: NaiveDate,
) -> Result<PassReport, RunError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.sources.len().max(1))
        .thread_name(|i| format!("rsiwatch-source-{i}"))
        .build()
        .map_err(|e| RunError::Pool(e.to_string()))?;

    tracing::info!(sources = config.sources.len(), %today, "evaluation pass started");

    let results: Vec<Result<SourceReport, RunError>> = pool.install(|| {
        config
            .sources
            .par_iter()
            .map(|source| evaluate_source(config, source, backend, today))
            .collect()
    });
    let sources = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    let report = PassReport { today, sources };
    tracing::info!(
        total = report.total(),
        below = report.count(BreachStatus::Below),
        above = report.count(BreachStatus::Above),
        "evaluation pass finished"
    );
    Ok(report)
}

/// Evaluate every instrument of one source.
pub fn evaluate_source(
    config: &MonitorConfig,
    source: &SourceConfig,
    backend: &dyn Backend,
    today: NaiveDate,
) -> Result<SourceReport, RunError> {
    let group = source.group();
    let store = backend
        .store(config, source)
        .map_err(|source| RunError::StoreInit {
            group: group.to_string(),
            source,
        })?;

    let remote = match backend.source(source) {
        Ok(remote) => remote,
        Err(e) => {
            tracing::error!(group, provider = %source.provider, error = %e, "provider unavailable");
            return Ok(SourceReport::failed(source, e.to_string()));
        }
    };

    let instruments = match load_instruments(source, &config.thresholds) {
        Ok(list) => list,
        Err(e) => {
            tracing::error!(group, error = %e, "instrument list unusable");
            return Ok(SourceReport::failed(source, e.to_string()));
        }
    };

    let sync = Synchronizer::new(store.as_ref(), remote.as_ref(), config.cache.projection());
    let evaluations = instruments
        .into_iter()
        .map(|instrument| evaluate_instrument(&sync, instrument, &config.evaluation, today))
        .collect();

    Ok(SourceReport {
        group: group.to_string(),
        provider: source.provider,
        evaluations,
        error: None,
    })
}

/// Sync one instrument and derive its RSI breach state.
pub fn evaluate_instrument(
    sync: &Synchronizer<'_>,
    instrument: Instrument,
    evaluation: &EvaluationConfig,
    today: NaiveDate,
) -> InstrumentEvaluation {
    let symbol = instrument.symbol.as_str();
    let start = today
        .checked_sub_signed(Duration::days(i64::from(evaluation.lookback_days)))
        .unwrap_or(NaiveDate::MIN);
    let outcome = sync.synchronize(symbol, start, today);

    let mut note = match &outcome.persisted {
        Persisted::Failed(e) => Some(format!("cache write failed: {e}")),
        _ => None,
    };

    let closes = closing_prices(&outcome.series, evaluation.lookback_days, today);
    let sma = sma(&closes, TREND_PERIOD).latest_defined().map(|(_, v)| v);
    let ema = ema(&closes, TREND_PERIOD).latest_defined().map(|(_, v)| v);

    let window = match rsi(&closes, evaluation.rsi_period) {
        Ok(oscillator) => detect(&oscillator, &instrument.thresholds),
        Err(e) => {
            tracing::info!(symbol, action = ?outcome.action, error = %e, "RSI undefined");
            note.get_or_insert_with(|| e.to_string());
            None
        }
    };

    match window {
        Some(w) if w.is_breach() => tracing::info!(
            symbol,
            rsi = w.value,
            status = ?w.status,
            since = ?w.since,
            "threshold exceeded"
        ),
        Some(w) => tracing::debug!(symbol, rsi = w.value, "within thresholds"),
        None => {}
    }

    InstrumentEvaluation {
        instrument,
        action: outcome.action,
        persisted: outcome.persisted,
        window,
        sma,
        ema,
        note,
    }
}
