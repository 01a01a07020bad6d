//! Monitor configuration, read once from a TOML file at start-up.
//!
//! ```toml
//! [thresholds]
//! min = 30
//! max = 70
//!
//! [thresholds.overrides]
//! "FSE/BAS_X" = { min = 25, max = 75 }
//!
//! [evaluation]
//! lookback_days = 100
//! rsi_period = 14
//!
//! [cache]
//! dir = "data"
//! retain = ["adj_close"]
//!
//! [[sources]]
//! provider = "quandl"
//! instruments = "quandl_fse_stocks.csv"
//! prefix = "FSE/"
//! api_key_env = "QUANDL_API_KEY"
//!
//! [report]
//! recipients = ["ops@example.com"]
//! outbox = "outbox"
//! ```

use rsiwatch_core::{FieldProjection, ProviderId, Thresholds};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SUBJECT: &str = "Stock Monitor: Symbols exceeded their thresholds";

/// Upper bound for `evaluation.lookback_days` (about a century).
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Default bounds plus per-symbol overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    #[serde(default)]
    pub overrides: BTreeMap<String, Thresholds>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min: default_min(),
            max: default_max(),
            overrides: BTreeMap::new(),
        }
    }
}

impl ThresholdConfig {
    pub fn defaults(&self) -> Thresholds {
        Thresholds::new(self.min, self.max)
    }

    /// Thresholds for a provider-namespaced symbol.
    pub fn for_symbol(&self, symbol: &str) -> Thresholds {
        match self.overrides.get(symbol) {
            Some(custom) => {
                tracing::debug!(symbol, min = custom.min, max = custom.max, "custom thresholds");
                *custom
            }
            None => self.defaults(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluationConfig {
    /// Calendar days of history behind each evaluation.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            rsi_period: default_rsi_period(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Auxiliary fields persisted next to `close`.
    #[serde(default = "default_retain")]
    pub retain: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            retain: default_retain(),
        }
    }
}

impl CacheConfig {
    pub fn projection(&self) -> FieldProjection {
        FieldProjection::new(self.retain.iter().cloned())
    }
}

/// One evaluation worker: a provider and the instruments it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub provider: ProviderId,
    /// CSV file: code, name.
    pub instruments: PathBuf,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    /// Environment variable holding the provider API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Cache group; defaults to the provider name.
    #[serde(default)]
    pub group: Option<String>,
}

impl SourceConfig {
    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or(self.provider.as_str())
    }

    pub fn symbol_for(&self, code: &str) -> String {
        self.provider.symbol_for(code, &self.prefix, &self.suffix)
    }

    /// API key from the configured environment variable, if any.
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env.as_deref()?;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Some(key),
            _ => {
                tracing::warn!(provider = %self.provider, var, "API key variable not set");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Directory receiving one message file per recipient.
    #[serde(default)]
    pub outbox: Option<PathBuf>,
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            recipients: Vec::new(),
            outbox: None,
            history_file: default_history_file(),
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.thresholds.defaults().is_valid() {
            return Err(ConfigError::Invalid(format!(
                "thresholds: min ({}) must be below max ({})",
                self.thresholds.min, self.thresholds.max
            )));
        }
        for (symbol, t) in &self.thresholds.overrides {
            if !t.is_valid() {
                return Err(ConfigError::Invalid(format!(
                    "thresholds for {symbol}: min ({}) must be below max ({})",
                    t.min, t.max
                )));
            }
        }

        if self.evaluation.rsi_period == 0 {
            return Err(ConfigError::Invalid("evaluation.rsi_period must be >= 1".into()));
        }
        if self.evaluation.lookback_days == 0 {
            return Err(ConfigError::Invalid("evaluation.lookback_days must be >= 1".into()));
        }
        if self.evaluation.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(ConfigError::Invalid(format!(
                "evaluation.lookback_days must be <= {MAX_LOOKBACK_DAYS}"
            )));
        }

        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("at least one [[sources]] entry is required".into()));
        }
        let mut groups = BTreeSet::new();
        for source in &self.sources {
            if !groups.insert(source.group()) {
                return Err(ConfigError::Invalid(format!(
                    "cache group '{}' is used by more than one source",
                    source.group()
                )));
            }
        }

        Ok(())
    }
}

fn default_min() -> f64 {
    Thresholds::default().min
}

fn default_max() -> f64 {
    Thresholds::default().max
}

fn default_lookback_days() -> u32 {
    100
}

fn default_rsi_period() -> usize {
    14
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_retain() -> Vec<String> {
    vec!["adj_close".to_string()]
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

fn default_history_file() -> PathBuf {
    PathBuf::from("data/history.csv")
}
