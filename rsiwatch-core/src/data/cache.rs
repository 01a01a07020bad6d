//! Parquet-backed cache store.
//!
//! Layout: `{cache_root}/{group}/symbol={KEY}/series.parquet` plus a
//! `meta.json` sidecar.
//!
//! - Full-replace writes (write to .tmp, rename into place)
//! - Schema validation on read
//! - Quarantine for corrupt files (`series.parquet.quarantined`)
//! - Metadata sidecar per symbol (date range, row count, BLAKE3 hash)

use super::provider::DataError;
use super::schema::CacheSchema;
use super::store::{cache_key, CacheStore};
use crate::domain::{Bar, CacheEntry};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const SERIES_FILE: &str = "series.parquet";
const META_FILE: &str = "meta.json";

/// Metadata sidecar for a cached symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_count: usize,
    pub fields: Vec<String>,
    pub data_hash: String,
    pub written_at: chrono::NaiveDateTime,
}

/// One line of `rsiwatch cache status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub key: String,
    pub meta: Option<CacheMeta>,
    pub size_bytes: u64,
    pub quarantined: bool,
}

/// Cache store for one logical group (one provider / asset universe).
#[derive(Debug)]
pub struct ParquetStore {
    group: String,
    dir: PathBuf,
}

impl ParquetStore {
    /// Open (creating if needed) the store for `group` under `cache_root`.
    pub fn open(cache_root: impl AsRef<Path>, group: impl Into<String>) -> Result<Self, DataError> {
        let group = group.into();
        let dir = cache_root.as_ref().join(&group);
        fs::create_dir_all(&dir).map_err(|e| {
            DataError::CacheError(format!("failed to create {}: {e}", dir.display()))
        })?;
        Ok(Self { group, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("symbol={}", cache_key(symbol)))
    }

    fn series_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join(SERIES_FILE)
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join(META_FILE)
    }

    pub fn meta(&self, symbol: &str) -> Option<CacheMeta> {
        read_meta(&self.meta_path(symbol))
    }

    /// Every symbol directory in this group, sorted by key.
    pub fn status(&self) -> Result<Vec<CacheStatus>, DataError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| DataError::CacheError(format!("read dir {}: {e}", self.dir.display())))?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();
            let Some(key) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("symbol="))
            else {
                continue;
            };
            if !path.is_dir() {
                continue;
            }

            let series = path.join(SERIES_FILE);
            out.push(CacheStatus {
                key: key.to_string(),
                meta: read_meta(&path.join(META_FILE)),
                size_bytes: fs::metadata(&series).map(|m| m.len()).unwrap_or(0),
                quarantined: quarantine_path(&series).exists(),
            });
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    fn quarantine(&self, path: &Path, reason: &DataError) {
        let target = quarantine_path(path);
        tracing::warn!(
            store = %self.group,
            file = %path.display(),
            error = %reason,
            "quarantining corrupt cache file"
        );
        if let Err(e) = fs::rename(path, &target) {
            tracing::warn!(file = %path.display(), error = %e, "quarantine rename failed");
        }
    }
}

impl CacheStore for ParquetStore {
    fn read(&self, symbol: &str) -> Result<Option<CacheEntry>, DataError> {
        let path = self.series_path(symbol);
        if !path.exists() {
            return Ok(None);
        }

        match load_and_validate_parquet(&path) {
            Ok(bars) => {
                tracing::trace!(store = %self.group, symbol, rows = bars.len(), "cache read");
                Ok(Some(CacheEntry { bars }))
            }
            Err(e) => {
                self.quarantine(&path, &e);
                Err(e)
            }
        }
    }

    fn write(&self, symbol: &str, entry: &CacheEntry) -> Result<(), DataError> {
        let (Some(first), Some(last)) = (entry.bars.first(), entry.bars.last()) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let fields = auxiliary_fields(&entry.bars);
        let mut df = bars_to_dataframe(&entry.bars, &fields)?;

        let path = self.series_path(symbol);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            symbol: symbol.to_string(),
            start_date: first.date,
            end_date: last.date,
            row_count: entry.bars.len(),
            fields: fields.into_iter().collect(),
            data_hash: blake3::hash(
                &serde_json::to_vec(&entry.bars)
                    .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            written_at: chrono::Utc::now().naive_utc(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        let meta_path = self.meta_path(symbol);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;
        fs::rename(&meta_tmp, &meta_path)
            .map_err(|e| DataError::CacheError(format!("meta rename: {e}")))?;

        tracing::debug!(store = %self.group, symbol, rows = meta.row_count, "cache written");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.group
    }
}

fn quarantine_path(path: &Path) -> PathBuf {
    path.with_extension("parquet.quarantined")
}

fn read_meta(path: &Path) -> Option<CacheMeta> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Names of all non-close fields present on any bar, sorted.
fn auxiliary_fields(bars: &[Bar]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for bar in bars {
        for (name, present) in [
            ("open", bar.open.is_some()),
            ("high", bar.high.is_some()),
            ("low", bar.low.is_some()),
            ("volume", bar.volume.is_some()),
        ] {
            if present {
                names.insert(name.to_string());
            }
        }
        names.extend(bar.extra.keys().cloned());
    }
    names
}

fn bars_to_dataframe(bars: &[Bar], fields: &BTreeSet<String>) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let mut columns = Vec::with_capacity(fields.len() + 2);
    columns.push(
        Column::new(CacheSchema::DATE.into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
    );
    columns.push(Column::new(CacheSchema::CLOSE.into(), closes));
    for name in fields {
        let values: Vec<Option<f64>> = bars.iter().map(|b| b.field(name)).collect();
        columns.push(Column::new(name.as_str().into(), values));
    }

    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    CacheSchema::validate(&df).map_err(|e| DataError::ValidationError(e.to_string()))?;

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let col_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));

    let date_ca = df
        .column(CacheSchema::DATE)
        .map_err(col_err)?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let close_ca = df
        .column(CacheSchema::CLOSE)
        .map_err(col_err)?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("close column type: {e}")))?;

    let mut auxiliaries = Vec::new();
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == CacheSchema::DATE || name == CacheSchema::CLOSE {
            continue;
        }
        let ca = column
            .f64()
            .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))?;
        auxiliaries.push((name, ca));
    }

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        let date = epoch()
            .checked_add_signed(chrono::Duration::days(i64::from(days)))
            .ok_or_else(|| DataError::ParquetError(format!("date out of range at row {i}")))?;

        let mut bar = Bar::new(date, close_ca.get(i).unwrap_or(f64::NAN));
        for (name, ca) in &auxiliaries {
            if let Some(v) = ca.get(i) {
                bar.set_field(name, v);
            }
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}
