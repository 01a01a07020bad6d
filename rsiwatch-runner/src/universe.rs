//! Instrument lists.
//!
//! Each source names a CSV file with a header row; every data row carries
//! the provider's raw ticker code and a display name. The code is turned into
//! a provider-namespaced symbol using the source's prefix/suffix.

use crate::config::{SourceConfig, ThresholdConfig};
use rsiwatch_core::Instrument;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("cannot read instrument list {path}: {source}")]
    Read { path: PathBuf, source: csv::Error },
    #[error("instrument list {path} has no usable rows")]
    Empty { path: PathBuf },
}

/// Load the instruments of one source from its CSV file.
pub fn load_instruments(
    source: &SourceConfig,
    thresholds: &ThresholdConfig,
) -> Result<Vec<Instrument>, UniverseError> {
    let path = source.instruments.as_path();
    let file = std::fs::File::open(path).map_err(|e| UniverseError::Read {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })?;
    let instruments = parse_instruments(file, path, source, thresholds)?;
    tracing::info!(
        provider = %source.provider,
        path = %path.display(),
        count = instruments.len(),
        "instrument list loaded"
    );
    Ok(instruments)
}

/// Parse instrument rows; short rows and blank codes are skipped.
pub fn parse_instruments<R: Read>(
    reader: R,
    path: &Path,
    source: &SourceConfig,
    thresholds: &ThresholdConfig,
) -> Result<Vec<Instrument>, UniverseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut instruments = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|source| UniverseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let code = record.get(0).unwrap_or_default();
        let name = record.get(1).unwrap_or_default();
        if code.is_empty() || name.is_empty() {
            tracing::warn!(path = %path.display(), line = line + 2, "skipping incomplete instrument row");
            continue;
        }

        let symbol = source.symbol_for(code);
        let limits = thresholds.for_symbol(&symbol);
        instruments.push(Instrument::new(symbol, name, limits));
    }

    if instruments.is_empty() {
        return Err(UniverseError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(instruments)
}
