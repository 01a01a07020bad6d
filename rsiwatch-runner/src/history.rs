//! Run history: one tab-delimited row per evaluation pass.
//!
//! ```text
//! Date        Below   Above   Total
//! 2024-01-10  2       5       160
//! ```
//!
//! The file is append-only; the header is written when the file is created.
//! Rows that fail to parse are skipped on read.

use crate::evaluate::PassReport;
use chrono::NaiveDate;
use rsiwatch_core::BreachStatus;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Below")]
    pub below: usize,
    #[serde(rename = "Above")]
    pub above: usize,
    #[serde(rename = "Total")]
    pub total: usize,
}

impl HistoryRow {
    pub fn from_pass(pass: &PassReport) -> Self {
        Self {
            date: pass.today,
            below: pass.count(BreachStatus::Below),
            above: pass.count(BreachStatus::Above),
            total: pass.total(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunHistory {
    path: PathBuf,
}

impl RunHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, row: &HistoryRow) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let fresh = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(fresh)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    /// All readable rows, oldest first. A missing file is an empty history.
    pub fn read_all(&self) -> Result<Vec<HistoryRow>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        let mut rows = Vec::new();
        for (line, record) in reader.deserialize::<HistoryRow>().enumerate() {
            match record {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), line = line + 2, error = %e, "skipping history row");
                }
            }
        }
        Ok(rows)
    }
}
