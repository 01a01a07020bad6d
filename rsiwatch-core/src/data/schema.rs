use polars::prelude::*;

/// Persisted schema of a cache entry.
///
/// `date` (Date) and `close` (Float64) are mandatory; any further column is a
/// retained auxiliary field and must be Float64.
pub struct CacheSchema;

impl CacheSchema {
    pub const DATE: &'static str = "date";
    pub const CLOSE: &'static str = "close";

    /// Validate a DataFrame read back from disk.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let actual = df.schema();

        for (name, dtype) in [(Self::DATE, DataType::Date), (Self::CLOSE, DataType::Float64)] {
            let found = actual
                .get(name)
                .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?;
            if *found != dtype {
                return Err(SchemaError::TypeMismatch {
                    column: name.to_string(),
                    expected: dtype,
                    actual: found.clone(),
                });
            }
        }

        for (name, dtype) in actual.iter() {
            if name.as_str() == Self::DATE || name.as_str() == Self::CLOSE {
                continue;
            }
            if *dtype != DataType::Float64 {
                return Err(SchemaError::TypeMismatch {
                    column: name.to_string(),
                    expected: DataType::Float64,
                    actual: dtype.clone(),
                });
            }
        }

        let dates = df
            .column(Self::DATE)
            .map_err(|_| SchemaError::MissingColumn(Self::DATE.to_string()))?;
        if dates.null_count() > 0 {
            return Err(SchemaError::NullDates(dates.null_count()));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("{0} rows without a date")]
    NullDates(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_column(days: &[i32]) -> Column {
        Column::new("date".into(), days)
            .cast(&DataType::Date)
            .unwrap()
    }

    #[test]
    fn accepts_close_with_float_auxiliaries() {
        let df = DataFrame::new(vec![
            date_column(&[19724, 19725]),
            Column::new("close".into(), &[101.0, 102.0]),
            Column::new("adj_close".into(), &[Some(100.5), None]),
        ])
        .unwrap();
        assert!(CacheSchema::validate(&df).is_ok());
    }

    #[test]
    fn rejects_missing_close() {
        let df = DataFrame::new(vec![
            date_column(&[19724]),
            Column::new("open".into(), &[101.0]),
        ])
        .unwrap();
        assert!(matches!(
            CacheSchema::validate(&df),
            Err(SchemaError::MissingColumn(c)) if c == "close"
        ));
    }

    #[test]
    fn rejects_non_float_auxiliary() {
        let df = DataFrame::new(vec![
            date_column(&[19724]),
            Column::new("close".into(), &[101.0]),
            Column::new("note".into(), &["stale"]),
        ])
        .unwrap();
        assert!(matches!(
            CacheSchema::validate(&df),
            Err(SchemaError::TypeMismatch { column, .. }) if column == "note"
        ));
    }

    #[test]
    fn rejects_string_dates() {
        let df = DataFrame::new(vec![
            Column::new("date".into(), &["2024-01-02"]),
            Column::new("close".into(), &[101.0]),
        ])
        .unwrap();
        assert!(matches!(
            CacheSchema::validate(&df),
            Err(SchemaError::TypeMismatch { column, .. }) if column == "date"
        ));
    }
}
