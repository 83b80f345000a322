//! Dataset sources.
//!
//! The pipeline only needs a frame whose column names, column order and row
//! order match the file, with numeric cells typed as numbers.

use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{AnalysisError, Result};

/// Number of rows used for schema inference.
const INFER_SCHEMA_ROWS: usize = 10_000;

/// Supplies the frame for one run.
pub trait DatasetSource {
    /// Name used for the run directory, usually the file stem.
    fn name(&self) -> String;

    /// Load the frame.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::SourceRead`] when the source is missing or
    /// unreadable.
    fn load(&self) -> Result<DataFrame>;
}

/// CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, reason: impl Into<String>) -> AnalysisError {
        AnalysisError::SourceRead {
            source_name: self.path.display().to_string(),
            reason: reason.into(),
        }
    }
}

impl DatasetSource for CsvSource {
    fn name(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset")
            .to_string()
    }

    fn load(&self) -> Result<DataFrame> {
        if !self.path.is_file() {
            return Err(self.read_error("file not found"));
        }

        info!("Reading data file: {}", self.path.display());
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .try_into_reader_with_file_path(Some(self.path.clone()))
            .and_then(|reader| reader.finish())
            .map_err(|e| self.read_error(e.to_string()))?;

        info!("Loaded {} rows x {} columns", df.height(), df.width());
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loads_csv_with_numeric_columns() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "SN,Width,Batch").unwrap();
        writeln!(file, "LSL,1.0,").unwrap();
        writeln!(file, "USL,5.0,").unwrap();
        writeln!(file, "P1,3.2,A").unwrap();
        file.flush().unwrap();

        let source = CsvSource::new(file.path());
        let df = source.load().unwrap();

        assert_eq!(df.shape(), (3, 3));
        assert_eq!(df.column("Width").unwrap().dtype(), &DataType::Float64);
        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>(),
            vec!["SN", "Width", "Batch"]
        );
    }

    #[test]
    fn test_missing_file_is_source_read_error() {
        let source = CsvSource::new("/definitely/not/here.csv");
        let err = source.load().unwrap_err();

        assert_eq!(err.error_code(), "SOURCE_READ_ERROR");
        assert_eq!(source.name(), "here");
    }
}
