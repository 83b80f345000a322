//! Measured-column selection.

use polars::prelude::*;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::utils::is_numeric_dtype;

/// Decides which columns are analyzed.
///
/// Numeric columns in frame order, minus the identifier, the group column
/// (when grouping is enabled) and the configured denylist. The result depends
/// only on the frame schema and the configuration, so output file names are
/// stable across runs.
#[derive(Debug, Clone)]
pub struct ColumnSelector<'a> {
    identifier_column: &'a str,
    group_column: Option<&'a str>,
    exclude_columns: &'a [String],
}

impl<'a> ColumnSelector<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self {
            identifier_column: &config.identifier_column,
            group_column: config.group_column(),
            exclude_columns: &config.data_processing.exclude_columns,
        }
    }

    pub fn select(&self, df: &DataFrame) -> Vec<String> {
        let selected: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|column| is_numeric_dtype(column.dtype()))
            .map(|column| column.name().to_string())
            .filter(|name| self.is_candidate(name))
            .collect();

        debug!("Selected measured columns: {:?}", selected);
        selected
    }

    fn is_candidate(&self, name: &str) -> bool {
        name != self.identifier_column
            && Some(name) != self.group_column
            && !self.exclude_columns.iter().any(|excluded| excluded == name)
    }
}
