//! Invalid-value detection and repair for measured columns.
//!
//! This module provides:
//! - Counting NaN, infinite and missing measurements per column
//! - Resolving them according to the configured [`CleaningPolicy`]
//! - A post-condition check that every measured column is finite afterwards
//!
//! Only data rows are inspected. `LSL`/`USL` rows are carried through
//! unchanged because an empty cell there means "no limit".

mod report;
mod strategies;

pub use report::{ColumnInvalidCount, InvalidValueReport};

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, CleaningPolicy};
use crate::error::{AnalysisError, Result};
use crate::spec_limits::limit_kinds;
use crate::utils::{float_values, is_valid_measurement};
use strategies::{Replacement, drop_invalid_rows, replace_invalid_values};

/// Result of a cleaning run.
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    /// The cleaned frame. Same columns as the input.
    pub frame: DataFrame,
    /// Diagnostics gathered before any mutation.
    pub report: InvalidValueReport,
    pub rows_removed: usize,
    pub values_replaced: usize,
}

/// Cleaner for measured columns.
#[derive(Debug, Clone)]
pub struct DataCleaner {
    policy: CleaningPolicy,
    identifier_column: String,
}

impl DataCleaner {
    pub fn new(policy: CleaningPolicy, identifier_column: impl Into<String>) -> Self {
        Self {
            policy,
            identifier_column: identifier_column.into(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.data_processing.cleaning_policy,
            config.identifier_column.clone(),
        )
    }

    pub fn policy(&self) -> CleaningPolicy {
        self.policy
    }

    /// Count invalid values per measured column without mutating anything.
    pub fn inspect(&self, df: &DataFrame, columns: &[String]) -> Result<InvalidValueReport> {
        let spec_rows = self.spec_row_flags(df)?;
        let rows_inspected = spec_rows.iter().filter(|is_spec| !**is_spec).count();

        let mut report = InvalidValueReport {
            rows_inspected,
            columns: Vec::with_capacity(columns.len()),
        };

        for column in columns {
            let values = float_values(df, column)?;
            let invalid = values
                .iter()
                .zip(&spec_rows)
                .filter(|(value, is_spec)| !**is_spec && !is_valid_measurement(**value))
                .count();
            debug!("Column '{}': {} invalid values", column, invalid);
            report.columns.push(ColumnInvalidCount {
                column: column.clone(),
                invalid,
            });
        }

        Ok(report)
    }

    /// Resolve invalid values in `columns` according to the policy.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::DataQuality`] when the policy rejects invalid
    /// values or cannot repair them.
    pub fn clean(&self, df: DataFrame, columns: &[String]) -> Result<CleaningOutcome> {
        let report = self.inspect(&df, columns)?;

        if report.is_clean() {
            debug!("No invalid values found; cleaning skipped");
            return Ok(CleaningOutcome {
                frame: df,
                report,
                rows_removed: 0,
                values_replaced: 0,
            });
        }

        for (column, count) in report.offending() {
            warn!("Found {} invalid values in column '{}'", count, column);
        }

        let spec_rows = self.spec_row_flags(&df)?;
        let (frame, rows_removed, values_replaced) = match self.policy {
            CleaningPolicy::Reject => {
                return Err(AnalysisError::data_quality(report.offending()));
            }
            CleaningPolicy::DropRows => {
                let (frame, removed) = drop_invalid_rows(df, columns, &spec_rows)?;
                (frame, removed, 0)
            }
            CleaningPolicy::Median => {
                let (frame, replaced) =
                    replace_invalid_values(df, columns, &spec_rows, Replacement::Median)?;
                (frame, 0, replaced)
            }
            CleaningPolicy::Sentinel { value } => {
                let (frame, replaced) = replace_invalid_values(
                    df,
                    columns,
                    &spec_rows,
                    Replacement::Constant(value),
                )?;
                (frame, 0, replaced)
            }
        };

        let remaining = self.inspect(&frame, columns)?;
        if !remaining.is_clean() {
            return Err(AnalysisError::data_quality(remaining.offending()));
        }

        info!(
            "Cleaned {} invalid values with policy '{}' ({} rows removed, {} values replaced)",
            report.total(),
            self.policy.name(),
            rows_removed,
            values_replaced
        );

        Ok(CleaningOutcome {
            frame,
            report,
            rows_removed,
            values_replaced,
        })
    }

    fn spec_row_flags(&self, df: &DataFrame) -> Result<Vec<bool>> {
        Ok(limit_kinds(df, &self.identifier_column)?
            .into_iter()
            .map(|kind| kind.is_some())
            .collect())
    }
}
