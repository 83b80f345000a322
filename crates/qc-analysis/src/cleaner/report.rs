//! Invalid-value diagnostics produced before cleaning.

use serde::{Deserialize, Serialize};

/// Invalid values found in one measured column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInvalidCount {
    pub column: String,
    pub invalid: usize,
}

/// Per-column counts of NaN, infinite and missing values among data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidValueReport {
    /// Data rows inspected (spec rows excluded).
    pub rows_inspected: usize,
    /// One entry per inspected column, in column order.
    pub columns: Vec<ColumnInvalidCount>,
}

impl InvalidValueReport {
    /// Total invalid values across all columns.
    pub fn total(&self) -> usize {
        self.columns.iter().map(|c| c.invalid).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    /// Invalid count of one column, zero when not inspected.
    pub fn invalid_in(&self, column: &str) -> usize {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map_or(0, |c| c.invalid)
    }

    /// Columns holding at least one invalid value, with their counts.
    pub fn offending(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .filter(|c| c.invalid > 0)
            .map(|c| (c.column.clone(), c.invalid))
            .collect()
    }
}
