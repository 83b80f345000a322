//! Specification limit extraction.
//!
//! Limits are stored in the measurement sheet itself as pseudo-rows whose
//! identifier is `LSL` or `USL`. [`SpecExtractor`] separates those rows from
//! the part rows and reads one optional threshold per column from them.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::utils::is_numeric_dtype;

/// Identifier token of the lower specification limit row.
pub const LSL_TOKEN: &str = "LSL";
/// Identifier token of the upper specification limit row.
pub const USL_TOKEN: &str = "USL";

/// Which limit a spec row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Lower,
    Upper,
}

impl LimitKind {
    pub fn token(&self) -> &'static str {
        match self {
            Self::Lower => LSL_TOKEN,
            Self::Upper => USL_TOKEN,
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            LSL_TOKEN => Some(Self::Lower),
            USL_TOKEN => Some(Self::Upper),
            _ => None,
        }
    }
}

/// Limits of a single column. `None` means "no limit", never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnLimits {
    pub lsl: Option<f64>,
    pub usl: Option<f64>,
}

impl ColumnLimits {
    /// Whether a value falls outside either limit.
    pub fn is_out_of_spec(&self, value: f64) -> bool {
        self.lsl.is_some_and(|lsl| value < lsl) || self.usl.is_some_and(|usl| value > usl)
    }
}

/// Per-column limits, in measured-column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecLimits {
    columns: Vec<(String, ColumnLimits)>,
}

impl SpecLimits {
    /// Limits for a column; unknown columns have no limits.
    pub fn get(&self, column: &str) -> ColumnLimits {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, limits)| *limits)
            .unwrap_or_default()
    }

    pub fn lsl(&self, column: &str) -> Option<f64> {
        self.get(column).lsl
    }

    pub fn usl(&self, column: &str) -> Option<f64> {
        self.get(column).usl
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnLimits)> {
        self.columns.iter().map(|(name, limits)| (name.as_str(), limits))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Spec rows and data rows of one frame.
///
/// Both frames keep the input's schema and relative row order; together they
/// hold exactly the input's rows.
#[derive(Debug, Clone)]
pub struct SpecExtraction {
    spec_rows: DataFrame,
    data_rows: DataFrame,
    lsl_row: Option<usize>,
    usl_row: Option<usize>,
}

impl SpecExtraction {
    /// The `LSL`/`USL` rows, in input order.
    pub fn spec_rows(&self) -> &DataFrame {
        &self.spec_rows
    }

    /// Every other row, in input order.
    pub fn data_rows(&self) -> &DataFrame {
        &self.data_rows
    }

    pub fn has_limit_row(&self, kind: LimitKind) -> bool {
        match kind {
            LimitKind::Lower => self.lsl_row.is_some(),
            LimitKind::Upper => self.usl_row.is_some(),
        }
    }

    /// Read the limits of `columns` from the spec rows.
    pub fn limits<S: AsRef<str>>(&self, columns: &[S]) -> SpecLimits {
        let columns = columns
            .iter()
            .map(|column| {
                let column = column.as_ref();
                let limits = ColumnLimits {
                    lsl: self.limit_value(column, self.lsl_row),
                    usl: self.limit_value(column, self.usl_row),
                };
                debug!(
                    "Limits for '{}': lsl={:?}, usl={:?}",
                    column, limits.lsl, limits.usl
                );
                (column.to_string(), limits)
            })
            .collect();
        SpecLimits { columns }
    }

    fn limit_value(&self, column: &str, row: Option<usize>) -> Option<f64> {
        let row = row?;
        let series = self.spec_rows.column(column).ok()?.as_materialized_series();
        if !is_numeric_dtype(series.dtype()) {
            return None;
        }
        let values = series.cast(&DataType::Float64).ok()?;
        values.f64().ok()?.get(row).filter(|v| v.is_finite())
    }
}

/// Classify every row of `df` by its identifier: `Some(kind)` for spec rows.
pub(crate) fn limit_kinds(
    df: &DataFrame,
    identifier_column: &str,
) -> Result<Vec<Option<LimitKind>>> {
    let column = df.column(identifier_column).map_err(|_| {
        AnalysisError::Schema(format!("identifier column '{identifier_column}' not found"))
    })?;
    let dtype = column.dtype();
    if !matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        return Err(AnalysisError::Schema(format!(
            "identifier column '{identifier_column}' must hold text, found {dtype}"
        )));
    }
    let identifiers = column.as_materialized_series().cast(&DataType::String)?;

    Ok(identifiers
        .str()?
        .into_iter()
        .map(|value| value.and_then(LimitKind::from_token))
        .collect())
}

/// Splits spec rows from data rows by the identifier column.
#[derive(Debug, Clone)]
pub struct SpecExtractor {
    identifier_column: String,
}

impl SpecExtractor {
    pub fn new(identifier_column: impl Into<String>) -> Self {
        Self {
            identifier_column: identifier_column.into(),
        }
    }

    /// Separate `LSL`/`USL` rows from data rows.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::Schema`] if the identifier column is absent or does
    ///   not hold text.
    /// - [`AnalysisError::Configuration`] if more than one row carries the
    ///   same limit token.
    pub fn extract(&self, df: &DataFrame) -> Result<SpecExtraction> {
        let kinds = limit_kinds(df, &self.identifier_column)?;

        let mut spec_mask = Vec::with_capacity(kinds.len());
        let mut data_mask = Vec::with_capacity(kinds.len());
        let mut lsl_rows = Vec::new();
        let mut usl_rows = Vec::new();
        let mut spec_index = 0usize;

        for kind in &kinds {
            match kind {
                Some(LimitKind::Lower) => lsl_rows.push(spec_index),
                Some(LimitKind::Upper) => usl_rows.push(spec_index),
                None => {}
            }
            if kind.is_some() {
                spec_index += 1;
            }
            spec_mask.push(kind.is_some());
            data_mask.push(kind.is_none());
        }

        for (kind, rows) in [(LimitKind::Lower, &lsl_rows), (LimitKind::Upper, &usl_rows)] {
            if rows.len() > 1 {
                return Err(AnalysisError::Configuration(format!(
                    "found {} '{}' rows in column '{}'; at most one is allowed",
                    rows.len(),
                    kind.token(),
                    self.identifier_column
                )));
            }
        }

        let spec_rows = df.filter(&BooleanChunked::from_slice("spec_mask".into(), &spec_mask))?;
        let data_rows = df.filter(&BooleanChunked::from_slice("data_mask".into(), &data_mask))?;

        debug!(
            "Extracted {} spec rows and {} data rows",
            spec_rows.height(),
            data_rows.height()
        );

        Ok(SpecExtraction {
            spec_rows,
            data_rows,
            lsl_row: lsl_rows.first().copied(),
            usl_row: usl_rows.first().copied(),
        })
    }
}
