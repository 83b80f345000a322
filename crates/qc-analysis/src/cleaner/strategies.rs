//! Resolution strategies for invalid measurements.
//!
//! Spec rows are never touched: their empty cells mean "no limit".

use polars::prelude::*;
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::utils::{finite_values, float_values, is_valid_measurement, median};

/// Remove data rows holding an invalid value in any of `columns`.
///
/// Returns the filtered frame and the number of rows removed.
pub(crate) fn drop_invalid_rows(
    df: DataFrame,
    columns: &[String],
    spec_rows: &[bool],
) -> Result<(DataFrame, usize)> {
    let mut keep = vec![true; df.height()];

    for column in columns {
        let values = float_values(&df, column)?;
        for (idx, value) in values.into_iter().enumerate() {
            if !spec_rows[idx] && !is_valid_measurement(value) {
                keep[idx] = false;
            }
        }
    }

    let removed = keep.iter().filter(|k| !**k).count();
    if removed == 0 {
        return Ok((df, 0));
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let df = df.filter(&mask)?;
    debug!("Dropped {} rows with invalid measurements", removed);
    Ok((df, removed))
}

/// How a replaced value is chosen.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Replacement {
    Median,
    Constant(f64),
}

/// Replace invalid data-row values in `columns`.
///
/// Returns the updated frame and the number of values replaced. With
/// [`Replacement::Median`], a column without any finite data value cannot be
/// repaired and is reported as a data-quality error.
///
/// A column with at least one replaced value is written back as `Float64`,
/// so an integer column holding nulls comes out as floats. Columns without
/// invalid values keep their dtype.
pub(crate) fn replace_invalid_values(
    mut df: DataFrame,
    columns: &[String],
    spec_rows: &[bool],
    replacement: Replacement,
) -> Result<(DataFrame, usize)> {
    let mut replaced_total = 0;
    let mut unrepairable = Vec::new();

    for column in columns {
        let values = float_values(&df, column)?;
        let invalid = values
            .iter()
            .zip(spec_rows)
            .filter(|(value, is_spec)| !**is_spec && !is_valid_measurement(**value))
            .count();
        if invalid == 0 {
            continue;
        }

        let fill = match replacement {
            Replacement::Constant(value) => value,
            Replacement::Median => {
                let data_values: Vec<Option<f64>> = values
                    .iter()
                    .zip(spec_rows)
                    .filter(|(_, is_spec)| !**is_spec)
                    .map(|(value, _)| *value)
                    .collect();
                match median(&finite_values(&data_values)) {
                    Some(m) => m,
                    None => {
                        unrepairable.push((column.clone(), invalid));
                        continue;
                    }
                }
            }
        };

        let repaired: Vec<Option<f64>> = values
            .into_iter()
            .zip(spec_rows)
            .map(|(value, is_spec)| {
                if *is_spec || is_valid_measurement(value) {
                    value
                } else {
                    Some(fill)
                }
            })
            .collect();

        df.replace(column, Series::new(column.as_str().into(), repaired))?;
        debug!("Replaced {} invalid values in '{}' with {}", invalid, column, fill);
        replaced_total += invalid;
    }

    if !unrepairable.is_empty() {
        return Err(AnalysisError::data_quality(unrepairable));
    }

    Ok((df, replaced_total))
}
