//! Per-column statistics summary.
//!
//! Descriptive statistics plus process capability indices against the
//! column's spec limits:
//!
//! - Cp  = (USL - LSL) / 6σ, requires both limits
//! - Cpu = (USL - mean) / 3σ
//! - Cpl = (mean - LSL) / 3σ
//! - Cpk = min(Cpu, Cpl) over the limits that exist
//!
//! σ is the sample standard deviation of the data rows.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::spec_limits::{ColumnLimits, SpecLimits};
use crate::utils::{finite_values, float_values, median, sample_std};

/// File name written by [`JsonStatisticsExporter`].
pub const STATISTICS_FILE_NAME: &str = "statistics.json";

/// Summary statistics of one measured column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    pub lsl: Option<f64>,
    pub usl: Option<f64>,
    pub cp: Option<f64>,
    pub cpk: Option<f64>,
    /// Values below LSL or above USL.
    pub out_of_spec: usize,
}

impl ColumnStatistics {
    /// Compute statistics of `values` against `limits`. Non-finite values are
    /// ignored.
    pub fn compute(column: impl Into<String>, values: &[Option<f64>], limits: ColumnLimits) -> Self {
        let finite = finite_values(values);
        let count = finite.len();
        let mean = (count > 0).then(|| finite.iter().sum::<f64>() / count as f64);
        let std = sample_std(&finite);
        let min = finite.iter().copied().reduce(f64::min);
        let max = finite.iter().copied().reduce(f64::max);

        let sigma = std.filter(|s| *s > 0.0);
        let cp = match (limits.lsl, limits.usl, sigma) {
            (Some(lsl), Some(usl), Some(s)) => Some((usl - lsl) / (6.0 * s)),
            _ => None,
        };
        let cpk = match (mean, sigma) {
            (Some(m), Some(s)) => {
                let cpu = limits.usl.map(|usl| (usl - m) / (3.0 * s));
                let cpl = limits.lsl.map(|lsl| (m - lsl) / (3.0 * s));
                match (cpu, cpl) {
                    (Some(u), Some(l)) => Some(u.min(l)),
                    (one, other) => one.or(other),
                }
            }
            _ => None,
        };

        Self {
            column: column.into(),
            count,
            mean,
            std,
            min,
            max,
            median: median(&finite),
            lsl: limits.lsl,
            usl: limits.usl,
            cp,
            cpk,
            out_of_spec: finite.iter().filter(|v| limits.is_out_of_spec(**v)).count(),
        }
    }
}

/// Statistics of every measured column of one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub is_group_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub rows: usize,
    pub columns: Vec<ColumnStatistics>,
}

/// Describe `columns` of `data_rows`.
pub fn describe_columns(
    data_rows: &DataFrame,
    columns: &[String],
    limits: &SpecLimits,
) -> Result<Vec<ColumnStatistics>> {
    columns
        .iter()
        .map(|column| -> Result<ColumnStatistics> {
            let values = float_values(data_rows, column)?;
            Ok(ColumnStatistics::compute(column.as_str(), &values, limits.get(column)))
        })
        .collect()
}

/// Input to a statistics export.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsRequest<'a> {
    /// Data rows only.
    pub data_rows: &'a DataFrame,
    pub columns: &'a [String],
    pub limits: &'a SpecLimits,
    pub config: &'a AnalysisConfig,
    pub output_dir: &'a Path,
    pub is_group_data: bool,
    /// Group key when `is_group_data`.
    pub group: Option<&'a str>,
}

/// Writes a tabular summary of a pass. The pipeline does not validate it.
pub trait StatisticsExporter: Send + Sync {
    /// Export and return the written path.
    fn export(&self, request: &StatisticsRequest<'_>) -> anyhow::Result<PathBuf>;
}

/// Writes `statistics.json` into the pass directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStatisticsExporter;

impl StatisticsExporter for JsonStatisticsExporter {
    fn export(&self, request: &StatisticsRequest<'_>) -> anyhow::Result<PathBuf> {
        let summary = StatisticsSummary {
            is_group_data: request.is_group_data,
            group_by: request
                .is_group_data
                .then(|| request.config.group_column().map(str::to_string))
                .flatten(),
            group: request.group.map(str::to_string),
            rows: request.data_rows.height(),
            columns: describe_columns(request.data_rows, request.columns, request.limits)?,
        };

        fs::create_dir_all(request.output_dir)?;
        let path = request.output_dir.join(STATISTICS_FILE_NAME);
        let mut file = File::create(&path)?;
        file.write_all(serde_json::to_string_pretty(&summary)?.as_bytes())?;

        info!("Statistics saved: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec_limits::SpecExtractor;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn test_capability_two_sided() {
        let values = [Some(9.0), Some(10.0), Some(11.0)];
        let limits = ColumnLimits {
            lsl: Some(7.0),
            usl: Some(14.0),
        };
        let stats = ColumnStatistics::compute("Width", &values, limits);

        assert_eq!(stats.count, 3);
        assert!(approx(stats.mean, 10.0));
        assert!(approx(stats.std, 1.0));
        assert!(approx(stats.cp, 7.0 / 6.0));
        assert!(approx(stats.cpk, 1.0));
        assert_eq!(stats.out_of_spec, 0);
    }

    #[test]
    fn test_one_sided_and_missing_limits() {
        let values = [Some(1.0), Some(3.0), Some(f64::NAN), None];
        let upper_only = ColumnStatistics::compute(
            "Width",
            &values,
            ColumnLimits {
                lsl: None,
                usl: Some(2.5),
            },
        );
        assert_eq!(upper_only.count, 2);
        assert_eq!(upper_only.cp, None);
        assert!(upper_only.cpk.is_some());
        assert_eq!(upper_only.out_of_spec, 1);

        let no_limits = ColumnStatistics::compute("Width", &values, ColumnLimits::default());
        assert_eq!(no_limits.cpk, None);
        assert_eq!(no_limits.out_of_spec, 0);
    }

    #[test]
    fn test_json_exporter_writes_summary() {
        let df = df![
            "SN" => ["LSL", "USL", "P1", "P2"],
            "Width" => [1.0, 5.0, 3.0, 4.0],
        ]
        .unwrap();
        let extraction = SpecExtractor::new("SN").extract(&df).unwrap();
        let columns = vec!["Width".to_string()];
        let limits = extraction.limits(&columns);
        let config = AnalysisConfig::default();
        let dir = tempfile::tempdir().unwrap();

        let path = JsonStatisticsExporter
            .export(&StatisticsRequest {
                data_rows: extraction.data_rows(),
                columns: &columns,
                limits: &limits,
                config: &config,
                output_dir: dir.path(),
                is_group_data: false,
                group: None,
            })
            .unwrap();

        let summary: StatisticsSummary =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.columns[0].lsl, Some(1.0));
        assert_eq!(summary.columns[0].usl, Some(5.0));
        assert!(approx(summary.columns[0].mean, 3.5));
        assert_eq!(summary.group, None);
    }
}
