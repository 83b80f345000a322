//! Configuration types for the analysis pipeline.
//!
//! Every option is an explicit field with a default, so a partially written
//! JSON file deserializes into a complete configuration. Validation runs once
//! when the configuration is built or loaded.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::AnalysisError;

/// Default identifier column holding part serial numbers and spec tokens.
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "SN";

/// Rule for resolving non-finite values in measured columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CleaningPolicy {
    /// Drop every data row holding an invalid value in any measured column.
    #[default]
    DropRows,
    /// Replace invalid values with the median of the column's finite values.
    Median,
    /// Replace invalid values with a fixed finite value.
    Sentinel { value: f64 },
    /// Refuse to clean: any invalid value fails the run.
    Reject,
}

impl CleaningPolicy {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DropRows => "drop_rows",
            Self::Median => "median",
            Self::Sentinel { .. } => "sentinel",
            Self::Reject => "reject",
        }
    }
}

/// Group analysis settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupAnalysisConfig {
    /// Whether the per-group pass runs.
    pub enabled: bool,
    /// Categorical column to partition by. Required when `enabled`.
    pub group_by: Option<String>,
}

/// Data processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataProcessingConfig {
    pub group_analysis: GroupAnalysisConfig,
    pub cleaning_policy: CleaningPolicy,
    /// Numeric columns never analyzed.
    pub exclude_columns: Vec<String>,
}

/// Report toggles and rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub enable_distribution: bool,
    pub enable_boxplot: bool,
    pub enable_correlation: bool,
    pub enable_group_boxplot: bool,
    pub enable_all_columns_compare: bool,
    /// Font family handed to the renderer.
    pub font_family: String,
    /// Render the minus sign with an ASCII hyphen.
    pub unicode_minus: bool,
    pub dpi: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            enable_distribution: true,
            enable_boxplot: true,
            enable_correlation: true,
            enable_group_boxplot: true,
            enable_all_columns_compare: true,
            font_family: "Microsoft YaHei".to_string(),
            unicode_minus: false,
            dpi: 100,
        }
    }
}

/// Complete configuration for one analysis run.
///
/// Use [`AnalysisConfig::builder()`] in code or
/// [`AnalysisConfig::from_json_file`] to load one from disk.
///
/// # Example
///
/// ```rust,ignore
/// use qc_analysis::config::{AnalysisConfig, CleaningPolicy};
///
/// let config = AnalysisConfig::builder()
///     .group_by("Batch")
///     .cleaning_policy(CleaningPolicy::Median)
///     .exclude_column("Temperature")
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Column holding serial numbers and the `LSL`/`USL` tokens.
    /// Default: "SN"
    pub identifier_column: String,

    /// Directory under which the timestamped run directory is created.
    /// Default: "output"
    pub output_root: PathBuf,

    pub data_processing: DataProcessingConfig,

    pub plot: PlotConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            output_root: PathBuf::from("output"),
            data_processing: DataProcessingConfig::default(),
            plot: PlotConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> crate::error::Result<Self> {
        let config = serde_json::from_str::<AnalysisConfig>(json)?.normalized();
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::Configuration(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Trim surrounding whitespace from column names.
    ///
    /// Applied once when a configuration is built or loaded, so lookups and
    /// validation see the same names.
    pub fn normalized(mut self) -> Self {
        self.identifier_column = self.identifier_column.trim().to_string();
        let group = &mut self.data_processing.group_analysis;
        group.group_by = group.group_by.take().map(|name| name.trim().to_string());
        for column in &mut self.data_processing.exclude_columns {
            *column = column.trim().to_string();
        }
        self
    }

    /// The group column, when grouping is enabled.
    pub fn group_column(&self) -> Option<&str> {
        let group = &self.data_processing.group_analysis;
        if group.enabled {
            group.group_by.as_deref()
        } else {
            None
        }
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.identifier_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyIdentifier);
        }

        let group = &self.data_processing.group_analysis;
        if group.enabled {
            match group.group_by.as_deref().map(str::trim) {
                None | Some("") => return Err(ConfigValidationError::MissingGroupBy),
                Some(name) if name == self.identifier_column.trim() => {
                    return Err(ConfigValidationError::GroupByIsIdentifier(name.to_string()));
                }
                Some(_) => {}
            }
        }

        if let CleaningPolicy::Sentinel { value } = self.data_processing.cleaning_policy
            && !value.is_finite()
        {
            return Err(ConfigValidationError::NonFiniteSentinel(value));
        }

        if self.plot.dpi == 0 {
            return Err(ConfigValidationError::InvalidDpi);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("identifier_column must not be empty")]
    EmptyIdentifier,

    #[error("group_analysis is enabled but group_by is not set")]
    MissingGroupBy,

    #[error("group_by '{0}' is the identifier column")]
    GroupByIsIdentifier(String),

    #[error("sentinel value {0} is not finite")]
    NonFiniteSentinel(f64),

    #[error("dpi must be at least 1")]
    InvalidDpi,
}

impl From<ConfigValidationError> for AnalysisError {
    fn from(e: ConfigValidationError) -> Self {
        AnalysisError::Configuration(e.to_string())
    }
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    identifier_column: Option<String>,
    output_root: Option<PathBuf>,
    group_by: Option<String>,
    cleaning_policy: Option<CleaningPolicy>,
    exclude_columns: Vec<String>,
    plot: Option<PlotConfig>,
}

impl AnalysisConfigBuilder {
    /// Set the identifier column (default "SN").
    pub fn identifier_column(mut self, column: impl Into<String>) -> Self {
        self.identifier_column = Some(column.into());
        self
    }

    /// Set the directory under which run directories are created.
    pub fn output_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_root = Some(path.into());
        self
    }

    /// Enable group analysis by the given column.
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by = Some(column.into());
        self
    }

    /// Set the cleaning policy for non-finite values.
    pub fn cleaning_policy(mut self, policy: CleaningPolicy) -> Self {
        self.cleaning_policy = Some(policy);
        self
    }

    /// Exclude a numeric column from analysis.
    pub fn exclude_column(mut self, column: impl Into<String>) -> Self {
        self.exclude_columns.push(column.into());
        self
    }

    /// Replace the report toggles and rendering settings.
    pub fn plot(mut self, plot: PlotConfig) -> Self {
        self.plot = Some(plot);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalysisConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnalysisConfig, ConfigValidationError> {
        let config = AnalysisConfig {
            identifier_column: self
                .identifier_column
                .unwrap_or_else(|| DEFAULT_IDENTIFIER_COLUMN.to_string()),
            output_root: self.output_root.unwrap_or_else(|| PathBuf::from("output")),
            data_processing: DataProcessingConfig {
                group_analysis: GroupAnalysisConfig {
                    enabled: self.group_by.is_some(),
                    group_by: self.group_by,
                },
                cleaning_policy: self.cleaning_policy.unwrap_or_default(),
                exclude_columns: self.exclude_columns,
            },
            plot: self.plot.unwrap_or_default(),
        }
        .normalized();

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.identifier_column, "SN");
        assert!(!config.data_processing.group_analysis.enabled);
        assert!(config.data_processing.exclude_columns.is_empty());
        assert_eq!(config.data_processing.cleaning_policy, CleaningPolicy::DropRows);
        assert!(config.plot.enable_distribution);
        assert_eq!(config.group_column(), None);
    }

    #[test]
    fn test_builder_enables_grouping() {
        let config = AnalysisConfig::builder()
            .group_by("Batch")
            .exclude_column("Temp")
            .build()
            .unwrap();

        assert!(config.data_processing.group_analysis.enabled);
        assert_eq!(config.group_column(), Some("Batch"));
        assert_eq!(config.data_processing.exclude_columns, vec!["Temp".to_string()]);
    }

    #[test]
    fn test_column_names_are_trimmed_once() {
        let config = AnalysisConfig::builder()
            .identifier_column(" SN")
            .group_by(" Batch ")
            .exclude_column("Temp ")
            .build()
            .unwrap();
        assert_eq!(config.identifier_column, "SN");
        assert_eq!(config.group_column(), Some("Batch"));
        assert_eq!(config.data_processing.exclude_columns, vec!["Temp".to_string()]);

        let json = r#"{ "data_processing": { "group_analysis": { "enabled": true, "group_by": "Batch\t" } } }"#;
        let config = AnalysisConfig::from_json_str(json).unwrap();
        assert_eq!(config.group_column(), Some("Batch"));
    }

    #[test]
    fn test_validation_missing_group_by() {
        let config = AnalysisConfig {
            data_processing: DataProcessingConfig {
                group_analysis: GroupAnalysisConfig {
                    enabled: true,
                    group_by: None,
                },
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::MissingGroupBy)
        ));
    }

    #[test]
    fn test_validation_group_by_identifier() {
        let result = AnalysisConfig::builder().group_by("SN").build();
        assert!(matches!(
            result,
            Err(ConfigValidationError::GroupByIsIdentifier(_))
        ));
    }

    #[test]
    fn test_validation_non_finite_sentinel() {
        let result = AnalysisConfig::builder()
            .cleaning_policy(CleaningPolicy::Sentinel { value: f64::NAN })
            .build();
        assert!(matches!(
            result,
            Err(ConfigValidationError::NonFiniteSentinel(_))
        ));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "data_processing": {
                "group_analysis": { "enabled": true, "group_by": "Batch" }
            },
            "plot": { "enable_correlation": false }
        }"#;

        let config = AnalysisConfig::from_json_str(json).unwrap();
        assert_eq!(config.group_column(), Some("Batch"));
        assert_eq!(config.identifier_column, "SN");
        assert!(!config.plot.enable_correlation);
        assert!(config.plot.enable_boxplot);
        assert_eq!(config.data_processing.cleaning_policy, CleaningPolicy::DropRows);
    }

    #[test]
    fn test_cleaning_policy_from_json() {
        let json = r#"{
            "data_processing": {
                "cleaning_policy": { "strategy": "sentinel", "value": -1.0 },
                "exclude_columns": ["Temp"]
            }
        }"#;

        let config = AnalysisConfig::from_json_str(json).unwrap();
        assert_eq!(
            config.data_processing.cleaning_policy,
            CleaningPolicy::Sentinel { value: -1.0 }
        );
    }

    #[test]
    fn test_invalid_json_config_is_configuration_error() {
        let json = r#"{ "data_processing": { "group_analysis": { "enabled": true } } }"#;
        let err = AnalysisConfig::from_json_str(json).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }
}
