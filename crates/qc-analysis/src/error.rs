//! Error types for the analysis pipeline.
//!
//! Errors fall into two groups: preparation errors (source, schema, data
//! quality, configuration) that stop a run, and report errors that are
//! collected per report while the run continues.
//!
//! Errors are serializable as `{code, message}` so callers can hand them to a
//! frontend or a JSON log unchanged.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the analysis pipeline.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The source file is missing or unreadable.
    #[error("Failed to read source '{source_name}': {reason}")]
    SourceRead { source_name: String, reason: String },

    /// A required column is absent or has the wrong type.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Measured columns still hold non-finite values the policy cannot resolve.
    #[error("Unresolved invalid values in measured columns: {summary}")]
    DataQuality {
        summary: String,
        columns: Vec<(String, usize)>,
    },

    /// Invalid or ambiguous configuration (including ambiguous spec rows).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A renderer, sink or exporter failed to produce one report.
    #[error("Failed to produce report '{report}': {message}")]
    Render { report: String, message: String },

    /// Run was cancelled through its cancellation token.
    #[error("Analysis cancelled")]
    Cancelled,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Build a data-quality error from per-column invalid counts.
    pub fn data_quality(columns: Vec<(String, usize)>) -> Self {
        let summary = columns
            .iter()
            .map(|(name, count)| format!("{name} ({count})"))
            .collect::<Vec<_>>()
            .join(", ");
        AnalysisError::DataQuality { summary, columns }
    }

    /// Wrap a collaborator failure for the named report.
    pub fn render(report: impl Into<String>, source: &anyhow::Error) -> Self {
        AnalysisError::Render {
            report: report.into(),
            message: format!("{source:#}"),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AnalysisError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SourceRead { .. } => "SOURCE_READ_ERROR",
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::DataQuality { .. } => "DATA_QUALITY_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Render { .. } => "RENDER_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Whether this error must stop the whole run.
    ///
    /// Only report errors are collected and survived; everything else aborts.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Render { .. } => false,
            Self::WithContext { source, .. } => source.is_fatal(),
            _ => true,
        }
    }
}

impl Serialize for AnalysisError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AnalysisError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AnalysisError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AnalysisError::Io(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(AnalysisError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            AnalysisError::Schema("missing SN".to_string()).error_code(),
            "SCHEMA_ERROR"
        );
    }

    #[test]
    fn test_data_quality_summary_names_columns_and_counts() {
        let error = AnalysisError::data_quality(vec![
            ("Width".to_string(), 2),
            ("Height".to_string(), 1),
        ]);
        let message = error.to_string();
        assert!(message.contains("Width (2)"));
        assert!(message.contains("Height (1)"));
        assert_eq!(error.error_code(), "DATA_QUALITY_ERROR");
    }

    #[test]
    fn test_render_errors_are_not_fatal() {
        let source = anyhow::anyhow!("backend exploded");
        let error = AnalysisError::render("boxplot", &source);
        assert!(!error.is_fatal());
        assert!(error.to_string().contains("backend exploded"));
        assert!(!error.with_context("group A").is_fatal());
        assert!(AnalysisError::Configuration("x".to_string()).is_fatal());
    }

    #[test]
    fn test_error_serialization() {
        let error = AnalysisError::Configuration("group column 'Batch' not found".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("CONFIGURATION_ERROR"));
        assert!(json.contains("Batch"));
    }

    #[test]
    fn test_with_context() {
        let error = AnalysisError::Cancelled.with_context("During group pass");
        assert!(error.to_string().contains("During group pass"));
        assert_eq!(error.error_code(), "CANCELLED");
        assert!(error.is_cancelled());
    }
}
