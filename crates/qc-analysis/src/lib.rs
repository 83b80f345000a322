//! QC Measurement Analysis Library
//!
//! Data preparation and grouping for quality-control measurement tables,
//! built with Rust and Polars.
//!
//! # Overview
//!
//! A measurement table has one identifier column (default `SN`), any number
//! of numeric measured columns, and two special rows whose identifier is
//! `LSL` or `USL` holding the lower and upper spec limit of each column.
//!
//! - **Column Selection**: Numeric columns become measured columns, minus the
//!   identifier, the group column and an exclusion list
//! - **Cleaning**: NaN, infinite and missing measurements are dropped,
//!   replaced or rejected according to a [`CleaningPolicy`]
//! - **Spec Limits**: `LSL`/`USL` rows are split from data rows and resolved
//!   per column
//! - **Grouping**: Data rows are partitioned by a group column; every group
//!   frame carries the spec rows
//! - **Reporting**: Statistics and charts for the whole table, for each group
//!   and across groups, through pluggable [`ReportRenderer`]s
//! - **Progress Reporting**: Progress updates with cancellation support
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use qc_analysis::{AnalysisConfig, AnalysisPipeline, CleaningPolicy, CsvSource};
//! use std::sync::Arc;
//!
//! let config = AnalysisConfig::builder()
//!     .output_root("reports")
//!     .group_by("Batch")
//!     .cleaning_policy(CleaningPolicy::Median)
//!     .build()?;
//!
//! let outcome = AnalysisPipeline::builder()
//!     .config(config)
//!     .renderer(Arc::new(MyRenderer::default()))
//!     .build()?
//!     .run(&CsvSource::new("line_a.csv"))?;
//!
//! println!("Reports written to {}", outcome.output_dir.display());
//! ```
//!
//! # Configuration
//!
//! [`AnalysisConfig`] can be built in code or read from JSON:
//!
//! ```json
//! {
//!   "identifier_column": "SN",
//!   "output_root": "reports",
//!   "data_processing": {
//!     "group_analysis": { "enabled": true, "group_by": "Batch" },
//!     "cleaning_policy": { "strategy": "sentinel", "value": 0.0 }
//!   },
//!   "plot": { "enable_correlation": false }
//! }
//! ```
//!
//! # Failure Model
//!
//! Preparation errors stop a run before any report is written. A failing
//! report is recorded in [`AnalysisOutcome::failures`] and the run goes on.

pub mod cleaner;
pub mod config;
pub mod error;
pub mod grouping;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod selector;
pub mod spec_limits;
pub mod statistics;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{CleaningOutcome, ColumnInvalidCount, DataCleaner, InvalidValueReport};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, CleaningPolicy, ConfigValidationError,
    DataProcessingConfig, GroupAnalysisConfig, PlotConfig,
};
pub use error::{AnalysisError, Result as AnalysisResult, ResultExt};
pub use grouping::{GroupFrame, GroupPartitioner, GroupedFrames, MISSING_GROUP_KEY};
pub use loader::{CsvSource, DatasetSource};
pub use output::OutputLayout;
pub use pipeline::{
    AnalysisOutcome, AnalysisPipeline, AnalysisPipelineBuilder, CancellationToken,
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate, ReportFailure,
    ReportScope,
};
pub use render::{
    FigureSink, FileFigureSink, Figure, RenderContext, RenderRequest, RenderSession, ReportKind,
    ReportRenderer,
};
pub use selector::ColumnSelector;
pub use spec_limits::{
    ColumnLimits, LSL_TOKEN, LimitKind, SpecExtraction, SpecExtractor, SpecLimits, USL_TOKEN,
};
pub use statistics::{
    ColumnStatistics, JsonStatisticsExporter, StatisticsExporter, StatisticsRequest,
    StatisticsSummary,
};
