//! The analysis pipeline and its builder.
//!
//! A run loads one dataset, cleans its measured columns, writes the overall
//! report set into a fresh run directory and, when grouping is enabled,
//! repeats the report set per group before writing cross-group comparisons.

use chrono::Local;
use polars::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::cleaner::DataCleaner;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result, ResultExt};
use crate::grouping::GroupPartitioner;
use crate::loader::DatasetSource;
use crate::output::OutputLayout;
use crate::pipeline::outcome::{AnalysisOutcome, ReportScope};
use crate::pipeline::passes::{PreparedFrame, ReportWriter};
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::render::{FileFigureSink, FigureSink, RenderContext, RenderSession, ReportRenderer};
use crate::selector::ColumnSelector;
use crate::spec_limits::SpecExtractor;
use crate::statistics::{JsonStatisticsExporter, StatisticsExporter};

/// The analysis pipeline.
///
/// Use [`AnalysisPipeline::builder()`] to create one. A renderer is required;
/// figures are written to disk and statistics to `statistics.json` unless
/// other collaborators are supplied.
///
/// # Example
///
/// ```rust,ignore
/// use qc_analysis::{AnalysisConfig, AnalysisPipeline, CsvSource};
/// use std::sync::Arc;
///
/// let config = AnalysisConfig::builder()
///     .output_root("reports")
///     .group_by("Batch")
///     .build()?;
///
/// let outcome = AnalysisPipeline::builder()
///     .config(config)
///     .renderer(Arc::new(MyRenderer::default()))
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run(&CsvSource::new("line_a.csv"))?;
///
/// for failure in &outcome.failures {
///     eprintln!("{}: {}", failure.scope, failure.error);
/// }
/// ```
pub struct AnalysisPipeline {
    config: AnalysisConfig,
    renderer: Arc<dyn ReportRenderer>,
    sink: Arc<dyn FigureSink>,
    exporter: Arc<dyn StatisticsExporter>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
    run_directory: Option<PathBuf>,
}

// Runs are typically moved onto a worker thread.
static_assertions::assert_impl_all!(AnalysisPipeline: Send, Sync);

impl AnalysisPipeline {
    pub fn builder() -> AnalysisPipelineBuilder {
        AnalysisPipelineBuilder::default()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load `source` and analyze it.
    ///
    /// # Errors
    ///
    /// Preparation errors stop the run: [`AnalysisError::SourceRead`],
    /// [`AnalysisError::Schema`], [`AnalysisError::DataQuality`],
    /// [`AnalysisError::Configuration`] and [`AnalysisError::Cancelled`].
    /// Report failures do not; they are listed in the outcome.
    pub fn run(&self, source: &dyn DatasetSource) -> Result<AnalysisOutcome> {
        self.start(&source.name());
        self.finish(self.run_internal(source))
    }

    /// Analyze an already loaded frame. `source_name` names the run directory.
    pub fn run_frame(&self, df: DataFrame, source_name: &str) -> Result<AnalysisOutcome> {
        self.start(source_name);
        self.finish(self.analyze(df, source_name))
    }

    fn start(&self, source_name: &str) {
        info!("Starting analysis of '{}'...", source_name);
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Initializing,
            1.0,
            "Starting analysis...",
        ));
    }

    fn finish(&self, result: Result<AnalysisOutcome>) -> Result<AnalysisOutcome> {
        match result {
            Ok(outcome) => {
                let message = if outcome.is_complete() {
                    "Analysis completed successfully".to_string()
                } else {
                    format!(
                        "Analysis completed with {} failed report(s)",
                        outcome.failures.len()
                    )
                };
                self.report_progress(ProgressUpdate::complete(message));
                Ok(outcome)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Analysis error: {}", e);
                Err(e)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, source: &dyn DatasetSource) -> Result<AnalysisOutcome> {
        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            0.0,
            format!("Loading {}...", source.name()),
        ));
        let df = source.load()?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            1.0,
            format!("Loaded {} rows", df.height()),
        ));

        self.analyze(df, &source.name())
    }

    fn analyze(&self, df: DataFrame, source_name: &str) -> Result<AnalysisOutcome> {
        let start_time = Instant::now();
        let config = &self.config;
        let identifier = config.identifier_column.as_str();

        self.check_cancelled()?;

        // Schema checks happen before anything touches the filesystem.
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Checking,
            0.0,
            "Checking measured columns...",
        ));
        if df.column(identifier).is_err() {
            return Err(AnalysisError::Schema(format!(
                "identifier column '{identifier}' not found"
            )));
        }
        let partitioner = config.group_column().map(GroupPartitioner::new);
        if let Some(partitioner) = &partitioner {
            partitioner.ensure_group_column(&df)?;
        }

        let selector = ColumnSelector::new(config);
        let columns = selector.select(&df);
        if columns.is_empty() {
            warn!("No numeric measured columns found");
        } else {
            info!("Measured columns ({}): {:?}", columns.len(), columns);
        }

        let cleaner = DataCleaner::from_config(config);
        let diagnostics = cleaner.inspect(&df, &columns)?;
        if diagnostics.is_clean() {
            info!("No invalid values in measured columns");
        }
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Checking,
            1.0,
            format!("{} invalid value(s) found", diagnostics.total()),
        ));
        self.check_cancelled()?;

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            0.0,
            format!("Cleaning with policy '{}'...", cleaner.policy().name()),
        ));
        let cleaned = cleaner.clean(df, &columns)?;
        let extractor = SpecExtractor::new(identifier);
        let overall = PreparedFrame::new(cleaned.frame, &extractor, &columns)?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            1.0,
            format!("{} data rows ready", overall.extraction.data_rows().height()),
        ));
        self.check_cancelled()?;

        // Group frames and their directory names are settled before any
        // directory exists.
        let grouped = match &partitioner {
            Some(partitioner) => {
                let groups = partitioner.partition(&overall.frame, &overall.extraction)?;
                let dir_names =
                    OutputLayout::group_dir_names(partitioner.group_by(), &groups.keys());
                Some((partitioner.group_by(), groups, dir_names))
            }
            None => None,
        };

        let layout = match &self.run_directory {
            Some(dir) => OutputLayout::at(dir),
            None => OutputLayout::create(&config.output_root, source_name, Local::now()),
        }
        .context("Failed to create run directory")?;
        info!("Output directory: {}", layout.base().display());

        let context = RenderContext::from_plot_config(&config.plot);
        let session = RenderSession::acquire(self.renderer.as_ref(), &context)?;
        let mut writer = ReportWriter::new(
            config,
            session.renderer(),
            self.sink.as_ref(),
            self.exporter.as_ref(),
            session.context(),
        );

        self.report_progress(ProgressUpdate::new(
            PipelineStage::OverallReporting,
            0.0,
            "Generating overall reports...",
        ));
        writer.write_pass(&ReportScope::Overall, &overall, &columns, layout.base());
        self.report_progress(ProgressUpdate::new(
            PipelineStage::OverallReporting,
            1.0,
            "Overall reports done",
        ));

        let mut group_keys = Vec::new();
        if let Some((group_by, groups, dir_names)) = grouped {
            let total = groups.len();
            info!("Group analysis by '{}': {} group(s)", group_by, total);

            for (index, (group, dir_name)) in groups.into_iter().zip(dir_names).enumerate() {
                self.check_cancelled()?;
                self.report_progress(ProgressUpdate::with_items(
                    PipelineStage::GroupReporting,
                    format!("{}: {}", group_by, group.key),
                    index,
                    total,
                    format!("Generating reports for group '{}'...", group.key),
                ));

                let dir = layout
                    .group_dir(&dir_name)
                    .context(format!("Failed to create directory for group '{}'", group.key))?;
                let prepared = PreparedFrame::cleaned(group.frame, &cleaner, &extractor, &columns)?;
                writer.write_pass(&ReportScope::Group(group.key.clone()), &prepared, &columns, &dir);
                group_keys.push(group.key);
            }

            self.check_cancelled()?;
            let plot = &config.plot;
            if plot.enable_group_boxplot || plot.enable_all_columns_compare {
                let dir = layout
                    .comparison_dir(group_by)
                    .context("Failed to create comparison directory")?;
                writer.write_comparisons(&overall, &columns, group_by, &dir);
            }
            self.report_progress(ProgressUpdate::with_items(
                PipelineStage::GroupReporting,
                group_by,
                total,
                total,
                "Group reports done",
            ));
        }

        let ReportWriter {
            written, failures, ..
        } = writer;
        drop(session);

        if !failures.is_empty() {
            warn!("{} report(s) failed:", failures.len());
            for failure in &failures {
                warn!("  [{}] {}", failure.scope, failure.error);
            }
        }
        info!(
            "Analysis finished in {:.2?}: {} file(s) written to {}",
            start_time.elapsed(),
            written.len(),
            layout.base().display()
        );

        Ok(AnalysisOutcome {
            output_dir: layout.base().to_path_buf(),
            measured_columns: columns,
            diagnostics,
            rows_removed: cleaned.rows_removed,
            values_replaced: cleaned.values_replaced,
            groups: group_keys,
            written,
            failures,
        })
    }
}

/// Builder for [`AnalysisPipeline`].
#[derive(Default)]
pub struct AnalysisPipelineBuilder {
    config: Option<AnalysisConfig>,
    renderer: Option<Arc<dyn ReportRenderer>>,
    sink: Option<Arc<dyn FigureSink>>,
    exporter: Option<Arc<dyn StatisticsExporter>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
    run_directory: Option<PathBuf>,
}

impl AnalysisPipelineBuilder {
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the chart renderer. Required.
    ///
    /// The renderer is shared through `Arc` so one instance can serve several
    /// pipelines. Only one run may hold its session at a time.
    pub fn renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Where rendered figures go. Defaults to [`FileFigureSink`].
    pub fn figure_sink(mut self, sink: Arc<dyn FigureSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Statistics writer. Defaults to [`JsonStatisticsExporter`].
    pub fn statistics_exporter(mut self, exporter: Arc<dyn StatisticsExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token. The pipeline checks it between stages and
    /// between groups.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Write into `dir` instead of a timestamped directory under the output
    /// root.
    pub fn run_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.run_directory = Some(dir.into());
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Configuration`] if the configuration is
    /// invalid or no renderer was set.
    pub fn build(self) -> Result<AnalysisPipeline> {
        let config = self.config.unwrap_or_default().normalized();
        config.validate()?;

        let renderer = self.renderer.ok_or_else(|| {
            AnalysisError::Configuration("a report renderer is required".to_string())
        })?;

        Ok(AnalysisPipeline {
            config,
            renderer,
            sink: self.sink.unwrap_or_else(|| Arc::new(FileFigureSink)),
            exporter: self
                .exporter
                .unwrap_or_else(|| Arc::new(JsonStatisticsExporter)),
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            run_directory: self.run_directory,
        })
    }
}
