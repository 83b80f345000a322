//! Report generation for one pass.
//!
//! A pass renders every enabled report of a prepared frame into one
//! directory. Failures are recorded and the pass moves on to the next report.

use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cleaner::DataCleaner;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::output::{SINGLE_DISTRIBUTIONS_DIR, unique_components};
use crate::pipeline::outcome::{ReportFailure, ReportScope};
use crate::render::{Figure, FigureSink, RenderContext, RenderRequest, ReportKind, ReportRenderer};
use crate::spec_limits::{SpecExtraction, SpecExtractor, SpecLimits};
use crate::statistics::{StatisticsExporter, StatisticsRequest};

/// A frame ready for reporting: cleaned, split and with limits resolved.
pub(crate) struct PreparedFrame {
    pub frame: DataFrame,
    pub extraction: SpecExtraction,
    pub limits: SpecLimits,
}

impl PreparedFrame {
    pub fn new(frame: DataFrame, extractor: &SpecExtractor, columns: &[String]) -> Result<Self> {
        let extraction = extractor.extract(&frame)?;
        let limits = extraction.limits(columns);
        Ok(Self {
            frame,
            extraction,
            limits,
        })
    }

    /// Clean `frame` only if it holds invalid values, then prepare it.
    pub fn cleaned(
        frame: DataFrame,
        cleaner: &DataCleaner,
        extractor: &SpecExtractor,
        columns: &[String],
    ) -> Result<Self> {
        let frame = if cleaner.inspect(&frame, columns)?.is_clean() {
            frame
        } else {
            cleaner.clean(frame, columns)?.frame
        };
        Self::new(frame, extractor, columns)
    }
}

/// Renders reports and collects written paths and failures.
pub(crate) struct ReportWriter<'a> {
    config: &'a AnalysisConfig,
    renderer: &'a dyn ReportRenderer,
    sink: &'a dyn FigureSink,
    exporter: &'a dyn StatisticsExporter,
    context: &'a RenderContext,
    pub written: Vec<PathBuf>,
    pub failures: Vec<ReportFailure>,
}

impl<'a> ReportWriter<'a> {
    pub fn new(
        config: &'a AnalysisConfig,
        renderer: &'a dyn ReportRenderer,
        sink: &'a dyn FigureSink,
        exporter: &'a dyn StatisticsExporter,
        context: &'a RenderContext,
    ) -> Self {
        Self {
            config,
            renderer,
            sink,
            exporter,
            context,
            written: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Statistics, distributions, boxplot and correlation of one frame.
    pub fn write_pass(
        &mut self,
        scope: &ReportScope,
        prepared: &PreparedFrame,
        columns: &[String],
        dir: &Path,
    ) {
        let (config, renderer, context) = (self.config, self.renderer, self.context);
        let plot = &config.plot;
        let group = match scope {
            ReportScope::Group(key) => Some(key.as_str()),
            _ => None,
        };
        let request = RenderRequest {
            frame: &prepared.frame,
            data_rows: prepared.extraction.data_rows(),
            columns,
            limits: &prepared.limits,
            context,
            config,
        };

        info!("Generating {} reports in {}", scope, dir.display());

        let statistics = self.exporter.export(&StatisticsRequest {
            data_rows: prepared.extraction.data_rows(),
            columns,
            limits: &prepared.limits,
            config,
            output_dir: dir,
            is_group_data: group.is_some(),
            group,
        });
        self.record(scope, ReportKind::Statistics, None, statistics);

        if plot.enable_distribution {
            self.save(
                scope,
                ReportKind::DistributionGrid,
                None,
                dir.join("distribution_plots.png"),
                || renderer.distribution_grid(&request),
            );

            let single_dir = dir.join(SINGLE_DISTRIBUTIONS_DIR);
            for (column, stem) in columns.iter().zip(unique_components(columns)) {
                self.save(
                    scope,
                    ReportKind::SingleDistribution,
                    Some(column),
                    single_dir.join(format!("{stem}.png")),
                    || renderer.single_distribution(&request, column),
                );
            }
        }

        let boxplot_enabled = match scope {
            ReportScope::Group(_) => plot.enable_boxplot || plot.enable_group_boxplot,
            _ => plot.enable_boxplot,
        };
        if boxplot_enabled {
            self.save(
                scope,
                ReportKind::Boxplot,
                None,
                dir.join("boxplot.png"),
                || renderer.boxplot(&request),
            );
        }

        if plot.enable_correlation {
            if columns.len() < 2 {
                debug!("Skipping correlation: fewer than two measured columns");
            } else {
                self.save(
                    scope,
                    ReportKind::Correlation,
                    None,
                    dir.join("correlation.png"),
                    || renderer.correlation(&request),
                );
            }
        }
    }

    /// Cross-group comparisons drawn from the full cleaned frame.
    pub fn write_comparisons(
        &mut self,
        prepared: &PreparedFrame,
        columns: &[String],
        group_by: &str,
        dir: &Path,
    ) {
        let (config, renderer, context) = (self.config, self.renderer, self.context);
        let plot = &config.plot;
        let scope = ReportScope::Comparison;
        let identifier = config.identifier_column.as_str();

        if plot.enable_group_boxplot {
            for (column, stem) in columns.iter().zip(unique_components(columns)) {
                let single_column = [column.clone()];
                self.save(
                    &scope,
                    ReportKind::GroupComparison,
                    Some(column),
                    dir.join(format!("{stem}_group_comparison.png")),
                    || {
                        let selection = [identifier, group_by, column.as_str()];
                        let frame = prepared.frame.select(selection)?;
                        let data_rows = prepared.extraction.data_rows().select(selection)?;
                        let request = RenderRequest {
                            frame: &frame,
                            data_rows: &data_rows,
                            columns: &single_column,
                            limits: &prepared.limits,
                            context,
                            config,
                        };
                        renderer.group_comparison(&request, group_by, column)
                    },
                );
            }
        }

        if plot.enable_all_columns_compare {
            let request = RenderRequest {
                frame: &prepared.frame,
                data_rows: prepared.extraction.data_rows(),
                columns,
                limits: &prepared.limits,
                context,
                config,
            };
            self.save(
                &scope,
                ReportKind::AllColumnsComparison,
                None,
                dir.join("all_columns_comparison.png"),
                || renderer.all_columns_comparison(&request, group_by),
            );
        }
    }

    fn save(
        &mut self,
        scope: &ReportScope,
        report: ReportKind,
        column: Option<&str>,
        path: PathBuf,
        render: impl FnOnce() -> anyhow::Result<Figure>,
    ) {
        let result = render()
            .and_then(|figure| self.sink.save(figure, &path))
            .map(|()| path);
        self.record(scope, report, column, result);
    }

    fn record(
        &mut self,
        scope: &ReportScope,
        report: ReportKind,
        column: Option<&str>,
        result: anyhow::Result<PathBuf>,
    ) {
        match result {
            Ok(path) => {
                debug!("Saved {}: {}", report, path.display());
                self.written.push(path);
            }
            Err(e) => {
                let label = match column {
                    Some(column) => format!("{report} ({column})"),
                    None => report.to_string(),
                };
                let error = AnalysisError::render(label, &e);
                warn!("{} report failed: {}", scope, error);
                self.failures.push(ReportFailure {
                    scope: scope.clone(),
                    report,
                    column: column.map(str::to_string),
                    error,
                });
            }
        }
    }
}
