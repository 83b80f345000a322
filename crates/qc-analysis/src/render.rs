//! Rendering seam between the pipeline and a plotting backend.
//!
//! The pipeline never draws. It hands a [`RenderRequest`] to a
//! [`ReportRenderer`], receives an opaque [`Figure`], and forwards it to a
//! [`FigureSink`] for persistence. Shared rendering settings live in an
//! immutable [`RenderContext`]; backend-wide setup and teardown are bracketed
//! by a [`RenderSession`] guard that releases on every exit path.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::config::{AnalysisConfig, PlotConfig};
use crate::error::{AnalysisError, Result};
use crate::spec_limits::SpecLimits;

/// The reports a pass can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Statistics,
    DistributionGrid,
    SingleDistribution,
    Boxplot,
    Correlation,
    GroupComparison,
    AllColumnsComparison,
}

impl ReportKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Statistics => "statistics",
            Self::DistributionGrid => "distribution_grid",
            Self::SingleDistribution => "single_distribution",
            Self::Boxplot => "boxplot",
            Self::Correlation => "correlation",
            Self::GroupComparison => "group_comparison",
            Self::AllColumnsComparison => "all_columns_comparison",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable rendering settings shared by every renderer call of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderContext {
    pub font_family: String,
    pub unicode_minus: bool,
    pub dpi: u32,
}

impl RenderContext {
    pub fn from_plot_config(plot: &PlotConfig) -> Self {
        Self {
            font_family: plot.font_family.clone(),
            unicode_minus: plot.unicode_minus,
            dpi: plot.dpi,
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::from_plot_config(&PlotConfig::default())
    }
}

/// Encoded figure produced by a renderer. The pipeline does not inspect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Figure {
    bytes: Vec<u8>,
}

impl Figure {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Everything a renderer needs for one report.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Spec rows followed by data rows.
    pub frame: &'a DataFrame,
    /// Data rows only.
    pub data_rows: &'a DataFrame,
    /// Measured columns, in selection order.
    pub columns: &'a [String],
    pub limits: &'a SpecLimits,
    pub context: &'a RenderContext,
    pub config: &'a AnalysisConfig,
}

/// Plotting backend.
///
/// Every method returns a [`Figure`] or an error; errors are collected per
/// report and never abort other reports.
pub trait ReportRenderer: Send + Sync {
    /// Apply backend-wide settings before the first report of a run.
    fn begin_session(&self, _context: &RenderContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Restore backend-wide settings. Called exactly once per successful
    /// [`begin_session`](Self::begin_session), including on failed runs.
    fn end_session(&self) {}

    /// Histograms of every measured column on one figure.
    fn distribution_grid(&self, request: &RenderRequest<'_>) -> anyhow::Result<Figure>;

    /// Histogram of one column with its LSL/USL markers.
    fn single_distribution(
        &self,
        request: &RenderRequest<'_>,
        column: &str,
    ) -> anyhow::Result<Figure>;

    fn boxplot(&self, request: &RenderRequest<'_>) -> anyhow::Result<Figure>;

    fn correlation(&self, request: &RenderRequest<'_>) -> anyhow::Result<Figure>;

    /// One column compared across groups. `request.frame` holds only the
    /// identifier, group and measured column.
    fn group_comparison(
        &self,
        request: &RenderRequest<'_>,
        group_by: &str,
        column: &str,
    ) -> anyhow::Result<Figure>;

    /// Every measured column compared across groups.
    fn all_columns_comparison(
        &self,
        request: &RenderRequest<'_>,
        group_by: &str,
    ) -> anyhow::Result<Figure>;
}

/// Persistence for rendered figures.
pub trait FigureSink: Send + Sync {
    fn save(&self, figure: Figure, path: &Path) -> anyhow::Result<()>;
}

/// Writes figure bytes to the given path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFigureSink;

impl FigureSink for FileFigureSink {
    fn save(&self, figure: Figure, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, figure.as_bytes())?;
        debug!("Saved figure: {}", path.display());
        Ok(())
    }
}

/// Scoped render session: `begin_session` on acquire, `end_session` on drop.
pub struct RenderSession<'a> {
    renderer: &'a dyn ReportRenderer,
    context: &'a RenderContext,
}

impl<'a> RenderSession<'a> {
    pub fn acquire(renderer: &'a dyn ReportRenderer, context: &'a RenderContext) -> Result<Self> {
        renderer
            .begin_session(context)
            .map_err(|e| AnalysisError::render("render session", &e).with_context("Render setup failed"))?;
        debug!("Render session started (font: {})", context.font_family);
        Ok(Self { renderer, context })
    }

    pub fn context(&self) -> &RenderContext {
        self.context
    }

    pub fn renderer(&self) -> &dyn ReportRenderer {
        self.renderer
    }
}

impl Drop for RenderSession<'_> {
    fn drop(&mut self) {
        self.renderer.end_session();
        debug!("Render session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRenderer {
        begun: AtomicUsize,
        ended: AtomicUsize,
        fail_begin: bool,
    }

    impl ReportRenderer for CountingRenderer {
        fn begin_session(&self, _context: &RenderContext) -> anyhow::Result<()> {
            if self.fail_begin {
                anyhow::bail!("font not installed");
            }
            self.begun.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn end_session(&self) {
            self.ended.fetch_add(1, Ordering::SeqCst);
        }

        fn distribution_grid(&self, _request: &RenderRequest<'_>) -> anyhow::Result<Figure> {
            Ok(Figure::new(b"grid".to_vec()))
        }

        fn single_distribution(
            &self,
            _request: &RenderRequest<'_>,
            column: &str,
        ) -> anyhow::Result<Figure> {
            Ok(Figure::new(column.as_bytes()))
        }

        fn boxplot(&self, _request: &RenderRequest<'_>) -> anyhow::Result<Figure> {
            Ok(Figure::new(b"box".to_vec()))
        }

        fn correlation(&self, _request: &RenderRequest<'_>) -> anyhow::Result<Figure> {
            Ok(Figure::new(b"corr".to_vec()))
        }

        fn group_comparison(
            &self,
            _request: &RenderRequest<'_>,
            _group_by: &str,
            column: &str,
        ) -> anyhow::Result<Figure> {
            Ok(Figure::new(column.as_bytes()))
        }

        fn all_columns_comparison(
            &self,
            _request: &RenderRequest<'_>,
            _group_by: &str,
        ) -> anyhow::Result<Figure> {
            Ok(Figure::new(b"all".to_vec()))
        }
    }

    #[test]
    fn test_session_released_on_drop() {
        let renderer = CountingRenderer::default();
        let context = RenderContext::default();
        {
            let session = RenderSession::acquire(&renderer, &context).unwrap();
            assert_eq!(session.context().dpi, 100);
            assert_eq!(renderer.begun.load(Ordering::SeqCst), 1);
            assert_eq!(renderer.ended.load(Ordering::SeqCst), 0);
        }
        assert_eq!(renderer.ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_acquire_does_not_release() {
        let renderer = CountingRenderer {
            fail_begin: true,
            ..Default::default()
        };
        let context = RenderContext::default();

        let err = RenderSession::acquire(&renderer, &context).err().unwrap();
        assert!(err.to_string().contains("font not installed"));
        assert_eq!(renderer.ended.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_file_sink_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxplot.png");

        FileFigureSink.save(Figure::new(b"png".to_vec()), &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
    }

    #[test]
    fn test_context_from_plot_config() {
        let plot = PlotConfig {
            dpi: 300,
            ..Default::default()
        };
        let context = RenderContext::from_plot_config(&plot);
        assert_eq!(context.dpi, 300);
        assert_eq!(context.font_family, plot.font_family);
    }
}
