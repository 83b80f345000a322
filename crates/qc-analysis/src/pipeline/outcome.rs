//! Results of an analysis run.

use serde::Serialize;
use std::path::PathBuf;

use crate::cleaner::InvalidValueReport;
use crate::error::AnalysisError;
use crate::render::ReportKind;

/// Where a report belongs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", content = "key", rename_all = "snake_case")]
pub enum ReportScope {
    Overall,
    Group(String),
    Comparison,
}

impl std::fmt::Display for ReportScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overall => f.write_str("overall"),
            Self::Group(key) => write!(f, "group '{key}'"),
            Self::Comparison => f.write_str("comparison"),
        }
    }
}

/// A report that could not be produced. The run continued without it.
#[derive(Debug, Serialize)]
pub struct ReportFailure {
    pub scope: ReportScope,
    pub report: ReportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub error: AnalysisError,
}

/// Summary of a finished run.
#[derive(Debug, Serialize)]
pub struct AnalysisOutcome {
    /// Run directory holding every written file.
    pub output_dir: PathBuf,
    /// Measured columns, in analysis order.
    pub measured_columns: Vec<String>,
    /// Invalid values found before cleaning.
    pub diagnostics: InvalidValueReport,
    pub rows_removed: usize,
    pub values_replaced: usize,
    /// Group keys in processing order; empty when grouping is disabled.
    pub groups: Vec<String>,
    /// Files written, in write order.
    pub written: Vec<PathBuf>,
    pub failures: Vec<ReportFailure>,
}

impl AnalysisOutcome {
    /// Whether every report was produced.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures of one scope.
    pub fn failures_in<'a>(
        &'a self,
        scope: &'a ReportScope,
    ) -> impl Iterator<Item = &'a ReportFailure> + 'a {
        self.failures.iter().filter(move |f| &f.scope == scope)
    }
}
