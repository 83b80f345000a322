//! Pipeline module.
//!
//! Orchestrates a run: checking and cleaning, the overall report pass, the
//! per-group passes and the cross-group comparisons.

mod builder;
mod outcome;
mod passes;
pub mod progress;

pub use builder::{AnalysisPipeline, AnalysisPipelineBuilder};
pub use outcome::{AnalysisOutcome, ReportFailure, ReportScope};
pub use progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
