//! Detector pipeline.
//!
//! Five independent detectors cross-reference the extracted relationship
//! graph, the intended schema from migrations, and the live schema. Each
//! appends typed issues to the shared [`AnalysisResult`]; a failure inside
//! one detector is caught by the orchestrator, reported as a
//! `detector_error` issue, and never blocks the remaining detectors.

pub mod cycles;
pub mod db_mismatch;
pub mod indexes;
pub mod inverse;
pub mod migration_mismatch;

pub use cycles::CircularDependencyDetector;
pub use db_mismatch::DatabaseMismatchDetector;
pub use indexes::IndexAnalyzer;
pub use inverse::InverseDetector;
pub use migration_mismatch::MigrationMismatchDetector;

use crate::error::AnalyzerResult;
use crate::issue::AnalysisResult;

/// Contract shared by all detectors.
#[allow(async_fn_in_trait)]
pub trait Detector {
    /// Display name used in `detector_error` issues.
    const NAME: &'static str;

    /// Inspect the result and append any issues found.
    async fn detect(&self, result: &mut AnalysisResult) -> AnalyzerResult<()>;
}
