//! Health score calculation.

use crate::config::HealthWeights;
use crate::issue::{AnalysisResult, Severity};

const ERROR_WEIGHT: usize = 2;
const WARNING_WEIGHT: usize = 1;

/// Reduce a result to a single 0–100 score.
///
/// With no relationships there is nothing to penalize and the score is a
/// flat 100. Otherwise issues are weighted (an error costs twice a
/// warning) against the worst case of every relationship failing with an
/// error. The weight table is part of the configuration contract; the
/// formula itself only distinguishes severities.
pub fn health_score(result: &AnalysisResult, _weights: &HealthWeights) -> u8 {
    let total_relationships = result.total_relationships();
    if total_relationships == 0 {
        return 100;
    }

    let errors = result.issues_by_severity(Severity::Error).count();
    let warnings = result.issues_by_severity(Severity::Warning).count();

    let weighted_issues = errors * ERROR_WEIGHT + warnings * WARNING_WEIGHT;
    let max_issues = total_relationships * ERROR_WEIGHT;

    let deduction_ratio = (weighted_issues as f64 / max_issues as f64).min(1.0);
    (100.0 * (1.0 - deduction_ratio)).round().clamp(0.0, 100.0) as u8
}
