//! Console rendering of analysis results.

use colored::*;

use crate::issue::{AnalysisResult, Issue, IssueKind, Severity};
use crate::model::ModelInfo;

/// Full analysis report: health banner, stats, all issues with their
/// suggestions.
pub fn print_analysis(result: &AnalysisResult) {
    println!();
    println!("{}", "Analyzing relationships...".cyan());
    println!();

    print_health_score(result.health_score);
    print_stats(result);
    print_issues(result);
}

/// Condensed health report: banner, grouped issue lines, recommendations.
pub fn print_health_report(result: &AnalysisResult) {
    println!();
    println!("{}", "Relationship Health Report".bold());
    println!("{}", "=".repeat(45));
    println!();

    print_health_score(result.health_score);
    println!();

    print_grouped_issues(result);
    print_recommendations(result);
}

/// Table of scanned models.
pub fn print_models(models: &[ModelInfo]) {
    println!();
    let width = models
        .iter()
        .map(|m| m.short_name.len())
        .max()
        .unwrap_or(0)
        .max("Model".len());

    println!(
        "{:width$}  {:24}  {}",
        "Model".bold(),
        "Table".bold(),
        "Relationships".bold()
    );
    for model in models {
        println!(
            "{:width$}  {:24}  {}",
            model.short_name,
            model.table,
            model.relationships.len()
        );
    }
    println!();
    println!("{} model(s)", models.len());
}

fn print_health_score(score: u8) {
    let line = format!("{score}/100");
    let (line, label) = if score >= 80 {
        (line.green(), "HEALTHY".green())
    } else if score >= 60 {
        (line.yellow(), "WARNING".yellow())
    } else {
        (line.red(), "CRITICAL".red())
    };
    println!("{} {} ({})", "Health Score:".bold(), line.bold(), label);
}

fn print_stats(result: &AnalysisResult) {
    println!();
    println!("  Models         {}", result.models.len());
    println!("  Tables         {}", result.schema.len());
    println!("  Relationships  {}", result.total_relationships());
    println!("  Errors         {}", result.errors().len().to_string().red());
    println!(
        "  Warnings       {}",
        result.warnings().len().to_string().yellow()
    );
    println!("  Info           {}", result.infos().len().to_string().blue());
}

fn print_issues(result: &AnalysisResult) {
    let errors = result.errors();
    let warnings = result.warnings();
    let infos = result.infos();

    if errors.is_empty() && warnings.is_empty() && infos.is_empty() {
        println!();
        println!(
            "{}",
            "No issues found. All relationships look healthy!".green()
        );
        return;
    }

    print_severity_block("ERRORS", &errors, |s| s.red().bold());
    print_severity_block("WARNINGS", &warnings, |s| s.yellow().bold());
    print_severity_block("INFO", &infos, |s| s.blue().bold());
}

fn print_severity_block(
    label: &str,
    issues: &[&Issue],
    paint: impl Fn(&str) -> ColoredString,
) {
    if issues.is_empty() {
        return;
    }

    println!();
    println!("{}", paint(&format!("{label} ({})", issues.len())));
    for issue in issues {
        println!("  {}", issue.message);
        if let Some(suggestion) = &issue.suggestion {
            for line in suggestion.lines() {
                println!("    {}", line.dimmed());
            }
        }
    }
}

fn print_grouped_issues(result: &AnalysisResult) {
    for (label, severity) in [
        ("CRITICAL", Severity::Error),
        ("WARNINGS", Severity::Warning),
        ("INFO", Severity::Info),
    ] {
        let issues: Vec<&Issue> = result.issues_by_severity(severity).collect();
        if issues.is_empty() {
            continue;
        }

        let header = format!("{label} ({})", issues.len());
        let header = match severity {
            Severity::Error => header.red(),
            Severity::Warning => header.yellow(),
            Severity::Info => header.blue(),
        };
        println!("{header}");
        for issue in issues {
            println!("  {}: {}", issue.model, issue.message);
        }
        println!();
    }
}

fn print_recommendations(result: &AnalysisResult) {
    let recommendations = build_recommendations(result);

    if recommendations.is_empty() {
        println!("{}", "No recommendations — everything looks great!".green());
        return;
    }

    println!("{}", "RECOMMENDATIONS".bold());
    for (i, recommendation) in recommendations.iter().enumerate() {
        println!("  {}. {recommendation}", i + 1);
    }
    println!();
}

fn build_recommendations(result: &AnalysisResult) -> Vec<String> {
    let count = |kind: IssueKind| result.issues.iter().filter(|i| i.kind == kind).count();

    let templates: &[(IssueKind, fn(usize) -> String)] = &[
        (IssueKind::MissingInverse, |n| {
            format!("Add {n} missing inverse relationship(s)")
        }),
        (IssueKind::CircularDependency, |n| {
            format!("Review {n} circular relationship(s)")
        }),
        (IssueKind::MissingTable, |n| {
            format!("Create {n} missing table(s) via migrations")
        }),
        (IssueKind::MissingColumn, |n| {
            format!("Add {n} missing column(s) via migrations")
        }),
        (IssueKind::MissingForeignKey, |n| {
            format!("Add {n} missing foreign key constraint(s)")
        }),
        (IssueKind::MissingIndex, |n| {
            format!("Add {n} missing index(es) on foreign key columns")
        }),
        (IssueKind::OrphanedForeignKey, |n| {
            format!("Review {n} orphaned foreign key column(s) that have no model relationship")
        }),
    ];

    templates
        .iter()
        .filter_map(|(kind, render)| {
            let n = count(*kind);
            (n > 0).then(|| render(n))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Issue, IssueKind, Severity};

    #[test]
    fn test_recommendations_reflect_issue_counts() {
        let mut result = AnalysisResult::default();
        result.add_issue(Issue::new(
            IssueKind::MissingInverse,
            Severity::Warning,
            "User",
            "m",
        ));
        result.add_issue(Issue::new(
            IssueKind::MissingInverse,
            Severity::Warning,
            "Post",
            "m",
        ));
        result.add_issue(Issue::new(
            IssueKind::CircularDependency,
            Severity::Error,
            "User",
            "m",
        ));

        let recommendations = build_recommendations(&result);
        assert_eq!(
            recommendations,
            vec![
                "Add 2 missing inverse relationship(s)".to_string(),
                "Review 1 circular relationship(s)".to_string(),
            ]
        );
    }

    #[test]
    fn test_clean_result_has_no_recommendations() {
        let result = AnalysisResult::default();
        assert!(build_recommendations(&result).is_empty());
    }
}
