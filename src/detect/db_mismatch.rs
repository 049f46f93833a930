//! Model-versus-live-database mismatch detection.

use std::collections::HashSet;

use super::Detector;
use crate::error::AnalyzerResult;
use crate::issue::{AnalysisResult, Issue, IssueKind, Severity};
use crate::model::{Relation, RelationTag};
use crate::schema::SchemaReader;

/// Verifies that every table and foreign-key column a relationship implies
/// actually exists in the connected database, and that declared foreign
/// keys carry real constraints. Also reports the reverse: live foreign-key
/// constraints no relationship accounts for.
pub struct DatabaseMismatchDetector<'a> {
    schema: &'a SchemaReader,
}

impl<'a> DatabaseMismatchDetector<'a> {
    pub fn new(schema: &'a SchemaReader) -> Self {
        Self { schema }
    }
}

impl Detector for DatabaseMismatchDetector<'_> {
    const NAME: &'static str = "DatabaseMismatchDetector";

    async fn detect(&self, result: &mut AnalysisResult) -> AnalyzerResult<()> {
        let mut issues = Vec::new();

        for model in &result.models {
            // The model's own table first; without it the relationship
            // checks are all noise.
            if !self.schema.table_exists(&model.table).await {
                issues.push(
                    Issue::new(
                        IssueKind::MissingTable,
                        Severity::Error,
                        &model.short_name,
                        format!(
                            "Table \"{}\" for model {} does not exist in the database",
                            model.table, model.short_name
                        ),
                    )
                    .suggest(format!(
                        "php artisan make:migration create_{}_table",
                        model.table
                    ))
                    .context("table", model.table.as_str()),
                );
                continue;
            }

            for rel in &model.relationships {
                if let Some(table) = &rel.table {
                    if !self.schema.table_exists(table).await {
                        issues.push(
                            Issue::new(
                                IssueKind::MissingTable,
                                Severity::Error,
                                &model.short_name,
                                format!(
                                    "Table \"{}\" referenced in {}::{}() does not exist",
                                    table, model.short_name, rel.name
                                ),
                            )
                            .suggest(format!("php artisan make:migration create_{table}_table"))
                            .context("model", model.class.as_str())
                            .context("relationship", rel.name.as_str())
                            .context("table", table.as_str()),
                        );
                        continue;
                    }
                }

                if let Some(pivot) = rel.kind.pivot_table() {
                    if !self.schema.table_exists(pivot).await {
                        issues.push(
                            Issue::new(
                                IssueKind::MissingTable,
                                Severity::Error,
                                &model.short_name,
                                format!(
                                    "Pivot table \"{}\" for {}::{}() does not exist",
                                    pivot, model.short_name, rel.name
                                ),
                            )
                            .suggest(format!("php artisan make:migration create_{pivot}_table"))
                            .context("model", model.class.as_str())
                            .context("relationship", rel.name.as_str())
                            .context("pivot_table", pivot),
                        );
                        continue;
                    }
                }

                let Some(fk_table) = fk_host_table(rel) else {
                    continue;
                };
                let Some(fk_column) = rel.kind.foreign_key() else {
                    continue;
                };
                if !self.schema.table_exists(fk_table).await {
                    continue;
                }

                if !self.schema.column_exists(fk_table, fk_column).await {
                    issues.push(
                        Issue::new(
                            IssueKind::MissingColumn,
                            Severity::Error,
                            &model.short_name,
                            format!(
                                "Column \"{}.{}\" for {}::{}() does not exist",
                                fk_table, fk_column, model.short_name, rel.name
                            ),
                        )
                        .suggest(format!(
                            "php artisan make:migration add_{fk_column}_to_{fk_table}_table"
                        ))
                        .context("model", model.class.as_str())
                        .context("relationship", rel.name.as_str())
                        .context("table", fk_table)
                        .context("column", fk_column),
                    );
                } else if !self.schema.column_has_foreign_key(fk_table, fk_column).await {
                    issues.push(
                        Issue::new(
                            IssueKind::MissingForeignKey,
                            Severity::Warning,
                            &model.short_name,
                            format!(
                                "Column \"{fk_table}.{fk_column}\" has no foreign key constraint"
                            ),
                        )
                        .suggest(format!(
                            "$table->foreign('{fk_column}')->references('id')->on('{}');",
                            model.table
                        ))
                        .context("model", model.class.as_str())
                        .context("relationship", rel.name.as_str())
                        .context("table", fk_table)
                        .context("column", fk_column),
                    );
                }
            }

            // Reverse direction: live constraints nothing declares.
            let declared: HashSet<&str> = model
                .relationships
                .iter()
                .filter_map(|rel| rel.kind.foreign_key())
                .collect();

            for fk in self.schema.foreign_keys(&model.table).await {
                if !declared.contains(fk.column.as_str()) {
                    issues.push(
                        Issue::new(
                            IssueKind::OrphanedForeignKey,
                            Severity::Info,
                            &model.short_name,
                            format!(
                                "Column \"{}.{}\" is a foreign key in the DB but has no \
                                 relationship method in {}",
                                model.table, fk.column, model.short_name
                            ),
                        )
                        .context("model", model.class.as_str())
                        .context("table", model.table.as_str())
                        .context("column", fk.column.as_str()),
                    );
                }
            }
        }

        result.issues.extend(issues);
        Ok(())
    }
}

/// The table that should hold the foreign-key column for this relationship.
/// On the has side the key lives on the related table; `belongsTo` keys are
/// verified from the owning side, so they resolve to nothing here.
fn fk_host_table(rel: &Relation) -> Option<&str> {
    match rel.kind.tag() {
        RelationTag::HasOne
        | RelationTag::HasMany
        | RelationTag::MorphOne
        | RelationTag::MorphMany => rel.table.as_deref(),
        _ => None,
    }
}
