//! Unindexed foreign-key detection.

use super::Detector;
use crate::error::AnalyzerResult;
use crate::issue::{AnalysisResult, Issue, IssueKind, Severity};
use crate::model::{Relation, RelationTag};
use crate::schema::SchemaReader;

/// Flags foreign-key columns that exist in the database but carry no
/// index. An unindexed foreign key turns every join and cascade on the
/// relationship into a table scan.
pub struct IndexAnalyzer<'a> {
    schema: &'a SchemaReader,
}

impl<'a> IndexAnalyzer<'a> {
    pub fn new(schema: &'a SchemaReader) -> Self {
        Self { schema }
    }
}

impl Detector for IndexAnalyzer<'_> {
    const NAME: &'static str = "IndexAnalyzer";

    async fn detect(&self, result: &mut AnalysisResult) -> AnalyzerResult<()> {
        let mut issues = Vec::new();

        for model in &result.models {
            if !self.schema.table_exists(&model.table).await {
                continue;
            }

            for rel in &model.relationships {
                let Some(fk_table) = fk_host_table(rel) else {
                    continue;
                };
                let Some(fk_column) = rel.kind.foreign_key() else {
                    continue;
                };

                if !self.schema.table_exists(fk_table).await
                    || !self.schema.column_exists(fk_table, fk_column).await
                {
                    continue;
                }

                if !self.schema.column_has_index(fk_table, fk_column).await {
                    issues.push(
                        Issue::new(
                            IssueKind::MissingIndex,
                            Severity::Warning,
                            &model.short_name,
                            format!(
                                "Foreign key column \"{fk_table}.{fk_column}\" has no index \
                                 (performance risk)"
                            ),
                        )
                        .suggest(format!(
                            "$table->index('{fk_column}'); // in a migration for {fk_table}"
                        ))
                        .context("model", model.class.as_str())
                        .context("relationship", rel.name.as_str())
                        .context("table", fk_table)
                        .context("column", fk_column),
                    );
                }
            }
        }

        result.issues.extend(issues);
        Ok(())
    }
}

/// The table holding the foreign key: the related table on the has side,
/// the pivot table for the many-to-many kinds.
fn fk_host_table(rel: &Relation) -> Option<&str> {
    match rel.kind.tag() {
        RelationTag::HasOne
        | RelationTag::HasMany
        | RelationTag::MorphOne
        | RelationTag::MorphMany => rel.table.as_deref(),
        RelationTag::BelongsToMany | RelationTag::MorphToMany | RelationTag::MorphedByMany => {
            rel.kind.pivot_table()
        }
        _ => None,
    }
}
