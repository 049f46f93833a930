//! Migration-versus-live-database drift detection.

use super::Detector;
use crate::error::AnalyzerResult;
use crate::issue::{AnalysisResult, Issue, IssueKind, Severity};
use crate::migrate::SchemaSnapshot;
use crate::schema::SchemaReader;

/// Bidirectionally diffs the intended schema (folded from migration files)
/// against the live one: tables and columns the migrations promise but the
/// database lacks, and tables and columns the database carries with no
/// migration to account for them. Does nothing when no migration files
/// were found.
pub struct MigrationMismatchDetector<'a> {
    intended: &'a SchemaSnapshot,
    schema: &'a SchemaReader,
}

impl<'a> MigrationMismatchDetector<'a> {
    pub fn new(intended: &'a SchemaSnapshot, schema: &'a SchemaReader) -> Self {
        Self { intended, schema }
    }

    async fn check_intended_against_live(&self, issues: &mut Vec<Issue>) {
        for (table, columns) in self.intended {
            if !self.schema.table_exists(table).await {
                issues.push(
                    Issue::new(
                        IssueKind::PendingMigration,
                        Severity::Error,
                        "migrations",
                        format!(
                            "Table \"{table}\" is defined in migrations but does not exist \
                             in the database"
                        ),
                    )
                    .suggest("Run: php artisan migrate")
                    .context("table", table.as_str()),
                );
                continue;
            }

            for (column, column_type) in columns {
                if !self.schema.column_exists(table, column).await {
                    issues.push(
                        Issue::new(
                            IssueKind::ColumnNotInDb,
                            Severity::Warning,
                            "migrations",
                            format!(
                                "Column \"{table}.{column}\" ({column_type}) is defined in \
                                 migrations but missing from the database"
                            ),
                        )
                        .suggest("Run: php artisan migrate")
                        .context("table", table.as_str())
                        .context("column", column.as_str())
                        .context("migration_type", column_type.as_str()),
                    );
                }
            }
        }
    }

    async fn check_live_against_intended(&self, issues: &mut Vec<Issue>) {
        for table in self.schema.tables().await {
            let Some(columns) = self.intended.get(&table) else {
                issues.push(
                    Issue::new(
                        IssueKind::NoMigrationForTable,
                        Severity::Info,
                        "migrations",
                        format!(
                            "Table \"{table}\" exists in the database but has no \
                             corresponding migration file"
                        ),
                    )
                    .suggest(format!(
                        "Create a migration: php artisan make:migration create_{table}_table"
                    ))
                    .context("table", table.as_str()),
                );
                continue;
            };

            for column in self.schema.columns(&table).await {
                if !columns.contains_key(&column.name) {
                    issues.push(
                        Issue::new(
                            IssueKind::DbColumnNotInMigration,
                            Severity::Info,
                            "migrations",
                            format!(
                                "Column \"{}.{}\" exists in the database but is not defined \
                                 in any migration",
                                table, column.name
                            ),
                        )
                        .suggest(format!(
                            "Add to a migration: php artisan make:migration \
                             add_{}_to_{}_table",
                            column.name, table
                        ))
                        .context("table", table.as_str())
                        .context("column", column.name.as_str()),
                    );
                }
            }
        }
    }
}

impl Detector for MigrationMismatchDetector<'_> {
    const NAME: &'static str = "MigrationMismatchDetector";

    async fn detect(&self, result: &mut AnalysisResult) -> AnalyzerResult<()> {
        // No migration directories, or nothing parseable in them: the
        // whole check is disabled.
        if self.intended.is_empty() {
            return Ok(());
        }

        let mut issues = Vec::new();
        self.check_intended_against_live(&mut issues).await;
        self.check_live_against_intended(&mut issues).await;
        result.issues.extend(issues);
        Ok(())
    }
}
