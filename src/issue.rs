//! Issues and the analysis result aggregate.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::migrate::SchemaSnapshot;
use crate::model::ModelInfo;

/// Closed vocabulary of defect types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingInverse,
    CircularDependency,
    MissingTable,
    MissingColumn,
    MissingForeignKey,
    MissingIndex,
    OrphanedForeignKey,
    PendingMigration,
    ColumnNotInDb,
    NoMigrationForTable,
    DbColumnNotInMigration,
    RelationshipParseError,
    ModelAnalysisError,
    DetectorError,
    SchemaReadError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One detected defect. Issues are append-only: once added to a result
/// they are never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    /// Short name of the subject model, or `system` / `migrations` for
    /// issues without a model subject.
    pub model: String,
    pub message: String,
    pub suggestion: Option<String>,
    /// Structured fields for programmatic consumers.
    pub context: Map<String, Value>,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        model: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            model: model.into(),
            message: message.into(),
            suggestion: None,
            context: Map::new(),
        }
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Aggregate root for one analysis run.
#[derive(Debug, Default)]
pub struct AnalysisResult {
    pub models: Vec<ModelInfo>,
    /// Live schema snapshot: table → column → type label.
    pub schema: SchemaSnapshot,
    pub issues: Vec<Issue>,
    pub health_score: u8,
}

impl AnalysisResult {
    pub fn add_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn issues_by_severity(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn errors(&self) -> Vec<&Issue> {
        self.issues_by_severity(Severity::Error).collect()
    }

    pub fn warnings(&self) -> Vec<&Issue> {
        self.issues_by_severity(Severity::Warning).collect()
    }

    pub fn infos(&self) -> Vec<&Issue> {
        self.issues_by_severity(Severity::Info).collect()
    }

    pub fn total_relationships(&self) -> usize {
        self.models.iter().map(|m| m.relationships.len()).sum()
    }

    /// Serialize to the report shape consumed by the CLI and CI tooling.
    pub fn to_json(&self) -> Value {
        json!({
            "health": {
                "score": self.health_score,
                "stats": {
                    "models": self.models.len(),
                    "tables": self.schema.len(),
                    "relationships": self.total_relationships(),
                    "errors": self.errors().len(),
                    "warnings": self.warnings().len(),
                    "infos": self.infos().len(),
                },
            },
            "issues": self.issues,
        })
    }
}
