//! Analysis orchestration.
//!
//! Sequences scanning, extraction, schema snapshotting, the detector
//! pipeline, and scoring. Failure is contained at three tiers: an accessor
//! that cannot be classified costs a warning, a model that cannot be
//! analyzed costs an error and its entry, and a failing detector costs a
//! `detector_error` issue — the run always completes with a best-effort
//! result. The single fatal condition is a database connection that cannot
//! be established at all, surfaced from [`ModelAnalyzer::connect`].

use crate::config::AnalyzerConfig;
use crate::detect::{
    CircularDependencyDetector, DatabaseMismatchDetector, Detector, IndexAnalyzer,
    InverseDetector, MigrationMismatchDetector,
};
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::extractor::{ExtractionError, RelationshipExtractor};
use crate::health;
use crate::issue::{AnalysisResult, Issue, IssueKind, Severity};
use crate::migrate::{MigrationScanner, SchemaSnapshot};
use crate::model::ModelInfo;
use crate::naming;
use crate::scanner::{ClassRegistry, ModelScanner};
use crate::schema::SchemaReader;

/// Ordered observability events; correctness never depends on anyone
/// listening.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    RunStart { models: usize },
    ModelStart { class: String },
    ModelDone { class: String, relationships: usize },
    ModelError { class: String, error: String },
    Phase { name: &'static str },
}

#[derive(Debug)]
pub struct ModelAnalyzer {
    config: AnalyzerConfig,
    schema: SchemaReader,
}

impl ModelAnalyzer {
    /// Connect to the configured database. The missing or unreachable
    /// database is the one unrecoverable setup error.
    pub async fn connect(config: AnalyzerConfig) -> AnalyzerResult<Self> {
        let Some(url) = config.database_url.clone() else {
            return Err(AnalyzerError::Connection(
                "no database_url configured".to_string(),
            ));
        };
        let schema = SchemaReader::connect(&url, config.excluded_tables.clone()).await?;
        Ok(Self { config, schema })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn schema(&self) -> &SchemaReader {
        &self.schema
    }

    /// Run a full analysis.
    pub async fn analyze(&self) -> AnalysisResult {
        self.analyze_with(None, &mut |_| {}).await
    }

    /// Run a full analysis with an optional model allowlist (short or
    /// fully-qualified names) and a progress observer.
    pub async fn analyze_with(
        &self,
        only: Option<&[String]>,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> AnalysisResult {
        let mut result = AnalysisResult::default();

        // 1. Scan for model classes.
        progress(ProgressEvent::Phase { name: "scan" });
        let scanner = ModelScanner::new(
            self.config.model_paths.clone(),
            self.config.excluded_models.clone(),
        );
        let (registry, mut classes) = scanner.scan();
        if let Some(only) = only {
            if !only.is_empty() {
                classes = filter_classes(classes, only);
            }
        }
        progress(ProgressEvent::RunStart {
            models: classes.len(),
        });

        // 2. Extract relationships per model.
        let mut extractor = RelationshipExtractor::new(&registry);
        for class in &classes {
            progress(ProgressEvent::ModelStart {
                class: class.clone(),
            });

            match build_model(&registry, &mut extractor, class) {
                Ok((model, extraction_errors)) => {
                    progress(ProgressEvent::ModelDone {
                        class: class.clone(),
                        relationships: model.relationships.len(),
                    });
                    result.models.push(model);
                    for error in extraction_errors {
                        result.add_issue(parse_error_issue(&error));
                    }
                }
                Err(e) => {
                    let short_name = naming::class_basename(class);
                    result.add_issue(
                        Issue::new(
                            IssueKind::ModelAnalysisError,
                            Severity::Error,
                            short_name,
                            format!("Failed to analyze model {short_name}: {e}"),
                        )
                        .suggest(
                            "Check this model file for syntax the static analyzer cannot follow.",
                        )
                        .context("model", class.as_str()),
                    );
                    progress(ProgressEvent::ModelError {
                        class: class.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        // 3. Capture the live schema snapshot.
        progress(ProgressEvent::Phase { name: "schema" });
        match self.schema.snapshot().await {
            Ok(snapshot) => result.schema = snapshot,
            Err(e) => result.add_issue(
                Issue::new(
                    IssueKind::SchemaReadError,
                    Severity::Error,
                    "system",
                    format!("Failed to read database schema: {e}"),
                )
                .suggest("Check your database connection and configuration."),
            ),
        }

        // 4. Fold migrations into the intended schema.
        progress(ProgressEvent::Phase { name: "migrations" });
        let intended: SchemaSnapshot = if self.config.migration_paths.is_empty() {
            SchemaSnapshot::new()
        } else {
            MigrationScanner::new().scan(&self.config.migration_paths)
        };

        // 5. Detectors, each isolated from the others.
        progress(ProgressEvent::Phase { name: "detect" });
        run_detector(&InverseDetector, &mut result).await;
        run_detector(&CircularDependencyDetector, &mut result).await;
        run_detector(&DatabaseMismatchDetector::new(&self.schema), &mut result).await;
        run_detector(
            &MigrationMismatchDetector::new(&intended, &self.schema),
            &mut result,
        )
        .await;
        run_detector(&IndexAnalyzer::new(&self.schema), &mut result).await;

        // 6. Score.
        progress(ProgressEvent::Phase { name: "score" });
        result.health_score = health::health_score(&result, &self.config.health_weights);

        result
    }
}

fn build_model(
    registry: &ClassRegistry,
    extractor: &mut RelationshipExtractor,
    class: &str,
) -> AnalyzerResult<(ModelInfo, Vec<ExtractionError>)> {
    let php_class = registry
        .get(class)
        .ok_or_else(|| AnalyzerError::parse(class, "class not present in the scan registry"))?;
    let table = registry
        .table_of(class)
        .ok_or_else(|| AnalyzerError::parse(class, "cannot determine table name"))?;

    let mut model = ModelInfo::new(class, table);
    model.relationships = extractor.extract(php_class);
    Ok((model, extractor.take_errors()))
}

fn parse_error_issue(error: &ExtractionError) -> Issue {
    let short_name = naming::class_basename(&error.model);
    Issue::new(
        IssueKind::RelationshipParseError,
        Severity::Warning,
        short_name,
        format!(
            "Failed to inspect relationship method {}::{}(): {}",
            short_name, error.method, error.message
        ),
    )
    .suggest(
        "Declare the related model with a class reference or string literal \
         so it can be resolved without running code.",
    )
    .context("model", error.model.as_str())
    .context("method", error.method.as_str())
}

async fn run_detector<D: Detector>(detector: &D, result: &mut AnalysisResult) {
    if let Err(e) = detector.detect(result).await {
        result.add_issue(
            Issue::new(
                IssueKind::DetectorError,
                Severity::Error,
                "system",
                format!("{} failed: {e}", D::NAME),
            )
            .suggest("This is an internal analysis error. Please report it.")
            .context("detector", D::NAME),
        );
    }
}

/// Keep only classes matching one of the given short or fully-qualified
/// names.
fn filter_classes(classes: Vec<String>, only: &[String]) -> Vec<String> {
    classes
        .into_iter()
        .filter(|class| {
            only.iter()
                .any(|name| class == name || naming::class_basename(class) == name)
        })
        .collect()
}
