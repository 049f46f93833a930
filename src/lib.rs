//! # relscope — relationship & schema auditor for Laravel codebases
//!
//! relscope statically extracts Eloquent relationship declarations from
//! PHP model sources (never executing them), rebuilds the intended schema
//! from migration files, introspects the live database (SQLite or MySQL),
//! and cross-references the three views for design defects: missing
//! inverse relationships, circular dependency chains, schema drift,
//! missing foreign keys and unindexed foreign-key columns. Findings reduce
//! to a 0–100 health score.
//!
//! ## Quick example
//!
//! ```rust,ignore
//! use relscope::prelude::*;
//!
//! let mut config = AnalyzerConfig::default();
//! config.database_url = Some("sqlite://database/database.sqlite".into());
//!
//! let analyzer = ModelAnalyzer::connect(config).await?;
//! let result = analyzer.analyze().await;
//!
//! println!("health: {}/100", result.health_score);
//! for issue in &result.issues {
//!     println!("[{:?}] {}", issue.severity, issue.message);
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod detect;
pub mod error;
pub mod extractor;
pub mod health;
pub mod issue;
pub mod migrate;
pub mod model;
pub mod naming;
pub mod php;
pub mod report;
pub mod scanner;
pub mod schema;

pub mod prelude {
    pub use crate::analyzer::{ModelAnalyzer, ProgressEvent};
    pub use crate::config::AnalyzerConfig;
    pub use crate::error::{AnalyzerError, AnalyzerResult};
    pub use crate::issue::{AnalysisResult, Issue, IssueKind, Severity};
    pub use crate::model::{ModelInfo, Relation, RelationKind, RelationTag};
    pub use crate::schema::SchemaReader;
}
