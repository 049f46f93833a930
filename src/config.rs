//! Analyzer configuration.
//!
//! Loaded from `relscope.toml` in the working directory (or the user
//! config directory as a fallback), with every field optional:
//!
//! ```toml
//! model_paths = ["app/Models", "app"]
//! migration_paths = ["database/migrations"]
//! excluded_tables = ["migrations", "telescope_entries"]
//! database_url = "sqlite://database/database.sqlite"
//! strict = false
//!
//! [health_weights]
//! has_inverse = 30
//! no_circular = 30
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AnalyzerError, AnalyzerResult};

pub const CONFIG_FILE: &str = "relscope.toml";

/// Point weights acknowledged by the health scorer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    pub has_inverse: u32,
    pub no_circular: u32,
    pub column_exists: u32,
    pub has_index: u32,
    pub has_foreign_key: u32,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            has_inverse: 30,
            no_circular: 30,
            column_exists: 20,
            has_index: 10,
            has_foreign_key: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Source roots scanned for model classes.
    pub model_paths: Vec<PathBuf>,
    /// Migration directories; empty disables migration-mismatch checking.
    pub migration_paths: Vec<PathBuf>,
    /// Fully-qualified class names excluded from analysis.
    pub excluded_models: Vec<String>,
    /// Tables excluded from schema analysis.
    pub excluded_tables: Vec<String>,
    /// `sqlite://...` or `mysql://...`.
    pub database_url: Option<String>,
    /// Treat warnings as failures in the CLI exit code.
    pub strict: bool,
    pub health_weights: HealthWeights,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model_paths: vec![PathBuf::from("app/Models"), PathBuf::from("app")],
            migration_paths: vec![PathBuf::from("database/migrations")],
            excluded_models: vec!["Illuminate\\Notifications\\DatabaseNotification".to_string()],
            excluded_tables: vec![
                "migrations".to_string(),
                "failed_jobs".to_string(),
                "password_resets".to_string(),
                "personal_access_tokens".to_string(),
            ],
            database_url: None,
            strict: false,
            health_weights: HealthWeights::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load from an explicit path, else `./relscope.toml`, else
    /// `<config dir>/relscope/relscope.toml`, else defaults.
    pub fn load(explicit: Option<&Path>) -> AnalyzerResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = Path::new(CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(local);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let global = config_dir.join("relscope").join(CONFIG_FILE);
            if global.is_file() {
                return Self::from_file(&global);
            }
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> AnalyzerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AnalyzerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&contents)
            .map_err(|e| AnalyzerError::Config(format!("invalid {}: {e}", path.display())))
    }
}
