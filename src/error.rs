//! Error types for relscope.

use thiserror::Error;

/// The main error type for analysis operations.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The database connection could not be established at all.
    /// This is the only fatal setup error; everything else degrades
    /// into issues on the analysis result.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A live-schema introspection query failed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A source file could not be parsed as a PHP class.
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// A detector failed mid-run.
    #[error("{detector} failed: {message}")]
    Detector {
        detector: &'static str,
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyzerError {
    /// Create a parse error for the given file.
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a detector failure.
    pub fn detector(detector: &'static str, message: impl Into<String>) -> Self {
        Self::Detector {
            detector,
            message: message.into(),
        }
    }
}

/// Result type alias for analysis operations.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
