//! Error types with fix suggestions
//!
//! Most engine layers are fail-soft: these errors are produced by the inner
//! helpers, logged, and turned into empty results at the public boundary.
//! Only the CLI surfaces them to the user.

use std::path::PathBuf;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid variable '{input}': {reason}")]
    InvalidVariable { input: String, reason: String },

    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to serialize output: {0}")]
    Serialize(String),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

impl FixSuggestion for EngineError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            EngineError::Io { .. } => Some("Check file path and permissions"),
            EngineError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            EngineError::JsonParse(_) => Some("Pass --vars as a JSON object, e.g. '{\"rating1\": \"critic\"}'"),
            EngineError::InvalidVariable { .. } => Some("Use the form --var key=value"),
            EngineError::NotFound { .. } => {
                Some("Pass an existing overlay file or set --defaults-dir")
            }
            EngineError::Serialize(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
