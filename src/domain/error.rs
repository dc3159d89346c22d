//! Domain-level errors (no I/O concerns)

use itertools::Itertools;
use thiserror::Error;

/// Domain errors describe violations on the configuration tree itself.
/// These are independent of where the data came from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("path not found: '{path}'")]
    PathNotFound { path: String },

    #[error("ambiguous relative path suffix '{query}': candidates [{}]", .candidates.iter().join(", "))]
    AmbiguousResolution {
        query: String,
        candidates: Vec<String>,
    },

    #[error("malformed template expression at '{path}': {expression}: {reason}")]
    MalformedTemplateExpression {
        path: String,
        expression: String,
        reason: String,
    },

    #[error("cannot convert '{path}' into {type_name}: {message}")]
    ModelConversion {
        type_name: String,
        path: String,
        message: String,
    },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid mask '{mask}': {reason}")]
    InvalidMask { mask: String, reason: String },

    #[error("invalid source format in {source_name}: {message}")]
    SourceFormat {
        source_name: String,
        message: String,
    },
}

impl DomainError {
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// A mapping key that is the empty string, found in the map at `parent`.
    pub fn empty_key(source_name: impl Into<String>, parent: &str) -> Self {
        Self::SourceFormat {
            source_name: source_name.into(),
            message: if parent.is_empty() {
                "empty key at the top level".to_string()
            } else {
                format!("empty key under '{parent}'")
            },
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
