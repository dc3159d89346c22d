//! Application-level errors (wraps domain errors)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add resolution-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("environment variable {name} is not set and has no default (at '{path}')")]
    MissingEnvVar { name: String, path: String },

    #[error("failed to read {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("circular template reference at '{path}': {expression}")]
    CircularTemplateReference { path: String, expression: String },

    #[error("template resolution exceeded {limit} iterations at '{path}'")]
    TemplateResolutionLimitExceeded { path: String, limit: usize },

    #[error("'{path}' references missing path '{target}'")]
    MissingReference { path: String, target: String },

    #[error("unknown template action '{action}' at '{path}'")]
    UnknownTemplateAction { path: String, action: String },

    #[error("invalid template usage at '{path}': {reason}")]
    InvalidTemplateUsage { path: String, reason: String },

    #[error("configuration '{key}' is not set")]
    NotConfigured { key: String },

    #[error("configuration '{key}' is already set")]
    AlreadyConfigured { key: String },

    #[error("no parameter named '{name}'")]
    UnknownParameter { name: String },

    #[error("parameter '{name}' is not a {expected}")]
    ParameterKind { name: String, expected: String },

    #[error("dependency '{name}' not found")]
    DependencyNotFound { name: String },

    #[error("dependency '{name}' is not a {expected}")]
    DependencyType { name: String, expected: String },

    #[error("config error: {message}")]
    Config { message: String },
}

impl ApplicationError {
    /// The dotted path the error refers to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            ApplicationError::Domain(DomainError::PathNotFound { path })
            | ApplicationError::Domain(DomainError::MalformedTemplateExpression { path, .. })
            | ApplicationError::Domain(DomainError::ModelConversion { path, .. })
            | ApplicationError::Domain(DomainError::InvalidPath { path, .. })
            | ApplicationError::MissingEnvVar { path, .. }
            | ApplicationError::CircularTemplateReference { path, .. }
            | ApplicationError::TemplateResolutionLimitExceeded { path, .. }
            | ApplicationError::MissingReference { path, .. }
            | ApplicationError::UnknownTemplateAction { path, .. }
            | ApplicationError::InvalidTemplateUsage { path, .. } => Some(path.as_str()),
            _ => None,
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
