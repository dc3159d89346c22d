//! CLI-level errors (wraps application errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::exitcode;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),
}

impl From<DomainError> for CliError {
    fn from(e: DomainError) -> Self {
        CliError::from(ApplicationError::from(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => exitcode::USAGE,
            CliError::Application(e) => match e {
                ApplicationError::FileRead { .. } => exitcode::NOINPUT,
                ApplicationError::Config { .. } => exitcode::CONFIG,
                ApplicationError::Domain(DomainError::InvalidPath { .. })
                | ApplicationError::Domain(DomainError::InvalidMask { .. }) => exitcode::USAGE,
                ApplicationError::Domain(_)
                | ApplicationError::MissingEnvVar { .. }
                | ApplicationError::CircularTemplateReference { .. }
                | ApplicationError::TemplateResolutionLimitExceeded { .. }
                | ApplicationError::MissingReference { .. }
                | ApplicationError::UnknownTemplateAction { .. }
                | ApplicationError::InvalidTemplateUsage { .. } => exitcode::DATAERR,
                _ => exitcode::SOFTWARE,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_error_kinds_when_mapping_then_sysexits_codes() {
        let missing = CliError::from(ApplicationError::FileRead {
            path: "x.yaml".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(missing.exit_code(), exitcode::NOINPUT);

        let ambiguous = CliError::from(DomainError::AmbiguousResolution {
            query: "db.user".into(),
            candidates: vec!["a.db.user".into(), "b.db.user".into()],
        });
        assert_eq!(ambiguous.exit_code(), exitcode::DATAERR);
        assert!(ambiguous.to_string().contains("a.db.user, b.db.user"));

        assert_eq!(CliError::Usage("no".into()).exit_code(), exitcode::USAGE);
        let unset = CliError::from(ApplicationError::NotConfigured { key: "default".into() });
        assert_eq!(unset.exit_code(), exitcode::SOFTWARE);
    }
}
