//! Domain layer: the configuration tree and its pure building blocks
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod error;
pub mod mask;
pub mod node;
pub mod path;
pub mod sources;
pub mod template;
pub mod tree;

pub use error::{DomainError, DomainResult};
pub use mask::Mask;
pub use node::{Node, NodeMap, Scalar};
pub use sources::{SourceKind, SourceRecord};
pub use template::TemplateExpr;
pub use tree::{ConfigTree, Paths};

/// Expand environment variables and `~` in a path string.
///
/// Uses shellexpand; unknown variables leave the input unchanged.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}
