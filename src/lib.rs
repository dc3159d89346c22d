//! cfgtree: hierarchical configuration trees
//!
//! Sources (YAML documents, `.env` files, in-memory mappings) are deep-merged
//! into a [`ConfigTree`], `${{ ACTION:ARG }}` templates are resolved by the
//! [`TemplateEngine`], and a [`ResolutionBinder`] looks values up by path,
//! by suffix or by parameter name.
//!
//! ```no_run
//! use std::path::PathBuf;
//! use cfgtree::config::Settings;
//! use cfgtree::{ResolutionRequest, ServiceContainer};
//!
//! let container = ServiceContainer::new(Settings::default());
//! let (tree, _) = container.load_resolved(&[PathBuf::from("config.yaml")])?;
//! let args = container
//!     .binder()
//!     .param("user", ResolutionRequest::path("db.user"))
//!     .build()?
//!     .bind(&tree)?;
//! let user: String = args.require("user")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

pub use application::{
    ApplicationError, ApplicationResult, BoundArgs, ConfigHolder, Providers, ResolutionBinder,
    ResolutionRequest, TemplateEngine,
};
pub use domain::{ConfigTree, DomainError, Mask, Node, Scalar};
pub use infrastructure::ServiceContainer;
