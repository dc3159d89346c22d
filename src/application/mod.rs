//! Application layer: template resolution, binding and source loading
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod actions;
pub mod binder;
pub mod error;
pub mod error_ext;
pub mod holder;
pub mod providers;
pub mod services;
pub mod template;

pub use binder::{resolve, resolve_as, BoundArgs, PathSpec, ResolutionBinder, ResolutionRequest, Resolved};
pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use holder::{ConfigHolder, DEFAULT_KEY};
pub use providers::Providers;
pub use template::{ActionContext, ActionOutput, ResolutionReport, TemplateAction, TemplateEngine};
